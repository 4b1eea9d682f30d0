// Warden - A Discord anti-spam and administration bot.
// Copyright (C) 2020-2021 Nick Samson

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Warden watches guild messages for floods, invite links and mass mentions, and cleans up
//! after spammers.

#![forbid(unsafe_code)]
#![deny(unused_must_use)]

#[macro_use]
extern crate serde;
#[macro_use]
extern crate tracing;

#[macro_use]
pub mod error;
pub mod about;
pub mod db;
pub mod dispatch;
pub mod example;
pub mod module;
pub mod platform;
pub mod run;
pub mod util;
