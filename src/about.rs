// Warden - A Discord anti-spam and administration bot.
// Copyright (C) 2020-2021 Nick Samson

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains constants describing some meta info about this binary.

/// Name of the binary, as shown by `--help`.
pub const BIN_NAME: &str = env!("CARGO_PKG_NAME");
/// Comma separated list of the authors.
pub const AUTHOR_NAME: &str = env!("CARGO_PKG_AUTHORS");
/// Short version of the warden copyright header.
pub const LICENSE_HEADER: &str = r#"Warden - A Discord anti-spam and administration bot.
Copyright (C) 2020-2021 Nick Samson

This binary is subject to the terms of the Mozilla Public
License, v. 2.0. If a copy of the MPL was not distributed with this
binary, You can obtain one at http://mozilla.org/MPL/2.0/."#;
/// The version from the Cargo.toml used to compile this version of warden.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
