//! Contains the CLI logic to emit a default configuration file with fill-in-the-blank slots.

use std::borrow::Cow;

use clap::ArgMatches;

use crate::error::SysError;

#[derive(rust_embed::RustEmbed)]
#[folder = "templates/"]
struct ExampleEnv;

/// Name of the embedded dotenv template.
pub const EXAMPLE_FILE: &str = "example.env";

/// Creates a subcommand for creating an example configuration file for Warden.
pub fn subcommand() -> clap::App<'static, 'static> {
    clap::SubCommand::with_name("make-config")
        .arg(clap::Arg::with_name("output-file")
            .value_name("FILE")
            .default_value("./default.env")
            .help("The destination to write the dotenv file to.")
            .takes_value(true)
            .index(1))
        .about("Create a config file with placeholders to fill for a working dotenv file.")
}

fn example_contents() -> crate::error::Result<Cow<'static, [u8]>> {
    ExampleEnv::get(EXAMPLE_FILE)
        .map(|f| f.data)
        .ok_or_else(|| SysError::new("example.env wasn't embedded").into())
}

/// Handles the case where someone invoked the output from the subcommand function.
pub async fn handle_matches(args: &ArgMatches<'_>) -> crate::error::Result<()> {
    let of = args.value_of("output-file").unwrap_or("./default.env");
    tokio::fs::write(of, example_contents()?).await?;
    info!("wrote example config to {}", of);
    Ok(())
}
