use std::io::{self, IsTerminal};

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;

use crate::config;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Load the configuration and report what the server would use.
    Check,
}

pub fn run(args: ConfigArgs) -> Result<(), String> {
    match args.command {
        ConfigSubcommand::Check => check(),
    }
}

fn check() -> Result<(), String> {
    let settings = config::load()?;
    let upstream = &settings.upstream;

    let status = if io::stdout().is_terminal() {
        "config OK".green().bold().to_string()
    } else {
        "config OK".to_string()
    };
    let source = if settings.file_found {
        "loaded"
    } else {
        "not found, using defaults"
    };

    println!("{status}: {} ({source})", settings.path.display());
    println!("endpoint={}", upstream.endpoint);
    println!("model={}", upstream.models.model);
    println!("reasoning_model={}", upstream.models.reasoning_model);
    println!("timeout_secs={}", upstream.timeout_secs);
    println!("api_key_env={}", upstream.api_key_env);
    println!("api_key_present={}", upstream.is_api_key_present());
    Ok(())
}
