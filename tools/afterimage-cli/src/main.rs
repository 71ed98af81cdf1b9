//! Afterimage CLI: live temporal effects on a webcam feed.
//!
//! Usage:
//!   afterimage mask [OPTIONS]    Live foreground over delayed frames
//!   afterimage flow [OPTIONS]    Live frame warped by delayed motion fields
//!
//! Press `q` then Enter in the terminal to quit.

use std::process::ExitCode;

use afterimage_common::config::AppConfig;
use afterimage_common::error::AfterimageError;
use afterimage_common::logging::{effective_logging, init_logging};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod settings;

use settings::{FlowArgs, MaskArgs};

#[derive(Parser)]
#[command(
    name = "afterimage",
    about = "Delayed-frame video effects from a live camera",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Paint the live foreground over a delayed frame
    Mask(MaskArgs),

    /// Warp the live frame by a delayed optical-flow field
    Flow(FlowArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, origin) = match AppConfig::load() {
        Ok(loaded) => loaded,
        Err(e) => usage_error(&e),
    };
    init_logging(&effective_logging(&config.logging, cli.verbose));
    tracing::debug!(origin = %origin, "Configuration loaded");

    let result = match &cli.command {
        Commands::Mask(args) => commands::mask::run(args, &config.pipeline),
        Commands::Flow(args) => commands::flow::run(args, &config.pipeline),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<AfterimageError>() {
            Some(err) if err.is_configuration() => usage_error(err),
            _ => {
                tracing::error!("{e:#}");
                println!("Error: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

/// Report a bad option value the way clap reports parse errors, then exit.
fn usage_error(err: &AfterimageError) -> ! {
    Cli::command().error(ErrorKind::ValueValidation, err).exit()
}
