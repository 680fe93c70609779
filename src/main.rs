//! consult-call - call-session host for nutrition consultations
//!
//! Drives one embedded call room through its lifecycle, either in a terminal
//! UI or headless.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consult_call::config::Config;
use consult_call::session::call_test::{self, CallTestOptions};
use consult_call::session::{CallProps, Role};
use consult_call::tui;
use consult_call::tui::log_capture::LogBuffer;

#[derive(Parser)]
#[command(name = "consult-call")]
#[command(about = "Call-session host for nutrition consultations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a call room in the terminal UI
    Call {
        /// Room identifier shared by both participants
        #[arg(short, long)]
        room: String,

        /// Display name shown to the other side (defaults to config)
        #[arg(short, long)]
        name: Option<String>,

        /// Which side of the consultation you are on
        #[arg(long, value_enum)]
        role: Option<Role>,
    },

    /// Run a scripted call without a UI and print a summary
    CallTest {
        /// Room identifier
        #[arg(short, long, default_value = "call-test")]
        room: String,

        /// Display name (defaults to config, then "tester")
        #[arg(short, long)]
        name: Option<String>,

        /// Seconds to hold the call once joined
        #[arg(short, long, default_value = "3")]
        duration: u64,

        /// Seconds to wait for the conference to be joined
        #[arg(long, default_value = "10")]
        join_timeout: u64,
    },

    /// Show or initialise the preferences file
    Config {
        /// Write the current (or default) preferences to disk
        #[arg(long)]
        init: bool,
    },
}

/// Install the tracing subscriber. With a capture buffer, output goes there
/// instead of stderr.
fn init_logging(verbose: bool, capture: Option<LogBuffer>) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match capture {
        Some(buffer) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(buffer),
            )
            .init(),
        None => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load config")?;

    match cli.command {
        Commands::Call { room, name, role } => {
            let log_buffer = LogBuffer::new();
            init_logging(cli.verbose, Some(log_buffer.clone()));

            let display_name = config
                .resolve_display_name(name)
                .context("No display name. Pass --name or set display_name in the config.")?;
            let props = CallProps {
                room,
                display_name,
                role: config.resolve_role(role),
                is_open: true,
            };
            tui::run(props, Box::new(config.loopback.factory()), log_buffer).await?;
        }
        Commands::CallTest {
            room,
            name,
            duration,
            join_timeout,
        } => {
            init_logging(cli.verbose, None);

            let opts = CallTestOptions {
                room,
                display_name: config
                    .resolve_display_name(name)
                    .unwrap_or_else(|| "tester".to_string()),
                role: config.role,
                duration: Duration::from_secs(duration),
                join_timeout: Duration::from_secs(join_timeout),
            };
            let result =
                call_test::run_call_test(opts, Box::new(config.loopback.factory())).await?;
            call_test::print_summary(&result);
            anyhow::ensure!(
                result.reached_active && result.audio_confirmed && result.end_callbacks == 1,
                "Call test failed"
            );
        }
        Commands::Config { init } => {
            init_logging(cli.verbose, None);

            println!("# {}", Config::config_path()?.display());
            print!("{}", config.to_toml()?);
            if init {
                let path = config.save()?;
                tracing::info!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
