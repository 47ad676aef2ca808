use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wakenode_cli::config::Config;
use wakenode_cli::{format, sim};
use wakenode_types::{BatteryStatus, Settings, heat_index_fahrenheit};

mod cli;

use cli::{Cli, Commands, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // Logs go to stderr so JSON on stdout stays machine-readable
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let output = match cli.command {
        Commands::Run {
            config,
            cycles,
            format: output_format,
            fast,
        } => {
            if cycles == 0 {
                bail!("--cycles must be at least 1");
            }
            let config = Config::load(config.as_deref())?;
            tracing::info!(
                device = %config.node.device_id,
                channels = config.channels.len(),
                cycles,
                fast,
                "Starting simulation"
            );
            let reports = sim::run(&config, cycles, fast).await?;
            match output_format {
                OutputFormat::Text => format::format_cycles_text(&reports),
                OutputFormat::Json => format::as_json(&reports)?,
            }
        }
        Commands::HeatIndex { temp_f, humidity } => {
            if !(0.0..=100.0).contains(&humidity) {
                bail!("humidity must be between 0 and 100, got {}", humidity);
            }
            let heat_index = heat_index_fahrenheit(temp_f, humidity)
                .context("temperature and humidity must be finite numbers")?;
            format::format_heat_index(temp_f, humidity, heat_index)
        }
        Commands::Battery { raw, coefficient } => {
            let coefficient = Settings::validate_coefficient(f64::from(coefficient))?;
            format::format_battery(&BatteryStatus::from_raw(raw, coefficient))
        }
        Commands::Config => Config::default().to_toml()?,
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
