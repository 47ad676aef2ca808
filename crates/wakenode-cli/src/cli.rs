//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "wakenode")]
#[command(author, version, about = "Simulator and utilities for wake-and-report sensor nodes", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run simulated wake cycles
    Run {
        /// Config file (defaults to the user config, then built-in defaults)
        #[arg(short, long, env = "WAKENODE_CONFIG")]
        config: Option<PathBuf>,

        /// Number of wake cycles to run
        #[arg(short = 'n', long, default_value = "1")]
        cycles: u32,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Run on virtual time without waiting between ticks
        #[arg(long)]
        fast: bool,
    },

    /// Compute the heat index
    HeatIndex {
        /// Temperature in °F
        #[arg(long, allow_negative_numbers = true)]
        temp_f: f32,

        /// Relative humidity in percent
        #[arg(long)]
        humidity: f32,
    },

    /// Convert a raw ADC sample to battery voltage
    Battery {
        /// Raw ADC count
        #[arg(long)]
        raw: u16,

        /// Volts per ADC count
        #[arg(long, default_value_t = wakenode_types::DEFAULT_VOLTAGE_COEFFICIENT)]
        coefficient: f32,
    },

    /// Print the default simulator configuration
    Config,
}
