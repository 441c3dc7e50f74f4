use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::constants::STATIONS_FILE;

#[derive(Parser)]
#[command(name = "station-store")]
#[command(about = "Tiered-consistency access layer for replicated weather station data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file [default: station-store.toml if present]"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the station schema and print the table definition
    Schema,

    /// Load stations and temperature readings into the store
    Ingest {
        #[arg(short, long, default_value = STATIONS_FILE, help = "GHCN stations inventory")]
        stations: PathBuf,

        #[arg(short, long, help = "Temperature CSV (station,date,tmin,tmax)")]
        temperatures: PathBuf,

        #[arg(long, help = "Two-letter state filter [default: from config]")]
        state: Option<String>,

        #[arg(long, help = "Load every station regardless of state")]
        all_states: bool,

        #[arg(long, help = "Maximum concurrent writes [default: from config]")]
        concurrency: Option<usize>,

        #[arg(long, help = "Map the stations file instead of reading it")]
        mmap: bool,
    },

    /// Ingest, optionally degrade a station's replicas, then query it
    Query {
        #[arg(short, long, default_value = STATIONS_FILE, help = "GHCN stations inventory")]
        stations: PathBuf,

        #[arg(short, long, help = "Temperature CSV (station,date,tmin,tmax)")]
        temperatures: PathBuf,

        #[arg(long, help = "Station id to query")]
        station: String,

        #[arg(long, help = "Range start for record listing (YYYY-MM-DD)")]
        from: Option<String>,

        #[arg(long, help = "Range end for record listing (YYYY-MM-DD)")]
        to: Option<String>,

        #[arg(long, default_value = "0", help = "Replicas of the station to mark down")]
        down_replicas: usize,

        #[arg(
            long,
            default_value = "0",
            help = "Replicas of the station to mark unresponsive"
        )]
        unresponsive: usize,

        #[arg(long, help = "Print replies as JSON")]
        json: bool,
    },
}
