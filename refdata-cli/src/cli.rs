//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "refdata-cli", version, about = "Load market reference tables from spreadsheets into a relational database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import table spreadsheets, in the order given.
    ///
    /// Geographic files must come in hierarchy order: countries before
    /// districts before municipalities before parishes.
    Import {
        /// Spreadsheet files to import
        files: Vec<PathBuf>,
        /// Worksheet to read in each file
        #[arg(long, default_value = "Data")]
        sheet: String,
    },
    /// Link processes to their ordered steps from the process-steps sheet
    ProcessSteps {
        file: PathBuf,
        #[arg(long, default_value = "Data")]
        sheet: String,
    },
    /// Post-import association procedures
    #[command(subcommand)]
    Associate(AssociateCommands),
    /// Run the full pipeline from a directory of conventionally named files
    Run {
        /// Directory containing the source spreadsheets
        #[arg(long, default_value = "files")]
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AssociateCommands {
    /// Link fields to the records sharing their code prefix
    Fields,
    /// Set record types from an auxiliary sheet
    RecordTypes {
        file: PathBuf,
        #[arg(long, default_value = "Data")]
        sheet: String,
    },
    /// Link steps to header types and records from an auxiliary sheet
    Steps {
        file: PathBuf,
        #[arg(long, default_value = "Data")]
        sheet: String,
    },
}
