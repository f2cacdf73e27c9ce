use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "privacy-scope",
    about = "Score how sites and companies track users and handle personal data",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file [default: ./.privacy-scope/config.toml, fallback ~/.config/privacy-scope/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT", global = true)]
    pub report: ReportFormat,

    /// Show rubric answers, review points and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the score line
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Look up a company or domain in the policy rubric and review catalogs
    Lookup {
        /// Company name or domain (URLs are reduced to their host)
        query: String,

        /// Look up a second company side by side
        #[arg(long, value_name = "QUERY")]
        compare: Option<String>,
    },

    /// Show tracker telemetry and the privacy score for one domain
    Site {
        /// Domain as listed in the telemetry snapshot, e.g. `google.com`
        domain: String,
    },

    /// List every domain in the telemetry snapshot, most popular first
    Domains,

    /// Build the master list of companies covered by either catalog
    Catalog,

    /// Read queries from stdin, one per line, against a shared snapshot
    Shell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
