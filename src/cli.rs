//! CLI argument parsing.
use crate::config::Overrides;
use crate::workflow::PartialBatchPolicy;
use clap::Parser;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "genroll",
    version,
    about = "Add every contact in a vCard file to a messaging group, resumably",
    after_help = "State (session cookies, per-group ledgers, config.json) lives in --state-dir.\nA run that is interrupted picks up where it stopped.\n\nExamples:\n  genroll \"Book Club\" contacts.vcf\n  genroll \"Book Club\" contacts.vcf --spawn-driver --partial-batch submit\n  genroll \"Book Club\" contacts.vcf --status --json",
    arg_required_else_help = true
)]
pub struct Args {
    /// Exact title of the group to add members to
    #[arg(value_name = "GROUP")]
    pub group: String,

    /// vCard (.vcf) file with the contacts to add
    #[arg(value_name = "CONTACTS")]
    pub contacts: PathBuf,

    /// Directory for session, ledgers, and config.json
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Config file to use instead of <state-dir>/config.json
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// WebDriver endpoint, e.g. http://localhost:9515
    #[arg(long, value_name = "URL", conflicts_with = "spawn_driver")]
    pub webdriver_url: Option<String>,

    /// Start chromedriver locally and restart it if it dies
    #[arg(long)]
    pub spawn_driver: bool,

    /// Bound on batch cycles per attempt
    #[arg(long, value_name = "N")]
    pub max_cycles: Option<usize>,

    /// Give up after N attempts (default: retry forever)
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// What to do with a final batch smaller than the confirm threshold
    #[arg(long, value_enum, value_name = "POLICY")]
    pub partial_batch: Option<PartialBatchPolicy>,

    /// Print progress for the group without opening a browser
    #[arg(long)]
    pub status: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Log per-element detail
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            webdriver_url: self.webdriver_url.clone(),
            max_cycles: self.max_cycles,
            max_attempts: self.max_attempts,
            partial_batch: self.partial_batch,
        }
    }
}
