use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "snapsafe")]
#[command(about = "Deduplicating, resumable media backup", long_about = None)]
pub struct Cli {
    /// Source directory to back up
    #[arg(long)]
    pub src: PathBuf,

    /// Destination archive root (must exist)
    #[arg(long)]
    pub dest: PathBuf,

    /// Skip files not newer than the last archived batch
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub incremental: bool,

    /// Number of parallel workers
    #[arg(long, default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Content-index database path [default: <dest>/snapsafe.db]
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// HTML report output path [default: <dest>/report_<timestamp>.html]
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Continue the interrupted run recorded in the destination
    #[arg(long)]
    pub resume: bool,
}
