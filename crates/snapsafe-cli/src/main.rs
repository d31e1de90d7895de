mod commands;
mod logging;
mod progress;

use std::process;

use clap::Parser;
use colored::*;
use commands::Cli;
use dotenv::dotenv;
use progress::BackupReporter;
use snapsafe_core::dates::MtimeResolver;
use snapsafe_core::report::{HtmlReport, ReportSink};
use snapsafe_core::{run_backup, BackupOptions, CancelFlag, RunOutcome};
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match snapsafe_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            eprintln!("\nInterrupt received, finishing in-flight files...");
            cancel.cancel();
        }) {
            error!("Could not install interrupt handler: {}", err);
            process::exit(1);
        }
    }

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| args.dest.join("snapsafe.db"));
    let report_path = args.report.clone().unwrap_or_else(|| {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        args.dest.join(format!("report_{}.html", stamp))
    });

    let options = BackupOptions {
        src: args.src.clone(),
        dest: args.dest.clone(),
        db_path,
        ledger_path: args.dest.join("snapsafe_resume.state"),
        workers: args.workers,
        incremental: args.incremental,
        resume: args.resume,
    };

    let reporter = BackupReporter::new();
    let outcome = match run_backup(&options, &config, &MtimeResolver, &reporter, &cancel) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Error: {}", err);
            process::exit(1);
        }
    };

    print_summary(&outcome);

    if let Err(err) = HtmlReport::new(&report_path).write(
        &outcome.summary,
        outcome.elapsed,
        &options.src,
        &options.dest,
    ) {
        warn!("Could not write report: {}", err);
    }

    if let Some(mismatch) = &outcome.accounting_error {
        eprintln!("{} {}", "WARNING:".red().bold(), mismatch.red());
    }

    if outcome.interrupted {
        eprintln!(
            "Run interrupted; re-run with {} to continue where it left off.",
            "--resume".yellow()
        );
        process::exit(1);
    }
}

fn print_summary(outcome: &RunOutcome) {
    let summary = &outcome.summary;
    println!();
    info!(
        "{} files in {}: {} copied ({}), {} duplicates, {} skipped, {} errors",
        summary.total_files,
        format!("{:.2}s", outcome.elapsed.as_secs_f64()).green(),
        format!("{}", summary.copied).green(),
        format!("{:.1} MiB", summary.total_bytes as f64 / (1024.0 * 1024.0)).green(),
        format!("{}", summary.duplicates).cyan(),
        format!("{}", summary.skipped).yellow(),
        format!("{}", summary.errors).red(),
    );
    for err in &summary.error_list {
        warn!("{}", err);
    }
}
