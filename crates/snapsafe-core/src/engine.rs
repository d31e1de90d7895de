use crate::candidate::Candidate;
use crate::cancel::CancelFlag;
use crate::classify::{classify, ClassifyContext};
use crate::config::AppConfig;
use crate::copier::{stage_copy, CopyError};
use crate::dates::{DateResolver, MtimeResolver};
use crate::error::Error;
use crate::hash_index::HashIndex;
use crate::model::{AccountingSummary, Decision, FileState, ProcessingResult};
use crate::progress::BackupObserver;
use crate::resume::ResumeLedger;
use crate::scheduler;
use crate::space;
use crate::storage::{Database, IndexRecord};
use crate::walk::{self, DiscoveredFile};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Safety margin kept free on the destination filesystem beyond the
/// estimated copy volume.
const SPACE_SAFETY_BUFFER: u64 = 100 * 1024 * 1024;
/// Rough durable-index growth per accepted file, for the space check.
const DB_BYTES_PER_RECORD: u64 = 512;
const DB_ESTIMATE_MIN: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub db_path: PathBuf,
    pub ledger_path: PathBuf,
    pub workers: usize,
    pub incremental: bool,
    /// Continue the interrupted run recorded at `ledger_path` instead of
    /// starting fresh.
    pub resume: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: AccountingSummary,
    pub elapsed: Duration,
    /// The run was cancelled; the summary covers only what completed and the
    /// resume ledger was left on disk.
    pub interrupted: bool,
    /// Set when the post-run accounting invariant failed. A defect report,
    /// not a file-level error.
    pub accounting_error: Option<String>,
}

/// Run one backup end to end: discover, plan, space-check, execute, account.
///
/// Setup failures (missing directories, unopenable database, insufficient
/// space, unusable resume state) abort before any file is touched. Per-file
/// failures never do — they come back as `Error*` states in the summary.
pub fn run_backup(
    options: &BackupOptions,
    config: &AppConfig,
    resolver: &dyn DateResolver,
    observer: &dyn BackupObserver,
    cancel: &CancelFlag,
) -> Result<RunOutcome, Error> {
    let started = Instant::now();

    if !options.src.is_dir() {
        return Err(Error::Setup(format!(
            "source directory {} does not exist",
            options.src.display()
        )));
    }
    if !options.dest.is_dir() {
        return Err(Error::Setup(format!(
            "destination directory {} does not exist",
            options.dest.display()
        )));
    }

    let db = Database::open(&options.db_path)?;
    let watermark = if options.incremental {
        db.last_inserted_at()?
    } else {
        None
    };
    let index = HashIndex::new(db, config.hash_batch_size)?;
    info!(
        "Hash index loaded: {} known hashes, watermark {:?}",
        index.known_count(),
        watermark
    );

    let ledger = if options.resume {
        let ledger = ResumeLedger::load(&options.ledger_path)?;
        if !ledger.matches(&options.src, &options.dest) {
            return Err(Error::Ledger(format!(
                "resume state at {} belongs to {} -> {}, not this source/destination pair",
                options.ledger_path.display(),
                ledger.header().src.display(),
                ledger.header().dest.display()
            )));
        }
        ledger
    } else {
        ResumeLedger::create(
            &options.ledger_path,
            &options.src,
            &options.dest,
            options.incremental,
        )?
    };

    observer.on_scan_start();
    let scan_started = Instant::now();
    let (mut files, walk_errors) = walk::discover(&options.src, &config.ignore_patterns);
    observer.on_scan_complete(files.len(), scan_started.elapsed().as_secs_f64());
    info!("Discovered {} files, {} walk errors", files.len(), walk_errors.len());

    if ledger.processed_count() > 0 {
        let before = files.len();
        files.retain(|file| !ledger.is_processed(&file.path));
        info!(
            "Resume: {} of {} files already processed, {} remaining",
            before - files.len(),
            before,
            files.len()
        );
    }

    let ctx = ClassifyContext {
        config,
        incremental: options.incremental,
        watermark,
    };

    // Planning pass: no hashing, no copying. Dates come from the filesystem
    // mtime so the byte estimate is free, if slightly optimistic.
    observer.on_plan_start(files.len());
    let plan_results = scheduler::run(
        files.clone(),
        options.workers,
        cancel,
        |file| {
            let mut candidate = Candidate::new(&file, &options.dest);
            Some(classify(&mut candidate, &ctx, &MtimeResolver))
        },
        |completed, total| observer.on_plan_progress(completed, total),
    );
    if cancel.is_cancelled() {
        return Err(Error::Interrupted);
    }

    let mut files_to_copy = 0usize;
    let mut estimated_bytes = 0u64;
    for decision in plan_results.iter().flatten() {
        if let Decision::Copy { estimated_size } = decision {
            files_to_copy += 1;
            estimated_bytes += estimated_size;
        }
    }
    observer.on_plan_complete(files_to_copy, estimated_bytes);

    let db_estimate = (files_to_copy as u64 * DB_BYTES_PER_RECORD).max(DB_ESTIMATE_MIN);
    let required = estimated_bytes + db_estimate + SPACE_SAFETY_BUFFER;
    let available = space::free_bytes(&options.dest)?;
    observer.on_space_check(required, available);
    if available < required {
        return Err(Error::Setup(format!(
            "insufficient space on {}: {} bytes required, {} available",
            options.dest.display(),
            required,
            available
        )));
    }

    // Execution pass: full classification plus the fused hash-and-copy.
    observer.on_copy_start(files.len());
    let copy_started = Instant::now();
    let results = scheduler::run(
        files,
        options.workers,
        cancel,
        |file| {
            let result = process_one(
                &file,
                &options.dest,
                &ctx,
                resolver,
                &index,
                config.copy_buffer_size,
                cancel,
            )?;
            if let Err(e) = ledger.mark_processed(&result.path) {
                warn!("Could not record {} in resume ledger: {}", result.path.display(), e);
            }
            Some(result)
        },
        |completed, total| observer.on_copy_progress(completed, total),
    );
    index.flush();

    let summary = AccountingSummary::fold(&results, &walk_errors);
    observer.on_copy_complete(summary.copied, copy_started.elapsed().as_secs_f64());

    let interrupted = cancel.is_cancelled();
    if interrupted {
        info!(
            "Interrupted; resume state kept at {}",
            options.ledger_path.display()
        );
    } else {
        ledger.cleanup()?;
    }

    let accounting_error = match summary.validate() {
        Ok(()) => None,
        Err(e) => {
            error!("{}", e);
            Some(e.to_string())
        }
    };

    Ok(RunOutcome {
        summary,
        elapsed: started.elapsed(),
        interrupted,
        accounting_error,
    })
}

/// Evaluate and, if accepted, copy a single file. Returns `None` only when
/// the copy was abandoned mid-stream due to cancellation — the file was
/// neither completed nor marked, so a resumed run picks it up again.
fn process_one(
    file: &DiscoveredFile,
    dest_dir: &Path,
    ctx: &ClassifyContext,
    resolver: &dyn DateResolver,
    index: &HashIndex,
    buffer_size: usize,
    cancel: &CancelFlag,
) -> Option<ProcessingResult> {
    let mut candidate = Candidate::new(file, dest_dir);

    let result = match classify(&mut candidate, ctx, resolver) {
        Decision::Skip(state) => ProcessingResult::terminal(candidate.path.clone(), state),
        Decision::Error(state) => {
            let detail = match state {
                FileState::ErrorStat => candidate.stat_error.clone(),
                FileState::ErrorDate => candidate.ensure_date(resolver).error.clone(),
                _ => None,
            };
            ProcessingResult {
                path: candidate.path.clone(),
                dest_path: None,
                state,
                error: detail,
                bytes_copied: 0,
            }
        }
        Decision::Duplicate { existing } => duplicate_result(&candidate, existing),
        Decision::Copy { .. } => {
            let dest_path = candidate
                .dest_path()
                .expect("classification resolves the destination before accepting")
                .to_path_buf();
            match stage_copy(
                &candidate.path,
                &dest_path,
                buffer_size,
                candidate.modified,
                cancel,
            ) {
                Err(CopyError::Cancelled) => return None,
                Err(e @ CopyError::Read(_)) => ProcessingResult {
                    path: candidate.path.clone(),
                    dest_path: None,
                    state: FileState::ErrorHash,
                    error: Some(e.to_string()),
                    bytes_copied: 0,
                },
                Err(e @ CopyError::Write(_)) => ProcessingResult {
                    path: candidate.path.clone(),
                    dest_path: None,
                    state: FileState::ErrorCopy,
                    error: Some(e.to_string()),
                    bytes_copied: 0,
                },
                Ok(stage) => {
                    let dest_str = dest_path.display().to_string();
                    match index.reserve(&stage.hash, &dest_str) {
                        Some(existing) => {
                            stage.discard();
                            duplicate_result(&candidate, existing)
                        }
                        None => {
                            let hash = stage.hash.clone();
                            let bytes = stage.bytes;
                            match stage.commit() {
                                Ok(final_path) => {
                                    index.enqueue(IndexRecord::new(
                                        candidate.path.display().to_string(),
                                        final_path.display().to_string(),
                                        hash,
                                        bytes as i64,
                                        candidate.mtime_unix().unwrap_or(0),
                                    ));
                                    ProcessingResult {
                                        path: candidate.path.clone(),
                                        dest_path: Some(final_path),
                                        state: FileState::Copied,
                                        error: None,
                                        bytes_copied: bytes,
                                    }
                                }
                                Err(e) => {
                                    // Free the hash so a later occurrence of
                                    // this content can still be archived.
                                    index.release(&hash);
                                    ProcessingResult {
                                        path: candidate.path.clone(),
                                        dest_path: None,
                                        state: FileState::ErrorCopy,
                                        error: Some(e.to_string()),
                                        bytes_copied: 0,
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    Some(result)
}

fn duplicate_result(candidate: &Candidate, existing: String) -> ProcessingResult {
    ProcessingResult {
        path: candidate.path.clone(),
        dest_path: Some(PathBuf::from(existing)),
        state: FileState::DuplicateHash,
        error: None,
        bytes_copied: 0,
    }
}
