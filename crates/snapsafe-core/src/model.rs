use std::fmt;
use std::path::PathBuf;

/// Terminal outcome for a processed file. Closed set: every discovered file
/// ends in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Copied,
    SkippedExtension,
    SkippedIncremental,
    SkippedNoDate,
    SkippedDestExists,
    DuplicateHash,
    ErrorStat,
    ErrorDate,
    ErrorHash,
    ErrorCopy,
    ErrorWalk,
}

impl FileState {
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            FileState::SkippedExtension
                | FileState::SkippedIncremental
                | FileState::SkippedNoDate
                | FileState::SkippedDestExists
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            FileState::ErrorStat
                | FileState::ErrorDate
                | FileState::ErrorHash
                | FileState::ErrorCopy
                | FileState::ErrorWalk
        )
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::Copied => "copied",
            FileState::SkippedExtension => "skipped (extension)",
            FileState::SkippedIncremental => "skipped (incremental)",
            FileState::SkippedNoDate => "skipped (no date)",
            FileState::SkippedDestExists => "skipped (destination exists)",
            FileState::DuplicateHash => "duplicate (hash exists)",
            FileState::ErrorStat => "error (stat)",
            FileState::ErrorDate => "error (date extraction)",
            FileState::ErrorHash => "error (hash computation)",
            FileState::ErrorCopy => "error (copy failed)",
            FileState::ErrorWalk => "error (walk failed)",
        };
        f.write_str(s)
    }
}

/// Outcome of classifying a candidate, before any copy happens.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Copy { estimated_size: u64 },
    Skip(FileState),
    Duplicate { existing: String },
    Error(FileState),
}

/// Produced exactly once per candidate, consumed exactly once by the
/// accounting fold.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub path: PathBuf,
    pub dest_path: Option<PathBuf>,
    pub state: FileState,
    pub error: Option<String>,
    pub bytes_copied: u64,
}

impl ProcessingResult {
    pub fn terminal(path: PathBuf, state: FileState) -> Self {
        Self {
            path,
            dest_path: None,
            state,
            error: None,
            bytes_copied: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Aggregate accounting built by a single fold over the ordered result set.
/// Never mutated after construction.
#[derive(Debug, Default)]
pub struct AccountingSummary {
    pub copied: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub errors: usize,

    pub copied_files: Vec<(String, String)>,
    pub duplicate_files: Vec<(String, String)>,
    pub skipped_files: Vec<SkippedFile>,
    pub error_list: Vec<String>,

    pub total_bytes: u64,
    pub total_files: usize,
    pub walk_errors: usize,
}

impl AccountingSummary {
    /// Fold the ordered result stream into bucket counts and report lists.
    ///
    /// Cancelled slots are `None` and are excluded entirely — they are not
    /// errors, the file was simply never processed. Walk errors have no
    /// candidate, so they arrive separately and land in the error bucket.
    pub fn fold(results: &[Option<ProcessingResult>], walk_errors: &[String]) -> Self {
        let mut summary = AccountingSummary {
            walk_errors: walk_errors.len(),
            ..Default::default()
        };

        for result in results.iter().flatten() {
            summary.total_files += 1;
            let src = result.path.display().to_string();
            let dst = result
                .dest_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();

            match result.state {
                FileState::Copied => {
                    summary.copied += 1;
                    summary.copied_files.push((src, dst));
                    summary.total_bytes += result.bytes_copied;
                }
                FileState::DuplicateHash => {
                    summary.duplicates += 1;
                    summary.duplicate_files.push((src, dst));
                }
                state if state.is_skip() => {
                    summary.skipped += 1;
                    summary.skipped_files.push(SkippedFile {
                        path: src,
                        reason: state.to_string(),
                    });
                }
                state => {
                    summary.errors += 1;
                    let message = match &result.error {
                        Some(err) => format!("{}: {}", src, err),
                        None => format!("{}: {}", src, state),
                    };
                    summary.error_list.push(message);
                }
            }
        }

        for walk_err in walk_errors {
            summary.error_list.push(format!("walk error: {}", walk_err));
        }
        summary.errors += walk_errors.len();

        summary
    }

    /// Assert that every processed file landed in exactly one bucket.
    /// A mismatch indicates a logic defect and must be surfaced, not fixed up.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        let accounted = self.copied + self.skipped + self.duplicates + self.errors
            - self.walk_errors;
        if accounted != self.total_files {
            return Err(crate::error::Error::Accounting(format!(
                "processed {} files but accounted for {}",
                self.total_files, accounted
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(path: &str, state: FileState, bytes: u64) -> Option<ProcessingResult> {
        Some(ProcessingResult {
            path: PathBuf::from(path),
            dest_path: Some(PathBuf::from(format!("/dest{}", path))),
            state,
            error: None,
            bytes_copied: bytes,
        })
    }

    #[test]
    fn fold_buckets_every_state_exactly_once() {
        let results = vec![
            result("/a.jpg", FileState::Copied, 10),
            result("/b.jpg", FileState::DuplicateHash, 0),
            result("/c.txt", FileState::SkippedExtension, 0),
            result("/d.jpg", FileState::ErrorCopy, 0),
            result("/e.jpg", FileState::SkippedIncremental, 0),
        ];
        let summary = AccountingSummary::fold(&results, &[]);

        assert_eq!(summary.copied, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.total_files, 5);
        assert_eq!(summary.total_bytes, 10);
        summary.validate().unwrap();
    }

    #[test]
    fn fold_excludes_cancelled_slots() {
        let results = vec![
            result("/a.jpg", FileState::Copied, 4),
            None,
            result("/c.jpg", FileState::SkippedDestExists, 0),
            None,
        ];
        let summary = AccountingSummary::fold(&results, &[]);
        assert_eq!(summary.total_files, 2);
        summary.validate().unwrap();
    }

    #[test]
    fn walk_errors_count_toward_error_bucket_only() {
        let results = vec![result("/a.jpg", FileState::Copied, 1)];
        let walk_errors = vec!["denied: /private".to_string()];
        let summary = AccountingSummary::fold(&results, &walk_errors);

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.error_list.len(), 1);
        assert!(summary.error_list[0].starts_with("walk error:"));
        summary.validate().unwrap();
    }

    #[test]
    fn validate_surfaces_double_counting() {
        let summary = AccountingSummary {
            copied: 2,
            total_files: 1,
            ..Default::default()
        };
        assert!(summary.validate().is_err());
    }
}
