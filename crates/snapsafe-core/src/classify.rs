use crate::candidate::Candidate;
use crate::config::AppConfig;
use crate::dates::DateResolver;
use crate::model::{Decision, FileState};
use chrono::{DateTime, Utc};

/// Shared inputs to the per-file decision: the extension allow-list, the
/// incremental watermark, and which pass is running.
pub struct ClassifyContext<'a> {
    pub config: &'a AppConfig,
    pub incremental: bool,
    /// Most recent `inserted_at` from the durable index; files at or before
    /// this instant are skipped in incremental mode.
    pub watermark: Option<DateTime<Utc>>,
}

/// Decide a candidate's fate up to (but not including) the hash check.
/// Each step short-circuits to a terminal state.
///
/// The planning pass passes a filesystem-mtime resolver here so no file
/// content or expensive metadata is read before the space budget is known;
/// the execution pass injects the real date oracle. Hashing never happens
/// here — it is fused with the copy itself, so `Decision::Copy` means
/// "proceed to the staged copy", after which the hash index settles
/// copy-versus-duplicate.
pub fn classify(
    candidate: &mut Candidate,
    ctx: &ClassifyContext,
    resolver: &dyn DateResolver,
) -> Decision {
    if candidate.stat_error.is_some() {
        return Decision::Error(FileState::ErrorStat);
    }

    if !ctx.config.is_extension_allowed(&candidate.extension) {
        return Decision::Skip(FileState::SkippedExtension);
    }

    if ctx.incremental {
        if let (Some(mtime), Some(watermark)) = (candidate.mtime_unix(), ctx.watermark) {
            // Boundary is inclusive: a file stamped exactly at the watermark
            // was part of the previous run's last batch.
            if mtime <= watermark.timestamp() {
                return Decision::Skip(FileState::SkippedIncremental);
            }
        }
    }

    let outcome = candidate.ensure_date(resolver).clone();
    let date = match outcome.date {
        Some(date) => date,
        None => {
            return match outcome.error {
                Some(_) => Decision::Error(FileState::ErrorDate),
                None => Decision::Skip(FileState::SkippedNoDate),
            }
        }
    };

    if candidate.dest_path_for(date).exists() {
        return Decision::Skip(FileState::SkippedDestExists);
    }

    Decision::Copy {
        estimated_size: candidate.size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{Confidence, DateOutcome, MtimeResolver};
    use crate::walk::DiscoveredFile;
    use chrono::TimeZone;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    struct FailingResolver;

    impl DateResolver for FailingResolver {
        fn best_date(&self, _: &Path, _: Option<SystemTime>) -> DateOutcome {
            DateOutcome {
                date: None,
                confidence: Confidence::None,
                error: Some("exif parse failed".into()),
            }
        }
    }

    fn candidate(path: &str, mtime_secs: u64) -> Candidate {
        Candidate::new(
            &DiscoveredFile {
                path: PathBuf::from(path),
                size: 100,
                modified: Some(UNIX_EPOCH + Duration::from_secs(mtime_secs)),
                stat_error: None,
            },
            Path::new("/nonexistent-backup-root"),
        )
    }

    fn ctx(config: &AppConfig, incremental: bool, watermark_secs: Option<i64>) -> ClassifyContext {
        ClassifyContext {
            config,
            incremental,
            watermark: watermark_secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
        }
    }

    #[test]
    fn disallowed_extension_short_circuits() {
        let config = AppConfig::default();
        let mut c = candidate("/src/notes.txt", 1_700_000_000);
        let decision = classify(&mut c, &ctx(&config, false, None), &MtimeResolver);
        assert_eq!(decision, Decision::Skip(FileState::SkippedExtension));
    }

    #[test]
    fn stat_failure_beats_everything_else() {
        let config = AppConfig::default();
        let mut c = candidate("/src/a.jpg", 1_700_000_000);
        c.stat_error = Some("permission denied".into());
        let decision = classify(&mut c, &ctx(&config, false, None), &MtimeResolver);
        assert_eq!(decision, Decision::Error(FileState::ErrorStat));
    }

    #[test]
    fn incremental_watermark_boundary_is_inclusive() {
        let config = AppConfig::default();
        let watermark = 1_700_000_000;

        // Exactly at the watermark: skipped.
        let mut at = candidate("/src/at.jpg", watermark as u64);
        assert_eq!(
            classify(&mut at, &ctx(&config, true, Some(watermark)), &MtimeResolver),
            Decision::Skip(FileState::SkippedIncremental)
        );

        // One second past it: kept.
        let mut after = candidate("/src/after.jpg", watermark as u64 + 1);
        assert_eq!(
            classify(&mut after, &ctx(&config, true, Some(watermark)), &MtimeResolver),
            Decision::Copy { estimated_size: 100 }
        );

        // Same file without incremental mode: kept.
        let mut full = candidate("/src/at.jpg", watermark as u64);
        assert_eq!(
            classify(&mut full, &ctx(&config, false, Some(watermark)), &MtimeResolver),
            Decision::Copy { estimated_size: 100 }
        );
    }

    #[test]
    fn unresolvable_date_without_error_is_a_skip() {
        let config = AppConfig::default();
        let mut c = candidate("/src/a.jpg", 1);
        c.modified = None;
        let decision = classify(&mut c, &ctx(&config, false, None), &MtimeResolver);
        assert_eq!(decision, Decision::Skip(FileState::SkippedNoDate));
    }

    #[test]
    fn failed_date_extraction_is_an_error() {
        let config = AppConfig::default();
        let mut c = candidate("/src/a.jpg", 1_700_000_000);
        let decision = classify(&mut c, &ctx(&config, false, None), &FailingResolver);
        assert_eq!(decision, Decision::Error(FileState::ErrorDate));
    }

    #[test]
    fn existing_destination_is_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();

        let file = DiscoveredFile {
            path: PathBuf::from("/src/a.jpg"),
            size: 100,
            modified: Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            stat_error: None,
        };
        let mut c = Candidate::new(&file, dir.path());

        // Pre-create the month-bucketed destination.
        let date = chrono::DateTime::<chrono::Local>::from(file.modified.unwrap());
        let dest = dir
            .path()
            .join(date.format("%Y-%m").to_string())
            .join("a.jpg");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"already there").unwrap();

        let decision = classify(&mut c, &ctx(&config, false, None), &MtimeResolver);
        assert_eq!(decision, Decision::Skip(FileState::SkippedDestExists));
    }
}
