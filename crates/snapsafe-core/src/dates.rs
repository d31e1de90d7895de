use chrono::{DateTime, Local};
use std::path::Path;
use std::time::SystemTime;

/// How reliable a resolved date is. Ordering matters: `None < Low < Medium < High`.
///
/// The pipeline treats any successful resolution as usable regardless of
/// confidence; confidence exists for reporting and future heuristics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::None => "none",
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct DateOutcome {
    pub date: Option<DateTime<Local>>,
    pub confidence: Confidence,
    /// Extraction failure detail, if any. A resolver may fail and still leave
    /// the caller free to fall back to the filesystem timestamp.
    pub error: Option<String>,
}

impl DateOutcome {
    pub fn none() -> Self {
        Self {
            date: None,
            confidence: Confidence::None,
            error: None,
        }
    }
}

/// Date oracle seam. EXIF / video-container extraction plugs in here;
/// the pipeline itself only consumes the resolved outcome.
///
/// Explicitly constructed and injected into the engine — no process-wide
/// registry singleton.
pub trait DateResolver: Send + Sync {
    fn best_date(&self, path: &Path, modified: Option<SystemTime>) -> DateOutcome;
}

/// Resolver backed by the filesystem modification time only.
///
/// Always available and cheap; confidence is `Low` because mtimes survive
/// neither re-saves nor transfers particularly well.
pub struct MtimeResolver;

impl DateResolver for MtimeResolver {
    fn best_date(&self, _path: &Path, modified: Option<SystemTime>) -> DateOutcome {
        match modified {
            Some(mtime) => DateOutcome {
                date: Some(DateTime::<Local>::from(mtime)),
                confidence: Confidence::Low,
                error: None,
            },
            None => DateOutcome::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn confidence_ordering() {
        assert!(Confidence::None < Confidence::Low);
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }

    #[test]
    fn mtime_resolver_uses_modified_time() {
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let outcome = MtimeResolver.best_date(Path::new("/x/a.jpg"), Some(mtime));
        assert_eq!(outcome.confidence, Confidence::Low);
        let date = outcome.date.expect("date resolved");
        assert_eq!(date.timestamp(), 1_700_000_000);
    }

    #[test]
    fn mtime_resolver_without_mtime_resolves_nothing() {
        let outcome = MtimeResolver.best_date(Path::new("/x/a.jpg"), None);
        assert!(outcome.date.is_none());
        assert_eq!(outcome.confidence, Confidence::None);
    }
}
