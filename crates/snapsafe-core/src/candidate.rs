use crate::dates::{DateOutcome, DateResolver};
use crate::walk::DiscoveredFile;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One discovered file being evaluated for backup, with every expensive
/// lookup cached so it runs at most once. Owned exclusively by the worker
/// processing it.
#[derive(Debug)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Normalized lowercase extension including the leading dot, e.g. `.jpg`.
    pub extension: String,
    pub dest_dir: PathBuf,
    pub stat_error: Option<String>,

    date: Option<DateOutcome>,
    dest_path: Option<PathBuf>,
}

impl Candidate {
    pub fn new(file: &DiscoveredFile, dest_dir: &Path) -> Self {
        Self {
            path: file.path.clone(),
            size: file.size,
            modified: file.modified,
            extension: normalized_extension(&file.path),
            dest_dir: dest_dir.to_path_buf(),
            stat_error: file.stat_error.clone(),
            date: None,
            dest_path: None,
        }
    }

    /// Modification time as unix seconds, for the incremental watermark check.
    pub fn mtime_unix(&self) -> Option<i64> {
        self.modified
            .map(|m| DateTime::<Local>::from(m).timestamp())
    }

    /// Resolve the best date through the injected oracle, caching the outcome.
    pub fn ensure_date(&mut self, resolver: &dyn DateResolver) -> &DateOutcome {
        if self.date.is_none() {
            self.date = Some(resolver.best_date(&self.path, self.modified));
        }
        self.date.as_ref().unwrap()
    }

    /// Destination path `dest_dir/YYYY-MM/basename` for the given date,
    /// cached after the first computation.
    pub fn dest_path_for(&mut self, date: DateTime<Local>) -> &Path {
        if self.dest_path.is_none() {
            let month_dir = self.dest_dir.join(date.format("%Y-%m").to_string());
            let basename = self.path.file_name().unwrap_or_default();
            self.dest_path = Some(month_dir.join(basename));
        }
        self.dest_path.as_deref().unwrap()
    }

    pub fn dest_path(&self) -> Option<&Path> {
        self.dest_path.as_deref()
    }
}

fn normalized_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{}", ext.to_lowercase()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::Confidence;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, UNIX_EPOCH};

    struct CountingResolver(AtomicUsize);

    impl DateResolver for CountingResolver {
        fn best_date(&self, _path: &Path, modified: Option<SystemTime>) -> DateOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            DateOutcome {
                date: modified.map(DateTime::<Local>::from),
                confidence: Confidence::Low,
                error: None,
            }
        }
    }

    fn discovered(path: &str, mtime_secs: u64) -> DiscoveredFile {
        DiscoveredFile {
            path: PathBuf::from(path),
            size: 42,
            modified: Some(UNIX_EPOCH + Duration::from_secs(mtime_secs)),
            stat_error: None,
        }
    }

    #[test]
    fn extension_is_normalized_lowercase() {
        let c = Candidate::new(&discovered("/x/IMG_0001.JPG", 1), Path::new("/backup"));
        assert_eq!(c.extension, ".jpg");

        let c = Candidate::new(&discovered("/x/noext", 1), Path::new("/backup"));
        assert_eq!(c.extension, "");
    }

    #[test]
    fn date_is_resolved_at_most_once() {
        let resolver = CountingResolver(AtomicUsize::new(0));
        let file = discovered("/x/a.jpg", 1_700_000_000);
        let mut c = Candidate::new(&file, Path::new("/backup"));

        c.ensure_date(&resolver);
        c.ensure_date(&resolver);
        assert_eq!(resolver.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dest_path_is_month_bucketed_and_cached() {
        let file = discovered("/x/a.jpg", 1_700_000_000);
        let mut c = Candidate::new(&file, Path::new("/backup"));
        let date = DateTime::<Local>::from(UNIX_EPOCH + Duration::from_secs(1_700_000_000));

        let month = date.format("%Y-%m").to_string();
        let expected: PathBuf = [Path::new("/backup"), Path::new(&month), Path::new("a.jpg")]
            .iter()
            .collect();
        assert_eq!(c.dest_path_for(date), expected.as_path());

        // A different date must not recompute the cached path.
        let other = DateTime::<Local>::from(UNIX_EPOCH + Duration::from_secs(100));
        assert_eq!(c.dest_path_for(other), expected.as_path());
    }
}
