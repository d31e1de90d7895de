use crate::error::Error;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Run metadata carried on the ledger's first line. Fields are appended,
/// never reordered, so a resume can load a ledger written by an older build.
#[derive(Debug, Clone)]
pub struct LedgerHeader {
    pub start_time: DateTime<Utc>,
    pub src: PathBuf,
    pub dest: PathBuf,
    pub incremental: bool,
}

impl LedgerHeader {
    fn to_line(&self) -> String {
        format!(
            "START_TIME:{} SRC:{} DEST:{} INCREMENTAL:{}",
            self.start_time.to_rfc3339(),
            self.src.display(),
            self.dest.display(),
            self.incremental
        )
    }

    /// Paths may contain spaces, so the line is cut at the known field tags
    /// rather than split on whitespace.
    fn parse(line: &str) -> Result<Self, Error> {
        let malformed = || Error::Ledger(format!("malformed ledger header: {}", line));

        let rest = line.strip_prefix("START_TIME:").ok_or_else(malformed)?;
        let (time_str, rest) = rest.split_once(" SRC:").ok_or_else(malformed)?;
        let (src, rest) = rest.split_once(" DEST:").ok_or_else(malformed)?;
        let (dest, rest) = rest.split_once(" INCREMENTAL:").ok_or_else(malformed)?;
        // Tolerate fields a newer build may have appended after INCREMENTAL.
        let incremental = rest.split_whitespace().next().ok_or_else(malformed)?;

        let start_time = DateTime::parse_from_rfc3339(time_str)
            .map_err(|e| Error::Ledger(format!("bad ledger start time {:?}: {}", time_str, e)))?
            .with_timezone(&Utc);
        let incremental = incremental
            .parse::<bool>()
            .map_err(|_| Error::Ledger(format!("bad incremental flag {:?}", incremental)))?;

        Ok(Self {
            start_time,
            src: PathBuf::from(src),
            dest: PathBuf::from(dest),
            incremental,
        })
    }
}

struct Inner {
    file: File,
    processed: HashSet<PathBuf>,
}

/// Durable record of source paths already processed in the current logical
/// run. One header line, then one appended line per finished file; a crashed
/// run leaves the file behind and a resume filters its paths out before
/// scheduling. Deleted on clean completion.
pub struct ResumeLedger {
    path: PathBuf,
    header: LedgerHeader,
    inner: Mutex<Inner>,
}

impl ResumeLedger {
    /// Start a fresh ledger for a new run, truncating any stale file.
    pub fn create(path: &Path, src: &Path, dest: &Path, incremental: bool) -> Result<Self, Error> {
        let header = LedgerHeader {
            start_time: Utc::now(),
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            incremental,
        };
        let mut file = File::create(path)?;
        writeln!(file, "{}", header.to_line())?;
        file.sync_data()?;
        debug!("Started resume ledger at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            header,
            inner: Mutex::new(Inner {
                file,
                processed: HashSet::new(),
            }),
        })
    }

    /// Load an interrupted run's ledger and reopen it for appending.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();
        let header_line = lines
            .next()
            .ok_or_else(|| Error::Ledger(format!("empty ledger file {}", path.display())))??;
        let header = LedgerHeader::parse(&header_line)?;

        let mut processed = HashSet::new();
        for line in lines {
            let line = line?;
            if !line.is_empty() {
                processed.insert(PathBuf::from(line));
            }
        }
        info!(
            "Resuming run started {} ({} files already processed)",
            header.start_time.to_rfc3339(),
            processed.len()
        );

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            header,
            inner: Mutex::new(Inner { file, processed }),
        })
    }

    pub fn header(&self) -> &LedgerHeader {
        &self.header
    }

    /// Whether a loaded ledger belongs to the run being requested. A ledger
    /// for a different source/dest pair must not suppress any work.
    pub fn matches(&self, src: &Path, dest: &Path) -> bool {
        self.header.src == src && self.header.dest == dest
    }

    pub fn is_processed(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().processed.contains(path)
    }

    pub fn processed_count(&self) -> usize {
        self.inner.lock().unwrap().processed.len()
    }

    /// Durably append one finished path. Called once per file after its
    /// outcome is final; the append is synced before returning so a crash
    /// right after cannot lose the mark. Appends are serialized internally,
    /// callers may race freely.
    pub fn mark_processed(&self, path: &Path) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.processed.insert(path.to_path_buf()) {
            return Ok(());
        }
        writeln!(inner.file, "{}", path.display())?;
        inner.file.sync_data()?;
        Ok(())
    }

    /// Remove the ledger after a clean, complete run.
    pub fn cleanup(self) -> Result<(), Error> {
        fs::remove_file(&self.path)?;
        debug!("Removed resume ledger {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn marks_survive_reload() {
        let dir = tempdir().unwrap();
        let ledger_path = dir.path().join("resume.state");

        let ledger = ResumeLedger::create(
            &ledger_path,
            Path::new("/photos"),
            Path::new("/backup"),
            true,
        )
        .unwrap();
        ledger.mark_processed(Path::new("/photos/a.jpg")).unwrap();
        ledger.mark_processed(Path::new("/photos/b with space.jpg")).unwrap();
        drop(ledger);

        let resumed = ResumeLedger::load(&ledger_path).unwrap();
        assert!(resumed.matches(Path::new("/photos"), Path::new("/backup")));
        assert!(resumed.header().incremental);
        assert_eq!(resumed.processed_count(), 2);
        assert!(resumed.is_processed(Path::new("/photos/a.jpg")));
        assert!(resumed.is_processed(Path::new("/photos/b with space.jpg")));
        assert!(!resumed.is_processed(Path::new("/photos/c.jpg")));
    }

    #[test]
    fn resumed_ledger_keeps_earlier_marks_on_new_appends() {
        let dir = tempdir().unwrap();
        let ledger_path = dir.path().join("resume.state");

        let ledger =
            ResumeLedger::create(&ledger_path, Path::new("/p"), Path::new("/b"), false).unwrap();
        ledger.mark_processed(Path::new("/p/one.jpg")).unwrap();
        drop(ledger);

        let resumed = ResumeLedger::load(&ledger_path).unwrap();
        resumed.mark_processed(Path::new("/p/two.jpg")).unwrap();
        drop(resumed);

        let again = ResumeLedger::load(&ledger_path).unwrap();
        assert!(again.is_processed(Path::new("/p/one.jpg")));
        assert!(again.is_processed(Path::new("/p/two.jpg")));
    }

    #[test]
    fn duplicate_marks_append_once() {
        let dir = tempdir().unwrap();
        let ledger_path = dir.path().join("resume.state");

        let ledger =
            ResumeLedger::create(&ledger_path, Path::new("/p"), Path::new("/b"), false).unwrap();
        ledger.mark_processed(Path::new("/p/a.jpg")).unwrap();
        ledger.mark_processed(Path::new("/p/a.jpg")).unwrap();
        drop(ledger);

        let content = fs::read_to_string(&ledger_path).unwrap();
        assert_eq!(content.lines().count(), 2); // header + one mark
    }

    #[test]
    fn header_with_spaced_paths_round_trips() {
        let header = LedgerHeader {
            start_time: Utc::now(),
            src: PathBuf::from("/my photos/2024 trip"),
            dest: PathBuf::from("/mnt/backup drive"),
            incremental: false,
        };
        let parsed = LedgerHeader::parse(&header.to_line()).unwrap();
        assert_eq!(parsed.src, header.src);
        assert_eq!(parsed.dest, header.dest);
        assert!(!parsed.incremental);
    }

    #[test]
    fn cleanup_removes_the_file() {
        let dir = tempdir().unwrap();
        let ledger_path = dir.path().join("resume.state");
        let ledger =
            ResumeLedger::create(&ledger_path, Path::new("/p"), Path::new("/b"), true).unwrap();
        ledger.cleanup().unwrap();
        assert!(!ledger_path.exists());
    }

    #[test]
    fn malformed_header_is_rejected() {
        let dir = tempdir().unwrap();
        let ledger_path = dir.path().join("resume.state");
        fs::write(&ledger_path, "not a header\n/p/a.jpg\n").unwrap();
        match ResumeLedger::load(&ledger_path) {
            Err(Error::Ledger(_)) => {}
            other => panic!("expected ledger error, got {:?}", other.map(|_| ())),
        }
    }
}
