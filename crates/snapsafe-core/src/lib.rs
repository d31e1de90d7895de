pub mod cancel;
pub mod candidate;
pub mod classify;
pub mod config;
pub mod copier;
pub mod dates;
pub mod engine;
pub mod error;
pub mod hash_index;
pub mod model;
pub mod progress;
pub mod report;
pub mod resume;
pub mod scheduler;
pub mod space;
pub mod storage;
pub mod walk;

pub use cancel::CancelFlag;
pub use config::AppConfig;
pub use engine::{run_backup, BackupOptions, RunOutcome};
pub use error::Error;
pub use model::{AccountingSummary, FileState, ProcessingResult};
pub use progress::{BackupObserver, SilentObserver};
pub use report::{HtmlReport, ReportSink};
