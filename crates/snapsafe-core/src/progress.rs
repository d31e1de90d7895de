/// Observer seam for run progress. All methods have no-op defaults so
/// implementors override only what they render.
pub trait BackupObserver: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_plan_start(&self, _total_files: usize) {}
    fn on_plan_progress(&self, _completed: usize, _total: usize) {}
    fn on_plan_complete(&self, _files_to_copy: usize, _estimated_bytes: u64) {}
    fn on_space_check(&self, _required_bytes: u64, _available_bytes: u64) {}
    fn on_copy_start(&self, _total_files: usize) {}
    fn on_copy_progress(&self, _completed: usize, _total: usize) {}
    fn on_copy_complete(&self, _copied: usize, _duration_secs: f64) {}
}

/// No-op observer for silent operation.
pub struct SilentObserver;

impl BackupObserver for SilentObserver {}
