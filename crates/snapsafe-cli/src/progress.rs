use indicatif::{ProgressBar, ProgressStyle};
use snapsafe_core::BackupObserver;
use std::sync::Mutex;

/// CLI progress rendering using indicatif.
///
/// - Discovery: spinner (total unknown upfront)
/// - Planning pass: progress bar
/// - Copy pass: progress bar
pub struct BackupReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl BackupReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    fn set_position(&self, completed: usize, total: usize) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(completed as u64);
        }
    }

    fn phase_bar(&self, label: &str, total: usize) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(&format!(
                "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} files ({{eta}} remaining)",
                label
            ))
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }
}

impl BackupObserver for BackupReporter {
    fn on_scan_start(&self) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message("Scanning files...");
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} files in {:.2}s",
            total_files, duration_secs
        );
    }

    fn on_plan_start(&self, total_files: usize) {
        self.phase_bar("Planning", total_files);
    }

    fn on_plan_progress(&self, completed: usize, total: usize) {
        self.set_position(completed, total);
    }

    fn on_plan_complete(&self, files_to_copy: usize, estimated_bytes: u64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Plan complete: {} files to copy, ~{:.1} MiB",
            files_to_copy,
            estimated_bytes as f64 / (1024.0 * 1024.0)
        );
    }

    fn on_space_check(&self, required_bytes: u64, available_bytes: u64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Space check: {:.1} MiB required, {:.1} MiB available",
            required_bytes as f64 / (1024.0 * 1024.0),
            available_bytes as f64 / (1024.0 * 1024.0)
        );
    }

    fn on_copy_start(&self, total_files: usize) {
        self.phase_bar("Copying", total_files);
    }

    fn on_copy_progress(&self, completed: usize, total: usize) {
        self.set_position(completed, total);
    }

    fn on_copy_complete(&self, copied: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Copy complete: {} files copied in {:.2}s",
            copied, duration_secs
        );
    }
}
