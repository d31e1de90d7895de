use crate::error::Error;
use crate::model::AccountingSummary;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Sink for the final run summary. The pipeline only hands over the numbers;
/// what artifact comes out the other end is the sink's business.
pub trait ReportSink {
    fn write(
        &self,
        summary: &AccountingSummary,
        elapsed: Duration,
        src: &Path,
        dest: &Path,
    ) -> Result<(), Error>;
}

/// Writes a single self-contained HTML page with the summary table and one
/// section per outcome bucket, with `file://` links into the archive.
pub struct HtmlReport {
    path: std::path::PathBuf,
}

impl HtmlReport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ReportSink for HtmlReport {
    fn write(
        &self,
        summary: &AccountingSummary,
        elapsed: Duration,
        src: &Path,
        dest: &Path,
    ) -> Result<(), Error> {
        let html = render(summary, elapsed, src, dest);
        fs::write(&self.path, html)?;
        info!("Report written to {}", self.path.display());
        Ok(())
    }
}

/// Sink that renders nowhere, for embedding and tests.
pub struct NullReport;

impl ReportSink for NullReport {
    fn write(
        &self,
        _summary: &AccountingSummary,
        _elapsed: Duration,
        _src: &Path,
        _dest: &Path,
    ) -> Result<(), Error> {
        Ok(())
    }
}

fn render(summary: &AccountingSummary, elapsed: Duration, src: &Path, dest: &Path) -> String {
    let mut out = String::with_capacity(8 * 1024);
    out.push_str(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>snapsafe backup report</title>\n<style>\n\
         body { font-family: sans-serif; margin: 2em; }\n\
         table { border-collapse: collapse; }\n\
         td, th { border: 1px solid #ccc; padding: 4px 10px; text-align: left; }\n\
         h2 { margin-top: 1.5em; }\n\
         .err { color: #a00; }\n\
         </style>\n</head>\n<body>\n",
    );

    let _ = write!(
        out,
        "<h1>snapsafe backup report</h1>\n\
         <p>{} &rarr; {}</p>\n\
         <table>\n\
         <tr><th>Total files</th><td>{}</td></tr>\n\
         <tr><th>Copied</th><td>{}</td></tr>\n\
         <tr><th>Duplicates</th><td>{}</td></tr>\n\
         <tr><th>Skipped</th><td>{}</td></tr>\n\
         <tr><th>Errors</th><td>{}</td></tr>\n\
         <tr><th>Bytes copied</th><td>{}</td></tr>\n\
         <tr><th>Elapsed</th><td>{:.1}s</td></tr>\n\
         </table>\n",
        escape(&src.display().to_string()),
        escape(&dest.display().to_string()),
        summary.total_files,
        summary.copied,
        summary.duplicates,
        summary.skipped,
        summary.errors,
        summary.total_bytes,
        elapsed.as_secs_f64(),
    );

    if !summary.copied_files.is_empty() {
        out.push_str("<h2>Copied</h2>\n<table>\n<tr><th>Source</th><th>Destination</th></tr>\n");
        for (from, to) in &summary.copied_files {
            let _ = write!(
                out,
                "<tr><td>{}</td><td><a href=\"file://{}\">{}</a></td></tr>\n",
                escape(from),
                escape(to),
                escape(to)
            );
        }
        out.push_str("</table>\n");
    }

    if !summary.duplicate_files.is_empty() {
        out.push_str(
            "<h2>Duplicates</h2>\n<table>\n<tr><th>Source</th><th>Existing copy</th></tr>\n",
        );
        for (from, existing) in &summary.duplicate_files {
            let _ = write!(
                out,
                "<tr><td>{}</td><td><a href=\"file://{}\">{}</a></td></tr>\n",
                escape(from),
                escape(existing),
                escape(existing)
            );
        }
        out.push_str("</table>\n");
    }

    if !summary.skipped_files.is_empty() {
        out.push_str("<h2>Skipped</h2>\n<table>\n<tr><th>File</th><th>Reason</th></tr>\n");
        for skipped in &summary.skipped_files {
            let _ = write!(
                out,
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape(&skipped.path),
                escape(&skipped.reason)
            );
        }
        out.push_str("</table>\n");
    }

    if !summary.error_list.is_empty() {
        out.push_str("<h2 class=\"err\">Errors</h2>\n<ul>\n");
        for error in &summary.error_list {
            let _ = write!(out, "<li class=\"err\">{}</li>\n", escape(error));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SkippedFile;

    fn sample_summary() -> AccountingSummary {
        AccountingSummary {
            copied: 1,
            skipped: 1,
            duplicates: 1,
            errors: 0,
            copied_files: vec![("/src/a.jpg".into(), "/dest/2024-05/a.jpg".into())],
            duplicate_files: vec![("/src/b.jpg".into(), "/dest/2024-05/a.jpg".into())],
            skipped_files: vec![SkippedFile {
                path: "/src/<odd> & \"quoted\".txt".into(),
                reason: "skipped (extension)".into(),
            }],
            error_list: vec![],
            total_bytes: 12345,
            total_files: 3,
            walk_errors: 0,
        }
    }

    #[test]
    fn report_contains_all_sections_and_escapes_paths() {
        let html = render(
            &sample_summary(),
            Duration::from_secs(2),
            Path::new("/src"),
            Path::new("/dest"),
        );
        assert!(html.contains("<h2>Copied</h2>"));
        assert!(html.contains("<h2>Duplicates</h2>"));
        assert!(html.contains("<h2>Skipped</h2>"));
        assert!(!html.contains("<h2 class=\"err\">Errors</h2>"));
        assert!(html.contains("file:///dest/2024-05/a.jpg"));
        assert!(html.contains("&lt;odd&gt; &amp; &quot;quoted&quot;"));
        assert!(!html.contains("<odd>"));
    }

    #[test]
    fn html_sink_writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("report.html");
        HtmlReport::new(&report_path)
            .write(
                &sample_summary(),
                Duration::from_secs(1),
                Path::new("/src"),
                Path::new("/dest"),
            )
            .unwrap();
        let html = fs::read_to_string(&report_path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
    }
}
