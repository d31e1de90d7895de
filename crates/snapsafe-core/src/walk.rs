use glob::Pattern;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::error;
use walkdir::WalkDir;

/// One discovered file with its cached stat fields. The single stat happens
/// during the walk; a stat failure is carried along so the pipeline can
/// classify the file instead of dropping it.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub stat_error: Option<String>,
}

/// Walk `root` depth-first in deterministic name order, returning every
/// regular file plus any traversal errors. Traversal errors do not abort the
/// walk — the rest of the tree is still discovered.
pub fn discover(root: &Path, ignore_globs: &[String]) -> (Vec<DiscoveredFile>, Vec<String>) {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let mut files = Vec::new();
    let mut walk_errors = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(entry.path()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                walk_errors.push(format!("{}: {}", path, err));
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => files.push(DiscoveredFile {
                path: entry.path().to_path_buf(),
                size: metadata.len(),
                modified: metadata.modified().ok(),
                stat_error: None,
            }),
            Err(err) => files.push(DiscoveredFile {
                path: entry.path().to_path_buf(),
                size: 0,
                modified: None,
                stat_error: Some(err.to_string()),
            }),
        }
    }

    (files, walk_errors)
}
