use std::fs::{self, File};
use std::path::Path;

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// One step of a walk. Directory events arrive before anything inside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit<'a> {
    Directory(&'a Path),
    File { folder: &'a Path, file: &'a Path },
}

/// Walks `root` depth-first, calling `visit` for every readable directory and
/// file, and returns how many files were visited.
///
/// Symlinks are followed; a link cycle is logged and skipped. Directories
/// that cannot be listed or entered, or that hold a `nomedia` marker, are
/// skipped together with everything below them. Unreadable entries are
/// logged and skipped; a missing or non-directory root yields zero visits.
pub fn walk<F>(root: &Path, mut visit: F) -> usize
where
    F: FnMut(Visit<'_>),
{
    if !root.is_dir() {
        debug!(path = %root.display(), "walk root is not a directory");
        return 0;
    }

    let mut files = 0;
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_type().is_dir() || is_scannable_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            visit(Visit::Directory(entry.path()));
        } else if entry.file_type().is_file() {
            if let Err(e) = File::open(entry.path()) {
                debug!(path = %entry.path().display(), "skipping unreadable file: {}", e);
                continue;
            }

            let folder = entry.path().parent().unwrap_or(root);
            visit(Visit::File {
                folder,
                file: entry.path(),
            });
            files += 1;
        }
    }

    files
}

fn is_scannable_dir(entry: &DirEntry) -> bool {
    let listing = match fs::read_dir(entry.path()) {
        Ok(listing) => listing,
        Err(e) => {
            debug!(path = %entry.path().display(), "skipping unreadable directory: {}", e);
            return false;
        }
    };

    let children: Vec<_> = listing.filter_map(|e| e.ok()).collect();

    // listing only needs read permission, reaching the children needs search
    if let Some(child) = children.first() {
        if let Err(e) = fs::symlink_metadata(child.path()) {
            debug!(path = %entry.path().display(), "skipping unsearchable directory: {}", e);
            return false;
        }
    }

    let excluded = children
        .iter()
        .any(|e| is_exclusion_marker(&e.file_name().to_string_lossy()));

    if excluded {
        debug!(path = %entry.path().display(), "skipping excluded directory");
    }
    !excluded
}

fn is_exclusion_marker(name: &str) -> bool {
    name.trim_start_matches('.').eq_ignore_ascii_case("nomedia")
}
