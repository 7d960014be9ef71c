//! One full library rebuild: validate, wipe, count, then index every file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::database::repo::{self, Store};
use crate::error::{ScanFileError, ScannerError};
use crate::ingest::walker::{self, Visit};
use crate::library::hierarchy::HierarchySchema;
use crate::library::indexer::LibraryIndexer;
use crate::media::strategy::{StrategyBuilder, StrategyFactory};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Validating,
    Wiping,
    Counting,
    Scanning,
    Done,
    Aborted,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    Success,
    NoRootConfigured,
    SampleDataActive,
    StoreFailed,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            ScanStatus::Success => "scan complete",
            ScanStatus::NoRootConfigured => "no library root configured",
            ScanStatus::SampleDataActive => "sample data mode is active, scan refused",
            ScanStatus::StoreFailed => "library database unavailable",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub root: Option<PathBuf>,
    pub sample_data: bool,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub status: ScanStatus,
    pub total_estimate: usize,
    pub visited: usize,
    pub indexed: usize,
    pub extraction_failures: usize,
    pub persistence_failures: usize,
    pub elapsed: Duration,
}

impl ScanReport {
    fn new(status: ScanStatus) -> Self {
        Self {
            status,
            total_estimate: 0,
            visited: 0,
            indexed: 0,
            extraction_failures: 0,
            persistence_failures: 0,
            elapsed: Duration::ZERO,
        }
    }
}

pub struct ScanOrchestrator {
    store: Store,
    settings: ScanSettings,
    builder: StrategyBuilder,
    state: ScanState,
}

impl ScanOrchestrator {
    pub fn new(store: Store, settings: ScanSettings, builder: StrategyBuilder) -> Self {
        Self {
            store,
            settings,
            builder,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn transition(&mut self, next: ScanState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn run(&mut self) -> ScanReport {
        let started = Instant::now();
        info!("scan started");

        let mut report = self.run_states();
        report.elapsed = started.elapsed();

        match report.status {
            ScanStatus::Success => info!(
                "done in {}s: visited={} indexed={} extraction_failures={} persistence_failures={}",
                report.elapsed.as_secs(),
                report.visited,
                report.indexed,
                report.extraction_failures,
                report.persistence_failures
            ),
            status => warn!("scan aborted: {}", status),
        }

        report
    }

    fn run_states(&mut self) -> ScanReport {
        self.transition(ScanState::Validating);
        let root = match self.validate() {
            Ok(root) => root,
            Err(status) => return self.abort(status),
        };

        self.transition(ScanState::Wiping);
        if let Err(e) = self.store.wipe() {
            error!("can't wipe library: {}", e);
            return self.abort(ScanStatus::StoreFailed);
        }

        let schema = match HierarchySchema::load(self.store.connection()) {
            Ok(schema) => schema,
            Err(e) => {
                error!("can't load hierarchy schema: {}", e);
                return self.abort(ScanStatus::StoreFailed);
            }
        };
        if schema.is_empty() {
            warn!("hierarchy schema is empty, tracks will be stored but not indexed");
        }

        self.transition(ScanState::Counting);
        let mut report = ScanReport::new(ScanStatus::Success);
        report.total_estimate = walker::walk(&root, |_| {});
        debug!("{} files to scan under '{}'", report.total_estimate, root.display());

        self.transition(ScanState::Scanning);
        let progress = ProgressBar::new(report.total_estimate as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}") {
            progress.set_style(style);
        }

        let mut strategies = StrategyFactory::new(self.builder.clone());
        let indexer = LibraryIndexer::new(&schema);
        let store = &mut self.store;

        walker::walk(&root, |visit| match visit {
            Visit::Directory(dir) => {
                debug!("directory '{}'", dir.display());
                progress.set_message(dir.display().to_string());
            }
            Visit::File { file, .. } => {
                report.visited += 1;
                match scan_file(store, &mut strategies, &indexer, file) {
                    Ok(()) => report.indexed += 1,
                    Err(ScanFileError::Extraction(e)) => {
                        report.extraction_failures += 1;
                        match e {
                            ScannerError::NotAudio(_) => debug!("skipped: {}", e),
                            _ => warn!("skipped: {}", e),
                        }
                    }
                    Err(ScanFileError::Persistence(e)) => {
                        report.persistence_failures += 1;
                        error!(
                            path = %file.display(),
                            constraint = e.is_constraint_violation(),
                            "index write rolled back: {}",
                            e
                        );
                    }
                }
                progress.inc(1);
            }
        });

        strategies.release();
        progress.finish_and_clear();
        self.transition(ScanState::Done);
        report
    }

    fn validate(&self) -> Result<PathBuf, ScanStatus> {
        if self.settings.sample_data {
            return Err(ScanStatus::SampleDataActive);
        }
        self.settings
            .root
            .clone()
            .ok_or(ScanStatus::NoRootConfigured)
    }

    fn abort(&mut self, status: ScanStatus) -> ScanReport {
        self.transition(ScanState::Aborted);
        ScanReport::new(status)
    }
}

/// Extracts tags, then writes the track, its tags and its hierarchy path in
/// one transaction.
///
/// A path that is not valid UTF-8 has no lossless uri and is reported as
/// unreadable.
fn scan_file(
    store: &mut Store,
    strategies: &mut StrategyFactory,
    indexer: &LibraryIndexer,
    path: &Path,
) -> Result<(), ScanFileError> {
    let uri = path.to_str().ok_or_else(|| {
        ScannerError::Unreadable(path.to_path_buf(), "path is not valid UTF-8".to_string())
    })?;
    let tags = strategies.select(path).extract(path)?;

    store.run_in_transaction(|tx| {
        let track = repo::insert_track(tx, uri)?;
        let representatives = repo::persist_tags(tx, track.id, &tags)?;
        indexer.index(tx, &track, &representatives)?;
        Ok(())
    })
}
