use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use crate::database::repo::Store;
use crate::ingest::orchestrator::{ScanOrchestrator, ScanReport, ScanSettings};
use crate::media::strategy::StrategyBuilder;

#[derive(Debug, Default)]
pub struct WorkerSummary {
    pub scans: usize,
    pub last: Option<ScanReport>,
}

/// Runs scans one at a time on a dedicated thread.
///
/// The request channel holds a single slot: a trigger that arrives while a
/// scan is running queues one follow-up scan, and any further triggers before
/// that follow-up starts are absorbed into it.
pub struct ScanWorker {
    requests: Option<Sender<()>>,
    handle: Option<JoinHandle<WorkerSummary>>,
}

impl ScanWorker {
    pub fn spawn(store: Store, settings: ScanSettings, builder: StrategyBuilder) -> Self {
        let (tx, rx) = bounded::<()>(1);

        let handle = thread::spawn(move || {
            info!("Scan worker started");
            let mut orchestrator = ScanOrchestrator::new(store, settings, builder);
            let mut summary = WorkerSummary::default();

            for () in rx {
                summary.last = Some(orchestrator.run());
                summary.scans += 1;
            }

            info!("Scan worker finished after {} scan(s)", summary.scans);
            summary
        });

        Self {
            requests: Some(tx),
            handle: Some(handle),
        }
    }

    /// Requests a scan. Returns false if the request was absorbed into one
    /// that is already queued.
    pub fn trigger(&self) -> bool {
        let Some(requests) = &self.requests else {
            return false;
        };

        match requests.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("scan already queued, absorbing trigger");
                false
            }
            Err(TrySendError::Disconnected(())) => {
                warn!("scan worker is gone, trigger dropped");
                false
            }
        }
    }

    /// Lets queued scans finish, then stops the worker.
    pub fn shutdown(mut self) -> WorkerSummary {
        drop(self.requests.take());

        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                error!("scan worker panicked");
                WorkerSummary::default()
            }
            None => WorkerSummary::default(),
        }
    }
}
