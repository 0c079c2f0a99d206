use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Tracked background work. Finished tasks are reaped whenever a new one is
/// spawned; `drain` waits for the rest at shutdown.
///
/// Hardware work goes through `spawn_exclusive`: one job owns the hardware
/// lane at a time, and scheduling a new job supersedes the previous one.
#[derive(Default)]
pub struct BackgroundTasks {
    set: Mutex<JoinSet<()>>,
    lane: Arc<tokio::sync::Mutex<()>>,
    current: Mutex<Option<AbortHandle>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub completed: usize,
    /// Cut off because a newer hardware job replaced them.
    pub superseded: usize,
    /// Still running when the grace period ran out.
    pub aborted: usize,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.lock();
        reap(&mut set);
        set.spawn(task);
    }

    /// Spawn `task` on the hardware lane. The previous lane job, queued or
    /// running, is aborted; `task` starts only after that job has been
    /// dropped and released the lane.
    pub fn spawn_exclusive<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let lane = Arc::clone(&self.lane);
        let mut set = self.lock();
        reap(&mut set);

        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = current.take() {
            if !previous.is_finished() {
                info!("superseding in-flight hardware job");
                previous.abort();
            }
        }
        *current = Some(set.spawn(async move {
            let _held = lane.lock_owned().await;
            task.await;
        }));
    }

    pub fn in_flight(&self) -> usize {
        let mut set = self.lock();
        reap(&mut set);
        set.len()
    }

    /// Wait for every tracked task, including ones spawned while draining,
    /// for up to `grace`; abort whatever is still running after that.
    pub async fn drain(&self, grace: Duration) -> DrainReport {
        let deadline = Instant::now() + grace;
        let mut report = DrainReport::default();

        loop {
            let mut set = std::mem::take(&mut *self.lock());
            if set.is_empty() {
                return report;
            }
            debug!(count = set.len(), "draining background tasks");

            loop {
                match tokio::time::timeout_at(deadline, set.join_next()).await {
                    Ok(Some(Err(e))) if e.is_cancelled() => report.superseded += 1,
                    Ok(Some(result)) => {
                        log_failure(result);
                        report.completed += 1;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        let mut late = std::mem::take(&mut *self.lock());
                        report.aborted += set.len() + late.len();
                        warn!(count = report.aborted, "grace period elapsed; aborting background tasks");
                        set.abort_all();
                        late.abort_all();
                        while set.join_next().await.is_some() {}
                        while late.join_next().await.is_some() {}
                        return report;
                    }
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn reap(set: &mut JoinSet<()>) {
    while let Some(result) = set.try_join_next() {
        log_failure(result);
    }
}

fn log_failure(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!("background task panicked: {e}");
        }
    }
}
