//! Send job state: `Idle -> Sending -> {Completed | Failed | Cancelled} -> Idle`.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::{CancelToken, Completed, SendError};

/// Whether a job is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Idle,
    Sending,
}

/// How the last job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        total: usize,
    },
    Failed {
        acknowledged: usize,
        total: usize,
        reason: String,
    },
    Cancelled {
        acknowledged: usize,
        total: usize,
    },
}

/// Observable job state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    /// Frames the device has acknowledged in the current job.
    pub acknowledged: usize,
    /// Frames in the current job.
    pub total: usize,
    pub last_outcome: Option<JobOutcome>,
}

impl JobSnapshot {
    /// Returns progress as a whole percentage, rounded down.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.acknowledged * 100 / self.total).min(100) as u8
    }

    /// Returns true while a job is sending.
    pub fn is_sending(&self) -> bool {
        self.phase == JobPhase::Sending
    }
}

struct Inner {
    state: watch::Sender<JobSnapshot>,
    active: Mutex<Option<CancelToken>>,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Admits at most one job at a time and publishes its progress.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl JobController {
    /// Creates an idle controller.
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(JobSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                state,
                active: Mutex::new(None),
            }),
        }
    }

    /// Starts a job of `total` frames, or fails with [`SendError::Busy`].
    pub fn begin(&self, total: usize, cancel: CancelToken) -> Result<JobHandle, SendError> {
        let mut active = self.inner.active();
        if active.is_some() {
            return Err(SendError::Busy);
        }
        *active = Some(cancel.clone());
        self.inner.state.send_modify(|s| {
            s.phase = JobPhase::Sending;
            s.acknowledged = 0;
            s.total = total;
        });
        debug!("Job started with {} frame(s)", total);

        Ok(JobHandle {
            inner: self.inner.clone(),
            cancel,
            acknowledged: 0,
            total,
            finished: false,
        })
    }

    /// Cancels the running job. Returns false when idle.
    pub fn cancel(&self) -> bool {
        match self.inner.active().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns the current state.
    pub fn snapshot(&self) -> JobSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.inner.state.subscribe()
    }
}

impl Default for JobController {
    fn default() -> Self {
        Self::new()
    }
}

/// The running job. Dropping it without [`JobHandle::finish`] records a failure.
pub struct JobHandle {
    inner: Arc<Inner>,
    cancel: CancelToken,
    acknowledged: usize,
    total: usize,
    finished: bool,
}

impl JobHandle {
    /// Returns the job's cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns frames acknowledged so far.
    pub fn acknowledged(&self) -> usize {
        self.acknowledged
    }

    /// Returns the job's frame count.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Records one more acknowledged frame.
    pub fn acknowledge(&mut self) -> usize {
        if self.acknowledged < self.total {
            self.acknowledged += 1;
        }
        let acknowledged = self.acknowledged;
        self.inner
            .state
            .send_modify(|s| s.acknowledged = acknowledged);
        acknowledged
    }

    /// Records the job's result and returns the controller to idle.
    pub fn finish(mut self, result: &Result<Completed, SendError>) {
        let outcome = match result {
            Ok(completed) => JobOutcome::Completed {
                total: completed.frames,
            },
            Err(SendError::Cancelled { acknowledged }) => JobOutcome::Cancelled {
                acknowledged: *acknowledged,
                total: self.total,
            },
            Err(e) => JobOutcome::Failed {
                acknowledged: e.acknowledged(),
                total: self.total,
                reason: e.to_string(),
            },
        };
        self.complete(outcome);
    }

    fn complete(&mut self, outcome: JobOutcome) {
        self.finished = true;
        let mut active = self.inner.active();
        *active = None;
        debug!("Job finished: {:?}", outcome);
        self.inner.state.send_modify(|s| {
            s.phase = JobPhase::Idle;
            s.last_outcome = Some(outcome);
        });
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if !self.finished {
            let outcome = JobOutcome::Failed {
                acknowledged: self.acknowledged,
                total: self.total,
                reason: "Job aborted".to_string(),
            };
            self.complete(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_job_at_a_time() {
        let controller = JobController::new();
        let handle = controller.begin(3, CancelToken::new()).unwrap();
        assert!(controller.snapshot().is_sending());
        assert!(matches!(
            controller.begin(1, CancelToken::new()),
            Err(SendError::Busy)
        ));

        handle.finish(&Ok(Completed { frames: 3 }));
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, JobPhase::Idle);
        assert_eq!(snapshot.last_outcome, Some(JobOutcome::Completed { total: 3 }));
        assert!(controller.begin(1, CancelToken::new()).is_ok());
    }

    #[test]
    fn test_progress_is_bounded() {
        let controller = JobController::new();
        let mut handle = controller.begin(3, CancelToken::new()).unwrap();
        handle.acknowledge();
        assert_eq!(controller.snapshot().percent(), 33);
        handle.acknowledge();
        handle.acknowledge();
        handle.acknowledge();
        assert_eq!(handle.acknowledged(), 3);
        assert_eq!(controller.snapshot().acknowledged, 3);
        assert_eq!(controller.snapshot().percent(), 100);
    }

    #[test]
    fn test_cancel_reaches_active_token() {
        let controller = JobController::new();
        assert!(!controller.cancel());

        let token = CancelToken::new();
        let mut handle = controller.begin(2, token.clone()).unwrap();
        handle.acknowledge();
        assert!(controller.cancel());
        assert!(token.is_cancelled());

        handle.finish(&Err(SendError::Cancelled { acknowledged: 1 }));
        assert_eq!(
            controller.snapshot().last_outcome,
            Some(JobOutcome::Cancelled {
                acknowledged: 1,
                total: 2
            })
        );
        assert!(!controller.cancel());
    }

    #[test]
    fn test_dropped_handle_returns_to_idle() {
        let controller = JobController::new();
        {
            let mut handle = controller.begin(2, CancelToken::new()).unwrap();
            handle.acknowledge();
        }
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, JobPhase::Idle);
        assert!(matches!(
            snapshot.last_outcome,
            Some(JobOutcome::Failed { acknowledged: 1, .. })
        ));
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = JobSnapshot {
            phase: JobPhase::Sending,
            acknowledged: 1,
            total: 4,
            last_outcome: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "sending");
        assert_eq!(json["total"], 4);
    }
}
