//! Sequential frame upload.
//!
//! Frames go to the device strictly one after another: the request for frame
//! `i + 1` is only issued once frame `i` has been acknowledged, followed by a
//! short throttle delay. Any failure ends the job; frames already on the
//! device stay there.

use std::time::Duration;

use tracing::{info, warn};

use crate::{
    Bitmap, CancelToken, DeviceTarget, DeviceTransport, Error, FrameUpload, JobController,
    JobHandle, PlaybackConfig, SendError, DEFAULT_THROTTLE, MAX_FRAMES,
};

/// A finished send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed {
    /// Frames written to the preset.
    pub frames: usize,
}

/// Uploads frame sequences through a [`DeviceTransport`], one job at a time.
pub struct UploadSequencer<T> {
    transport: T,
    throttle: Duration,
    jobs: JobController,
}

impl<T: DeviceTransport> UploadSequencer<T> {
    /// Creates a sequencer with the default throttle delay.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            throttle: DEFAULT_THROTTLE,
            jobs: JobController::new(),
        }
    }

    /// Sets the delay between frame uploads.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Returns the job controller for progress and cancellation.
    pub fn jobs(&self) -> &JobController {
        &self.jobs
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Cancels the running job, if any.
    pub fn cancel(&self) -> bool {
        self.jobs.cancel()
    }

    /// Uploads `frames` to the target preset in order, then writes the
    /// preset's frame count and timing.
    ///
    /// Rejected with [`SendError::Busy`] while another job is running.
    pub async fn send(
        &self,
        frames: &[Bitmap],
        target: &DeviceTarget,
        playback: &PlaybackConfig,
        cancel: &CancelToken,
    ) -> Result<Completed, SendError> {
        let job = self.begin(frames, cancel)?;
        self.run_job(job, frames, target, playback).await
    }

    /// Validates `frames` and reserves the sequencer for them.
    ///
    /// Lets callers reject a send synchronously and run it elsewhere with
    /// [`UploadSequencer::run_job`].
    pub fn begin(&self, frames: &[Bitmap], cancel: &CancelToken) -> Result<JobHandle, SendError> {
        validate_frames(frames)?;
        self.jobs.begin(frames.len(), cancel.clone())
    }

    /// Runs a job reserved with [`UploadSequencer::begin`] for the same frames.
    pub async fn run_job(
        &self,
        mut job: JobHandle,
        frames: &[Bitmap],
        target: &DeviceTarget,
        playback: &PlaybackConfig,
    ) -> Result<Completed, SendError> {
        debug_assert_eq!(job.total(), frames.len());
        info!(
            "Sending {} frame(s) to {} preset {}",
            frames.len(),
            target.address(),
            target.preset()
        );

        let result = self.run(frames, target, playback, &mut job).await;
        log_result(&result);
        job.finish(&result);
        result
    }

    /// Sends one frame through the legacy single-frame endpoint.
    pub async fn send_single(
        &self,
        frame: &Bitmap,
        target: &DeviceTarget,
        count: usize,
        cancel: &CancelToken,
    ) -> Result<Completed, SendError> {
        let mut job = self.jobs.begin(1, cancel.clone())?;
        info!(
            "Sending single frame to {} contents {}",
            target.address(),
            target.preset()
        );

        let result = self.run_single(frame, target, count, &mut job).await;
        log_result(&result);
        job.finish(&result);
        result
    }

    async fn run(
        &self,
        frames: &[Bitmap],
        target: &DeviceTarget,
        playback: &PlaybackConfig,
        job: &mut JobHandle,
    ) -> Result<Completed, SendError> {
        let cancel = job.cancel_token().clone();

        for (index, frame) in frames.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SendError::Cancelled {
                    acknowledged: job.acknowledged(),
                });
            }

            let png = frame.encode_png().map_err(|source| SendError::Encoding {
                index,
                acknowledged: job.acknowledged(),
                source,
            })?;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(SendError::Cancelled { acknowledged: job.acknowledged() });
                }
                result = self.transport.upload_frame(target, FrameUpload { index, png }) => {
                    result.map_err(|source| SendError::Upload {
                        index,
                        acknowledged: job.acknowledged(),
                        source,
                    })?;
                }
            }
            job.acknowledge();

            if !self.throttle.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(SendError::Cancelled { acknowledged: job.acknowledged() });
                    }
                    _ = tokio::time::sleep(self.throttle) => {}
                }
            }
        }

        let payload = playback.payload(frames.len());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SendError::Cancelled { acknowledged: job.acknowledged() });
            }
            result = self.transport.finalize(target, &payload) => {
                result.map_err(|source| SendError::Finalize {
                    acknowledged: job.acknowledged(),
                    source,
                })?;
            }
        }

        Ok(Completed {
            frames: frames.len(),
        })
    }

    async fn run_single(
        &self,
        frame: &Bitmap,
        target: &DeviceTarget,
        count: usize,
        job: &mut JobHandle,
    ) -> Result<Completed, SendError> {
        let cancel = job.cancel_token().clone();
        if cancel.is_cancelled() {
            return Err(SendError::Cancelled { acknowledged: 0 });
        }

        let png = frame.encode_png().map_err(|source| SendError::Encoding {
            index: 0,
            acknowledged: 0,
            source,
        })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SendError::Cancelled { acknowledged: 0 });
            }
            result = self.transport.upload_contents(target, png, count) => {
                result.map_err(|source| SendError::Upload {
                    index: 0,
                    acknowledged: 0,
                    source,
                })?;
            }
        }
        job.acknowledge();

        Ok(Completed { frames: 1 })
    }
}

fn validate_frames(frames: &[Bitmap]) -> Result<(), SendError> {
    if frames.is_empty() {
        return Err(SendError::Validation(Error::NoFrames));
    }
    if frames.len() > MAX_FRAMES {
        return Err(SendError::Validation(Error::TooManyFrames {
            count: frames.len(),
            max: MAX_FRAMES,
        }));
    }
    Ok(())
}

fn log_result(result: &Result<Completed, SendError>) {
    match result {
        Ok(completed) => info!("Send complete ({} frame(s))", completed.frames),
        Err(SendError::Cancelled { acknowledged }) => {
            info!("Send cancelled after {} frame(s)", acknowledged)
        }
        Err(e) => warn!("Send failed: {}", e),
    }
}
