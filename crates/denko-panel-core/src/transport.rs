//! Device HTTP API.
//!
//! Endpoints (all under `http://{address}`):
//! - `POST /presets/{id}/frames`: multipart `file` (`image{N}.png`) + `frameIndex`
//! - `POST /presets/{id}`: JSON `{"totalFrames", "interval", "loopCount"}`
//! - `POST /contents/{id}`: legacy single frame, multipart `file` + `count`

use std::future::Future;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::debug;

use crate::{DeviceTarget, PresetPayload, TransportError};

/// One PNG-encoded frame and its playback position.
#[derive(Debug, Clone)]
pub struct FrameUpload {
    pub index: usize,
    pub png: Vec<u8>,
}

impl FrameUpload {
    /// File name sent with the frame.
    pub fn file_name(&self) -> String {
        format!("image{}.png", self.index)
    }
}

/// Requests the sequencer makes to a device.
pub trait DeviceTransport: Send + Sync {
    /// Uploads one frame of the target preset.
    fn upload_frame(
        &self,
        target: &DeviceTarget,
        frame: FrameUpload,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Writes frame count and timing of the target preset.
    fn finalize(
        &self,
        target: &DeviceTarget,
        payload: &PresetPayload,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Uploads a single frame through the legacy contents endpoint.
    fn upload_contents(
        &self,
        target: &DeviceTarget,
        png: Vec<u8>,
        count: usize,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// [`DeviceTransport`] over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with the client's default timeouts.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Creates a transport whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn png_part(png: Vec<u8>, file_name: String) -> Result<Part, TransportError> {
        Ok(Part::bytes(png).file_name(file_name).mime_str("image/png")?)
    }

    fn check(response: Response) -> Result<(), TransportError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTransport for HttpTransport {
    async fn upload_frame(
        &self,
        target: &DeviceTarget,
        frame: FrameUpload,
    ) -> Result<(), TransportError> {
        let url = target.frames_url();
        let file_name = frame.file_name();
        debug!("Uploading {} ({} bytes) to {}", file_name, frame.png.len(), url);

        let form = Form::new()
            .part("file", Self::png_part(frame.png, file_name)?)
            .text("frameIndex", frame.index.to_string());
        let response = self.client.post(&url).multipart(form).send().await?;
        Self::check(response)
    }

    async fn finalize(
        &self,
        target: &DeviceTarget,
        payload: &PresetPayload,
    ) -> Result<(), TransportError> {
        let url = target.preset_url();
        debug!("Configuring preset at {}: {:?}", url, payload);

        let response = self.client.post(&url).json(payload).send().await?;
        Self::check(response)
    }

    async fn upload_contents(
        &self,
        target: &DeviceTarget,
        png: Vec<u8>,
        count: usize,
    ) -> Result<(), TransportError> {
        let url = target.contents_url();
        debug!("Uploading single frame ({} bytes) to {}", png.len(), url);

        let form = Form::new()
            .part("file", Self::png_part(png, "image0.png".to_string())?)
            .text("count", count.to_string());
        let response = self.client.post(&url).multipart(form).send().await?;
        Self::check(response)
    }
}
