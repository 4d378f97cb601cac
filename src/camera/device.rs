use std::time::Duration;

use tracing::debug;

use super::frame::{ColorMode, Frame, Resolution};
use crate::config::ConfigCamera;

/// A source of still frames. Each capture reconfigures the device to the
/// requested resolution, so callers may alternate between small grayscale
/// frames for motion comparison and large color snapshots.
///
/// Implementations do no error recovery of their own; a device fault is
/// fatal and propagates to the caller.
pub trait FrameSource {
    async fn capture(
        &mut self,
        resolution: Resolution,
        mode: ColorMode,
    ) -> Result<Frame, CameraError>;
}

/// Drives an IP camera's still-picture endpoint over HTTP. The client is
/// built once at startup and held for the process lifetime.
pub struct HttpCamera {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCamera {
    pub fn open(config: &ConfigCamera) -> Result<HttpCamera, CameraError> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(CameraError::ConnectionError)?;
        let base_url = format!(
            "http://{}{}",
            config.address,
            config.port.map(|p| format!(":{}", p)).unwrap_or_default()
        );
        Ok(HttpCamera { client, base_url })
    }
}

impl FrameSource for HttpCamera {
    async fn capture(
        &mut self,
        resolution: Resolution,
        mode: ColorMode,
    ) -> Result<Frame, CameraError> {
        let url = format!(
            "{}/ISAPI/Streaming/channels/1/picture?videoResolutionWidth={}&videoResolutionHeight={}",
            self.base_url, resolution.width, resolution.height
        );
        let url = reqwest::Url::parse(&url).map_err(|e| CameraError::UrlError(e.to_string()))?;
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(CameraError::ConnectionError)?;
        if res.status() != 200 {
            return Err(CameraError::CaptureRejected(res.status().as_u16()));
        }
        let body = res
            .bytes()
            .await
            .map_err(CameraError::InvalidResponseBody)?;
        debug!(%resolution, bytes = body.len(), "captured still");
        Ok(Frame::from_jpeg(&body, mode)?)
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum CameraError {
        UrlError(error: String) {
            display("Unable to parse camera URL: {}", error)
        }
        ConnectionError(error: reqwest::Error) {
            display("Unable to reach camera: {}", error)
            source(error)
        }
        InvalidResponseBody(error: reqwest::Error) {
            display("Camera returned mangled response body: {}", error)
            source(error)
        }
        CaptureRejected(status: u16) {
            display("Camera rejected still capture with status {}", status)
        }
        ImageInvalid(error: image::ImageError) {
            from()
            display("Camera returned an undecodable image: {}", error)
            source(error)
        }
    }
}
