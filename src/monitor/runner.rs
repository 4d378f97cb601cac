use std::time::Duration;

use tracing::{debug, info};

use super::state::{Action, Event, Monitor};
use crate::camera::{CameraError, ColorMode, Frame, FrameSource, MotionDetector, Resolution};
use crate::config::Config;
use crate::discord::{ChannelId, NotificationSink, NotifyError};
use crate::hfapi::{Classifier, InferenceError, InferenceTransport};

pub const STARTUP_MESSAGE: &str = "nomcam started";
pub const FIRST_CONTACT_MESSAGE: &str = "test";
pub const ALERT_MESSAGE: &str = "He's heeeeeeere!!!";

/// One-time liveness message to the debug channel, sent before the loop
/// starts. Uses the placeholder image since no snapshot exists yet.
pub async fn announce_startup<N: NotificationSink>(
    notifier: &N,
    channel: &ChannelId,
) -> Result<(), NotifyError> {
    notifier
        .notify(&Frame::placeholder(), STARTUP_MESSAGE, channel)
        .await
}

/// Drives the detection cycle: snapshot capture, motion sampling,
/// classification, notification, cool-down. Owns the state machine and all
/// collaborators; any collaborator failure ends the run and propagates.
pub struct Runner<S, T, N> {
    machine: Monitor,
    camera: S,
    detector: MotionDetector,
    classifier: Classifier<T>,
    notifier: N,
    snapshot_resolution: Resolution,
    target_label: String,
    confidence_threshold: f64,
    cooldown: Duration,
    alert_channel: ChannelId,
    debug_channel: ChannelId,
}

impl<S, T, N> Runner<S, T, N>
where
    S: FrameSource,
    T: InferenceTransport,
    N: NotificationSink,
{
    pub fn new(
        camera: S,
        detector: MotionDetector,
        classifier: Classifier<T>,
        notifier: N,
        config: &Config,
    ) -> Runner<S, T, N> {
        Runner {
            machine: Monitor::new(),
            camera,
            detector,
            classifier,
            notifier,
            snapshot_resolution: config.detection.snapshot_resolution,
            target_label: config.detection.target_label.clone(),
            confidence_threshold: config.detection.confidence_threshold,
            cooldown: Duration::from_secs(config.detection.cooldown_secs),
            alert_channel: config.discord.channel_id.clone(),
            debug_channel: config.discord.debug_channel_id.clone(),
        }
    }

    pub async fn run(mut self) -> Result<(), MonitorError> {
        info!("starting detection loop");
        // Replaced by the machine's first CaptureSnapshot before any other use
        let mut snapshot = Frame::placeholder();
        let mut event = Event::Started;
        loop {
            event = match self.machine.advance(event) {
                Action::CaptureSnapshot => {
                    debug!("next cycle");
                    snapshot = self
                        .camera
                        .capture(self.snapshot_resolution, ColorMode::Color)
                        .await?;
                    Event::SnapshotCaptured
                }
                Action::SampleMotion => {
                    // The detector takes its own pair of captures; the
                    // snapshot above is kept for the eventual notification
                    Event::MotionOutcome(self.detector.sample(&mut self.camera).await?)
                }
                Action::SendFirstContact => {
                    self.notifier
                        .notify(&snapshot, FIRST_CONTACT_MESSAGE, &self.debug_channel)
                        .await?;
                    Event::FirstContactSent
                }
                Action::Classify => {
                    let confirmed = self
                        .classifier
                        .classify(&snapshot, &self.target_label, self.confidence_threshold)
                        .await?;
                    Event::Verdict(confirmed)
                }
                Action::SendAlert => {
                    info!(label = %self.target_label, "target sighted, sending alert");
                    self.notifier
                        .notify(&snapshot, ALERT_MESSAGE, &self.alert_channel)
                        .await?;
                    Event::AlertSent
                }
                Action::Rest => {
                    tokio::time::sleep(self.cooldown).await;
                    Event::Rested
                }
            };
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum MonitorError {
        Camera(error: CameraError) {
            from()
            display("Camera failure: {}", error)
            source(error)
        }
        Inference(error: InferenceError) {
            from()
            display("Classifier failure: {}", error)
            source(error)
        }
        Notify(error: NotifyError) {
            from()
            display("Notification failure: {}", error)
            source(error)
        }
    }
}
