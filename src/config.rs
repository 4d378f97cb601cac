use std::path::Path;

use figment::{providers::Format, Figment};
use serde::{Deserialize, Serialize};

use crate::camera::Resolution;
use crate::discord::ChannelId;

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct Config {
    pub camera: ConfigCamera,
    pub discord: ConfigDiscord,
    pub inference: ConfigInference,
    #[serde(default)]
    pub detection: ConfigDetection,
    #[serde(default)]
    pub system: ConfigSystem,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ConfigCamera {
    pub address: String,
    pub port: Option<u16>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ConfigDiscord {
    #[serde(default = "default_discord_api")]
    pub api_url: String,
    pub token: String,
    pub channel_id: ChannelId,
    pub debug_channel_id: ChannelId,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ConfigInference {
    #[serde(default = "default_inference_api")]
    pub api_url: String,
    pub token: String,
    #[serde(default = "default_model")]
    pub model: String,
}

/// Detection tunables. The defaults were hand tuned on real hardware with
/// minimal experimentation; expect to adjust them per installation.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ConfigDetection {
    /// Wait between the two motion samples, in milliseconds.
    #[serde(default = "default_motion_interval_ms")]
    pub motion_interval_ms: u64,
    /// Resolution of the grayscale frames used for motion comparison.
    #[serde(default = "default_motion_resolution")]
    pub motion_resolution: Resolution,
    /// Resolution of the color snapshot attached to notifications.
    #[serde(default = "default_snapshot_resolution")]
    pub snapshot_resolution: Resolution,
    /// Minimum per-pixel difference that counts as a change at all.
    #[serde(default = "default_threshold_first")]
    pub threshold_first: u8,
    /// Box blur radius applied between the two thresholds.
    #[serde(default = "default_blur_radius")]
    pub blur_radius: u32,
    /// Threshold applied to the blurred difference mask.
    #[serde(default = "default_threshold_second")]
    pub threshold_second: u8,
    /// Fraction of changed pixels above which motion is reported.
    #[serde(default = "default_diff_threshold")]
    pub diff_threshold: f64,
    /// Substring matched against the model's labels.
    #[serde(default = "default_target_label")]
    pub target_label: String,
    /// Minimum model confidence for a matching label to trigger an alert.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Pause after a positive alert, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ConfigSystem {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_discord_api() -> String {
    "https://discord.com/api/v9".to_string()
}
fn default_inference_api() -> String {
    "https://api-inference.huggingface.co".to_string()
}
fn default_model() -> String {
    "google/vit-base-patch16-224".to_string()
}
fn default_motion_interval_ms() -> u64 {
    500
}
fn default_motion_resolution() -> Resolution {
    Resolution::new(224, 224)
}
fn default_snapshot_resolution() -> Resolution {
    Resolution::new(1024, 1024)
}
fn default_threshold_first() -> u8 {
    25
}
fn default_blur_radius() -> u32 {
    20
}
fn default_threshold_second() -> u8 {
    100
}
fn default_diff_threshold() -> f64 {
    0.01
}
fn default_target_label() -> String {
    "squirrel".to_string()
}
fn default_confidence_threshold() -> f64 {
    0.01
}
fn default_cooldown_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConfigDetection {
    fn default() -> Self {
        ConfigDetection {
            motion_interval_ms: default_motion_interval_ms(),
            motion_resolution: default_motion_resolution(),
            snapshot_resolution: default_snapshot_resolution(),
            threshold_first: default_threshold_first(),
            blur_radius: default_blur_radius(),
            threshold_second: default_threshold_second(),
            diff_threshold: default_diff_threshold(),
            target_label: default_target_label(),
            confidence_threshold: default_confidence_threshold(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Default for ConfigSystem {
    fn default() -> Self {
        ConfigSystem {
            log_level: default_log_level(),
        }
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config, String> {
    let cfg: Config = Figment::new()
        .merge(figment::providers::Env::prefixed("NOMCAM_"))
        .merge(figment::providers::Toml::file(path))
        .extract()
        .map_err(|e| e.to_string())?;
    validate(cfg)
}

fn validate(cfg: Config) -> Result<Config, String> {
    // Fractional thresholds must be sane before the loop starts
    for (name, value) in [
        ("diff_threshold", cfg.detection.diff_threshold),
        ("confidence_threshold", cfg.detection.confidence_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("{} must lie in [0, 1], got {}", name, value));
        }
    }
    for (name, resolution) in [
        ("motion_resolution", cfg.detection.motion_resolution),
        ("snapshot_resolution", cfg.detection.snapshot_resolution),
    ] {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(format!("{} must be non-zero, got {}", name, resolution));
        }
    }
    Ok(cfg)
}

#[cfg(test)]
mod test {
    use figment::providers::{Format, Toml};
    use figment::Figment;

    use super::{validate, Config};
    use crate::camera::Resolution;

    fn parse(toml: &str) -> Config {
        Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .unwrap()
    }

    const MINIMAL: &str = indoc::indoc! {r#"
        [camera]
        address = "192.168.20.2"

        [discord]
        token = "discord-token"
        channel_id = "111"
        debug_channel_id = "222"

        [inference]
        token = "hf-token"
    "#};

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg = parse(MINIMAL);
        assert_eq!(cfg.detection.motion_interval_ms, 500);
        assert_eq!(cfg.detection.motion_resolution, Resolution::new(224, 224));
        assert_eq!(cfg.detection.snapshot_resolution, Resolution::new(1024, 1024));
        assert_eq!(cfg.detection.threshold_first, 25);
        assert_eq!(cfg.detection.blur_radius, 20);
        assert_eq!(cfg.detection.threshold_second, 100);
        assert_eq!(cfg.detection.diff_threshold, 0.01);
        assert_eq!(cfg.detection.target_label, "squirrel");
        assert_eq!(cfg.detection.confidence_threshold, 0.01);
        assert_eq!(cfg.detection.cooldown_secs, 5);
        assert_eq!(cfg.inference.model, "google/vit-base-patch16-224");
        assert_eq!(cfg.system.log_level, "info");
        assert!(validate(cfg).is_ok());
    }

    #[test]
    fn test_overrides_apply() {
        let toml = format!(
            "{}\n{}",
            MINIMAL,
            indoc::indoc! {r#"
                [detection]
                target_label = "raccoon"
                diff_threshold = 0.05
                motion_resolution = { width = 160, height = 120 }
            "#}
        );
        let cfg = parse(&toml);
        assert_eq!(cfg.detection.target_label, "raccoon");
        assert_eq!(cfg.detection.diff_threshold, 0.05);
        assert_eq!(cfg.detection.motion_resolution, Resolution::new(160, 120));
        // Untouched keys keep their defaults
        assert_eq!(cfg.detection.cooldown_secs, 5);
    }

    #[test]
    fn test_fractional_thresholds_validated() {
        let mut cfg = parse(MINIMAL);
        cfg.detection.diff_threshold = 1.5;
        assert!(validate(cfg).is_err());

        let mut cfg = parse(MINIMAL);
        cfg.detection.confidence_threshold = -0.1;
        assert!(validate(cfg).is_err());
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let mut cfg = parse(MINIMAL);
        cfg.detection.motion_resolution = Resolution::new(0, 224);
        assert!(validate(cfg).is_err());
    }
}
