use std::path::PathBuf;

use structopt::StructOpt;
use tracing::{error, info, trace};

#[macro_use]
extern crate quick_error;

mod camera;
mod config;
mod discord;
mod hfapi;
mod monitor;

use camera::{Frame, HttpCamera, MotionDetector};
use discord::{DiscordNotifier, NotificationSink};
use hfapi::{Classifier, HfTransport, RetryPolicy};
use monitor::{MonitorError, Runner};

#[derive(Debug, StructOpt)]
#[structopt(name = "nomcam", about = "Motion triggered camera trap with remote classification and chat alerts.")]
struct CliArgs {
    #[structopt(
        parse(from_os_str),
        short = "c",
        long = "config",
        default_value = "config.toml",
        help = "Path to configuration file. See sample_config.toml for format.",
        env = "NOMCAM_CONFIG"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::from_args();
    let cfg = config::load_config(args.config).unwrap();

    let filter = tracing_subscriber::EnvFilter::new(&cfg.system.log_level);
    let stdout_subscriber = tracing_subscriber::fmt()
        // Filter from user
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(stdout_subscriber).unwrap();

    info!("nomcam camera trap running");
    trace!("Config: {:?}", cfg);

    let notifier = DiscordNotifier::new(&cfg.discord).unwrap();

    if let Err(e) = run(&cfg, notifier.clone()).await {
        error!("fatal: {}", e);
        // Best effort only; a second failure here still terminates, stacked
        let final_word = notifier
            .notify(
                &Frame::placeholder(),
                &e.to_string(),
                &cfg.discord.debug_channel_id,
            )
            .await;
        if let Err(notify_error) = final_word {
            error!("failure notification could not be delivered: {}", notify_error);
        }
        std::process::exit(1);
    }
}

async fn run(cfg: &config::Config, notifier: DiscordNotifier) -> Result<(), MonitorError> {
    monitor::announce_startup(&notifier, &cfg.discord.debug_channel_id).await?;

    info!("initializing camera");
    let camera = HttpCamera::open(&cfg.camera)?;
    let detector = MotionDetector::new(&cfg.detection);
    let classifier = Classifier::new(HfTransport::new(&cfg.inference)?, RetryPolicy::default());

    Runner::new(camera, detector, classifier, notifier, cfg).run().await
}
