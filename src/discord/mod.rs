mod notifier;

pub use notifier::{ChannelId, DiscordNotifier, NotificationSink, NotifyError};
