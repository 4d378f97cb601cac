mod runner;
mod state;

pub use runner::{
    announce_startup, MonitorError, Runner, ALERT_MESSAGE, FIRST_CONTACT_MESSAGE, STARTUP_MESSAGE,
};
pub use state::{Action, Event, LoopState, Monitor};
