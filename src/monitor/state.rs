use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{error, trace};

/// Where the detection cycle currently is. `Idle` exists only before the
/// first capture; the loop otherwise cycles through the remaining states.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy, Display)]
pub enum LoopState {
    Idle,
    Snapshot,
    Motion,
    FirstContact,
    Classification,
    Alert,
    CoolDown,
}

/// Outcome of the last action, fed back into the machine by the runner.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Event {
    Started,
    SnapshotCaptured,
    /// `Some(score)` when the motion score cleared the trigger threshold.
    MotionOutcome(Option<f64>),
    FirstContactSent,
    Verdict(bool),
    AlertSent,
    Rested,
}

/// What the runner must do next.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Action {
    CaptureSnapshot,
    SampleMotion,
    SendFirstContact,
    Classify,
    SendAlert,
    Rest,
}

/// The run-level state of the detection loop: the current position in the
/// cycle, whether the once-ever first-contact notification went out, and
/// when the last alert fired. The first-contact flag flips exactly once and
/// never resets for the lifetime of the process.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct Monitor {
    state: LoopState,
    first_contact_sent: bool,
    last_alert: Option<DateTime<Utc>>,
}

impl Monitor {
    pub fn new() -> Monitor {
        Monitor {
            state: LoopState::Idle,
            first_contact_sent: false,
            last_alert: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        self.last_alert
    }

    /// Feeds the outcome of the previous action into the machine and returns
    /// the next action to perform.
    pub fn advance(&mut self, event: Event) -> Action {
        let action = match (self.state, event) {
            (LoopState::Idle, Event::Started) => {
                self.state = LoopState::Snapshot;
                Action::CaptureSnapshot
            }
            (LoopState::Snapshot, Event::SnapshotCaptured) => {
                self.state = LoopState::Motion;
                Action::SampleMotion
            }
            (LoopState::Motion, Event::MotionOutcome(None)) => {
                self.state = LoopState::Snapshot;
                Action::CaptureSnapshot
            }
            (LoopState::Motion, Event::MotionOutcome(Some(_))) => {
                if self.first_contact_sent {
                    self.state = LoopState::Classification;
                    Action::Classify
                } else {
                    self.first_contact_sent = true;
                    self.state = LoopState::FirstContact;
                    Action::SendFirstContact
                }
            }
            (LoopState::FirstContact, Event::FirstContactSent) => {
                self.state = LoopState::Classification;
                Action::Classify
            }
            (LoopState::Classification, Event::Verdict(false)) => {
                self.state = LoopState::Snapshot;
                Action::CaptureSnapshot
            }
            (LoopState::Classification, Event::Verdict(true)) => {
                self.last_alert = Some(Utc::now());
                self.state = LoopState::Alert;
                Action::SendAlert
            }
            (LoopState::Alert, Event::AlertSent) => {
                self.state = LoopState::CoolDown;
                Action::Rest
            }
            (LoopState::CoolDown, Event::Rested) => {
                self.state = LoopState::Snapshot;
                Action::CaptureSnapshot
            }
            (state, event) => {
                // Not reachable from the runner, but checked to prevent a
                // crash in the event of programmer error.
                error!(%state, ?event, "unexpected loop event, restarting cycle");
                self.state = LoopState::Snapshot;
                Action::CaptureSnapshot
            }
        };
        trace!(state = %self.state, ?action, "loop transition");
        action
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
