//! Live broadcast state machine.
//!
//! Two event sources feed it: authoritative `live_state` values arriving
//! through the store (pushed or polled), and successful REST actions that
//! optimistically move the state forward until the next authoritative
//! update reconciles them. A failed action feeds nothing here.

use std::collections::VecDeque;

use tracing::debug;

use livesync_core::{LiveKind, LiveState};

/// User-initiated live actions whose REST call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveAction {
    Initiate(LiveKind),
    Start,
    /// Resumable stop: the broadcast can be picked back up.
    Pause,
    /// Definitive teardown of this broadcast attempt.
    End,
    Harvest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveEvent {
    /// Authoritative state from the server. Always wins.
    ServerUpdate(LiveState),
    /// Optimistic advance after a 2xx action response.
    ActionSucceeded(LiveAction),
}

/// Side effects requested by a transition, executed by the session driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Poll the video until `live_state` leaves `Starting`; covers the
    /// window where the push channel itself is still being established.
    ArmPoller,
    StartRecording,
    StopRecording,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: LiveState,
    pub effects: Vec<Effect>,
}

fn effects_for_edge(current: LiveState, next: LiveState) -> Vec<Effect> {
    let mut effects = Vec::new();
    if next == LiveState::Starting && current != LiveState::Starting {
        effects.push(Effect::ArmPoller);
    }
    if next == LiveState::Running && current != LiveState::Running {
        effects.push(Effect::StartRecording);
    }
    if current == LiveState::Running && next != LiveState::Running {
        effects.push(Effect::StopRecording);
    }
    effects
}

/// Compute the next state for one event. Pure; no I/O, no clock.
pub fn transition(current: LiveState, event: &LiveEvent) -> Transition {
    let next = match event {
        // The server owns the state. Whatever it says, we converge on it.
        LiveEvent::ServerUpdate(state) => *state,

        LiveEvent::ActionSucceeded(action) => match (current, action) {
            (LiveState::Idle, LiveAction::Initiate(LiveKind::Raw)) => LiveState::Starting,
            (LiveState::Idle, LiveAction::Initiate(LiveKind::Jitsi)) => LiveState::Creating,
            (
                LiveState::Idle | LiveState::Creating | LiveState::Paused,
                LiveAction::Start,
            ) => LiveState::Starting,
            (LiveState::Running, LiveAction::Pause) => LiveState::Paused,
            (LiveState::Running | LiveState::Paused, LiveAction::End) => LiveState::Stopping,
            (LiveState::Stopped | LiveState::Paused, LiveAction::Harvest) => LiveState::Harvesting,
            // Action does not apply in this state: hold position and let
            // the next authoritative update decide.
            _ => current,
        },
    };

    Transition {
        next,
        effects: effects_for_edge(current, next),
    }
}

/// Holds the current state for one video and a bounded log of applied
/// events for diagnostics.
pub struct LiveSession {
    video_id: String,
    state: LiveState,
    log: VecDeque<(LiveEvent, LiveState)>,
}

const EVENT_LOG_CAPACITY: usize = 64;

impl LiveSession {
    pub fn new(video_id: impl Into<String>, initial: LiveState) -> Self {
        Self {
            video_id: video_id.into(),
            state: initial,
            log: VecDeque::new(),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn state(&self) -> LiveState {
        self.state
    }

    /// Apply one event and return the effects the driver must execute.
    pub fn apply(&mut self, event: LiveEvent) -> Vec<Effect> {
        let Transition { next, effects } = transition(self.state, &event);
        if next != self.state {
            debug!(
                video_id = %self.video_id,
                from = %self.state,
                to = %next,
                "live state transition"
            );
        }
        if self.log.len() == EVENT_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back((event, next));
        self.state = next;
        effects
    }

    /// Applied events with the state each one produced, oldest first.
    pub fn event_log(&self) -> impl Iterator<Item = &(LiveEvent, LiveState)> {
        self.log.iter()
    }
}
