//! Live-session lifecycle: a pure transition function over broadcast
//! states, and the coordinator that drives the external recording
//! side effect off its transitions.

pub mod machine;
pub mod recording;

pub use machine::{transition, Effect, LiveAction, LiveEvent, LiveSession, Transition};
pub use recording::{
    ConferenceControl, RecordingCommand, RecordingCoordinator, RecordingStatus,
};
