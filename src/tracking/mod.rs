pub mod clock;
pub mod gate;
pub mod pace;
pub mod path;
pub mod session;

pub use clock::ElapsedClock;
pub use gate::{GateConfig, GateVerdict};
pub use pace::{Pace, PaceConfig, Unit};
pub use path::PathStore;
pub use session::{
    FixOutcome, LiveStats, RunAction, RunSession, RunState, RunSummary, StateError,
};
