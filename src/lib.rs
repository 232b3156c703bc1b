pub mod commands;
pub mod geo;
pub mod replay;
pub mod runtime;
pub mod settings;
pub mod tracking;
mod utils;

pub use commands::{dispatch, CommandReply, RunCommand};
pub use geo::{distance_m, GeoFix};
pub use runtime::{RunController, RunEvent};
pub use settings::{SettingsStore, TrackerSettings};
pub use tracking::{
    FixOutcome, GateConfig, LiveStats, Pace, PaceConfig, RunSession, RunState, RunSummary,
    StateError, Unit,
};

/// Initialise logging (reads `RUST_LOG`, defaults to info). Safe to call twice.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
