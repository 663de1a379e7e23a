//! Debug module: periodic per-surface stats logging.
//! Systems are only registered when compiled with `--features debug`.
use bevy::prelude::*;

#[cfg(feature = "debug")]
mod logging;
pub mod stats;

#[derive(Resource, Debug)]
pub struct DebugState {
    pub log_interval: f32,
    pub time_accum: f32,
    pub frame_counter: u64,
}

impl Default for DebugState {
    fn default() -> Self {
        Self {
            log_interval: 2.0,
            time_accum: 0.0,
            frame_counter: 0,
        }
    }
}

pub struct DebugPlugin;

impl Plugin for DebugPlugin {
    #[cfg(feature = "debug")]
    fn build(&self, app: &mut App) {
        use crate::core::system::system_order::FluidFrameSet;
        app.init_resource::<DebugState>()
            .add_systems(Update, logging::debug_logging_system.after(FluidFrameSet::Present));
    }

    #[cfg(not(feature = "debug"))]
    fn build(&self, _app: &mut App) {}
}
