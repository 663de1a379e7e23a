use bevy::prelude::*;

use super::stats::SurfaceStats;
use super::DebugState;
use crate::rendering::surface::FluidSurface;

pub fn debug_logging_system(time: Res<Time>, mut state: ResMut<DebugState>, q: Query<&FluidSurface>) {
    state.frame_counter += 1;
    state.time_accum += time.delta_secs();
    if state.time_accum < state.log_interval {
        return;
    }
    state.time_accum = 0.0;
    for s in q.iter() {
        info!(target: "fluid", "{} frame={}", SurfaceStats::collect(&s.solver).line(&s.name), state.frame_counter);
    }
}
