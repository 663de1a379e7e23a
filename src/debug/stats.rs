use crate::fluid::{DisplayField, FluidSolver, SolverState};

/// Snapshot of one surface for the periodic stats line.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceStats {
    pub ticks: u64,
    pub last_dt: f32,
    pub pointers: usize,
    pub queued: usize,
    pub dye_energy: f32,
    pub state: SolverState,
    pub display: DisplayField,
}

impl SurfaceStats {
    pub fn collect(solver: &FluidSolver) -> Self {
        Self {
            ticks: solver.ticks(),
            last_dt: solver.last_dt(),
            pointers: solver.pointers().len(),
            queued: solver.queued_batches(),
            dye_energy: solver.dye_energy(),
            state: solver.state(),
            display: solver.display_field(),
        }
    }

    pub fn line(&self, name: &str) -> String {
        format!(
            "FLUID surface={name} ticks={} dt={:.4} pointers={} queued={} energy={:.2} state={:?} display={:?}",
            self.ticks, self.last_dt, self.pointers, self.queued, self.dye_energy, self.state, self.display
        )
    }
}
