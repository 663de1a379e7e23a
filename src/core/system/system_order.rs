//! Per-frame ordering of the fluid surfaces.
//! 1. Resize (follow window / region size changes)
//! 2. Input (forward pointer and touch events into each solver)
//! 3. Step (frame driver: resize check, splats, one tick)
//! 4. Present (upload the displayed field and refresh the material)
use bevy::prelude::*;

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum FluidFrameSet {
    Resize,
    Input,
    Step,
    Present,
}
