use thiserror::Error;

use super::program::ShaderStage;

/// Fatal, once-only failures while bringing a solver up.
///
/// A solver that fails to construct never starts ticking; callers log the
/// error and leave the surface blank.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FluidInitError {
    #[error("no usable rendering context: {0}")]
    SurfaceUnavailable(String),
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
    #[error("no renderable texture format for a {components}-component field")]
    NoRenderableFormat { components: u8 },
    #[error("shader stage {stage:?} failed to compile: {reason}")]
    ShaderCompile { stage: ShaderStage, reason: String },
    #[error("shader stage {stage:?} failed to link: {reason}")]
    ProgramLink { stage: ShaderStage, reason: String },
}
