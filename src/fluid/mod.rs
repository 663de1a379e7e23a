//! Grid fluid solver: advection, Jacobi pressure projection and vorticity confinement.
pub mod config;
pub mod device;
pub mod error;
pub mod field;
pub mod input;
pub mod kernels;
pub mod program;
pub mod render;
pub mod solver;
pub mod step;

pub use config::{FloatPrecision, SolverConfig};
pub use device::{bind_surface, AdapterProbe, DeviceCaps, FormatProbe, ProbeSnapshot, SoftwareProbe, SurfaceRequest};
pub use error::FluidInitError;
pub use field::{DoubleBuffer, DoubleField, Field, FieldFormat, FilterMode, Precision};
pub use input::{ContactId, PointerState, Splat};
pub use program::{ProgramCache, ShaderStage};
pub use render::{DisplayField, RenderPass, RenderTarget};
pub use solver::{FluidSolver, FrameClock, SolverState};
pub use step::{grid_size, FieldStorage, StepEngine};
