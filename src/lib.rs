pub mod app;
pub mod core;
pub mod debug;
pub mod fluid;
pub mod interaction;
pub mod rendering;

// Curated re-exports
pub use crate::app::portfolio::PortfolioPlugin;
pub use crate::core::config::{AppConfig, SurfaceConfig, WindowConfig};
pub use crate::fluid::{FluidInitError, FluidSolver, SolverConfig};
