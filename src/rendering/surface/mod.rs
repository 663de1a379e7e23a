pub mod capabilities;
pub mod material;
pub mod surface;
pub mod upload;

pub use capabilities::SurfaceCapabilities;
pub use material::FluidDisplayMaterial;
pub use surface::{FluidControl, FluidSurface, FluidSurfacePlugin, SurfaceTarget};
