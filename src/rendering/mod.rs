pub mod background;
pub mod surface;
