pub mod config;

pub use config::{AppConfig, BackgroundConfig, ConfigReport, BlobConfig, IntroConfig, SurfaceConfig, WindowConfig};
