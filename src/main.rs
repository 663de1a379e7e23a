use bevy::prelude::*;
use portfolio_fluid::core::config::ConfigReport;
use portfolio_fluid::{AppConfig, PortfolioPlugin};

#[cfg(target_arch = "wasm32")]
fn load_config() -> (AppConfig, ConfigReport) {
    const RAW: &str = include_str!("../assets/config/portfolio.ron");
    match ron::from_str(RAW) {
        Ok(cfg) => (
            cfg,
            ConfigReport {
                layers: vec!["embedded portfolio.ron".into()],
                issues: Vec::new(),
            },
        ),
        Err(e) => (
            AppConfig::default(),
            ConfigReport {
                layers: Vec::new(),
                issues: vec![format!("embedded config parse failure: {e}; using defaults")],
            },
        ),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn load_config() -> (AppConfig, ConfigReport) {
    let (cfg, layers, issues) = AppConfig::load_layered([
        std::path::Path::new("assets/config/portfolio.ron"),
        std::path::Path::new("assets/config/portfolio.local.ron"),
    ]);
    (cfg, ConfigReport { layers, issues })
}

fn main() {
    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
    }

    let (cfg, mut report) = load_config();
    report.issues.extend(cfg.validate());

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: cfg.window.title.clone(),
                resolution: (cfg.window.width, cfg.window.height).into(),
                resizable: true,
                ..default()
            }),
            ..default()
        }))
        .insert_resource(cfg)
        .insert_resource(report)
        .add_plugins(PortfolioPlugin)
        .run();
}
