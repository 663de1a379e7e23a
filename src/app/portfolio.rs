use bevy::prelude::*;

use crate::app::intro::SessionPlugin;
use crate::core::config::{AppConfig, ConfigReport};
use crate::debug::DebugPlugin;
use crate::interaction::controls::ControlsPlugin;
use crate::rendering::background::background::BackgroundPlugin;
use crate::rendering::surface::FluidSurfacePlugin;

/// Everything the page needs on top of `DefaultPlugins`. Expects an [`AppConfig`] resource.
pub struct PortfolioPlugin;

impl Plugin for PortfolioPlugin {
    fn build(&self, app: &mut App) {
        let clear = app
            .world()
            .get_resource::<AppConfig>()
            .map(|cfg| cfg.background.clear_color)
            .unwrap_or((1.0, 1.0, 1.0));
        app.insert_resource(ClearColor(Color::srgb(clear.0, clear.1, clear.2)))
            .add_systems(Startup, (report_config, spawn_camera))
            .add_plugins((
                BackgroundPlugin,
                FluidSurfacePlugin,
                ControlsPlugin,
                SessionPlugin,
                DebugPlugin,
            ));
    }
}

fn report_config(cfg: Res<AppConfig>, report: Option<Res<ConfigReport>>) {
    if let Some(report) = report {
        for issue in &report.issues {
            warn!(target: "fluid_host", "CONFIG: {issue}");
        }
        if report.layers.is_empty() {
            info!(target: "fluid_host", "No config layers found; using defaults");
        } else {
            info!(target: "fluid_host", layers = ?report.layers, "Config layers loaded");
        }
    }
    info!(target: "fluid_host", surfaces = cfg.surfaces.len(), "Surface summary");
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}
