//! Session timeline: the intro countdown, then the optional auto-close.
//!
//! Surfaces marked `play_after_intro` start when the intro ends. The
//! auto-close countdown only starts once the intro is over and every
//! surface's solver is ticking, so a smoke run always exercises each solver
//! for the full `window.autoClose` seconds.
use std::time::Duration;

use bevy::prelude::*;

use crate::core::config::AppConfig;
use crate::rendering::surface::{FluidControl, FluidSurface, SurfaceTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    IntroFinished,
    /// Every surface is running; the auto-close countdown has started.
    CloseArmed,
    Exit,
}

#[derive(Resource, Debug)]
pub struct SessionTimeline {
    intro: Option<Timer>,
    auto_close: Option<f32>,
    closing: Option<Timer>,
}

impl SessionTimeline {
    /// `auto_close_secs <= 0` disables the exit.
    pub fn new(intro_secs: f32, auto_close_secs: f32) -> Self {
        Self {
            intro: Some(Timer::from_seconds(intro_secs.max(0.0), TimerMode::Once)),
            auto_close: (auto_close_secs > 0.0).then_some(auto_close_secs),
            closing: None,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.intro.duration_secs, cfg.window.auto_close)
    }

    pub fn auto_close(&self) -> Option<f32> {
        self.auto_close
    }

    /// Advance by `dt`. `surfaces_running` is whether every surface ticks right now.
    ///
    /// At most one event per call; the frame the intro ends never arms the
    /// close, since deferred surfaces only get their `Play` after it.
    pub fn advance(&mut self, dt: Duration, surfaces_running: bool) -> Option<SessionEvent> {
        if let Some(intro) = self.intro.as_mut() {
            intro.tick(dt);
            if !intro.finished() {
                return None;
            }
            self.intro = None;
            return Some(SessionEvent::IntroFinished);
        }
        if let Some(timer) = self.closing.as_mut() {
            timer.tick(dt);
            return timer.just_finished().then_some(SessionEvent::Exit);
        }
        match self.auto_close {
            Some(secs) if surfaces_running => {
                self.closing = Some(Timer::from_seconds(secs, TimerMode::Once));
                Some(SessionEvent::CloseArmed)
            }
            _ => None,
        }
    }
}

pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, start_session)
            .add_systems(Update, advance_session);
    }
}

/// Controls sent when the intro finishes.
pub fn intro_controls(cfg: &AppConfig) -> Vec<FluidControl> {
    cfg.surfaces
        .iter()
        .filter(|s| s.play_after_intro)
        .map(|s| FluidControl::Play(SurfaceTarget::Named(s.name.clone())))
        .collect()
}

fn start_session(mut commands: Commands, cfg: Res<AppConfig>) {
    let timeline = SessionTimeline::from_config(&cfg);
    info!(
        target: "fluid_host",
        "Intro: {}s before deferred surfaces start",
        cfg.intro.duration_secs.max(0.0)
    );
    if let Some(secs) = timeline.auto_close() {
        info!(target: "fluid_host", seconds = secs, "AutoClose: armed once every surface runs");
    }
    commands.insert_resource(timeline);
}

fn advance_session(
    time: Res<Time>,
    cfg: Res<AppConfig>,
    timeline: Option<ResMut<SessionTimeline>>,
    surfaces: Query<&FluidSurface>,
    mut controls: EventWriter<FluidControl>,
    mut exit: EventWriter<AppExit>,
) {
    let Some(mut timeline) = timeline else {
        return;
    };
    let running = surfaces.iter().all(|s| s.solver.is_running());
    match timeline.advance(time.delta(), running) {
        Some(SessionEvent::IntroFinished) => {
            let sent = intro_controls(&cfg);
            info!(target: "fluid_host", "Intro finished; starting {} surface(s)", sent.len());
            controls.write_batch(sent);
        }
        Some(SessionEvent::CloseArmed) => {
            info!(
                target: "fluid_host",
                "AutoClose: all surfaces running, exiting in {}s",
                timeline.auto_close().unwrap_or_default()
            );
        }
        Some(SessionEvent::Exit) => {
            for s in surfaces.iter() {
                info!(target: "fluid_host", surface = %s.name, ticks = s.solver.ticks(), "AutoClose: final surface state");
            }
            exit.write(AppExit::Success);
        }
        None => {}
    }
}
