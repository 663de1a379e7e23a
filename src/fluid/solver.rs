//! One self-contained fluid solver and its frame driver.
//!
//! A solver owns its device caps, program cache, field storage and pointer
//! table outright. Nothing is shared between instances, so any number of
//! surfaces can run side by side.
use std::time::Duration;

use bevy::log::info;
use bevy::math::{UVec2, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::config::SolverConfig;
use super::device::{bind_surface, DeviceCaps, FormatProbe, SurfaceRequest};
use super::error::FluidInitError;
use super::input::{apply_splat, splat_radius, ContactId, InputInjector, PointerState, Splat};
use super::program::ProgramCache;
use super::render::{DisplayField, RenderPass, RenderTarget};
use super::step::{grid_size, FieldStorage, StepEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Running,
    Paused,
}

/// Turns frame timestamps into a clamped simulation dt.
///
/// The clock only advances on frames that actually tick, so the first
/// frame after a long pause sees the whole gap and gets clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    last: Option<Duration>,
    fixed: Option<f32>,
    max_dt: f32,
}

impl FrameClock {
    pub fn new(fixed: Option<f32>, max_dt: f32) -> Self {
        Self {
            last: None,
            fixed,
            max_dt,
        }
    }

    pub fn delta(&mut self, now: Duration) -> f32 {
        let elapsed = match (self.fixed, self.last) {
            (Some(fixed), _) => fixed,
            (None, Some(last)) => now.saturating_sub(last).as_secs_f32(),
            (None, None) => self.max_dt,
        };
        self.last = Some(now);
        elapsed.clamp(0.0, self.max_dt)
    }
}

pub struct FluidSolver {
    config: SolverConfig,
    caps: DeviceCaps,
    programs: ProgramCache,
    fields: FieldStorage,
    engine: StepEngine,
    injector: InputInjector,
    state: SolverState,
    clock: FrameClock,
    surface: UVec2,
    display: DisplayField,
    ticks: u64,
    last_dt: f32,
}

impl FluidSolver {
    /// Bind a `surface`-sized drawing area and build everything the solver needs.
    ///
    /// Fails once and for all; a failed solver never ticks.
    pub fn new(config: SolverConfig, surface: UVec2, probe: &dyn FormatProbe) -> Result<Self, FluidInitError> {
        config.check()?;
        let caps = bind_surface(
            surface.x,
            surface.y,
            SurfaceRequest::default(),
            probe,
            config.precision,
        )?;
        let programs = ProgramCache::standard()?;
        let sim = grid_size(config.sim_resolution, surface, caps.max_grid_side);
        let dye = grid_size(config.dye_resolution, surface, caps.max_grid_side);
        let fields = FieldStorage::allocate(&caps, sim, dye);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut injector = InputInjector::new(&config, surface, rng);
        injector.queue_random_splats(config.random_splats_on_start);
        let state = if config.start_paused {
            SolverState::Paused
        } else {
            SolverState::Running
        };
        info!(target: "fluid", "solver ready: surface={surface} sim={sim} dye={dye} state={state:?}");
        Ok(Self {
            engine: StepEngine::from(&config),
            clock: FrameClock::new(config.fixed_dt, config.max_dt),
            config,
            caps,
            programs,
            fields,
            injector,
            state,
            surface,
            display: DisplayField::Dye,
            ticks: 0,
            last_dt: 0.0,
        })
    }

    /// Start (or resume) ticking. Returns `false` if already running.
    pub fn play(&mut self) -> bool {
        if self.state == SolverState::Running {
            return false;
        }
        self.state = SolverState::Running;
        info!(target: "fluid", "solver resumed after {} ticks", self.ticks);
        true
    }

    /// Stop ticking from the next frame on. Returns `false` if already paused.
    pub fn pause(&mut self) -> bool {
        if self.state == SolverState::Paused {
            return false;
        }
        self.state = SolverState::Paused;
        info!(target: "fluid", "solver paused at tick {}", self.ticks);
        true
    }

    /// Follow a new surface size. Fields are reallocated only if a grid changes.
    pub fn resize(&mut self, surface: UVec2) -> bool {
        if surface == self.surface || surface.x == 0 || surface.y == 0 {
            return false;
        }
        self.surface = surface;
        self.injector.set_surface(surface);
        let sim = grid_size(self.config.sim_resolution, surface, self.caps.max_grid_side);
        let dye = grid_size(self.config.dye_resolution, surface, self.caps.max_grid_side);
        self.fields.resize(sim, dye)
    }

    pub fn record_press(&mut self, id: ContactId, px: Vec2) {
        self.injector.record_press(id, px);
    }

    pub fn record_move(&mut self, id: ContactId, px: Vec2) {
        self.injector.record_move(id, px);
    }

    pub fn record_release(&mut self, id: ContactId) -> bool {
        self.injector.record_release(id)
    }

    pub fn queue_random_splats(&mut self, count: u32) {
        self.injector.queue_random_splats(count);
    }

    /// Queue one batch of the configured size.
    pub fn queue_default_batch(&mut self) {
        self.injector.queue_default_batch();
    }

    fn aspect(&self) -> f32 {
        self.surface.x as f32 / self.surface.y as f32
    }

    /// Inject one splat now, outside the pointer table.
    pub fn splat(&mut self, point: Vec2, impulse: Vec2, color: Vec3) {
        let aspect = self.aspect();
        let radius = splat_radius(self.config.splat_radius, aspect, self.config.correct_radius_aspect);
        apply_splat(
            &self.programs,
            &mut self.fields,
            &Splat {
                point,
                impulse,
                color,
            },
            aspect,
            radius,
        );
    }

    /// Drain pending pointer motion and at most one queued batch into the fields.
    pub fn apply_inputs(&mut self) -> usize {
        let splats = self.injector.drain();
        let aspect = self.aspect();
        let radius = splat_radius(self.config.splat_radius, aspect, self.config.correct_radius_aspect);
        for s in &splats {
            apply_splat(&self.programs, &mut self.fields, s, aspect, radius);
        }
        splats.len()
    }

    /// One step-engine tick. `dt` is clamped to `[0, max_dt]`; the effective value is returned.
    pub fn step(&mut self, dt: f32) -> f32 {
        let dt = dt.clamp(0.0, self.config.max_dt);
        self.engine.tick(&self.programs, &mut self.fields, dt);
        self.ticks += 1;
        self.last_dt = dt;
        dt
    }

    /// Per-frame driver: resize check, input, tick. Paused solvers do nothing.
    pub fn frame(&mut self, now: Duration, surface: UVec2) -> Option<f32> {
        if self.state == SolverState::Paused {
            return None;
        }
        self.resize(surface);
        self.apply_inputs();
        let dt = self.clock.delta(now);
        Some(self.step(dt))
    }

    /// Composite the displayed field over `target`.
    pub fn render(&self, target: &mut RenderTarget) {
        RenderPass::composite(&self.programs, &self.fields, self.display, target);
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SolverState::Running
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn fields(&self) -> &FieldStorage {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldStorage {
        &mut self.fields
    }

    pub fn surface(&self) -> UVec2 {
        self.surface
    }

    pub fn pointers(&self) -> &[PointerState] {
        self.injector.pointers()
    }

    pub fn queued_batches(&self) -> usize {
        self.injector.queued()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_dt(&self) -> f32 {
        self.last_dt
    }

    pub fn display_field(&self) -> DisplayField {
        self.display
    }

    pub fn set_display_field(&mut self, display: DisplayField) {
        self.display = display;
    }

    /// Sum of dye color over the grid; a cheap "how much ink is left" figure.
    pub fn dye_energy(&self) -> f32 {
        self.fields
            .dye
            .read()
            .texels()
            .iter()
            .map(|t| t.x + t.y + t.z)
            .sum()
    }
}
