//! Field storage for one solver and the fixed-order step engine that advances it.
use bevy::log::debug;
use bevy::math::UVec2;

use super::config::SolverConfig;
use super::device::DeviceCaps;
use super::field::{DoubleField, Field, FilterMode};
use super::program::{names::*, ProgramCache, ShaderStage};

/// Grid for a target `resolution` on a `surface`; the longer axis gets more cells.
///
/// Neither side exceeds `max_side`, so extreme aspect ratios stretch cells
/// along the long axis instead of allocating past the device limit.
pub fn grid_size(resolution: u32, surface: UVec2, max_side: u32) -> UVec2 {
    let (w, h) = (surface.x.max(1) as f32, surface.y.max(1) as f32);
    let mut aspect = w / h;
    if aspect < 1.0 {
        aspect = 1.0 / aspect;
    }
    let max_side = max_side.max(1);
    let min = resolution.min(max_side);
    let max = ((resolution as f32 * aspect).round() as u32).min(max_side);
    if surface.x > surface.y {
        UVec2::new(max, min)
    } else {
        UVec2::new(min, max)
    }
}

/// Every grid one solver owns.
#[derive(Debug, Clone)]
pub struct FieldStorage {
    pub dye: DoubleField,
    pub velocity: DoubleField,
    pub divergence: Field,
    pub curl: Field,
    pub pressure: DoubleField,
    allocations: u64,
}

impl FieldStorage {
    pub fn allocate(caps: &DeviceCaps, sim: UVec2, dye: UVec2) -> Self {
        let transport = caps.transport_filter();
        Self {
            dye: DoubleField::allocate(dye.x, dye.y, caps.rgba, transport),
            velocity: DoubleField::allocate(sim.x, sim.y, caps.rg, transport),
            divergence: Field::allocate(sim.x, sim.y, caps.r, FilterMode::Nearest),
            curl: Field::allocate(sim.x, sim.y, caps.r, FilterMode::Nearest),
            pressure: DoubleField::allocate(sim.x, sim.y, caps.r, FilterMode::Nearest),
            allocations: 8,
        }
    }

    pub fn sim_size(&self) -> UVec2 {
        self.velocity.size()
    }

    pub fn dye_size(&self) -> UVec2 {
        self.dye.size()
    }

    /// Number of buffers allocated over this storage's lifetime.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Reallocate (zeroed) only the grids whose dimensions change.
    pub fn resize(&mut self, sim: UVec2, dye: UVec2) -> bool {
        let before = self.allocations;
        if self.dye.resize(dye.x, dye.y) {
            self.allocations += 2;
        }
        if self.velocity.resize(sim.x, sim.y) {
            self.allocations += 2;
        }
        if self.pressure.resize(sim.x, sim.y) {
            self.allocations += 2;
        }
        for field in [&mut self.divergence, &mut self.curl] {
            if field.size() != sim.max(UVec2::ONE) {
                *field = Field::allocate(sim.x, sim.y, field.format(), field.filter());
                self.allocations += 1;
            }
        }
        if self.allocations != before {
            debug!(target: "fluid", "reallocated fields: sim={sim} dye={dye}");
        }
        self.allocations != before
    }
}

/// Per-tick constants taken from the solver configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEngine {
    pub curl_strength: f32,
    pub pressure_damping: f32,
    pub pressure_iterations: u32,
    pub velocity_dissipation: f32,
    pub density_dissipation: f32,
}

impl From<&SolverConfig> for StepEngine {
    fn from(cfg: &SolverConfig) -> Self {
        Self {
            curl_strength: cfg.curl_strength,
            pressure_damping: cfg.pressure_damping,
            pressure_iterations: cfg.pressure_iterations,
            velocity_dissipation: cfg.velocity_dissipation,
            density_dissipation: cfg.density_dissipation,
        }
    }
}

impl StepEngine {
    /// One simulation tick. Pass order is fixed; each pass consumes the previous one's output.
    pub fn tick(&self, programs: &ProgramCache, fields: &mut FieldStorage, dt: f32) {
        self.curl(programs, fields);
        self.vorticity(programs, fields, dt);
        self.divergence(programs, fields);
        self.relax_pressure(programs, fields);
        self.subtract_gradient(programs, fields);
        self.advect_velocity(programs, fields, dt);
        self.advect_dye(programs, fields, dt);
    }

    pub fn curl(&self, programs: &ProgramCache, f: &mut FieldStorage) {
        programs
            .get(ShaderStage::Curl)
            .bind()
            .vec2(TEXEL_SIZE, f.velocity.texel_size())
            .texture(U_VELOCITY, f.velocity.read())
            .draw(&mut f.curl);
    }

    pub fn vorticity(&self, programs: &ProgramCache, f: &mut FieldStorage, dt: f32) {
        let texel = f.velocity.texel_size();
        let (read, write) = f.velocity.split();
        programs
            .get(ShaderStage::Vorticity)
            .bind()
            .vec2(TEXEL_SIZE, texel)
            .texture(U_VELOCITY, read)
            .texture(U_CURL, &f.curl)
            .float(CURL, self.curl_strength)
            .float(DT, dt)
            .draw(write);
        f.velocity.swap();
    }

    pub fn divergence(&self, programs: &ProgramCache, f: &mut FieldStorage) {
        programs
            .get(ShaderStage::Divergence)
            .bind()
            .vec2(TEXEL_SIZE, f.velocity.texel_size())
            .texture(U_VELOCITY, f.velocity.read())
            .draw(&mut f.divergence);
    }

    /// Damp last frame's pressure, then run the configured Jacobi iterations.
    pub fn relax_pressure(&self, programs: &ProgramCache, f: &mut FieldStorage) {
        let (read, write) = f.pressure.split();
        programs
            .get(ShaderStage::Clear)
            .bind()
            .texture(U_TEXTURE, read)
            .float(VALUE, self.pressure_damping)
            .draw(write);
        f.pressure.swap();

        let texel = f.velocity.texel_size();
        let jacobi = programs.get(ShaderStage::Pressure);
        for _ in 0..self.pressure_iterations {
            let (read, write) = f.pressure.split();
            jacobi
                .bind()
                .vec2(TEXEL_SIZE, texel)
                .texture(U_PRESSURE, read)
                .texture(U_DIVERGENCE, &f.divergence)
                .draw(write);
            f.pressure.swap();
        }
    }

    pub fn subtract_gradient(&self, programs: &ProgramCache, f: &mut FieldStorage) {
        let texel = f.velocity.texel_size();
        let (read, write) = f.velocity.split();
        programs
            .get(ShaderStage::GradientSubtract)
            .bind()
            .vec2(TEXEL_SIZE, texel)
            .texture(U_PRESSURE, f.pressure.read())
            .texture(U_VELOCITY, read)
            .draw(write);
        f.velocity.swap();
    }

    pub fn advect_velocity(&self, programs: &ProgramCache, f: &mut FieldStorage, dt: f32) {
        let texel = f.velocity.texel_size();
        let (read, write) = f.velocity.split();
        programs
            .get(ShaderStage::Advection)
            .bind()
            .vec2(TEXEL_SIZE, texel)
            .texture(U_VELOCITY, read)
            .texture(U_SOURCE, read)
            .float(DT, dt)
            .float(DISSIPATION, self.velocity_dissipation)
            .draw(write);
        f.velocity.swap();
    }

    /// Transport dye along the velocity produced earlier in this tick.
    pub fn advect_dye(&self, programs: &ProgramCache, f: &mut FieldStorage, dt: f32) {
        let (read, write) = f.dye.split();
        programs
            .get(ShaderStage::Advection)
            .bind()
            .vec2(TEXEL_SIZE, f.velocity.texel_size())
            .texture(U_VELOCITY, f.velocity.read())
            .texture(U_SOURCE, read)
            .float(DT, dt)
            .float(DISSIPATION, self.density_dissipation)
            .draw(write);
        f.dye.swap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::config::FloatPrecision;
    use crate::fluid::device::{bind_surface, SoftwareProbe, SurfaceRequest};
    use bevy::math::Vec4;

    fn storage(sim: UVec2, dye: UVec2) -> FieldStorage {
        let caps = bind_surface(
            16,
            16,
            SurfaceRequest::default(),
            &SoftwareProbe::full(),
            FloatPrecision::Full,
        )
        .unwrap();
        FieldStorage::allocate(&caps, sim, dye)
    }

    #[test]
    fn grid_follows_surface_orientation() {
        assert_eq!(grid_size(128, UVec2::new(1920, 1080), 8192), UVec2::new(228, 128));
        assert_eq!(grid_size(128, UVec2::new(1080, 1920), 8192), UVec2::new(128, 228));
        assert_eq!(grid_size(64, UVec2::new(300, 300), 8192), UVec2::new(64, 64));
    }

    #[test]
    fn grid_sides_stop_at_the_device_limit() {
        // a 1280x10 strip would otherwise ask for a 131072-wide dye grid
        assert_eq!(grid_size(1024, UVec2::new(1280, 10), 8192), UVec2::new(8192, 1024));
        assert_eq!(grid_size(1024, UVec2::new(10, 1280), 2048), UVec2::new(1024, 2048));
        assert_eq!(grid_size(4096, UVec2::new(100, 100), 2048), UVec2::new(2048, 2048));
    }

    #[test]
    fn storage_uses_negotiated_layouts() {
        let s = storage(UVec2::new(8, 4), UVec2::new(32, 16));
        assert_eq!(s.velocity.read().format().components, 2);
        assert_eq!(s.dye.read().format().components, 4);
        assert_eq!(s.pressure.read().format().components, 1);
        assert_eq!(s.pressure.read().filter(), FilterMode::Nearest);
        assert_eq!(s.dye.read().filter(), FilterMode::Linear);
        assert_eq!(s.sim_size(), UVec2::new(8, 4));
        assert_eq!(s.dye_size(), UVec2::new(32, 16));
    }

    #[test]
    fn resize_touches_only_changed_grids() {
        let mut s = storage(UVec2::new(8, 8), UVec2::new(32, 32));
        s.dye.read_mut().fill(Vec4::ONE);
        let before = s.allocations();
        assert!(!s.resize(UVec2::new(8, 8), UVec2::new(32, 32)));
        assert_eq!(s.allocations(), before);
        assert!(s.resize(UVec2::new(16, 8), UVec2::new(32, 32)));
        assert_eq!(s.allocations(), before + 8 - 2);
        assert_eq!(s.dye.read().texel(0, 0), Vec4::ONE);
        assert_eq!(s.curl.size(), UVec2::new(16, 8));
    }

    #[test]
    fn clear_pass_damps_pressure_before_iterating() {
        let programs = ProgramCache::standard().unwrap();
        let mut s = storage(UVec2::new(4, 4), UVec2::new(4, 4));
        s.pressure.read_mut().fill(Vec4::splat(1.0));
        let engine = StepEngine {
            pressure_iterations: 0,
            ..StepEngine::from(&SolverConfig::hero())
        };
        engine.relax_pressure(&programs, &mut s);
        assert!((s.pressure.read().texel(1, 1).x - 0.8).abs() < 1e-6);
    }

    #[test]
    fn quiescent_fluid_stays_at_rest() {
        let programs = ProgramCache::standard().unwrap();
        let mut s = storage(UVec2::new(8, 8), UVec2::new(16, 16));
        let engine = StepEngine::from(&SolverConfig::hero());
        engine.tick(&programs, &mut s, 0.016);
        assert!(s.velocity.read().texels().iter().all(|t| t.x == 0.0 && t.y == 0.0));
        assert!(s.pressure.read().texels().iter().all(|t| t.x == 0.0));
    }
}
