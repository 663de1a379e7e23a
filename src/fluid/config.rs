use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use super::error::FluidInitError;

/// Storage precision requested for every simulation field.
///
/// Written as a string (`"half"` / `"full"`) so it survives layered RON merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatPrecision {
    #[default]
    Half,
    Full,
}

impl FromStr for FloatPrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "half" => Ok(FloatPrecision::Half),
            "full" => Ok(FloatPrecision::Full),
            other => Err(format!("unknown precision '{other}' (expected \"half\" or \"full\")")),
        }
    }
}

impl<'de> Deserialize<'de> for FloatPrecision {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Tunables of one solver instance. Immutable for the session.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SolverConfig {
    pub sim_resolution: u32,
    pub dye_resolution: u32,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    /// Factor applied to last frame's pressure before relaxation.
    pub pressure_damping: f32,
    pub pressure_iterations: u32,
    pub curl_strength: f32,
    /// Denominator of the splat falloff `exp(-d^2 / radius)`.
    pub splat_radius: f32,
    pub splat_force: f32,
    /// Widen the radius by the aspect ratio on landscape surfaces.
    pub correct_radius_aspect: bool,
    /// Scale pointer deltas so both axes are measured in the same units.
    pub correct_delta_aspect: bool,
    /// Mouse motion without a press drives pointer 0.
    pub hover_pointer: bool,
    pub random_splats_on_start: u32,
    pub random_splat_amount: u32,
    pub random_splat_velocity: f32,
    pub fixed_dt: Option<f32>,
    pub max_dt: f32,
    pub start_paused: bool,
    pub precision: FloatPrecision,
    pub palette: Vec<[f32; 3]>,
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::hero()
    }
}

impl SolverConfig {
    /// Full-page purple aurora behind the hero section.
    pub fn hero() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 0.97,
            velocity_dissipation: 0.98,
            pressure_damping: 0.8,
            pressure_iterations: 20,
            curl_strength: 30.0,
            splat_radius: 0.4 / 100.0,
            splat_force: 6000.0,
            correct_radius_aspect: true,
            correct_delta_aspect: true,
            hover_pointer: true,
            random_splats_on_start: 0,
            random_splat_amount: 5,
            random_splat_velocity: 1000.0,
            fixed_dt: None,
            max_dt: 0.016666,
            start_paused: false,
            precision: FloatPrecision::Half,
            palette: vec![
                [0.50, 0.20, 0.85],
                [0.65, 0.35, 0.95],
                [0.75, 0.55, 1.00],
                [0.90, 0.80, 1.00],
                [1.00, 1.00, 1.00],
            ],
            seed: None,
        }
    }

    /// Lighter solver behind the opening screen; waits for `play()`.
    pub fn opening() -> Self {
        Self {
            sim_resolution: 64,
            dye_resolution: 512,
            pressure_iterations: 10,
            splat_radius: 0.008,
            splat_force: 10.0,
            correct_radius_aspect: false,
            correct_delta_aspect: false,
            hover_pointer: false,
            fixed_dt: Some(0.016),
            start_paused: true,
            palette: vec![[0.5, 0.3, 1.0], [0.8, 0.7, 1.0], [1.0, 1.0, 1.0]],
            ..Self::hero()
        }
    }

    /// Hard constraints; a violation makes the solver refuse to start.
    pub fn check(&self) -> Result<(), FluidInitError> {
        let fail = |msg: String| Err(FluidInitError::InvalidConfig(msg));
        if self.sim_resolution == 0 || self.dye_resolution == 0 {
            return fail(format!(
                "resolutions must be >= 1 (sim={} dye={})",
                self.sim_resolution, self.dye_resolution
            ));
        }
        for (label, v) in [
            ("density_dissipation", self.density_dissipation),
            ("velocity_dissipation", self.velocity_dissipation),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                return fail(format!("{label} must be in (0, 1], got {v}"));
            }
        }
        if !(0.0..1.0).contains(&self.pressure_damping) {
            return fail(format!(
                "pressure_damping must be in [0, 1), got {}",
                self.pressure_damping
            ));
        }
        if !(self.max_dt > 0.0) {
            return fail(format!("max_dt must be positive, got {}", self.max_dt));
        }
        if !(self.splat_radius > 0.0) {
            return fail(format!("splat_radius must be positive, got {}", self.splat_radius));
        }
        if self.palette.is_empty() {
            return fail("palette must contain at least one color".into());
        }
        Ok(())
    }

    /// Non-fatal oddities worth a log line.
    pub fn validate(&self) -> Vec<String> {
        let mut w = Vec::new();
        if self.dye_resolution < self.sim_resolution {
            w.push(format!(
                "dye_resolution {} is below sim_resolution {}; dye will look blocky",
                self.dye_resolution, self.sim_resolution
            ));
        }
        if self.pressure_iterations == 0 {
            w.push("pressure_iterations is 0; velocity will not be projected".into());
        } else if self.pressure_iterations > 80 {
            w.push(format!(
                "pressure_iterations {} is very high; expect frame drops",
                self.pressure_iterations
            ));
        }
        if self.curl_strength < 0.0 {
            w.push(format!(
                "curl_strength {} is negative; swirls will be damped instead of confined",
                self.curl_strength
            ));
        }
        if let Some(fixed) = self.fixed_dt {
            if fixed > self.max_dt {
                w.push(format!(
                    "fixed_dt {fixed} exceeds max_dt {}; it will be clamped",
                    self.max_dt
                ));
            }
        }
        if self.random_splat_amount == 0 && self.random_splats_on_start > 0 {
            w.push("random_splats_on_start set but random_splat_amount is 0".into());
        }
        for (i, c) in self.palette.iter().enumerate() {
            if c.iter().any(|v| !(0.0..=1.0).contains(v)) {
                w.push(format!("palette[{i}] = {c:?} has channels outside [0, 1]"));
            }
        }
        w
    }

    /// Palette entry `i`, wrapping.
    pub fn palette_color(&self, i: usize) -> [f32; 3] {
        self.palette[i % self.palette.len()]
    }
}
