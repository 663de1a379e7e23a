//! Fragment kernels of the built-in stages.
//!
//! Each kernel names the uniforms it reads in a `*_READS` list next to it and
//! indexes `Bound` by position in that list. Linking resolves the names to
//! binding slots, so declaration order never leaks into a kernel.
use bevy::math::{Vec2, Vec3, Vec4};

use super::program::{
    names::*, Bound, Kernel, ShaderStage, StageSource, UniformDecl, UniformKind, Varyings, V_B, V_L, V_R, V_T,
    V_UV,
};

/// Falloff below which a splat leaves a texel as it was.
pub const SPLAT_CUTOFF: f32 = 1e-4;

/// Aspect-scaled distance from a splat's point beyond which it changes nothing.
pub fn splat_reach(radius: f32) -> f32 {
    (radius * -SPLAT_CUTOFF.ln()).sqrt()
}

const fn sampler(name: &'static str) -> UniformDecl {
    UniformDecl::new(name, UniformKind::Sampler)
}
const fn float(name: &'static str) -> UniformDecl {
    UniformDecl::new(name, UniformKind::Float)
}

const CENTER: &[&str] = &[V_UV];
const STENCIL_VARYINGS: &[&str] = &[V_UV, V_L, V_R, V_T, V_B];

const DISPLAY: &[UniformDecl] = &[sampler(U_TEXTURE)];
const SPLAT: &[UniformDecl] = &[
    sampler(U_TARGET),
    float(ASPECT_RATIO),
    UniformDecl::new(COLOR, UniformKind::Vec3),
    UniformDecl::new(POINT, UniformKind::Vec2),
    float(RADIUS),
];
const ADVECTION: &[UniformDecl] = &[
    sampler(U_VELOCITY),
    sampler(U_SOURCE),
    UniformDecl::new(TEXEL_SIZE, UniformKind::Vec2),
    float(DT),
    float(DISSIPATION),
];
const VELOCITY_ONLY: &[UniformDecl] = &[sampler(U_VELOCITY)];
const VORTICITY: &[UniformDecl] = &[sampler(U_VELOCITY), sampler(U_CURL), float(CURL), float(DT)];
const PRESSURE: &[UniformDecl] = &[sampler(U_PRESSURE), sampler(U_DIVERGENCE)];
const GRADIENT_SUBTRACT: &[UniformDecl] = &[sampler(U_PRESSURE), sampler(U_VELOCITY)];
const CLEAR: &[UniformDecl] = &[sampler(U_TEXTURE), float(VALUE)];

pub fn standard_sources() -> Vec<StageSource> {
    fn stage(
        stage: ShaderStage,
        uniforms: &'static [UniformDecl],
        varyings: &'static [&'static str],
        reads: &'static [&'static str],
        kernel: Kernel,
    ) -> StageSource {
        StageSource {
            stage,
            uniforms,
            varyings,
            reads,
            kernel,
        }
    }
    vec![
        stage(ShaderStage::Display, DISPLAY, CENTER, DISPLAY_READS, display),
        stage(ShaderStage::Splat, SPLAT, CENTER, SPLAT_READS, splat),
        stage(ShaderStage::Advection, ADVECTION, CENTER, ADVECTION_READS, advection),
        stage(ShaderStage::Divergence, VELOCITY_ONLY, STENCIL_VARYINGS, VELOCITY_READS, divergence),
        stage(ShaderStage::Curl, VELOCITY_ONLY, STENCIL_VARYINGS, VELOCITY_READS, curl),
        stage(ShaderStage::Vorticity, VORTICITY, STENCIL_VARYINGS, VORTICITY_READS, vorticity),
        stage(ShaderStage::Pressure, PRESSURE, STENCIL_VARYINGS, PRESSURE_READS, pressure),
        stage(
            ShaderStage::GradientSubtract,
            GRADIENT_SUBTRACT,
            STENCIL_VARYINGS,
            GRADIENT_READS,
            gradient_subtract,
        ),
        stage(ShaderStage::Clear, CLEAR, CENTER, CLEAR_READS, clear),
    ]
}

const DISPLAY_READS: &[&str] = &[U_TEXTURE];

/// Dye color with alpha taken from its brightest channel.
fn display(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let c = b.sample(0, v.uv).truncate();
    c.extend(c.max_element())
}

const SPLAT_READS: &[&str] = &[U_TARGET, ASPECT_RATIO, COLOR, POINT, RADIUS];

fn splat(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let [target, aspect, color, point, radius] = [0, 1, 2, 3, 4];
    let mut p = v.uv - b.vec2(point);
    p.x *= b.float(aspect);
    let falloff = (-p.dot(p) / b.float(radius)).exp();
    let amount = if falloff < SPLAT_CUTOFF {
        Vec3::ZERO
    } else {
        falloff * b.vec3(color)
    };
    let base = b.sample(target, v.uv).truncate();
    (base + amount).extend(1.0)
}

const ADVECTION_READS: &[&str] = &[TEXEL_SIZE, U_VELOCITY, U_SOURCE, DT, DISSIPATION];

/// Semi-Lagrangian backtrace. `texelSize` is the velocity grid's, whatever the target.
fn advection(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let [texel, velocity, source, dt, dissipation] = [0, 1, 2, 3, 4];
    let vel = b.sample(velocity, v.uv);
    let coord = v.uv - b.float(dt) * Vec2::new(vel.x, vel.y) * b.vec2(texel);
    let mut out = b.float(dissipation) * b.sample(source, coord);
    out.w = 1.0;
    out
}

const VELOCITY_READS: &[&str] = &[U_VELOCITY];

/// Central differences with reflective walls: a missing neighbor mirrors the center.
fn divergence(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let velocity = 0;
    let mut l = b.sample(velocity, v.l).x;
    let mut r = b.sample(velocity, v.r).x;
    let mut t = b.sample(velocity, v.t).y;
    let mut bottom = b.sample(velocity, v.b).y;
    let c = b.sample(velocity, v.uv);
    if v.l.x < 0.0 {
        l = -c.x;
    }
    if v.r.x > 1.0 {
        r = -c.x;
    }
    if v.t.y > 1.0 {
        t = -c.y;
    }
    if v.b.y < 0.0 {
        bottom = -c.y;
    }
    Vec4::new(0.5 * (r - l + t - bottom), 0.0, 0.0, 1.0)
}

fn curl(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let velocity = 0;
    let l = b.sample(velocity, v.l).y;
    let r = b.sample(velocity, v.r).y;
    let t = b.sample(velocity, v.t).x;
    let bottom = b.sample(velocity, v.b).x;
    Vec4::new(0.5 * (r - l - t + bottom), 0.0, 0.0, 1.0)
}

const VORTICITY_READS: &[&str] = &[U_VELOCITY, U_CURL, CURL, DT];

fn vorticity(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let [velocity, curl_field, strength, dt] = [0, 1, 2, 3];
    let l = b.sample(curl_field, v.l).x;
    let r = b.sample(curl_field, v.r).x;
    let t = b.sample(curl_field, v.t).x;
    let bottom = b.sample(curl_field, v.b).x;
    let c = b.sample(curl_field, v.uv).x;
    let mut force = 0.5 * Vec2::new(t.abs() - bottom.abs(), r.abs() - l.abs());
    force /= force.length() + 0.0001;
    force *= b.float(strength) * c;
    force.y = -force.y;
    let vel = b.sample(velocity, v.uv);
    let out = Vec2::new(vel.x, vel.y) + force * b.float(dt);
    Vec4::new(out.x, out.y, 0.0, 1.0)
}

const PRESSURE_READS: &[&str] = &[U_PRESSURE, U_DIVERGENCE];

/// One Jacobi iteration of the pressure Poisson equation.
fn pressure(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let [pressure_field, divergence_field] = [0, 1];
    let l = b.sample(pressure_field, v.l).x;
    let r = b.sample(pressure_field, v.r).x;
    let t = b.sample(pressure_field, v.t).x;
    let bottom = b.sample(pressure_field, v.b).x;
    let div = b.sample(divergence_field, v.uv).x;
    Vec4::new((l + r + bottom + t - div) * 0.25, 0.0, 0.0, 1.0)
}

const GRADIENT_READS: &[&str] = &[U_PRESSURE, U_VELOCITY];

fn gradient_subtract(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let [pressure_field, velocity] = [0, 1];
    let l = b.sample(pressure_field, v.l).x;
    let r = b.sample(pressure_field, v.r).x;
    let t = b.sample(pressure_field, v.t).x;
    let bottom = b.sample(pressure_field, v.b).x;
    let vel = b.sample(velocity, v.uv);
    Vec4::new(vel.x - (r - l), vel.y - (t - bottom), 0.0, 1.0)
}

const CLEAR_READS: &[&str] = &[U_TEXTURE, VALUE];

fn clear(v: &Varyings, b: &Bound<'_>) -> Vec4 {
    let [texture, value] = [0, 1];
    b.float(value) * b.sample(texture, v.uv)
}
