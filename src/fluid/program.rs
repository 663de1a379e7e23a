//! Program cache: fixed shader stages linked against one shared vertex stage.
//!
//! A stage is a declared uniform list plus a fragment kernel run once per
//! target texel. Building the cache "compiles" each declaration (names must
//! be well formed and unique), "links" it with the vertex stage (varyings
//! must exist, shared uniforms must agree on type) and resolves every uniform
//! name to a binding slot. Kernels never see those slots: each source lists
//! the uniforms its kernel reads, by name, and linking turns that list into
//! the slot table the kernel indexes. A read of an undeclared uniform, or a
//! declared uniform nothing reads, fails the link. Any failure aborts the
//! whole build.
//!
//! Draws run rows of the target in parallel on the rayon pool.
use std::collections::HashMap;

use bevy::log::info;
use bevy::math::{Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use super::error::FluidInitError;
use super::field::{CellRect, Field};

/// Uniform names shared by the stage declarations and the step engine.
pub mod names {
    pub const TEXEL_SIZE: &str = "texelSize";
    pub const U_TEXTURE: &str = "uTexture";
    pub const U_TARGET: &str = "uTarget";
    pub const U_VELOCITY: &str = "uVelocity";
    pub const U_SOURCE: &str = "uSource";
    pub const U_CURL: &str = "uCurl";
    pub const U_PRESSURE: &str = "uPressure";
    pub const U_DIVERGENCE: &str = "uDivergence";
    pub const ASPECT_RATIO: &str = "aspectRatio";
    pub const POINT: &str = "point";
    pub const COLOR: &str = "color";
    pub const RADIUS: &str = "radius";
    pub const DT: &str = "dt";
    pub const DISSIPATION: &str = "dissipation";
    pub const CURL: &str = "curl";
    pub const VALUE: &str = "value";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Display,
    Splat,
    Advection,
    Divergence,
    Curl,
    Vorticity,
    Pressure,
    GradientSubtract,
    Clear,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 9] = [
        ShaderStage::Display,
        ShaderStage::Splat,
        ShaderStage::Advection,
        ShaderStage::Divergence,
        ShaderStage::Curl,
        ShaderStage::Vorticity,
        ShaderStage::Pressure,
        ShaderStage::GradientSubtract,
        ShaderStage::Clear,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: UniformKind,
}

impl UniformDecl {
    pub const fn new(name: &'static str, kind: UniformKind) -> Self {
        Self { name, kind }
    }
}

/// Per-texel outputs of the vertex stage: the texel center and its 4 neighbors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Varyings {
    pub uv: Vec2,
    pub l: Vec2,
    pub r: Vec2,
    pub t: Vec2,
    pub b: Vec2,
}

pub const V_UV: &str = "vUv";
pub const V_L: &str = "vL";
pub const V_R: &str = "vR";
pub const V_T: &str = "vT";
pub const V_B: &str = "vB";

/// The one vertex stage every program shares.
#[derive(Debug, Clone, Copy)]
pub struct VertexStage {
    pub outputs: &'static [&'static str],
    pub uniforms: &'static [UniformDecl],
}

impl VertexStage {
    /// Full-screen quad with 4-connected neighbor coordinates offset by `texelSize`.
    pub const STENCIL: VertexStage = VertexStage {
        outputs: &[V_UV, V_L, V_R, V_T, V_B],
        uniforms: &[UniformDecl::new(names::TEXEL_SIZE, UniformKind::Vec2)],
    };

    #[inline]
    pub fn run(&self, uv: Vec2, texel: Vec2) -> Varyings {
        Varyings {
            uv,
            l: uv - Vec2::new(texel.x, 0.0),
            r: uv + Vec2::new(texel.x, 0.0),
            t: uv + Vec2::new(0.0, texel.y),
            b: uv - Vec2::new(0.0, texel.y),
        }
    }
}

pub type Kernel = fn(&Varyings, &Bound<'_>) -> Vec4;

/// Declaration of one fragment stage.
#[derive(Debug, Clone, Copy)]
pub struct StageSource {
    pub stage: ShaderStage,
    pub uniforms: &'static [UniformDecl],
    pub varyings: &'static [&'static str],
    /// Uniforms the kernel reads; `Bound` accessors take positions in this list.
    pub reads: &'static [&'static str],
    pub kernel: Kernel,
}

#[derive(Debug, Clone)]
pub struct Program {
    stage: ShaderStage,
    vertex: VertexStage,
    uniforms: Vec<UniformDecl>,
    slots: HashMap<&'static str, usize>,
    reads: SmallVec<[usize; 6]>,
    kernel: Kernel,
}

impl Program {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Binding slot of a declared uniform.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    pub fn uniforms(&self) -> &[UniformDecl] {
        &self.uniforms
    }

    /// Binding slot behind each kernel read, in read order.
    pub fn reads(&self) -> &[usize] {
        &self.reads
    }

    /// Start a draw with every uniform at its default (zero / unbound).
    pub fn bind(&self) -> Bindings<'_> {
        Bindings {
            program: self,
            values: SmallVec::from_elem(Binding::Unset, self.uniforms.len()),
        }
    }

    fn compile(vertex: &VertexStage, src: &StageSource) -> Result<Program, FluidInitError> {
        let compile_err = |reason: String| FluidInitError::ShaderCompile {
            stage: src.stage,
            reason,
        };
        let link_err = |reason: String| FluidInitError::ProgramLink {
            stage: src.stage,
            reason,
        };

        let mut seen: Vec<&str> = Vec::with_capacity(src.uniforms.len());
        for decl in src.uniforms {
            let valid = decl
                .name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && decl.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(compile_err(format!("malformed uniform name {:?}", decl.name)));
            }
            if seen.contains(&decl.name) {
                return Err(compile_err(format!("uniform {} declared twice", decl.name)));
            }
            seen.push(decl.name);
        }

        for v in src.varyings {
            if !vertex.outputs.contains(v) {
                return Err(link_err(format!("varying {v} is not written by the vertex stage")));
            }
        }

        let mut uniforms: Vec<UniformDecl> = vertex.uniforms.to_vec();
        for decl in src.uniforms {
            match uniforms.iter().find(|u| u.name == decl.name) {
                Some(shared) if shared.kind != decl.kind => {
                    return Err(link_err(format!(
                        "uniform {} is {:?} in the vertex stage but {:?} here",
                        decl.name, shared.kind, decl.kind
                    )));
                }
                Some(_) => {}
                None => uniforms.push(*decl),
            }
        }
        let slots: HashMap<&'static str, usize> =
            uniforms.iter().enumerate().map(|(i, u)| (u.name, i)).collect();

        let mut reads = SmallVec::with_capacity(src.reads.len());
        for name in src.reads {
            match slots.get(name) {
                Some(&slot) => reads.push(slot),
                None => return Err(link_err(format!("kernel reads undeclared uniform {name}"))),
            }
        }
        if let Some(unread) = src.uniforms.iter().find(|d| !src.reads.contains(&d.name)) {
            return Err(link_err(format!("uniform {} is declared but never read", unread.name)));
        }

        Ok(Program {
            stage: src.stage,
            vertex: *vertex,
            uniforms,
            slots,
            reads,
            kernel: src.kernel,
        })
    }
}

/// One uniform value for a draw.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
    Unset,
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Texture(&'a Field),
}

/// Uniform values for one draw of one program.
///
/// Inputs are borrowed shared and the target mutably, so a pass can never
/// sample the buffer it is writing.
pub struct Bindings<'a> {
    program: &'a Program,
    values: SmallVec<[Binding<'a>; 8]>,
}

impl<'a> Bindings<'a> {
    fn set(mut self, name: &str, kind: UniformKind, value: Binding<'a>) -> Self {
        match self.program.slot(name) {
            Some(slot) => {
                debug_assert_eq!(
                    self.program.uniforms[slot].kind, kind,
                    "uniform {name} bound with the wrong type"
                );
                self.values[slot] = value;
            }
            None => debug_assert!(false, "{:?} has no uniform {name}", self.program.stage),
        }
        self
    }

    pub fn float(self, name: &str, v: f32) -> Self {
        self.set(name, UniformKind::Float, Binding::Float(v))
    }

    pub fn vec2(self, name: &str, v: Vec2) -> Self {
        self.set(name, UniformKind::Vec2, Binding::Vec2(v))
    }

    pub fn vec3(self, name: &str, v: Vec3) -> Self {
        self.set(name, UniformKind::Vec3, Binding::Vec3(v))
    }

    pub fn texture(self, name: &str, field: &'a Field) -> Self {
        self.set(name, UniformKind::Sampler, Binding::Texture(field))
    }

    fn texel_size(&self) -> Vec2 {
        match self.program.slot(names::TEXEL_SIZE).map(|s| self.values[s]) {
            Some(Binding::Vec2(v)) => v,
            _ => Vec2::ZERO,
        }
    }

    fn bound(&self) -> Bound<'_> {
        Bound {
            values: &self.values,
            reads: &self.program.reads,
        }
    }

    /// Run the program over every texel of `target`.
    pub fn draw(&self, target: &mut Field) {
        let all = target.cells();
        self.draw_cells(target, all);
    }

    /// Run the program over `cells` of `target` only; the rest is left as it was.
    pub fn draw_cells(&self, target: &mut Field, cells: CellRect) {
        let bound = self.bound();
        let texel = self.texel_size();
        let inv = target.texel_size();
        let program = self.program;
        target.fill_cells_with(cells, |x, y| {
            let uv = (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5)) * inv;
            (program.kernel)(&program.vertex.run(uv, texel), &bound)
        });
    }

    /// Evaluate the program at one normalized coordinate (no target).
    pub fn eval(&self, uv: Vec2) -> Vec4 {
        (self.program.kernel)(&self.program.vertex.run(uv, self.texel_size()), &self.bound())
    }
}

/// Read-only view of bound values handed to kernels.
///
/// Accessors take the position of a name in the stage's `reads` list.
/// Unset slots read as zero.
pub struct Bound<'b> {
    values: &'b [Binding<'b>],
    reads: &'b [usize],
}

impl Bound<'_> {
    #[inline]
    fn get(&self, read: usize) -> Option<&Binding<'_>> {
        self.reads.get(read).and_then(|&slot| self.values.get(slot))
    }

    #[inline]
    pub fn float(&self, read: usize) -> f32 {
        match self.get(read) {
            Some(Binding::Float(v)) => *v,
            _ => 0.0,
        }
    }

    #[inline]
    pub fn vec2(&self, read: usize) -> Vec2 {
        match self.get(read) {
            Some(Binding::Vec2(v)) => *v,
            _ => Vec2::ZERO,
        }
    }

    #[inline]
    pub fn vec3(&self, read: usize) -> Vec3 {
        match self.get(read) {
            Some(Binding::Vec3(v)) => *v,
            _ => Vec3::ZERO,
        }
    }

    #[inline]
    pub fn sample(&self, read: usize, uv: Vec2) -> Vec4 {
        match self.get(read) {
            Some(Binding::Texture(f)) => f.sample(uv),
            _ => Vec4::ZERO,
        }
    }
}

/// All linked programs of one solver instance.
#[derive(Debug, Clone)]
pub struct ProgramCache {
    programs: Vec<Program>,
}

impl ProgramCache {
    pub fn build(vertex: &VertexStage, sources: &[StageSource]) -> Result<Self, FluidInitError> {
        let mut slots: Vec<Option<Program>> = vec![None; ShaderStage::ALL.len()];
        for src in sources {
            let program = Program::compile(vertex, src)?;
            let entry = &mut slots[src.stage.index()];
            if entry.is_some() {
                return Err(FluidInitError::ProgramLink {
                    stage: src.stage,
                    reason: "stage supplied twice".into(),
                });
            }
            *entry = Some(program);
        }
        let mut programs = Vec::with_capacity(slots.len());
        for (stage, program) in ShaderStage::ALL.into_iter().zip(slots) {
            match program {
                Some(p) => programs.push(p),
                None => {
                    return Err(FluidInitError::ProgramLink {
                        stage,
                        reason: "no source for stage".into(),
                    })
                }
            }
        }
        info!(target: "fluid", "linked {} programs", programs.len());
        Ok(Self { programs })
    }

    /// Cache of the built-in stages.
    pub fn standard() -> Result<Self, FluidInitError> {
        Self::build(&VertexStage::STENCIL, &super::kernels::standard_sources())
    }

    pub fn get(&self, stage: ShaderStage) -> &Program {
        &self.programs[stage.index()]
    }
}
