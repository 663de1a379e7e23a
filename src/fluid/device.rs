//! Device surface binding: capability probing and field format negotiation.
//!
//! The binder is queried once per solver. It records whether float storage
//! and linear filtering are available and which concrete texture format
//! backs each component layout. Narrow formats fall back to wider ones
//! (`R` -> `RG` -> `RGBA`), then to the other float precision, then to
//! `Rgba8Unorm`. If nothing survives, initialization fails loudly. The
//! device's largest 2D texture side caps every grid the solver allocates.
use bevy::log::{info, warn};
use bevy::render::render_resource::{TextureFormat, TextureFormatFeatureFlags, TextureUsages};
use bevy::render::renderer::RenderAdapter;

use super::config::FloatPrecision;
use super::error::FluidInitError;
use super::field::{FieldFormat, FilterMode};

const HALF_CHAIN: [TextureFormat; 3] = [
    TextureFormat::R16Float,
    TextureFormat::Rg16Float,
    TextureFormat::Rgba16Float,
];
const FULL_CHAIN: [TextureFormat; 3] = [
    TextureFormat::R32Float,
    TextureFormat::Rg32Float,
    TextureFormat::Rgba32Float,
];
const INTEGER_FALLBACK: TextureFormat = TextureFormat::Rgba8Unorm;

/// `max_texture_dimension_2d` of wgpu's default limits.
pub const DEFAULT_MAX_TEXTURE_SIDE: u32 = 8192;

/// What a solver asks of its drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRequest {
    pub alpha: bool,
    pub depth: bool,
    pub stencil: bool,
    pub antialias: bool,
}

impl Default for SurfaceRequest {
    fn default() -> Self {
        Self {
            alpha: true,
            depth: false,
            stencil: false,
            antialias: false,
        }
    }
}

/// Answers "can fields live in this format" for one device.
pub trait FormatProbe {
    fn renderable(&self, format: TextureFormat) -> bool;
    fn filterable(&self, format: TextureFormat) -> bool;
    fn label(&self) -> String;

    /// Largest width or height a 2D texture may have.
    fn max_texture_side(&self) -> u32 {
        DEFAULT_MAX_TEXTURE_SIDE
    }
}

/// Probe backed by the GPU adapter the host renders with.
pub struct AdapterProbe<'a>(pub &'a RenderAdapter);

impl FormatProbe for AdapterProbe<'_> {
    fn renderable(&self, format: TextureFormat) -> bool {
        let features = self.0.get_texture_format_features(format);
        features
            .allowed_usages
            .contains(TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST)
    }

    fn filterable(&self, format: TextureFormat) -> bool {
        let features = self.0.get_texture_format_features(format);
        features.flags.contains(TextureFormatFeatureFlags::FILTERABLE)
    }

    fn label(&self) -> String {
        format!("adapter:{}", self.0.get_info().name)
    }

    fn max_texture_side(&self) -> u32 {
        self.0.limits().max_texture_dimension_2d
    }
}

/// Probe for headless runs; capabilities are whatever the caller says.
#[derive(Debug, Clone)]
pub struct SoftwareProbe {
    unsupported: Vec<TextureFormat>,
    linear: bool,
    max_side: u32,
}

impl SoftwareProbe {
    /// Everything renderable and filterable.
    pub fn full() -> Self {
        Self {
            unsupported: Vec::new(),
            linear: true,
            max_side: DEFAULT_MAX_TEXTURE_SIDE,
        }
    }

    pub fn without(mut self, formats: &[TextureFormat]) -> Self {
        self.unsupported.extend_from_slice(formats);
        self
    }

    pub fn nearest_only(mut self) -> Self {
        self.linear = false;
        self
    }

    pub fn max_side(mut self, side: u32) -> Self {
        self.max_side = side.max(1);
        self
    }
}

impl FormatProbe for SoftwareProbe {
    fn renderable(&self, format: TextureFormat) -> bool {
        !self.unsupported.contains(&format)
    }

    fn filterable(&self, format: TextureFormat) -> bool {
        self.linear && self.renderable(format)
    }

    fn label(&self) -> String {
        "software".into()
    }

    fn max_texture_side(&self) -> u32 {
        self.max_side
    }
}

/// Every format the binder may hand out.
pub const CANDIDATE_FORMATS: [TextureFormat; 7] = [
    TextureFormat::R16Float,
    TextureFormat::Rg16Float,
    TextureFormat::Rgba16Float,
    TextureFormat::R32Float,
    TextureFormat::Rg32Float,
    TextureFormat::Rgba32Float,
    INTEGER_FALLBACK,
];

/// Answers of another probe for [`CANDIDATE_FORMATS`], captured once.
///
/// Owns no device handle, so it can live in an ECS resource and serve
/// every solver constructed later.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSnapshot {
    label: String,
    renderable: Vec<TextureFormat>,
    filterable: Vec<TextureFormat>,
    max_side: u32,
}

impl ProbeSnapshot {
    pub fn capture(probe: &dyn FormatProbe) -> Self {
        Self {
            label: probe.label(),
            renderable: CANDIDATE_FORMATS.into_iter().filter(|f| probe.renderable(*f)).collect(),
            filterable: CANDIDATE_FORMATS.into_iter().filter(|f| probe.filterable(*f)).collect(),
            max_side: probe.max_texture_side(),
        }
    }
}

impl FormatProbe for ProbeSnapshot {
    fn renderable(&self, format: TextureFormat) -> bool {
        self.renderable.contains(&format)
    }

    fn filterable(&self, format: TextureFormat) -> bool {
        self.filterable.contains(&format)
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn max_texture_side(&self) -> u32 {
        self.max_side
    }
}

/// Cached result of binding one surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceCaps {
    pub request: SurfaceRequest,
    pub rgba: FieldFormat,
    pub rg: FieldFormat,
    pub r: FieldFormat,
    pub float_textures: bool,
    pub linear_filtering: bool,
    /// Longest grid side the device can store.
    pub max_grid_side: u32,
}

impl DeviceCaps {
    /// Filter for velocity and dye; the scalar fields always sample nearest.
    pub fn transport_filter(&self) -> FilterMode {
        if self.linear_filtering {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        }
    }
}

fn float_format(probe: &dyn FormatProbe, chain: &[TextureFormat; 3], components: u8) -> Option<FieldFormat> {
    let start = match components {
        1 => 0,
        2 => 1,
        _ => 2,
    };
    chain[start..]
        .iter()
        .copied()
        .find(|f| probe.renderable(*f))
        .and_then(FieldFormat::from_texture)
}

fn negotiate(probe: &dyn FormatProbe, preferred: FloatPrecision, components: u8) -> Result<FieldFormat, FluidInitError> {
    let (first, second) = match preferred {
        FloatPrecision::Half => (&HALF_CHAIN, &FULL_CHAIN),
        FloatPrecision::Full => (&FULL_CHAIN, &HALF_CHAIN),
    };
    if let Some(f) = float_format(probe, first, components).or_else(|| float_format(probe, second, components)) {
        return Ok(f);
    }
    if probe.renderable(INTEGER_FALLBACK) {
        if let Some(f) = FieldFormat::from_texture(INTEGER_FALLBACK) {
            return Ok(f);
        }
    }
    Err(FluidInitError::NoRenderableFormat { components })
}

/// Bind a `width` x `height` surface and negotiate field formats against `probe`.
pub fn bind_surface(
    width: u32,
    height: u32,
    request: SurfaceRequest,
    probe: &dyn FormatProbe,
    precision: FloatPrecision,
) -> Result<DeviceCaps, FluidInitError> {
    if width == 0 || height == 0 {
        return Err(FluidInitError::SurfaceUnavailable(format!(
            "surface has no area ({width}x{height})"
        )));
    }
    if request.depth || request.stencil || request.antialias {
        return Err(FluidInitError::SurfaceUnavailable(
            "field surfaces are color-only and single-sampled".into(),
        ));
    }
    let rgba = negotiate(probe, precision, 4)?;
    let rg = negotiate(probe, precision, 2)?;
    let r = negotiate(probe, precision, 1)?;
    let float_textures = rgba.is_float() && rg.is_float() && r.is_float();
    let linear_filtering = probe.filterable(rgba.texture) && probe.filterable(rg.texture);
    if !float_textures {
        warn!(target: "fluid", "{}: float textures unavailable, fields degrade to {:?}", probe.label(), INTEGER_FALLBACK);
    }
    let max_grid_side = probe.max_texture_side().max(1);
    info!(
        target: "fluid",
        "{}: rgba={:?} rg={:?} r={:?} linear={linear_filtering} max_side={max_grid_side}",
        probe.label(),
        rgba.texture,
        rg.texture,
        r.texture
    );
    Ok(DeviceCaps {
        request,
        rgba,
        rg,
        r,
        float_textures,
        linear_filtering,
        max_grid_side,
    })
}
