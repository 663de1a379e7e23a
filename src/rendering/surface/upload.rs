//! Packing field texels into `Image` bytes.
use bevy::asset::RenderAssetUsages;
use bevy::image::{Image, ImageSampler};
use bevy::math::{UVec2, Vec4};
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use half::f16;
use rayon::prelude::*;

use crate::fluid::{FilterMode, FluidSolver};

/// Texture format the display image uses for a given solver dye format.
pub fn display_format(dye: TextureFormat) -> TextureFormat {
    match dye {
        TextureFormat::Rgba16Float | TextureFormat::Rgba32Float => dye,
        _ => TextureFormat::Rgba8Unorm,
    }
}

/// Texels encoded per rayon task.
const ENCODE_CHUNK: usize = 4096;

fn bytes_per_texel(format: TextureFormat) -> usize {
    match format {
        TextureFormat::Rgba32Float => 16,
        TextureFormat::Rgba16Float => 8,
        _ => 4,
    }
}

fn encode_one(format: TextureFormat, t: Vec4, out: &mut [u8]) {
    let c = t.to_array();
    match format {
        TextureFormat::Rgba32Float => out.copy_from_slice(bytemuck::cast_slice(&c)),
        TextureFormat::Rgba16Float => {
            for (dst, v) in out.chunks_exact_mut(2).zip(c) {
                dst.copy_from_slice(&f16::from_f32(v).to_le_bytes());
            }
        }
        _ => {
            for (dst, v) in out.iter_mut().zip(c) {
                *dst = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
    }
}

/// Encode `map(texel)` for every texel into `out`, reusing its allocation.
/// Chunks are encoded in parallel.
pub fn encode_texels_into<F>(format: TextureFormat, texels: &[Vec4], map: F, out: &mut Vec<u8>)
where
    F: Fn(Vec4) -> Vec4 + Sync,
{
    let stride = bytes_per_texel(format);
    out.resize(texels.len() * stride, 0);
    out.par_chunks_mut(ENCODE_CHUNK * stride)
        .zip(texels.par_chunks(ENCODE_CHUNK))
        .for_each(|(bytes, chunk)| {
            for (dst, t) in bytes.chunks_exact_mut(stride).zip(chunk) {
                encode_one(format, map(*t), dst);
            }
        });
}

/// Encode texels (row 0 = bottom) in `format`. Image rows keep the same order;
/// the display shader flips `v`.
pub fn encode_texels(format: TextureFormat, texels: &[Vec4]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_texels_into(format, texels, |t| t, &mut out);
    out
}

pub fn new_display_image(size: UVec2, format: TextureFormat, filter: FilterMode) -> Image {
    let size = size.max(UVec2::ONE);
    let texels = vec![Vec4::ZERO; (size.x * size.y) as usize];
    let mut image = Image::new(
        Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        encode_texels(format, &texels),
        format,
        RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
    );
    image.sampler = match filter {
        FilterMode::Linear => ImageSampler::linear(),
        FilterMode::Nearest => ImageSampler::nearest(),
    };
    image
}

/// Copy the solver's displayed field into `image`, re-encoding in place.
///
/// Returns `true` when the grid size changed and the image was resized, the
/// only case where bind groups built on the image need refreshing.
pub fn write_display(solver: &FluidSolver, image: &mut Image) -> bool {
    let mode = solver.display_field();
    let field = mode.source(solver.fields());
    let format = image.texture_descriptor.format;
    let size = field.size();
    let resized = image.size() != size;
    if resized {
        image.texture_descriptor.size = Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        };
    }
    let data = image.data.get_or_insert_with(Vec::new);
    encode_texels_into(format, field.texels(), |t| mode.visualize(t), data);
    resized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_lengths_match_format() {
        let t = [Vec4::new(0.25, 0.5, 2.0, 1.0); 3];
        assert_eq!(encode_texels(TextureFormat::Rgba32Float, &t).len(), 3 * 16);
        assert_eq!(encode_texels(TextureFormat::Rgba16Float, &t).len(), 3 * 8);
        assert_eq!(encode_texels(TextureFormat::Rgba8Unorm, &t).len(), 3 * 4);
    }

    #[test]
    fn unorm_clamps_and_half_keeps_range() {
        let t = [Vec4::new(2.0, -1.0, 0.5, 1.0)];
        assert_eq!(encode_texels(TextureFormat::Rgba8Unorm, &t), vec![255, 0, 128, 255]);
        let half = encode_texels(TextureFormat::Rgba16Float, &t);
        assert_eq!(f16::from_le_bytes([half[0], half[1]]).to_f32(), 2.0);
    }

    #[test]
    fn chunked_encoding_keeps_texel_order() {
        let t: Vec<Vec4> = (0..ENCODE_CHUNK * 2 + 7).map(|i| Vec4::splat(i as f32)).collect();
        let bytes = encode_texels(TextureFormat::Rgba32Float, &t);
        let floats: &[f32] = bytemuck::cast_slice(&bytes);
        for (i, texel) in floats.chunks_exact(4).enumerate() {
            assert_eq!(texel, &[i as f32; 4]);
        }
    }

    #[test]
    fn display_upload_resizes_only_when_the_grid_changes() {
        use crate::fluid::{FloatPrecision, SoftwareProbe, SolverConfig};
        use bevy::math::{Vec2, Vec3};

        let cfg = SolverConfig {
            sim_resolution: 8,
            dye_resolution: 16,
            precision: FloatPrecision::Full,
            ..SolverConfig::hero()
        };
        let mut solver = FluidSolver::new(cfg, UVec2::new(64, 32), &SoftwareProbe::full()).unwrap();
        solver.splat(Vec2::splat(0.5), Vec2::ZERO, Vec3::ONE);
        let dye = solver.fields().dye_size();
        let mut image = new_display_image(dye, TextureFormat::Rgba32Float, FilterMode::Linear);

        assert!(!write_display(&solver, &mut image));
        let expected = encode_texels(TextureFormat::Rgba32Float, solver.fields().dye.read().texels());
        assert_eq!(image.data.as_deref(), Some(expected.as_slice()));

        assert!(solver.resize(UVec2::new(32, 64)));
        assert!(write_display(&solver, &mut image));
        assert_eq!(image.size(), solver.fields().dye_size());
        assert_eq!(image.data.as_ref().map(Vec::len), Some(16 * 32 * 16));
    }

    #[test]
    fn display_format_falls_back_to_unorm() {
        assert_eq!(display_format(TextureFormat::Rgba16Float), TextureFormat::Rgba16Float);
        assert_eq!(display_format(TextureFormat::Rgba8Unorm), TextureFormat::Rgba8Unorm);
    }
}
