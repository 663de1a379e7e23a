//! Render pass: composite the dye field onto a target with premultiplied "over" blending.
use bevy::math::{UVec2, Vec2, Vec3, Vec4};
use rayon::prelude::*;

use super::field::Field;
use super::program::{names::U_TEXTURE, ProgramCache, ShaderStage};
use super::step::FieldStorage;

/// Which field a surface shows. Anything but `Dye` is a debug view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayField {
    #[default]
    Dye,
    Velocity,
    Pressure,
    Curl,
    Divergence,
}

impl DisplayField {
    pub const ALL: [DisplayField; 5] = [
        DisplayField::Dye,
        DisplayField::Velocity,
        DisplayField::Pressure,
        DisplayField::Curl,
        DisplayField::Divergence,
    ];

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn source(self, fields: &FieldStorage) -> &Field {
        match self {
            DisplayField::Dye => fields.dye.read(),
            DisplayField::Velocity => fields.velocity.read(),
            DisplayField::Pressure => fields.pressure.read(),
            DisplayField::Curl => &fields.curl,
            DisplayField::Divergence => &fields.divergence,
        }
    }

    /// Map a raw texel of the displayed field into displayable color.
    ///
    /// Velocity shows `|v| / 1000` per axis in red and green. Signed scalars
    /// show positive values in red and negative ones in blue.
    pub fn visualize(self, t: Vec4) -> Vec4 {
        match self {
            DisplayField::Dye => t,
            DisplayField::Velocity => Vec4::new(t.x.abs() / 1000.0, t.y.abs() / 1000.0, 0.0, 1.0),
            DisplayField::Pressure | DisplayField::Curl | DisplayField::Divergence => {
                let scale = match self {
                    DisplayField::Curl => 0.02,
                    _ => 0.2,
                };
                let v = t.x * scale;
                Vec4::new(v.max(0.0), 0.0, (-v).max(0.0), 1.0)
            }
        }
    }
}

/// An RGBA framebuffer holding premultiplied color.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32, clear: Vec4) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            width,
            height,
            pixels: vec![clear; (width * height) as usize],
        }
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn clear(&mut self, color: Vec4) {
        self.pixels.iter_mut().for_each(|p| *p = color);
    }

    /// Pixel at column `x`, row `y` counted from the top.
    pub fn pixel(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y.min(self.height - 1) * self.width + x.min(self.width - 1)) as usize]
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    /// Straight-alpha 8-bit RGBA, rows top to bottom.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for p in &self.pixels {
            let a = p.w.clamp(0.0, 1.0);
            let rgb = if a > 0.0 {
                (p.truncate() / a).clamp(Vec3::ZERO, Vec3::ONE)
            } else {
                Vec3::ZERO
            };
            for c in [rgb.x, rgb.y, rgb.z, a] {
                out.push((c * 255.0).round() as u8);
            }
        }
        out
    }
}

/// Blend factors `ONE, ONE_MINUS_SRC_ALPHA` on color and alpha.
#[inline]
pub fn blend_over(src: Vec4, dst: Vec4) -> Vec4 {
    src + dst * (1.0 - src.w)
}

pub struct RenderPass;

impl RenderPass {
    /// Draw `mode`'s field over every pixel of `target`, rows in parallel.
    ///
    /// The display program runs at the pixel center; its output is clamped
    /// to `[0, 1]` as a fixed-point render target would before blending.
    pub fn composite(programs: &ProgramCache, fields: &FieldStorage, mode: DisplayField, target: &mut RenderTarget) {
        let source = mode.source(fields);
        let display = programs.get(ShaderStage::Display).bind().texture(U_TEXTURE, source);
        let size = target.size().as_vec2();
        let width = target.width as usize;
        target.pixels.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            // Framebuffer rows run top-down, texture rows bottom-up.
            let v = 1.0 - (y as f32 + 0.5) / size.y;
            for (x, pixel) in row.iter_mut().enumerate() {
                let uv = Vec2::new((x as f32 + 0.5) / size.x, v);
                let src = match mode {
                    DisplayField::Dye => display.eval(uv),
                    _ => {
                        let c = mode.visualize(source.sample(uv));
                        c.truncate().extend(c.truncate().max_element())
                    }
                };
                *pixel = blend_over(src.clamp(Vec4::ZERO, Vec4::ONE), *pixel);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_blend_keeps_destination_under_transparent_source() {
        let dst = Vec4::new(1.0, 1.0, 1.0, 1.0);
        assert_eq!(blend_over(Vec4::ZERO, dst), dst);
        let src = Vec4::new(0.5, 0.0, 0.0, 0.5);
        assert_eq!(blend_over(src, dst), Vec4::new(1.0, 0.5, 0.5, 1.0));
    }

    #[test]
    fn straight_alpha_conversion() {
        let mut t = RenderTarget::new(1, 1, Vec4::ZERO);
        assert_eq!(t.to_rgba8(), vec![0, 0, 0, 0]);
        t.clear(Vec4::new(0.5, 0.0, 0.0, 0.5));
        assert_eq!(t.to_rgba8(), vec![255, 0, 0, 128]);
    }

    #[test]
    fn debug_modes_cycle_back_to_dye() {
        let mut m = DisplayField::Dye;
        for _ in 0..DisplayField::ALL.len() {
            m = m.next();
        }
        assert_eq!(m, DisplayField::Dye);
    }

    #[test]
    fn signed_scalars_split_into_red_and_blue() {
        let pos = DisplayField::Pressure.visualize(Vec4::new(2.0, 0.0, 0.0, 1.0));
        let neg = DisplayField::Pressure.visualize(Vec4::new(-2.0, 0.0, 0.0, 1.0));
        assert!(pos.x > 0.0 && pos.z == 0.0);
        assert!(neg.z > 0.0 && neg.x == 0.0);
    }
}
