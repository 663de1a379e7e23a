//! Field storage: CPU-resident 2D grids that behave like sampled GPU textures.
//!
//! Sampling follows texture rules so that every pass reads the way a
//! fragment shader would:
//! * normalized coordinates in `[0, 1]`, texel centers at `(i + 0.5) / n`;
//! * clamp-to-edge addressing, never wraparound;
//! * nearest or bilinear filtering per field;
//! * channels the storage format lacks read back as `(0, 0, 0, 1)`.
//!
//! Writes are rounded to the storage precision, so a half-float field loses
//! exactly the bits an `R16Float` render target would.
use bevy::math::{UVec2, Vec2, Vec4};
use bevy::render::render_resource::TextureFormat;
use half::f16;
use rayon::prelude::*;

/// Half-open block of cells, `min` inclusive and `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub min: UVec2,
    pub max: UVec2,
}

impl CellRect {
    pub fn new(min: UVec2, max: UVec2) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    pub fn contains(&self, cell: UVec2) -> bool {
        cell.cmpge(self.min).all() && cell.cmplt(self.max).all()
    }

    pub fn area(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let d = self.max - self.min;
        d.x as u64 * d.y as u64
    }
}

/// Numeric storage of a field's channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Full,
    Half,
    /// Integer fallback when float textures are missing; values clamp to `[0, 1]`.
    Unorm8,
}

impl Precision {
    #[inline]
    pub fn quantize(self, v: f32) -> f32 {
        match self {
            Precision::Full => v,
            Precision::Half => f16::from_f32(v).to_f32(),
            Precision::Unorm8 => (v.clamp(0.0, 1.0) * 255.0).round() / 255.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Negotiated storage for one component layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFormat {
    pub texture: TextureFormat,
    pub components: u8,
    pub precision: Precision,
}

impl FieldFormat {
    /// Layout for the formats the device binder may hand out.
    pub fn from_texture(texture: TextureFormat) -> Option<Self> {
        use TextureFormat::*;
        let (components, precision) = match texture {
            R16Float => (1, Precision::Half),
            Rg16Float => (2, Precision::Half),
            Rgba16Float => (4, Precision::Half),
            R32Float => (1, Precision::Full),
            Rg32Float => (2, Precision::Full),
            Rgba32Float => (4, Precision::Full),
            Rgba8Unorm => (4, Precision::Unorm8),
            _ => return None,
        };
        Some(Self {
            texture,
            components,
            precision,
        })
    }

    pub fn is_float(&self) -> bool {
        self.precision != Precision::Unorm8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    width: u32,
    height: u32,
    format: FieldFormat,
    filter: FilterMode,
    data: Vec<Vec4>,
}

impl Field {
    /// Zero-initialized grid. Zero dimensions are bumped to one texel.
    pub fn allocate(width: u32, height: u32, format: FieldFormat, filter: FilterMode) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let blank = format.fill_missing(Vec4::ZERO);
        Self {
            width,
            height,
            format,
            filter,
            data: vec![blank; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// One grid cell in normalized coordinates.
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    pub fn format(&self) -> FieldFormat {
        self.format
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    /// Row-major texels, row 0 at the bottom (`v = 0`).
    pub fn texels(&self) -> &[Vec4] {
        &self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Texel with clamp-to-edge integer addressing.
    #[inline]
    pub fn fetch(&self, x: i32, y: i32) -> Vec4 {
        let cx = x.clamp(0, self.width as i32 - 1) as u32;
        let cy = y.clamp(0, self.height as i32 - 1) as u32;
        self.data[self.index(cx, cy)]
    }

    /// Texel at an in-range cell.
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        self.data[self.index(x.min(self.width - 1), y.min(self.height - 1))]
    }

    /// Texture lookup at normalized `uv` using this field's filter.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        match self.filter {
            FilterMode::Nearest => {
                let x = (uv.x * self.width as f32).floor() as i32;
                let y = (uv.y * self.height as f32).floor() as i32;
                self.fetch(x, y)
            }
            FilterMode::Linear => {
                let p = uv * self.size().as_vec2() - Vec2::splat(0.5);
                let base = p.floor();
                let f = p - base;
                let (x0, y0) = (base.x as i32, base.y as i32);
                let bottom = self.fetch(x0, y0).lerp(self.fetch(x0 + 1, y0), f.x);
                let top = self.fetch(x0, y0 + 1).lerp(self.fetch(x0 + 1, y0 + 1), f.x);
                bottom.lerp(top, f.y)
            }
        }
    }

    /// Write one texel, dropping channels the format lacks and rounding to its precision.
    #[inline]
    pub fn store(&mut self, x: u32, y: u32, value: Vec4) {
        let idx = self.index(x, y);
        self.data[idx] = self.format.encode(value);
    }

    pub fn fill(&mut self, value: Vec4) {
        let v = self.format.encode(value);
        self.data.iter_mut().for_each(|t| *t = v);
    }

    /// Every cell of the field.
    pub fn cells(&self) -> CellRect {
        CellRect::new(UVec2::ZERO, self.size())
    }

    /// Cells whose centers fall inside the normalized box `[lo, hi]`.
    pub fn cells_within(&self, lo: Vec2, hi: Vec2) -> CellRect {
        let n = self.size().as_vec2();
        // saturating casts send anything left of the grid to 0
        let min = (lo * n - Vec2::splat(0.5)).ceil().max(Vec2::ZERO);
        let max = ((hi * n - Vec2::splat(0.5)).floor() + Vec2::ONE).min(n);
        let (min, max) = (min.as_uvec2(), max.as_uvec2());
        CellRect::new(min, max.max(min))
    }

    /// Write `f(x, y)` into every cell of `cells`, one rayon task per row.
    pub fn fill_cells_with<F>(&mut self, cells: CellRect, f: F)
    where
        F: Fn(u32, u32) -> Vec4 + Sync,
    {
        if cells.is_empty() {
            return;
        }
        let w = self.width as usize;
        let format = self.format;
        let (x0, x1) = (cells.min.x as usize, cells.max.x.min(self.width) as usize);
        let y1 = cells.max.y.min(self.height) as usize;
        self.data[cells.min.y as usize * w..y1 * w]
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(i, row)| {
                let y = cells.min.y + i as u32;
                for (x, texel) in row[x0..x1].iter_mut().enumerate() {
                    *texel = format.encode(f((x0 + x) as u32, y));
                }
            });
    }

    /// Copy `cells` over from a field of the same size.
    pub fn copy_cells_from(&mut self, src: &Field, cells: CellRect) {
        debug_assert_eq!(self.size(), src.size());
        if cells.is_empty() {
            return;
        }
        let w = self.width as usize;
        for y in cells.min.y as usize..cells.max.y.min(self.height) as usize {
            let row = y * w + cells.min.x as usize..y * w + cells.max.x.min(self.width) as usize;
            self.data[row.clone()].copy_from_slice(&src.data[row]);
        }
    }

    /// Cell whose center is closest to `uv`.
    pub fn nearest_cell(&self, uv: Vec2) -> UVec2 {
        let x = (uv.x * self.width as f32).floor().clamp(0.0, (self.width - 1) as f32);
        let y = (uv.y * self.height as f32).floor().clamp(0.0, (self.height - 1) as f32);
        UVec2::new(x as u32, y as u32)
    }

    /// Normalized coordinate of a cell center.
    pub fn cell_uv(&self, x: u32, y: u32) -> Vec2 {
        (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5)) * self.texel_size()
    }
}

impl FieldFormat {
    #[inline]
    fn fill_missing(&self, mut v: Vec4) -> Vec4 {
        if self.components < 2 {
            v.y = 0.0;
        }
        if self.components < 3 {
            v.z = 0.0;
        }
        if self.components < 4 {
            v.w = 1.0;
        }
        v
    }

    #[inline]
    fn encode(&self, v: Vec4) -> Vec4 {
        let p = self.precision;
        let q = Vec4::new(p.quantize(v.x), p.quantize(v.y), p.quantize(v.z), p.quantize(v.w));
        self.fill_missing(q)
    }
}

/// Ping-pong pair: passes read `read` and write `write`, then `swap`.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleBuffer<T> {
    read: T,
    write: T,
}

impl<T> DoubleBuffer<T> {
    pub fn new(read: T, write: T) -> Self {
        Self { read, write }
    }

    pub fn read(&self) -> &T {
        &self.read
    }

    pub fn read_mut(&mut self) -> &mut T {
        &mut self.read
    }

    pub fn write(&self) -> &T {
        &self.write
    }

    /// Source and destination of one pass, borrowed together.
    pub fn split(&mut self) -> (&T, &mut T) {
        (&self.read, &mut self.write)
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }
}

pub type DoubleField = DoubleBuffer<Field>;

impl DoubleField {
    pub fn allocate(width: u32, height: u32, format: FieldFormat, filter: FilterMode) -> Self {
        let read = Field::allocate(width, height, format, filter);
        let write = read.clone();
        Self::new(read, write)
    }

    pub fn size(&self) -> UVec2 {
        self.read.size()
    }

    pub fn texel_size(&self) -> Vec2 {
        self.read.texel_size()
    }

    /// Publish a pass that only drew `cells` of the write half.
    ///
    /// Copies those cells onto the read half instead of swapping, so the
    /// untouched remainder of the read half stays current.
    pub fn commit_cells(&mut self, cells: CellRect) {
        self.read.copy_cells_from(&self.write, cells);
    }

    /// Reallocate both halves at the new size; `false` (and untouched) when unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.read.width == width.max(1) && self.read.height == height.max(1) {
            return false;
        }
        *self = Self::allocate(width, height, self.read.format, self.read.filter);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_full() -> FieldFormat {
        FieldFormat::from_texture(TextureFormat::Rgba32Float).unwrap()
    }

    #[test]
    fn texel_size_is_reciprocal_of_dimensions() {
        let f = Field::allocate(64, 32, rgba_full(), FilterMode::Nearest);
        assert_eq!(f.texel_size(), Vec2::new(1.0 / 64.0, 1.0 / 32.0));
    }

    #[test]
    fn sampling_outside_unit_square_clamps_to_edge() {
        let mut f = Field::allocate(4, 1, rgba_full(), FilterMode::Linear);
        for x in 0..4 {
            f.store(x, 0, Vec4::splat(x as f32));
        }
        assert_eq!(f.sample(Vec2::new(-0.5, 0.5)).x, 0.0);
        assert_eq!(f.sample(Vec2::new(1.5, 0.5)).x, 3.0);
    }

    #[test]
    fn linear_filter_interpolates_between_centers() {
        let mut f = Field::allocate(2, 1, rgba_full(), FilterMode::Linear);
        f.store(0, 0, Vec4::ZERO);
        f.store(1, 0, Vec4::ONE);
        let mid = f.sample(Vec2::new(0.5, 0.5));
        assert!((mid.x - 0.5).abs() < 1e-6);
        let at_center = f.sample(f.cell_uv(1, 0));
        assert_eq!(at_center.x, 1.0);
    }

    #[test]
    fn nearest_filter_picks_containing_cell() {
        let mut f = Field::allocate(2, 1, rgba_full(), FilterMode::Nearest);
        f.store(1, 0, Vec4::ONE);
        assert_eq!(f.sample(Vec2::new(0.49, 0.5)).x, 0.0);
        assert_eq!(f.sample(Vec2::new(0.51, 0.5)).x, 1.0);
    }

    #[test]
    fn narrow_formats_drop_missing_channels() {
        let r = FieldFormat::from_texture(TextureFormat::R16Float).unwrap();
        let mut f = Field::allocate(1, 1, r, FilterMode::Nearest);
        assert_eq!(f.texel(0, 0), Vec4::new(0.0, 0.0, 0.0, 1.0));
        f.store(0, 0, Vec4::new(0.5, 2.0, 3.0, 4.0));
        assert_eq!(f.texel(0, 0), Vec4::new(0.5, 0.0, 0.0, 1.0));
    }

    #[test]
    fn half_precision_rounds_writes() {
        let rg = FieldFormat::from_texture(TextureFormat::Rg16Float).unwrap();
        let mut f = Field::allocate(1, 1, rg, FilterMode::Nearest);
        f.store(0, 0, Vec4::new(0.1, 1000.2, 0.0, 0.0));
        let t = f.texel(0, 0);
        assert_eq!(t.x, f16::from_f32(0.1).to_f32());
        assert_eq!(t.y, 1000.0);
    }

    #[test]
    fn unorm_fallback_clamps() {
        let fmt = FieldFormat::from_texture(TextureFormat::Rgba8Unorm).unwrap();
        let mut f = Field::allocate(1, 1, fmt, FilterMode::Nearest);
        f.store(0, 0, Vec4::new(-1.0, 2.0, 0.5, 1.0));
        let t = f.texel(0, 0);
        assert_eq!(t.x, 0.0);
        assert_eq!(t.y, 1.0);
        assert!((t.z - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn swap_exchanges_roles() {
        let mut d = DoubleField::allocate(2, 2, rgba_full(), FilterMode::Nearest);
        {
            let (_, write) = d.split();
            write.fill(Vec4::ONE);
        }
        assert_eq!(d.read().texel(0, 0), Vec4::ZERO);
        d.swap();
        assert_eq!(d.read().texel(0, 0), Vec4::ONE);
        assert_eq!(d.write().texel(0, 0), Vec4::ZERO);
    }

    #[test]
    fn cells_within_selects_covered_centers() {
        let f = Field::allocate(10, 4, rgba_full(), FilterMode::Nearest);
        // centers at 0.05, 0.15, ... along x and 0.125, 0.375, ... along y
        let r = f.cells_within(Vec2::new(0.1, 0.3), Vec2::new(0.36, 0.9));
        assert_eq!(r, CellRect::new(UVec2::new(1, 1), UVec2::new(4, 4)));
        assert_eq!(f.cells_within(Vec2::splat(-3.0), Vec2::splat(3.0)), f.cells());
        assert!(f.cells_within(Vec2::splat(1.5), Vec2::splat(2.0)).is_empty());
        assert!(f.cells_within(Vec2::new(0.11, 0.0), Vec2::new(0.12, 1.0)).is_empty());
    }

    #[test]
    fn committed_cells_reach_the_read_half_only() {
        let mut d = DoubleField::allocate(4, 4, rgba_full(), FilterMode::Nearest);
        d.read_mut().fill(Vec4::splat(3.0));
        let cells = CellRect::new(UVec2::new(1, 1), UVec2::new(3, 2));
        {
            let (_, write) = d.split();
            write.fill_cells_with(cells, |x, y| Vec4::new(x as f32, y as f32, 0.0, 0.0));
        }
        d.commit_cells(cells);
        assert_eq!(d.read().texel(2, 1), Vec4::new(2.0, 1.0, 0.0, 0.0));
        assert_eq!(d.read().texel(0, 1), Vec4::splat(3.0));
        assert_eq!(d.read().texel(2, 2), Vec4::splat(3.0));
        assert_eq!(cells.area(), 2);
    }

    #[test]
    fn resize_is_noop_for_same_dimensions() {
        let mut d = DoubleField::allocate(8, 4, rgba_full(), FilterMode::Linear);
        d.read_mut().fill(Vec4::splat(0.25));
        assert!(!d.resize(8, 4));
        assert_eq!(d.read().texel(3, 3), Vec4::splat(0.25));
        assert!(d.resize(16, 4));
        assert_eq!(d.size(), UVec2::new(16, 4));
        assert_eq!(d.read().texel(3, 3), Vec4::ZERO);
        assert_eq!(d.read().filter(), FilterMode::Linear);
    }
}
