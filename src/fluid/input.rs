//! Input injector: pointer table and splat queue.
//!
//! Host events arrive as surface-relative pixels (origin top-left). They
//! are stored as texture coordinates (origin bottom-left). Once per tick the
//! injector turns every moved pointer, plus at most one queued random batch,
//! into splats.
use bevy::math::{UVec2, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::Rng;
use bevy::log::trace;
use smallvec::SmallVec;

use super::config::SolverConfig;
use super::field::{CellRect, Field};
use super::kernels::splat_reach;
use super::program::{names::*, ProgramCache, ShaderStage};
use super::step::FieldStorage;

/// Stable identity of one input contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactId {
    Mouse,
    Touch(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerState {
    pub id: ContactId,
    pub position: Vec2,
    pub previous: Vec2,
    pub delta: Vec2,
    pub moved: bool,
    pub down: bool,
    pub color: Vec3,
}

/// One Gaussian impulse into velocity and dye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub point: Vec2,
    pub impulse: Vec2,
    pub color: Vec3,
}

#[derive(Debug)]
pub struct InputInjector {
    pointers: SmallVec<[PointerState; 4]>,
    queue: Vec<u32>,
    surface: UVec2,
    palette: Vec<Vec3>,
    splat_force: f32,
    correct_delta_aspect: bool,
    hover: bool,
    random_amount: u32,
    random_velocity: f32,
    rng: StdRng,
}

impl InputInjector {
    pub fn new(cfg: &SolverConfig, surface: UVec2, rng: StdRng) -> Self {
        Self {
            pointers: SmallVec::new(),
            queue: Vec::new(),
            surface: surface.max(UVec2::ONE),
            palette: cfg.palette.iter().map(|c| Vec3::from_array(*c)).collect(),
            splat_force: cfg.splat_force,
            correct_delta_aspect: cfg.correct_delta_aspect,
            hover: cfg.hover_pointer,
            random_amount: cfg.random_splat_amount,
            random_velocity: cfg.random_splat_velocity,
            rng,
        }
    }

    pub fn set_surface(&mut self, surface: UVec2) {
        self.surface = surface.max(UVec2::ONE);
    }

    pub fn pointers(&self) -> &[PointerState] {
        &self.pointers
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn aspect(&self) -> f32 {
        self.surface.x as f32 / self.surface.y as f32
    }

    /// Surface pixels to texture coordinates.
    pub fn texcoord(&self, px: Vec2) -> Vec2 {
        Vec2::new(px.x / self.surface.x as f32, 1.0 - px.y / self.surface.y as f32)
    }

    fn correct_delta(&self, mut d: Vec2) -> Vec2 {
        if self.correct_delta_aspect {
            let aspect = self.aspect();
            if aspect < 1.0 {
                d.x *= aspect;
            }
            if aspect > 1.0 {
                d.y /= aspect;
            }
        }
        d
    }

    fn random_color(&mut self) -> Vec3 {
        let i = self.rng.gen_range(0..self.palette.len().max(1));
        self.palette.get(i).copied().unwrap_or(Vec3::ONE)
    }

    fn find(&mut self, id: ContactId) -> Option<&mut PointerState> {
        self.pointers.iter_mut().find(|p| p.id == id)
    }

    fn fresh(&mut self, id: ContactId, position: Vec2, down: bool) -> PointerState {
        PointerState {
            id,
            position,
            previous: position,
            delta: Vec2::ZERO,
            moved: false,
            down,
            color: self.random_color(),
        }
    }

    pub fn record_press(&mut self, id: ContactId, px: Vec2) {
        let position = self.texcoord(px);
        let state = self.fresh(id, position, true);
        match self.find(id) {
            Some(p) => *p = state,
            None => self.pointers.push(state),
        }
    }

    pub fn record_move(&mut self, id: ContactId, px: Vec2) {
        let position = self.texcoord(px);
        let Some(current) = self.pointers.iter().position(|p| p.id == id) else {
            if self.hover && id == ContactId::Mouse {
                let state = self.fresh(id, position, false);
                self.pointers.push(state);
            }
            return;
        };
        let previous = self.pointers[current].position;
        let delta = self.correct_delta(position - previous);
        let p = &mut self.pointers[current];
        p.previous = previous;
        p.position = position;
        p.delta = delta;
        p.moved = delta != Vec2::ZERO;
    }

    /// Forget a contact. In hover mode the mouse stays tracked, only released.
    pub fn record_release(&mut self, id: ContactId) -> bool {
        if self.hover && id == ContactId::Mouse {
            return match self.find(id) {
                Some(p) => {
                    p.down = false;
                    true
                }
                None => false,
            };
        }
        let before = self.pointers.len();
        self.pointers.retain(|p| p.id != id);
        self.pointers.len() != before
    }

    pub fn queue_random_splats(&mut self, count: u32) {
        if count > 0 {
            self.queue.push(count);
        }
    }

    /// Queue a batch of the configured default size.
    pub fn queue_default_batch(&mut self) {
        self.queue_random_splats(self.random_amount);
    }

    /// Splats due this tick; clears the `moved` flags it consumed.
    pub fn drain(&mut self) -> Vec<Splat> {
        let mut out = Vec::new();
        if let Some(count) = self.queue.pop() {
            for _ in 0..count {
                let color = self.random_color();
                let point = Vec2::new(self.rng.gen(), self.rng.gen());
                let impulse = Vec2::new(self.rng.gen::<f32>() - 0.5, self.rng.gen::<f32>() - 0.5)
                    * self.random_velocity;
                out.push(Splat {
                    point,
                    impulse,
                    color,
                });
            }
        }
        for p in self.pointers.iter_mut().filter(|p| p.moved) {
            p.moved = false;
            out.push(Splat {
                point: p.position,
                impulse: p.delta * self.splat_force,
                color: p.color,
            });
        }
        out
    }
}

/// Falloff denominator for a surface; landscape surfaces widen it when asked to.
pub fn splat_radius(radius: f32, aspect: f32, correct_aspect: bool) -> f32 {
    if correct_aspect && aspect > 1.0 {
        radius * aspect
    } else {
        radius
    }
}

/// Cells of `field` a splat can change: its reach, stretched by the aspect
/// correction on x, plus one texel of slack on every side.
pub fn splat_footprint(field: &Field, point: Vec2, aspect: f32, radius: f32) -> CellRect {
    let reach = splat_reach(radius);
    let half = Vec2::new(reach / aspect.max(f32::EPSILON), reach) + field.texel_size();
    field.cells_within(point - half, point + half)
}

/// Draw one splat into velocity, then the same footprint into dye.
///
/// Only the cells inside the splat's reach are drawn; they are committed
/// back to the read half, so the rest of each grid is never visited.
pub fn apply_splat(programs: &ProgramCache, f: &mut FieldStorage, splat: &Splat, aspect: f32, radius: f32) {
    let program = programs.get(ShaderStage::Splat);

    let cells = splat_footprint(f.velocity.read(), splat.point, aspect, radius);
    let (read, write) = f.velocity.split();
    program
        .bind()
        .texture(U_TARGET, read)
        .float(ASPECT_RATIO, aspect)
        .vec2(POINT, splat.point)
        .vec3(COLOR, splat.impulse.extend(0.0))
        .float(RADIUS, radius)
        .draw_cells(write, cells);
    f.velocity.commit_cells(cells);

    let cells = splat_footprint(f.dye.read(), splat.point, aspect, radius);
    let (read, write) = f.dye.split();
    program
        .bind()
        .texture(U_TARGET, read)
        .float(ASPECT_RATIO, aspect)
        .vec2(POINT, splat.point)
        .vec3(COLOR, splat.color)
        .float(RADIUS, radius)
        .draw_cells(write, cells);
    f.dye.commit_cells(cells);
    trace!(target: "fluid", "splat at {} touched {} dye cells", splat.point, cells.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn injector(cfg: &SolverConfig, surface: UVec2) -> InputInjector {
        InputInjector::new(cfg, surface, StdRng::seed_from_u64(7))
    }

    fn pressed_cfg() -> SolverConfig {
        SolverConfig {
            hover_pointer: false,
            ..SolverConfig::hero()
        }
    }

    #[test]
    fn press_move_release_lifecycle() {
        let mut inj = injector(&pressed_cfg(), UVec2::new(100, 100));
        inj.record_press(ContactId::Touch(3), Vec2::new(50.0, 50.0));
        assert_eq!(inj.pointers().len(), 1);
        assert!(!inj.pointers()[0].moved);
        inj.record_move(ContactId::Touch(3), Vec2::new(60.0, 40.0));
        let p = &inj.pointers()[0];
        assert!(p.moved);
        assert!((p.position - Vec2::new(0.6, 0.6)).length() < 1e-6);
        assert!((p.delta - Vec2::new(0.1, 0.1)).length() < 1e-6);
        assert!(inj.record_release(ContactId::Touch(3)));
        assert!(inj.pointers().is_empty());
        assert!(!inj.record_release(ContactId::Touch(3)));
    }

    #[test]
    fn concurrent_contacts_are_keyed_by_id() {
        let mut inj = injector(&pressed_cfg(), UVec2::new(100, 100));
        inj.record_press(ContactId::Touch(1), Vec2::new(10.0, 10.0));
        inj.record_press(ContactId::Touch(2), Vec2::new(90.0, 90.0));
        inj.record_move(ContactId::Touch(2), Vec2::new(80.0, 90.0));
        let moved: Vec<_> = inj.pointers().iter().filter(|p| p.moved).map(|p| p.id).collect();
        assert_eq!(moved, vec![ContactId::Touch(2)]);
        inj.record_release(ContactId::Touch(1));
        assert_eq!(inj.pointers().len(), 1);
    }

    #[test]
    fn unknown_move_is_ignored_without_hover() {
        let mut inj = injector(&pressed_cfg(), UVec2::new(100, 100));
        inj.record_move(ContactId::Mouse, Vec2::new(10.0, 10.0));
        assert!(inj.pointers().is_empty());
    }

    #[test]
    fn hover_mouse_is_tracked_and_left_dangling() {
        let mut inj = injector(&SolverConfig::hero(), UVec2::new(100, 100));
        inj.record_move(ContactId::Mouse, Vec2::new(10.0, 10.0));
        inj.record_move(ContactId::Mouse, Vec2::new(20.0, 10.0));
        assert!(inj.pointers()[0].moved);
        assert!(inj.record_release(ContactId::Mouse));
        assert_eq!(inj.pointers().len(), 1);
        assert!(!inj.pointers()[0].down);
    }

    #[test]
    fn deltas_are_aspect_corrected() {
        let mut inj = injector(&pressed_cfg(), UVec2::new(200, 100));
        inj.record_press(ContactId::Mouse, Vec2::new(100.0, 50.0));
        inj.record_move(ContactId::Mouse, Vec2::new(120.0, 40.0));
        let d = inj.pointers()[0].delta;
        assert!((d.x - 0.1).abs() < 1e-6);
        assert!((d.y - 0.05).abs() < 1e-6);

        let raw = SolverConfig::opening();
        let mut inj = injector(&raw, UVec2::new(200, 100));
        inj.record_press(ContactId::Mouse, Vec2::new(100.0, 50.0));
        inj.record_move(ContactId::Mouse, Vec2::new(120.0, 40.0));
        assert!((inj.pointers()[0].delta.y - 0.1).abs() < 1e-6);
    }

    #[test]
    fn drain_emits_moved_pointers_once() {
        let cfg = pressed_cfg();
        let mut inj = injector(&cfg, UVec2::new(100, 100));
        inj.record_press(ContactId::Mouse, Vec2::new(50.0, 50.0));
        inj.record_move(ContactId::Mouse, Vec2::new(51.0, 50.0));
        let splats = inj.drain();
        assert_eq!(splats.len(), 1);
        assert!((splats[0].impulse.x - 0.01 * cfg.splat_force).abs() < 1e-2);
        assert!(cfg.palette.iter().any(|c| Vec3::from_array(*c) == splats[0].color));
        assert!(inj.drain().is_empty());
    }

    #[test]
    fn queue_drains_one_batch_per_tick() {
        let cfg = pressed_cfg();
        let mut inj = injector(&cfg, UVec2::new(100, 100));
        inj.queue_random_splats(3);
        inj.queue_random_splats(2);
        inj.queue_random_splats(0);
        assert_eq!(inj.queued(), 2);
        assert_eq!(inj.drain().len(), 2);
        let batch = inj.drain();
        assert_eq!(batch.len(), 3);
        for s in &batch {
            assert!((0.0..1.0).contains(&s.point.x) && (0.0..1.0).contains(&s.point.y));
            assert!(s.impulse.abs().max_element() <= cfg.random_splat_velocity * 0.5);
        }
        assert!(inj.drain().is_empty());
    }

    #[test]
    fn footprint_covers_reach_and_stretches_with_aspect() {
        use crate::fluid::field::FilterMode;
        use bevy::render::render_resource::TextureFormat;
        let fmt = crate::fluid::field::FieldFormat::from_texture(TextureFormat::Rgba16Float).unwrap();
        let dye = Field::allocate(400, 200, fmt, FilterMode::Linear);
        let radius = 0.004;
        let reach = splat_reach(radius);
        let square = splat_footprint(&dye, Vec2::splat(0.5), 1.0, radius);
        let wide = splat_footprint(&dye, Vec2::splat(0.5), 2.0, radius);
        let d = square.max - square.min;
        // every cell center within the reach is covered
        assert!(d.x as f32 >= 2.0 * reach * 400.0 && d.y as f32 >= 2.0 * reach * 200.0);
        assert!(square.area() < dye.cells().area() / 4);
        assert_eq!((wide.max - wide.min).y, d.y);
        assert!((wide.max - wide.min).x < d.x);

        let corner = splat_footprint(&dye, Vec2::ZERO, 1.0, radius);
        assert_eq!(corner.min, UVec2::ZERO);
    }

    #[test]
    fn radius_widens_only_on_landscape_when_enabled() {
        assert_eq!(splat_radius(0.004, 2.0, true), 0.008);
        assert_eq!(splat_radius(0.004, 0.5, true), 0.004);
        assert_eq!(splat_radius(0.004, 2.0, false), 0.004);
    }
}
