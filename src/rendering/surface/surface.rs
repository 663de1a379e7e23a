//! Fluid surfaces: one solver per configured window region, driven once per frame.
use bevy::input::touch::{TouchInput, TouchPhase};
use bevy::prelude::*;
use bevy::sprite::{Material2dPlugin, MeshMaterial2d};
use bevy::window::PrimaryWindow;

use super::capabilities::{probe_capabilities, SurfaceCapabilities};
use super::material::FluidDisplayMaterial;
#[cfg(target_arch = "wasm32")]
use super::material::FLUID_DISPLAY_SHADER_HANDLE;
use super::upload::{display_format, new_display_image, write_display};
use crate::core::config::{AppConfig, SurfaceConfig};
use crate::core::system::system_order::FluidFrameSet;
use crate::fluid::{ContactId, DisplayField, FluidSolver};

/// Which surfaces a control applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceTarget {
    All,
    Named(String),
}

impl SurfaceTarget {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            SurfaceTarget::All => true,
            SurfaceTarget::Named(n) => n == name,
        }
    }
}

/// Page-level lifecycle and debug controls.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub enum FluidControl {
    Play(SurfaceTarget),
    Pause(SurfaceTarget),
    TogglePause(SurfaceTarget),
    RandomSplats(SurfaceTarget),
    CycleDisplay(SurfaceTarget),
}

impl FluidControl {
    pub fn target(&self) -> &SurfaceTarget {
        match self {
            FluidControl::Play(t)
            | FluidControl::Pause(t)
            | FluidControl::TogglePause(t)
            | FluidControl::RandomSplats(t)
            | FluidControl::CycleDisplay(t) => t,
        }
    }

    /// Apply to one solver; returns whether anything changed.
    pub fn apply(&self, solver: &mut FluidSolver) -> bool {
        match self {
            FluidControl::Play(_) => solver.play(),
            FluidControl::Pause(_) => solver.pause(),
            FluidControl::TogglePause(_) => {
                if solver.is_running() {
                    solver.pause()
                } else {
                    solver.play()
                }
            }
            FluidControl::RandomSplats(_) => {
                solver.queue_default_batch();
                true
            }
            FluidControl::CycleDisplay(_) => {
                let next = solver.display_field().next();
                solver.set_display_field(next);
                true
            }
        }
    }
}

#[derive(Component)]
pub struct FluidSurface {
    pub name: String,
    pub play_after_intro: bool,
    pub solver: FluidSolver,
    region: (f32, f32, f32, f32),
    z: f32,
    /// Top-left corner in logical window pixels.
    origin: Vec2,
    logical_size: Vec2,
    scale_factor: f32,
    physical: UVec2,
    image: Handle<Image>,
    material: Handle<FluidDisplayMaterial>,
    presented: Option<(u64, DisplayField)>,
}

impl FluidSurface {
    pub fn physical_size(&self) -> UVec2 {
        self.physical
    }

    /// Logical window position to surface-relative physical pixels, if inside the region.
    pub fn to_surface_px(&self, window_pos: Vec2) -> Option<Vec2> {
        let local = window_pos - self.origin;
        let inside = local.x >= 0.0 && local.y >= 0.0 && local.x < self.logical_size.x && local.y < self.logical_size.y;
        inside.then_some(local * self.scale_factor)
    }

    /// Like [`Self::to_surface_px`] but without the bounds check, for contacts already tracked.
    fn to_surface_px_unbounded(&self, window_pos: Vec2) -> Vec2 {
        (window_pos - self.origin) * self.scale_factor
    }

    fn tracks(&self, id: ContactId) -> bool {
        self.solver.pointers().iter().any(|p| p.id == id)
    }
}

/// Region in logical pixels plus its physical pixel size.
pub fn surface_layout(region: (f32, f32, f32, f32), window: Vec2, scale_factor: f32) -> (Vec2, Vec2, UVec2) {
    let (x, y, w, h) = region;
    let origin = Vec2::new(x, y) * window;
    let size = Vec2::new(w, h) * window;
    let physical = (size * scale_factor).round().as_uvec2().max(UVec2::ONE);
    (origin, size, physical)
}

fn surface_transform(origin: Vec2, size: Vec2, window: Vec2, z: f32) -> Transform {
    let center = origin + size * 0.5;
    Transform::from_xyz(center.x - window.x * 0.5, window.y * 0.5 - center.y, z).with_scale(size.extend(1.0))
}

pub struct FluidSurfacePlugin;

impl Plugin for FluidSurfacePlugin {
    fn build(&self, app: &mut App) {
        #[cfg(target_arch = "wasm32")]
        {
            use bevy::asset::Assets;
            use bevy::render::render_resource::Shader;
            let mut shaders = app.world_mut().resource_mut::<Assets<Shader>>();
            let display = shaders.add(Shader::from_wgsl(
                include_str!("../../../assets/shaders/fluid_display.wgsl"),
                "fluid_display_embedded.wgsl",
            ));
            FLUID_DISPLAY_SHADER_HANDLE.get_or_init(|| display.clone());
        }
        app.add_plugins(Material2dPlugin::<FluidDisplayMaterial>::default())
            .add_event::<FluidControl>()
            .configure_sets(
                Update,
                (
                    FluidFrameSet::Resize,
                    FluidFrameSet::Input,
                    FluidFrameSet::Step,
                    FluidFrameSet::Present,
                )
                    .chain(),
            )
            .add_systems(Startup, (probe_capabilities, spawn_surfaces).chain())
            .add_systems(
                Update,
                (
                    follow_window.in_set(FluidFrameSet::Resize),
                    (apply_controls, forward_pointer_events).chain().in_set(FluidFrameSet::Input),
                    step_surfaces.in_set(FluidFrameSet::Step),
                    present_surfaces.in_set(FluidFrameSet::Present),
                ),
            );
    }
}

fn spawn_surfaces(
    mut commands: Commands,
    cfg: Res<AppConfig>,
    caps: Res<SurfaceCapabilities>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<FluidDisplayMaterial>>,
) {
    let (window, scale_factor) = match windows.single() {
        Ok(win) => (Vec2::new(win.width(), win.height()), win.scale_factor()),
        Err(_) => (Vec2::new(cfg.window.width, cfg.window.height), 1.0),
    };
    let quad = meshes.add(Mesh::from(Rectangle::new(1.0, 1.0)));
    for sc in &cfg.surfaces {
        spawn_surface(
            &mut commands,
            sc,
            &caps,
            window,
            scale_factor,
            quad.clone(),
            &mut images,
            &mut materials,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_surface(
    commands: &mut Commands,
    sc: &SurfaceConfig,
    caps: &SurfaceCapabilities,
    window: Vec2,
    scale_factor: f32,
    quad: Handle<Mesh>,
    images: &mut Assets<Image>,
    materials: &mut Assets<FluidDisplayMaterial>,
) {
    let (origin, logical_size, physical) = surface_layout(sc.region, window, scale_factor);
    let solver = match FluidSolver::new(sc.solver.clone(), physical, &caps.probe) {
        Ok(s) => s,
        Err(e) => {
            error!(target: "fluid_host", "surface '{}' failed to initialize: {e}", sc.name);
            return;
        }
    };
    let image = images.add(new_display_image(
        solver.fields().dye_size(),
        display_format(solver.caps().rgba.texture),
        solver.caps().transport_filter(),
    ));
    let material = materials.add(FluidDisplayMaterial { dye: image.clone() });
    info!(
        target: "fluid_host",
        "surface '{}' spawned: {}x{} px state={:?}",
        sc.name,
        physical.x,
        physical.y,
        solver.state()
    );
    commands.spawn((
        Mesh2d::from(quad),
        MeshMaterial2d(material.clone()),
        surface_transform(origin, logical_size, window, sc.z),
        Visibility::Visible,
        FluidSurface {
            name: sc.name.clone(),
            play_after_intro: sc.play_after_intro,
            solver,
            region: sc.region,
            z: sc.z,
            origin,
            logical_size,
            scale_factor,
            physical,
            image,
            material,
            presented: None,
        },
    ));
}

fn follow_window(
    windows: Query<&Window, With<PrimaryWindow>>,
    mut q: Query<(&mut FluidSurface, &mut Transform)>,
) {
    let Ok(win) = windows.single() else {
        return;
    };
    let window = Vec2::new(win.width(), win.height());
    let scale_factor = win.scale_factor();
    for (mut s, mut tf) in q.iter_mut() {
        let (origin, logical_size, physical) = surface_layout(s.region, window, scale_factor);
        if physical == s.physical && origin == s.origin && logical_size == s.logical_size {
            continue;
        }
        debug!(target: "fluid_host", "surface '{}' now {}x{} px", s.name, physical.x, physical.y);
        s.origin = origin;
        s.logical_size = logical_size;
        s.scale_factor = scale_factor;
        s.physical = physical;
        *tf = surface_transform(origin, logical_size, window, s.z);
    }
}

fn apply_controls(mut events: EventReader<FluidControl>, mut q: Query<&mut FluidSurface>) {
    for ev in events.read() {
        for mut s in q.iter_mut() {
            if ev.target().matches(&s.name) {
                ev.apply(&mut s.solver);
            }
        }
    }
}

fn forward_pointer_events(
    windows: Query<&Window, With<PrimaryWindow>>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut cursor: EventReader<CursorMoved>,
    mut touches: EventReader<TouchInput>,
    mut q: Query<&mut FluidSurface>,
) {
    let cursor_pos = windows.single().ok().and_then(|w| w.cursor_position());
    if buttons.just_pressed(MouseButton::Left) {
        if let Some(pos) = cursor_pos {
            for mut s in q.iter_mut() {
                if let Some(px) = s.to_surface_px(pos) {
                    s.solver.record_press(ContactId::Mouse, px);
                }
            }
        }
    }
    for ev in cursor.read() {
        for mut s in q.iter_mut() {
            let px = match s.to_surface_px(ev.position) {
                Some(px) => px,
                None if s.tracks(ContactId::Mouse) => s.to_surface_px_unbounded(ev.position),
                None => continue,
            };
            s.solver.record_move(ContactId::Mouse, px);
        }
    }
    if buttons.just_released(MouseButton::Left) {
        for mut s in q.iter_mut() {
            s.solver.record_release(ContactId::Mouse);
        }
    }
    for ev in touches.read() {
        let id = ContactId::Touch(ev.id);
        for mut s in q.iter_mut() {
            match ev.phase {
                TouchPhase::Started => {
                    if let Some(px) = s.to_surface_px(ev.position) {
                        s.solver.record_press(id, px);
                    }
                }
                TouchPhase::Moved => {
                    if s.tracks(id) {
                        let px = s.to_surface_px_unbounded(ev.position);
                        s.solver.record_move(id, px);
                    }
                }
                TouchPhase::Ended | TouchPhase::Canceled => {
                    s.solver.record_release(id);
                }
            }
        }
    }
}

fn step_surfaces(time: Res<Time>, mut q: Query<&mut FluidSurface>) {
    let now = time.elapsed();
    for mut s in q.iter_mut() {
        let physical = s.physical;
        s.solver.frame(now, physical);
    }
}

fn present_surfaces(
    mut q: Query<&mut FluidSurface>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<FluidDisplayMaterial>>,
) {
    for mut s in q.iter_mut() {
        let current = (s.solver.ticks(), s.solver.display_field());
        if s.presented == Some(current) {
            continue;
        }
        let resized = images
            .get_mut(&s.image)
            .is_some_and(|image| write_display(&s.solver, image));
        if resized {
            // Touching the material re-creates its bind group with the resized image.
            let _ = materials.get_mut(&s.material);
        }
        s.presented = Some(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::{FloatPrecision, SoftwareProbe, SolverConfig};

    #[test]
    fn layout_scales_region_to_physical_pixels() {
        let (origin, size, physical) = surface_layout((0.5, 0.0, 0.5, 1.0), Vec2::new(800.0, 600.0), 2.0);
        assert_eq!(origin, Vec2::new(400.0, 0.0));
        assert_eq!(size, Vec2::new(400.0, 600.0));
        assert_eq!(physical, UVec2::new(800, 1200));

        let (origin, size, physical) = surface_layout((0.5, 0.25, 0.5, 0.5), Vec2::new(800.0, 400.0), 1.0);
        assert_eq!(origin, Vec2::new(400.0, 100.0));
        assert_eq!(size, Vec2::new(400.0, 200.0));
        assert_eq!(physical, UVec2::new(400, 200));
    }

    #[test]
    fn transform_centers_region_in_world_space() {
        let tf = surface_transform(Vec2::ZERO, Vec2::new(400.0, 300.0), Vec2::new(800.0, 600.0), 1.0);
        assert_eq!(tf.translation, Vec3::new(-200.0, 150.0, 1.0));
        assert_eq!(tf.scale, Vec3::new(400.0, 300.0, 1.0));
    }

    #[test]
    fn targets_match_by_name() {
        assert!(SurfaceTarget::All.matches("hero"));
        assert!(SurfaceTarget::Named("hero".into()).matches("hero"));
        assert!(!SurfaceTarget::Named("hero".into()).matches("opening"));
    }

    #[test]
    fn controls_drive_the_solver() {
        let cfg = SolverConfig {
            sim_resolution: 8,
            dye_resolution: 8,
            precision: FloatPrecision::Full,
            seed: Some(3),
            ..SolverConfig::opening()
        };
        let mut solver = FluidSolver::new(cfg, UVec2::new(32, 32), &SoftwareProbe::full()).unwrap();
        assert!(FluidControl::Play(SurfaceTarget::All).apply(&mut solver));
        assert!(!FluidControl::Play(SurfaceTarget::All).apply(&mut solver));
        assert!(FluidControl::TogglePause(SurfaceTarget::All).apply(&mut solver));
        assert!(!solver.is_running());
        FluidControl::RandomSplats(SurfaceTarget::All).apply(&mut solver);
        assert_eq!(solver.queued_batches(), 1);
        FluidControl::CycleDisplay(SurfaceTarget::All).apply(&mut solver);
        assert_eq!(solver.display_field(), DisplayField::Velocity);
    }
}
