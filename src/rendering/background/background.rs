//! Drifting gradient blobs behind the fluid surfaces.
use bevy::prelude::*;
use bevy::render::render_resource::{AsBindGroup, ShaderRef, ShaderType};
use bevy::sprite::{AlphaMode2d, Material2d, Material2dPlugin, MeshMaterial2d};
use bevy::window::PrimaryWindow;
use rand::Rng;
#[cfg(target_arch = "wasm32")]
use std::sync::OnceLock;

use crate::core::config::{AppConfig, BackgroundConfig};

#[cfg(target_arch = "wasm32")]
static GRADIENT_BLOBS_SHADER_HANDLE: OnceLock<Handle<Shader>> = OnceLock::new();

pub const MAX_BLOBS: usize = 4;

// fields are only read by gradient_blobs.wgsl
#[allow(dead_code)]
#[derive(Clone, Copy, ShaderType, Debug, Default)]
struct BlobsUniform {
    /// xy = window size in logical pixels, z = blob count.
    window: Vec4,
    /// xy = center (top-left origin), z = radius, w = alpha.
    blobs: [Vec4; MAX_BLOBS],
    colors: [Vec4; MAX_BLOBS],
}

#[derive(Asset, AsBindGroup, TypePath, Debug, Clone, Default)]
struct GradientBlobsMaterial {
    #[uniform(0)]
    data: BlobsUniform,
}

impl Material2d for GradientBlobsMaterial {
    fn fragment_shader() -> ShaderRef {
        #[cfg(target_arch = "wasm32")]
        {
            return GRADIENT_BLOBS_SHADER_HANDLE
                .get()
                .cloned()
                .map(ShaderRef::Handle)
                .unwrap_or_else(|| ShaderRef::Path("shaders/gradient_blobs.wgsl".into()));
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            "shaders/gradient_blobs.wgsl".into()
        }
    }

    fn alpha_mode(&self) -> AlphaMode2d {
        AlphaMode2d::Blend
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub position: Vec2,
    pub radius: f32,
    pub color: Vec3,
    pub alpha: f32,
    pub vx: f32,
    pub vy: f32,
}

/// Blob positions in logical pixels and the shared drift phase.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct BlobField {
    pub blobs: Vec<Blob>,
    pub phase: f32,
    phase_step: f32,
    drift: f32,
}

impl BlobField {
    pub fn from_config(cfg: &BackgroundConfig, window: Vec2, rng: &mut impl Rng) -> Self {
        let min_side = window.x.min(window.y);
        let blobs = cfg
            .blobs
            .iter()
            .map(|b| Blob {
                position: Vec2::new(b.position.0, b.position.1) * window,
                radius: b.radius * min_side,
                color: Vec3::new(b.color.0 as f32, b.color.1 as f32, b.color.2 as f32) / 255.0,
                alpha: b.alpha,
                vx: rng.gen_range(-1.0..1.0),
                vy: rng.gen_range(-1.0..1.0),
            })
            .collect();
        Self {
            blobs,
            phase: 0.0,
            phase_step: cfg.phase_step,
            drift: cfg.drift,
        }
    }

    /// One frame of drift.
    pub fn advance(&mut self) {
        for b in &mut self.blobs {
            b.position.x += (self.phase + b.vx).sin() * self.drift;
            b.position.y += (self.phase + b.vy).cos() * self.drift;
        }
        self.phase += self.phase_step;
    }

    fn uniform(&self, window: Vec2) -> BlobsUniform {
        let mut u = BlobsUniform {
            window: Vec4::new(window.x, window.y, self.blobs.len().min(MAX_BLOBS) as f32, 0.0),
            ..Default::default()
        };
        for (i, b) in self.blobs.iter().take(MAX_BLOBS).enumerate() {
            u.blobs[i] = Vec4::new(b.position.x, b.position.y, b.radius, b.alpha);
            u.colors[i] = b.color.extend(1.0);
        }
        u
    }
}

/// Alpha of one blob at `distance` from its center: full, half at mid radius, zero at the rim.
/// Mirrors the fragment shader.
pub fn blob_alpha(alpha: f32, radius: f32, distance: f32) -> f32 {
    alpha * (1.0 - (distance / radius).clamp(0.0, 1.0))
}

#[derive(Component)]
pub struct BackgroundQuad;

pub struct BackgroundPlugin;

impl Plugin for BackgroundPlugin {
    fn build(&self, app: &mut App) {
        #[cfg(target_arch = "wasm32")]
        {
            use bevy::asset::Assets;
            use bevy::render::render_resource::Shader;
            let mut shaders = app.world_mut().resource_mut::<Assets<Shader>>();
            let blobs = shaders.add(Shader::from_wgsl(
                include_str!("../../../assets/shaders/gradient_blobs.wgsl"),
                "gradient_blobs_embedded.wgsl",
            ));
            GRADIENT_BLOBS_SHADER_HANDLE.get_or_init(|| blobs.clone());
        }
        app.add_plugins(Material2dPlugin::<GradientBlobsMaterial>::default())
            .add_systems(Startup, setup_background)
            .add_systems(Update, drift_blobs);
    }
}

fn setup_background(
    mut commands: Commands,
    cfg: Res<AppConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut mats: ResMut<Assets<GradientBlobsMaterial>>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    if !cfg.background.enabled {
        return;
    }
    let window = if let Ok(win) = windows.single() {
        Vec2::new(win.width(), win.height())
    } else {
        Vec2::new(cfg.window.width, cfg.window.height)
    };
    if cfg.background.blobs.len() > MAX_BLOBS {
        warn!(
            target: "fluid_host",
            "background has {} blobs; only the first {MAX_BLOBS} are drawn",
            cfg.background.blobs.len()
        );
    }
    let field = BlobField::from_config(&cfg.background, window, &mut rand::thread_rng());
    let handle = mats.add(GradientBlobsMaterial {
        data: field.uniform(window),
    });
    let mesh = meshes.add(Mesh::from(Rectangle::new(1.0, 1.0)));
    commands.spawn((
        Mesh2d::from(mesh),
        MeshMaterial2d(handle),
        Transform::from_xyz(0.0, 0.0, -500.0).with_scale(window.extend(1.0)),
        Visibility::Visible,
        BackgroundQuad,
    ));
    commands.insert_resource(field);
    info!(target: "fluid_host", "Background blobs spawned");
}

fn drift_blobs(
    windows: Query<&Window, With<PrimaryWindow>>,
    field: Option<ResMut<BlobField>>,
    mut q: Query<(&MeshMaterial2d<GradientBlobsMaterial>, &mut Transform), With<BackgroundQuad>>,
    mut materials: ResMut<Assets<GradientBlobsMaterial>>,
) {
    let Some(mut field) = field else {
        return;
    };
    let Ok(win) = windows.single() else {
        return;
    };
    let Ok((handle, mut tf)) = q.single_mut() else {
        return;
    };
    let window = Vec2::new(win.width(), win.height());
    field.advance();
    tf.scale = window.extend(1.0);
    if let Some(mat) = materials.get_mut(&handle.0) {
        mat.data = field.uniform(window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn blobs_scale_with_window() {
        let cfg = BackgroundConfig::default();
        let field = BlobField::from_config(&cfg, Vec2::new(1000.0, 500.0), &mut StdRng::seed_from_u64(1));
        assert_eq!(field.blobs.len(), 3);
        assert_eq!(field.blobs[0].position, Vec2::new(300.0, 150.0));
        assert_eq!(field.blobs[0].radius, 0.4 * 500.0);
        assert!((field.blobs[0].color - Vec3::new(127.0, 82.0, 255.0) / 255.0).length() < 1e-6);
    }

    #[test]
    fn drift_moves_by_at_most_the_step() {
        let cfg = BackgroundConfig::default();
        let mut field = BlobField::from_config(&cfg, Vec2::new(800.0, 600.0), &mut StdRng::seed_from_u64(2));
        let before = field.blobs.clone();
        field.advance();
        assert!((field.phase - cfg.phase_step).abs() < 1e-9);
        for (a, b) in before.iter().zip(&field.blobs) {
            let d = (b.position - a.position).abs();
            assert!(d.x <= cfg.drift + 1e-6 && d.y <= cfg.drift + 1e-6);
        }
    }

    #[test]
    fn gradient_stops() {
        assert_eq!(blob_alpha(0.4, 100.0, 0.0), 0.4);
        assert!((blob_alpha(0.4, 100.0, 50.0) - 0.2).abs() < 1e-6);
        assert_eq!(blob_alpha(0.4, 100.0, 100.0), 0.0);
        assert_eq!(blob_alpha(0.4, 100.0, 250.0), 0.0);
    }

    #[test]
    fn uniform_caps_blob_count() {
        let mut cfg = BackgroundConfig::default();
        cfg.blobs.extend(cfg.blobs.clone());
        let field = BlobField::from_config(&cfg, Vec2::new(100.0, 100.0), &mut StdRng::seed_from_u64(3));
        assert_eq!(field.uniform(Vec2::new(100.0, 100.0)).window.z, MAX_BLOBS as f32);
    }

    #[test]
    fn uniform_packs_blob_geometry_and_color() {
        let cfg = BackgroundConfig::default();
        let window = Vec2::new(200.0, 100.0);
        let field = BlobField::from_config(&cfg, window, &mut StdRng::seed_from_u64(5));
        let u = field.uniform(window);
        assert_eq!(u.window.truncate().truncate(), window);
        let first = &field.blobs[0];
        assert_eq!(u.blobs[0], Vec4::new(first.position.x, first.position.y, first.radius, first.alpha));
        assert_eq!(u.colors[0], first.color.extend(1.0));
        let used = field.blobs.len().min(MAX_BLOBS);
        assert!(u.blobs[used..].iter().all(|b| *b == Vec4::ZERO));
    }
}
