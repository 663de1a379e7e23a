use bevy::math::{UVec2, Vec2, Vec3, Vec4};
use portfolio_fluid::fluid::{DisplayField, FloatPrecision, FluidSolver, RenderTarget, SoftwareProbe, SolverConfig};

fn splatted() -> FluidSolver {
    let cfg = SolverConfig {
        sim_resolution: 32,
        dye_resolution: 64,
        precision: FloatPrecision::Full,
        seed: Some(2),
        ..SolverConfig::hero()
    };
    let mut s = FluidSolver::new(cfg, UVec2::new(64, 64), &SoftwareProbe::full()).unwrap();
    s.splat(Vec2::splat(0.5), Vec2::ZERO, Vec3::new(0.8, 0.2, 0.0));
    s
}

#[test]
fn alpha_is_brightest_channel_and_empty_dye_is_clear() {
    let s = splatted();
    let mut target = RenderTarget::new(64, 64, Vec4::ZERO);
    s.render(&mut target);

    let center = target.pixel(32, 32);
    assert!(center.x > 0.5);
    assert!((center.w - center.x).abs() < 1e-6, "{center}");
    for p in target.pixels() {
        assert!((p.w - p.truncate().max_element()).abs() < 1e-6);
    }
    assert_eq!(target.pixel(0, 0), Vec4::ZERO);
    assert_eq!(target.pixel(63, 63), Vec4::ZERO);
}

#[test]
fn composite_over_background_keeps_it_where_dye_is_empty() {
    let s = splatted();
    let mut target = RenderTarget::new(64, 64, Vec4::ONE);
    s.render(&mut target);
    assert_eq!(target.pixel(0, 0), Vec4::ONE);
    let center = target.pixel(32, 32);
    // 0.8 red over white: src + dst * (1 - src.a)
    assert!(center.x > 0.99 && center.w > 0.99);
    assert!(center.z < 0.5);
}

#[test]
fn straight_alpha_export() {
    let s = splatted();
    let mut target = RenderTarget::new(16, 16, Vec4::ZERO);
    s.render(&mut target);
    let bytes = target.to_rgba8();
    assert_eq!(bytes.len(), 16 * 16 * 4);
    let i = (8 * 16 + 8) * 4;
    // red carries the alpha, so it un-premultiplies to full
    assert_eq!(bytes[i], 255);
    assert!(bytes[i + 3] > 64);
    assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
}

#[test]
fn debug_views_are_opaque_where_they_show_something() {
    let mut s = splatted();
    s.splat(Vec2::splat(0.5), Vec2::new(300.0, 0.0), Vec3::ZERO);
    s.set_display_field(DisplayField::Velocity);
    let mut target = RenderTarget::new(32, 32, Vec4::ZERO);
    s.render(&mut target);
    let center = target.pixel(16, 16);
    assert!(center.x > 0.1);
    assert_eq!(center.w, center.x.max(center.y).max(center.z));
}

#[test]
fn framebuffer_rows_run_top_down() {
    let mut s = splatted();
    let dye = s.fields_mut().dye.read_mut();
    let (w, h) = (dye.width(), dye.height());
    for y in 0..h {
        let c = if y < h / 2 { Vec4::new(1.0, 0.0, 0.0, 1.0) } else { Vec4::new(0.0, 1.0, 0.0, 1.0) };
        for x in 0..w {
            dye.store(x, y, c);
        }
    }
    let mut target = RenderTarget::new(5, 4, Vec4::ZERO);
    s.render(&mut target);
    for x in 0..5 {
        assert_eq!(target.pixel(x, 0), Vec4::new(0.0, 1.0, 0.0, 1.0), "top row, column {x}");
        assert_eq!(target.pixel(x, 3), Vec4::new(1.0, 0.0, 0.0, 1.0), "bottom row, column {x}");
    }
}
