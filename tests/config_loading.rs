use std::fs;
use std::path::Path;

use portfolio_fluid::fluid::FloatPrecision;
use portfolio_fluid::AppConfig;

#[test]
fn shipped_config_parses_and_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/config/portfolio.ron");
    let cfg = AppConfig::load_from_file(&path).unwrap();
    let names: Vec<_> = cfg.surfaces.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["hero", "opening"]);
    let opening = &cfg.surfaces[1];
    assert!(opening.play_after_intro && opening.solver.start_paused);
    assert_eq!(opening.solver.fixed_dt, Some(0.016));
    assert_eq!(opening.solver.palette.len(), 3);
    assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
}

#[test]
fn local_layer_overrides_individual_keys() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("portfolio.ron");
    let local = dir.path().join("portfolio.local.ron");
    fs::write(
        &base,
        r#"(
            window: (width: 900.0, title: "Base"),
            surfaces: [(name: "hero", solver: (sim_resolution: 32, precision: "full"))],
        )"#,
    )
    .unwrap();
    fs::write(&local, r#"(window: (title: "Local", autoClose: 3.5))"#).unwrap();

    let (cfg, used, errors) = AppConfig::load_layered([&base, &local]);
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(used.len(), 2);
    assert_eq!(cfg.window.width, 900.0);
    assert_eq!(cfg.window.title, "Local");
    assert_eq!(cfg.window.auto_close, 3.5);
    assert_eq!(cfg.surfaces.len(), 1);
    assert_eq!(cfg.surfaces[0].solver.sim_resolution, 32);
    assert_eq!(cfg.surfaces[0].solver.precision, FloatPrecision::Full);
}

#[test]
fn missing_layer_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("portfolio.ron");
    fs::write(&base, "(intro: (duration_secs: 1.0))").unwrap();
    let missing = dir.path().join("portfolio.local.ron");

    let (cfg, used, errors) = AppConfig::load_layered([&base, &missing]);
    assert_eq!(used.len(), 1);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("read error"));
    assert_eq!(cfg.intro.duration_secs, 1.0);
    assert_eq!(cfg.surfaces.len(), 2);
}

#[test]
fn broken_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    fs::write(&path, "(window: (width: ").unwrap();
    let (cfg, err) = AppConfig::load_or_default(&path);
    assert_eq!(cfg, AppConfig::default());
    assert!(err.unwrap().contains("parse RON"));

    let (cfg, err) = AppConfig::load_or_default(dir.path().join("absent.ron"));
    assert_eq!(cfg, AppConfig::default());
    assert!(err.is_some());
}
