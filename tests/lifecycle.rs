use std::time::Duration;

use bevy::math::UVec2;
use portfolio_fluid::fluid::{FluidSolver, SoftwareProbe, SolverConfig, SolverState};

fn small(start_paused: bool) -> FluidSolver {
    let cfg = SolverConfig {
        sim_resolution: 8,
        dye_resolution: 8,
        start_paused,
        seed: Some(5),
        ..SolverConfig::hero()
    };
    FluidSolver::new(cfg, UVec2::new(64, 64), &SoftwareProbe::full()).unwrap()
}

#[test]
fn resume_after_long_pause_is_clamped() {
    let surface = UVec2::new(64, 64);
    let mut s = small(false);
    let max_dt = s.config().max_dt;

    let t0 = Duration::from_secs(1);
    assert_eq!(s.frame(t0, surface), Some(max_dt));
    let dt = s.frame(t0 + Duration::from_millis(10), surface).unwrap();
    assert!((dt - 0.010).abs() < 1e-4);

    assert!(s.pause());
    let ticks = s.ticks();
    assert_eq!(s.frame(t0 + Duration::from_secs(3), surface), None);
    assert_eq!(s.ticks(), ticks);

    assert!(s.play());
    let resumed = s.frame(t0 + Duration::from_secs(5) + Duration::from_millis(10), surface);
    assert_eq!(resumed, Some(max_dt));
    assert_eq!(s.last_dt(), max_dt);
    assert_eq!(s.ticks(), ticks + 1);
}

#[test]
fn play_and_pause_are_idempotent() {
    let mut s = small(false);
    assert!(!s.play());
    assert_eq!(s.state(), SolverState::Running);
    assert!(s.pause());
    assert!(!s.pause());
    assert_eq!(s.state(), SolverState::Paused);
    assert!(s.play());
    assert!(!s.play());
    assert!(s.is_running());
}

#[test]
fn paused_solver_still_records_input() {
    let surface = UVec2::new(64, 64);
    let mut s = small(true);
    s.queue_default_batch();
    assert_eq!(s.frame(Duration::from_secs(1), surface), None);
    assert_eq!(s.queued_batches(), 1);
    s.play();
    assert!(s.frame(Duration::from_secs(2), surface).is_some());
    assert_eq!(s.queued_batches(), 0);
    assert!(s.dye_energy() > 0.0);
}

#[test]
fn fixed_step_ignores_wall_clock() {
    let surface = UVec2::new(64, 64);
    let mut s = FluidSolver::new(
        SolverConfig {
            sim_resolution: 8,
            dye_resolution: 8,
            ..SolverConfig::opening()
        },
        surface,
        &SoftwareProbe::full(),
    )
    .unwrap();
    assert_eq!(s.state(), SolverState::Paused);
    s.play();
    assert_eq!(s.frame(Duration::from_secs(1), surface), Some(0.016));
    assert_eq!(s.frame(Duration::from_secs(9), surface), Some(0.016));
}

#[test]
fn frame_follows_surface_size() {
    let mut s = small(false);
    s.frame(Duration::ZERO, UVec2::new(128, 64));
    assert_eq!(s.surface(), UVec2::new(128, 64));
    assert_eq!(s.fields().sim_size(), UVec2::new(16, 8));
}
