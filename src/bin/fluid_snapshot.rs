use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use bevy::math::{UVec2, Vec4};
use clap::Parser;
use portfolio_fluid::fluid::{DisplayField, FluidSolver, RenderTarget, SoftwareProbe};
use portfolio_fluid::AppConfig;

#[derive(Parser, Debug)]
#[command(about = "Run a fluid surface headless and write the composited frame to a PNG", version)]
struct Args {
    /// RON config; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Surface name from the config.
    #[arg(long, default_value = "hero")]
    surface: String,
    #[arg(long, default_value_t = 320)]
    width: u32,
    #[arg(long, default_value_t = 180)]
    height: u32,
    #[arg(long, default_value_t = 60)]
    ticks: u32,
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,
    #[arg(long)]
    seed: Option<u64>,
    /// Random splat batches queued before the first tick.
    #[arg(long, default_value_t = 1)]
    batches: u32,
    /// Override the solver's grid resolutions (sim, dye) to keep runs short.
    #[arg(long)]
    sim_resolution: Option<u32>,
    #[arg(long)]
    dye_resolution: Option<u32>,
    /// dye | velocity | pressure | curl | divergence
    #[arg(long, default_value = "dye")]
    display: String,
    /// Composite over white instead of transparent black.
    #[arg(long)]
    white: bool,
    #[arg(long, default_value = "fluid_snapshot.png")]
    out: PathBuf,
}

fn parse_display(s: &str) -> Result<DisplayField> {
    DisplayField::ALL
        .into_iter()
        .find(|d| format!("{d:?}").eq_ignore_ascii_case(s))
        .ok_or_else(|| anyhow!("unknown display field '{s}'"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let app = match &args.config {
        Some(path) => AppConfig::load_from_file(path).map_err(|e| anyhow!("{}: {e}", path.display()))?,
        None => AppConfig::default(),
    };
    let surface = app
        .surfaces
        .iter()
        .find(|s| s.name == args.surface)
        .with_context(|| format!("no surface named '{}' in config", args.surface))?;
    let mut cfg = surface.solver.clone();
    if let Some(n) = args.sim_resolution {
        cfg.sim_resolution = n;
    }
    if let Some(n) = args.dye_resolution {
        cfg.dye_resolution = n;
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    cfg.random_splats_on_start = 0;
    let display = parse_display(&args.display)?;

    let size = UVec2::new(args.width, args.height);
    let mut solver = FluidSolver::new(cfg, size, &SoftwareProbe::full())?;
    solver.play();
    solver.set_display_field(display);
    for _ in 0..args.batches {
        solver.queue_default_batch();
    }

    let mut splats = 0;
    for _ in 0..args.ticks {
        splats += solver.apply_inputs();
        solver.step(args.dt);
    }
    println!(
        "Surface '{}' {}x{}: ticks={} splats={} dye_energy={:.4}",
        args.surface,
        size.x,
        size.y,
        solver.ticks(),
        splats,
        solver.dye_energy()
    );

    let clear = if args.white { Vec4::ONE } else { Vec4::ZERO };
    let mut target = RenderTarget::new(size.x, size.y, clear);
    solver.render(&mut target);
    let img = image::RgbaImage::from_raw(size.x, size.y, target.to_rgba8())
        .context("framebuffer size mismatch")?;
    img.save(&args.out)
        .with_context(|| format!("write {}", args.out.display()))?;
    println!("Wrote {}", args.out.display());
    Ok(())
}
