//! Offline effect simulation

use anyhow::{Context, Result};
use clap::Args;
use particle_sheet::SheetLoader;
use particle_sim::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::effects::{self, Effect, EffectOptions};
use crate::utils::{add_numeric_row, create_table, format_seconds, format_vec3};

#[derive(Args)]
pub struct SimulateArgs {
    /// Effect to run
    #[arg(value_enum)]
    pub effect: Effect,

    /// Seconds to simulate
    #[arg(short, long, default_value = "2")]
    pub duration: f32,

    /// Frames per second
    #[arg(long, default_value = "30")]
    pub fps: f32,

    /// Fixed random seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u32>,

    /// Collide with a floor at this height
    #[arg(long, allow_hyphen_values = true)]
    pub floor: Option<f32>,

    /// Sheet file to pick sprite sequences from
    #[arg(long)]
    pub sheet: Option<PathBuf>,

    /// Report every Nth frame
    #[arg(long, default_value = "1")]
    pub every: usize,

    /// Print the frame reports as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct FrameReport {
    frame: usize,
    time: f32,
    particles: usize,
    total_particles: usize,
    sprites: usize,
    bounds_min: Option<[f32; 3]>,
    bounds_max: Option<[f32; 3]>,
}

fn total_particles(collection: &ParticleCollection) -> usize {
    collection.active_particles()
        + collection
            .children()
            .iter()
            .map(total_particles)
            .sum::<usize>()
}

fn report(frame: usize, collection: &ParticleCollection) -> FrameReport {
    let mut sprites: Vec<SpriteQuad> = Vec::new();
    collection.render(&mut sprites);
    let bounds = collection.bounds();

    FrameReport {
        frame,
        time: collection.cur_time(),
        particles: collection.active_particles(),
        total_particles: total_particles(collection),
        sprites: sprites.len(),
        bounds_min: bounds.map(|(min, _)| min.to_array()),
        bounds_max: bounds.map(|(_, max)| max.to_array()),
    }
}

fn print_table(args: &SimulateArgs, reports: &[FrameReport], finished: bool) {
    println!(
        "Simulating {:?} for {} at {} fps",
        args.effect,
        format_seconds(args.duration),
        args.fps
    );
    println!("=====================================");

    let mut table = create_table(&["Frame", "Time", "Particles", "Total", "Sprites", "Min", "Max"]);
    for report in reports {
        let bound = |corner: Option<[f32; 3]>| {
            corner.map_or_else(|| "-".to_string(), |c| format_vec3(Vec3::from_array(c)))
        };
        add_numeric_row(
            &mut table,
            report.frame.to_string(),
            vec![
                format_seconds(report.time),
                report.particles.to_string(),
                report.total_particles.to_string(),
                report.sprites.to_string(),
                bound(report.bounds_min),
                bound(report.bounds_max),
            ],
        );
    }
    table.printstd();

    let peak = reports
        .iter()
        .map(|report| report.total_particles)
        .max()
        .unwrap_or(0);
    println!("\nPeak Particles: {peak}");
    println!("Finished: {}", if finished { "yes" } else { "no" });
}

pub fn execute(args: SimulateArgs) -> Result<()> {
    if !(args.fps > 0.0) {
        anyhow::bail!("Frame rate must be positive, got {}", args.fps);
    }
    if !(args.duration >= 0.0) {
        anyhow::bail!("Duration must not be negative, got {}", args.duration);
    }
    let every = args.every.max(1);

    let sheet = args
        .sheet
        .as_ref()
        .map(|path| {
            SheetLoader::new()
                .load_file(path)
                .with_context(|| format!("Failed to load sheet file: {}", path.display()))
        })
        .transpose()?
        .map(Arc::new);

    let options = EffectOptions {
        seed: args.seed,
        floor: args.floor,
        sheet,
    };
    let definition = effects::build(args.effect, &options)?;
    let context = Arc::new(effects::context(&options));
    let mut collection = ParticleCollection::new(Arc::new(definition), context)
        .context("Failed to instantiate effect")?;

    let frames = (args.duration * args.fps).ceil() as usize;
    let dt = 1.0 / args.fps;
    log::info!("Running {:?} for {frames} frames of {dt:.4}s", args.effect);

    collection.simulate(0.0);
    let mut reports = vec![report(0, &collection)];
    let mut finished = false;

    for frame in 1..=frames {
        collection.simulate(dt);
        finished = collection.is_finished();
        if frame % every == 0 || frame == frames || finished {
            reports.push(report(frame, &collection));
        }
        if finished {
            log::debug!("Effect finished after {frame} frames");
            break;
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_table(&args, &reports, finished);
    }
    Ok(())
}
