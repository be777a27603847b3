use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use fragmentgif::{
    animation::{DEFAULT_DURATION_SECS, DEFAULT_FRAMES},
    create_animation, create_animation_with, decode_image,
    effects::MAX_PIXELATE,
    AnimationParams, Effects,
};
use rand::{rngs::StdRng, SeedableRng};

/// Turn one image into a glitchy looping GIF without going through the server.
#[derive(Parser, Debug)]
#[command(name = "fragment", version)]
struct Args {
    /// Image to cut up.
    input: PathBuf,

    #[arg(short, long, default_value = "animation.gif")]
    out: PathBuf,

    /// Frames to generate after the original.
    #[arg(long, default_value_t = DEFAULT_FRAMES)]
    frames: u32,

    /// Total animation length in seconds.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    duration: u32,

    /// Seed for repeatable output.
    #[arg(long)]
    seed: Option<u64>,

    /// Play the frames forward then backward so the loop has no jump.
    #[arg(long)]
    seamless: bool,

    #[arg(long)]
    invert: bool,

    #[arg(long)]
    grayscale: bool,

    #[arg(long)]
    sepia: bool,

    #[arg(long)]
    edge_detect: bool,

    /// Block size from 0 (off) to 100 (coarsest).
    #[arg(
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_PIXELATE))
    )]
    pixelate: u8,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
    let args = Args::parse();

    let bytes = fs::read(&args.input)
        .with_context(|| format!("could not read {}", args.input.display()))?;
    let image = decode_image(&bytes).context("could not decode input")?;
    let params = AnimationParams {
        frame_count: args.frames,
        duration_secs: args.duration,
        effects: Effects {
            seamless: args.seamless,
            invert: args.invert,
            grayscale: args.grayscale,
            sepia: args.sepia,
            edge_detect: args.edge_detect,
            pixelate: args.pixelate,
        },
        ..AnimationParams::default()
    };
    let animation = match args.seed {
        Some(seed) => create_animation_with(&mut StdRng::seed_from_u64(seed), &image, params),
        None => create_animation(&image, params),
    }
    .context("could not create animation")?;

    fs::write(&args.out, &animation.data)
        .with_context(|| format!("could not write {}", args.out.display()))?;
    log::info!("wrote {} frames to {}", animation.frames, args.out.display());
    Ok(())
}
