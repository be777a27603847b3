use std::time::Instant;

use image::RgbaImage;
use log::{debug, info};
use rand::Rng;

use crate::effects::{Effects, MAX_PIXELATE};
use crate::encode;
use crate::error::{AnimationError, AnimationResult};
use crate::frames;

pub const CONTENT_TYPE: &str = "image/gif";
pub const FILENAME: &str = "animation.gif";

pub const DEFAULT_FRAMES: u32 = 40;
pub const DEFAULT_DURATION_SECS: u32 = 5;
/// About 400 MB of RGBA frames held at once.
pub const DEFAULT_MAX_ANIMATION_PIXELS: u64 = 100_000_000;

/// Bounds on what a request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamLimits {
    pub default_frames: u32,
    pub default_duration_secs: u32,
    pub max_frames: u32,
    pub max_duration_secs: u32,
    /// Cap on width * height * output frames, since every frame is kept in memory.
    pub max_animation_pixels: u64,
}

impl Default for ParamLimits {
    fn default() -> Self {
        Self {
            default_frames: DEFAULT_FRAMES,
            default_duration_secs: DEFAULT_DURATION_SECS,
            max_frames: 500,
            max_duration_secs: 600,
            max_animation_pixels: DEFAULT_MAX_ANIMATION_PIXELS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationParams {
    /// Frames generated on top of the original one.
    pub frame_count: u32,
    pub duration_secs: u32,
    pub effects: Effects,
    pub max_animation_pixels: u64,
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            frame_count: DEFAULT_FRAMES,
            duration_secs: DEFAULT_DURATION_SECS,
            effects: Effects::default(),
            max_animation_pixels: DEFAULT_MAX_ANIMATION_PIXELS,
        }
    }
}

impl AnimationParams {
    /// Parses the raw form values, looked up by field name. Absent values
    /// fall back to the defaults in `limits`, absent effects are off.
    pub fn parse<'a>(
        field: impl Fn(&str) -> Option<&'a str>,
        limits: &ParamLimits,
    ) -> AnimationResult<Self> {
        let frame_count = parse_int(field("loops"), "loops", limits.default_frames)?;
        let duration_secs =
            parse_int(field("duration"), "duration", limits.default_duration_secs)?;
        if frame_count > limits.max_frames {
            return Err(AnimationError::bad_parameter(format!(
                "loops must be at most {}",
                limits.max_frames
            )));
        }
        if duration_secs == 0 || duration_secs > limits.max_duration_secs {
            return Err(AnimationError::bad_parameter(format!(
                "duration must be between 1 and {} seconds",
                limits.max_duration_secs
            )));
        }

        let pixelate = parse_int(field("pixelate"), "pixelate", 0)?;
        let pixelate = u8::try_from(pixelate)
            .ok()
            .filter(|p| *p <= MAX_PIXELATE)
            .ok_or_else(|| {
                AnimationError::bad_parameter(format!("pixelate must be at most {MAX_PIXELATE}"))
            })?;
        let effects = Effects {
            seamless: parse_flag(field("seamless"), "seamless")?,
            invert: parse_flag(field("invert"), "invert")?,
            grayscale: parse_flag(field("grayscale"), "grayscale")?,
            sepia: parse_flag(field("sepia"), "sepia")?,
            edge_detect: parse_flag(field("edgeDetect"), "edgeDetect")?,
            pixelate,
        };

        let params = Self {
            frame_count,
            duration_secs,
            effects,
            max_animation_pixels: limits.max_animation_pixels,
        };
        // catch timings the gif can't hold before any frame gets made
        if let Err(e) = encode::frame_delay(duration_secs, params.output_frames()) {
            return Err(AnimationError::bad_parameter(format!(
                "loops and duration don't make a valid gif ({e})"
            )));
        }
        Ok(params)
    }

    /// Frames in the finished gif, after effects.
    pub fn output_frames(&self) -> usize {
        self.effects.output_len(self.frame_count as usize + 1)
    }

    /// Fails if a `width`x`height` animation would go over the pixel budget.
    pub fn check_size(&self, width: u32, height: u32) -> AnimationResult<()> {
        let total = u64::from(width) * u64::from(height) * self.output_frames() as u64;
        if total > self.max_animation_pixels {
            return Err(AnimationError::bad_parameter(format!(
                "{} frames of {width}x{height} is {total} pixels, the limit is {}",
                self.output_frames(),
                self.max_animation_pixels
            )));
        }
        Ok(())
    }
}

fn parse_int(raw: Option<&str>, name: &str, default: u32) -> AnimationResult<u32> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.trim()
        .parse::<u32>()
        .map_err(|e| AnimationError::bad_parameter(format!("{name} {raw:?}: {e}")))
}

// checkboxes post "on", everything else tends to post true/false
fn parse_flag(raw: Option<&str>, name: &str) -> AnimationResult<bool> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        _ => Err(AnimationError::bad_parameter(format!(
            "{name} {raw:?} is not a boolean"
        ))),
    }
}

/// Decodes an uploaded file into RGBA.
pub fn decode_image(bytes: &[u8]) -> AnimationResult<RgbaImage> {
    if bytes.is_empty() {
        return Err(AnimationError::invalid_image("upload is empty"));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|e| AnimationError::invalid_image(e.to_string()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(AnimationError::invalid_image(format!(
            "image has no pixels ({width}x{height})"
        )));
    }
    if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        return Err(AnimationError::invalid_image(format!(
            "{width}x{height} is larger than a gif can hold"
        )));
    }
    Ok(image)
}

/// A finished GIF, ready to hand back as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    pub data: Vec<u8>,
    pub frames: usize,
}

impl Animation {
    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    pub fn filename(&self) -> &'static str {
        FILENAME
    }
}

pub fn create_animation(image: &RgbaImage, params: AnimationParams) -> AnimationResult<Animation> {
    create_animation_with(&mut rand::thread_rng(), image, params)
}

pub fn create_animation_with<R: Rng + ?Sized>(
    rng: &mut R,
    image: &RgbaImage,
    params: AnimationParams,
) -> AnimationResult<Animation> {
    params.check_size(image.width(), image.height())?;

    let start = Instant::now();
    let frames = frames::generate_with(rng, image, params.frame_count)?;
    debug!(
        "generated {} frames of {}x{} in {:?}",
        frames.len(),
        image.width(),
        image.height(),
        start.elapsed()
    );
    let frames = params.effects.apply(frames);
    let data = encode::encode(&frames, params.duration_secs)?;
    info!(
        "encoded {} frames over {}s into {} bytes in {:?}",
        frames.len(),
        params.duration_secs,
        data.len(),
        start.elapsed()
    );
    Ok(Animation {
        data,
        frames: frames.len(),
    })
}
