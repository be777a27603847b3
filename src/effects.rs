//! Optional whole-frame filters and the ping-pong loop, applied after the
//! frames are generated and before they are encoded.

use image::{
    imageops::{self, FilterType},
    DynamicImage, Rgba, RgbaImage,
};

/// Which effects a request asked for. The default does nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effects {
    /// Play the frames forward then backward so the loop has no jump.
    pub seamless: bool,
    pub invert: bool,
    pub grayscale: bool,
    pub sepia: bool,
    pub edge_detect: bool,
    /// 0 (off) to 100 (coarsest).
    pub pixelate: u8,
}

pub const MAX_PIXELATE: u8 = 100;
/// Blocks across the width at full pixelation.
const MIN_PIXELATED_WIDTH: f64 = 5.0;

impl Effects {
    fn filters_frames(&self) -> bool {
        self.invert || self.grayscale || self.sepia || self.edge_detect || self.pixelate > 0
    }

    /// How many frames `apply` turns `generated` frames into.
    pub fn output_len(&self, generated: usize) -> usize {
        if self.seamless && generated > 2 {
            2 * generated - 2
        } else {
            generated
        }
    }

    /// Filters every frame, then mirrors the sequence if `seamless` is set.
    pub fn apply(&self, mut frames: Vec<RgbaImage>) -> Vec<RgbaImage> {
        if self.filters_frames() {
            for frame in frames.iter_mut() {
                self.filter(frame);
            }
        }
        if self.seamless {
            ping_pong(frames)
        } else {
            frames
        }
    }

    /// Pixelate runs first and replaces the whole frame, then edge detect,
    /// then the per-pixel colour filters.
    pub fn filter(&self, frame: &mut RgbaImage) {
        if self.pixelate > 0 {
            *frame = pixelate(frame, self.pixelate);
        }
        if self.edge_detect {
            *frame = edge_detect(frame);
        }
        if self.grayscale {
            *frame = grayscale(frame);
        }
        if self.sepia {
            sepia(frame);
        }
        if self.invert {
            imageops::invert(frame);
        }
    }
}

/// `a b c d` becomes `a b c d c b`: the reverse minus both ends, so no frame
/// shows twice in a row when the gif wraps around.
pub fn ping_pong(mut frames: Vec<RgbaImage>) -> Vec<RgbaImage> {
    let n = frames.len();
    if n <= 2 {
        return frames;
    }
    frames.reserve(n - 2);
    for i in (1..n - 1).rev() {
        let copy = frames[i].clone();
        frames.push(copy);
    }
    frames
}

/// Scales down to fewer blocks and back up with nearest-neighbour sampling.
pub fn pixelate(frame: &RgbaImage, level: u8) -> RgbaImage {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return frame.clone();
    }
    let level = f64::from(level.min(MAX_PIXELATE)) / f64::from(MAX_PIXELATE);
    let w = f64::from(width);
    let blocks_x = (w - level * (w - MIN_PIXELATED_WIDTH)).round();
    let blocks_x = (blocks_x as u32).clamp(1, width);
    let blocks_y = ((f64::from(blocks_x) * f64::from(height)) / w).round() as u32;
    let blocks_y = blocks_y.clamp(1, height);
    if (blocks_x, blocks_y) == (width, height) {
        return frame.clone();
    }
    let small = imageops::resize(frame, blocks_x, blocks_y, FilterType::Nearest);
    imageops::resize(&small, width, height, FilterType::Nearest)
}

/// Luma with alpha kept.
pub fn grayscale(frame: &RgbaImage) -> RgbaImage {
    DynamicImage::ImageRgba8(frame.clone())
        .grayscale()
        .into_rgba8()
}

pub fn sepia(frame: &mut RgbaImage) {
    for px in frame.pixels_mut() {
        let [r, g, b, a] = px.0.map(f32::from);
        let tone = |kr: f32, kg: f32, kb: f32| (r * kr + g * kg + b * kb).min(255.0) as u8;
        *px = Rgba([
            tone(0.393, 0.769, 0.189),
            tone(0.349, 0.686, 0.168),
            tone(0.272, 0.534, 0.131),
            a as u8,
        ]);
    }
}

/// Sobel magnitude `|gx| + |gy|` per colour channel. The output is opaque;
/// the one pixel border, where the kernel doesn't fit, is black.
pub fn edge_detect(frame: &RgbaImage) -> RgbaImage {
    const KX: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
    const KY: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

    let (width, height) = frame.dimensions();
    let mut out = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    if width < 3 || height < 3 {
        return out;
    }
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut gx = [0i32; 3];
            let mut gy = [0i32; 3];
            for (ky, row) in KX.iter().enumerate() {
                for (kx, &wx) in row.iter().enumerate() {
                    let wy = KY[ky][kx];
                    let px = frame.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for c in 0..3 {
                        gx[c] += i32::from(px[c]) * wx;
                        gy[c] += i32::from(px[c]) * wy;
                    }
                }
            }
            let mag = |c: usize| (gx[c].abs() + gy[c].abs()).min(255) as u8;
            out.put_pixel(x, y, Rgba([mag(0), mag(1), mag(2), 255]));
        }
    }
    out
}
