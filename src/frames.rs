//! Frame generation: random excerpts of the original image pasted back over a
//! running composite, one paste per frame.

use image::{imageops, RgbaImage};
use rand::Rng;

use crate::error::{AnimationError, AnimationResult};

/// A crop rectangle in pixel coordinates, `right` and `bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Where the top-left corner of a region lands on the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// Picks a crop from a `width`x`height` image.
///
/// Each edge is drawn independently: the near edge anywhere in `0..=len`, the
/// far edge at least one pixel past it. The far edge is then clamped to the
/// image and the near edge pulled back so the region never goes empty.
/// Both dimensions must be nonzero.
pub fn random_region<R: Rng + ?Sized>(rng: &mut R, width: u32, height: u32) -> Region {
    let (left, right) = random_span(rng, width);
    let (top, bottom) = random_span(rng, height);
    Region {
        left,
        top,
        right,
        bottom,
    }
}

fn random_span<R: Rng + ?Sized>(rng: &mut R, len: u32) -> (u32, u32) {
    let start = rng.gen_range(0..=len);
    let end = start + rng.gen_range(1..=len.saturating_sub(start).max(1));
    // start == len lets end overshoot by one
    let end = end.min(len);
    (start.min(end - 1), end)
}

/// Picks a spot where `region` fits without clipping.
pub fn random_placement<R: Rng + ?Sized>(
    rng: &mut R,
    width: u32,
    height: u32,
    region: &Region,
) -> Placement {
    Placement {
        x: rng.gen_range(0..=width.saturating_sub(region.width())),
        y: rng.gen_range(0..=height.saturating_sub(region.height())),
    }
}

/// Composites `src` onto `dst` at `at`, using the source alpha as the mask:
/// transparent source pixels leave `dst` alone, opaque ones replace it and
/// anything between blends. Whatever hangs off the edge of `dst` is dropped.
pub fn paste_region(dst: &mut RgbaImage, src: &RgbaImage, at: Placement) {
    imageops::overlay(dst, src, i64::from(at.x), i64::from(at.y));
}

/// [`generate_with`] using the thread-local entropy RNG.
pub fn generate(original: &RgbaImage, frame_count: u32) -> AnimationResult<Vec<RgbaImage>> {
    generate_with(&mut rand::thread_rng(), original, frame_count)
}

/// Builds `frame_count + 1` frames. The first is `original` untouched; every
/// following frame is the previous one with one more random crop of `original`
/// pasted over it. Crops always come from `original`, never from a frame.
pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    original: &RgbaImage,
    frame_count: u32,
) -> AnimationResult<Vec<RgbaImage>> {
    let (width, height) = original.dimensions();
    if width == 0 || height == 0 {
        return Err(AnimationError::invalid_image(format!(
            "image has no pixels ({width}x{height})"
        )));
    }

    let mut frames = Vec::with_capacity(frame_count as usize + 1);
    frames.push(original.clone());
    for _ in 0..frame_count {
        let region = random_region(rng, width, height);
        let crop = imageops::crop_imm(
            original,
            region.left,
            region.top,
            region.width(),
            region.height(),
        )
        .to_image();
        let at = random_placement(rng, width, height, &region);

        // frames never share buffers, so mutating this copy is fine
        let mut next = frames[frames.len() - 1].clone();
        paste_region(&mut next, &crop, at);
        frames.push(next);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rand::{rngs::StdRng, SeedableRng};

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 255 / width) as u8, (y * 255 / height) as u8, 128, 255])
        })
    }

    #[test]
    fn regions_stay_inside_and_nonempty() {
        let mut rng = StdRng::seed_from_u64(7);
        for (w, h) in [(1, 1), (1, 9), (10, 10), (37, 3)] {
            for _ in 0..2000 {
                let r = random_region(&mut rng, w, h);
                assert!(r.left < r.right && r.right <= w, "{r:?} in {w}x{h}");
                assert!(r.top < r.bottom && r.bottom <= h, "{r:?} in {w}x{h}");
                assert!((1..=w).contains(&r.width()));
                assert!((1..=h).contains(&r.height()));

                let p = random_placement(&mut rng, w, h, &r);
                assert!(p.x + r.width() <= w);
                assert!(p.y + r.height() <= h);
            }
        }
    }

    #[test]
    fn full_size_region_is_placed_at_origin() {
        let mut rng = StdRng::seed_from_u64(1);
        let region = Region {
            left: 0,
            top: 0,
            right: 8,
            bottom: 5,
        };
        for _ in 0..50 {
            assert_eq!(
                random_placement(&mut rng, 8, 5, &region),
                Placement { x: 0, y: 0 }
            );
        }
    }

    #[test]
    fn paste_honours_source_alpha() {
        let paste_one = |under: [u8; 4], over: [u8; 4]| {
            let mut dst = RgbaImage::from_pixel(1, 1, Rgba(under));
            let src = RgbaImage::from_pixel(1, 1, Rgba(over));
            paste_region(&mut dst, &src, Placement { x: 0, y: 0 });
            dst.get_pixel(0, 0).0
        };
        let green = [0, 255, 0, 255];
        assert_eq!(paste_one(green, [255, 255, 255, 0]), green);
        assert_eq!(paste_one(green, [255, 0, 255, 255]), [255, 0, 255, 255]);

        let half = paste_one([0, 0, 0, 255], [255, 255, 255, 128]);
        assert!(half[3] >= 254, "{half:?}");
        assert!((120..=136).contains(&half[0]), "{half:?}");
    }

    #[test]
    fn paste_region_only_touches_the_target_rect() {
        let mut dst = RgbaImage::from_pixel(6, 6, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(2, 3, Rgba([255, 0, 0, 255]));
        paste_region(&mut dst, &src, Placement { x: 3, y: 1 });
        for (x, y, px) in dst.enumerate_pixels() {
            let inside = (3..5).contains(&x) && (1..4).contains(&y);
            let want = if inside { [255, 0, 0, 255] } else { [0, 0, 0, 255] };
            assert_eq!(px.0, want, "pixel {x},{y}");
        }
    }

    #[test]
    fn zero_frames_is_just_the_original() {
        let original = gradient(5, 4);
        let frames = generate(&original, 0).unwrap();
        assert_eq!(frames, vec![original]);
    }

    #[test]
    fn sequence_shape() {
        let original = gradient(23, 17);
        let mut rng = StdRng::seed_from_u64(42);
        let frames = generate_with(&mut rng, &original, 25).unwrap();
        assert_eq!(frames.len(), 26);
        assert_eq!(frames[0], original);
        assert!(frames.iter().all(|f| f.dimensions() == (23, 17)));
    }

    #[test]
    fn frames_usually_change() {
        // a 10x10 gradient has unique pixels, so a paste is a no-op only when a
        // crop lands exactly where it came from
        let original = gradient(10, 10);
        let mut changed = 0;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let frames = generate_with(&mut rng, &original, 3).unwrap();
            assert_eq!(frames.len(), 4);
            changed += frames.windows(2).filter(|w| w[0] != w[1]).count();
        }
        assert!(changed >= 120, "only {changed}/150 frames changed");
    }

    #[test]
    fn unseeded_runs_differ() {
        let original = gradient(32, 32);
        let a = generate(&original, 10).unwrap();
        let b = generate(&original, 10).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn same_seed_same_frames() {
        let original = gradient(12, 9);
        let a = generate_with(&mut StdRng::seed_from_u64(3), &original, 6).unwrap();
        let b = generate_with(&mut StdRng::seed_from_u64(3), &original, 6).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn original_is_left_alone() {
        let original = gradient(8, 8);
        let before = original.clone();
        let _ = generate(&original, 20).unwrap();
        assert_eq!(original, before);
    }

    #[test]
    fn empty_image_is_rejected() {
        let err = generate(&RgbaImage::new(0, 4), 3).unwrap_err();
        assert!(matches!(err, AnimationError::InvalidImage(_)));
    }
}
