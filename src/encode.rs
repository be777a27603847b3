use gif::{DisposalMethod, Encoder, Frame, Repeat};
use image::RgbaImage;

use crate::error::{AnimationError, AnimationResult};

/// NeuQuant speed handed to the gif quantizer, 1 (best) to 30 (fastest)
pub const QUANTIZE_SPEED: i32 = 10;

/// Per-frame delay in GIF units (10 ms), rounded half up.
///
/// Every frame gets the same delay. Errors if the result can't be represented:
/// zero frames, a delay that rounds down to nothing, or one too long for the
/// 16-bit delay field.
pub fn frame_delay(duration_secs: u32, frame_count: usize) -> AnimationResult<u16> {
    if frame_count == 0 {
        return Err(AnimationError::encoding("no frames to encode"));
    }
    if duration_secs == 0 {
        return Err(AnimationError::encoding("duration must be positive"));
    }
    let total = u64::from(duration_secs) * 100;
    let n = frame_count as u64;
    let delay = (2 * total + n) / (2 * n);
    match u16::try_from(delay) {
        Ok(0) => Err(AnimationError::encoding(format!(
            "{frame_count} frames over {duration_secs}s is under 10ms per frame"
        ))),
        Ok(d) => Ok(d),
        Err(_) => Err(AnimationError::encoding(format!(
            "per-frame delay of {}ms is too long for a gif",
            delay * 10
        ))),
    }
}

/// Encodes `frames` as an endlessly looping GIF lasting about `duration_secs`.
///
/// Alpha is reduced to GIF's single transparent key: fully transparent pixels
/// stay transparent, anything else becomes opaque.
pub fn encode(frames: &[RgbaImage], duration_secs: u32) -> AnimationResult<Vec<u8>> {
    let first = frames
        .first()
        .ok_or_else(|| AnimationError::encoding("no frames to encode"))?;
    let (width, height) = first.dimensions();
    if let Some((i, f)) = frames
        .iter()
        .enumerate()
        .find(|(_, f)| f.dimensions() != (width, height))
    {
        return Err(AnimationError::encoding(format!(
            "frame {i} is {}x{}, expected {width}x{height}",
            f.width(),
            f.height()
        )));
    }
    let (Ok(gif_width), Ok(gif_height)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(AnimationError::encoding(format!(
            "{width}x{height} is too large for a gif"
        )));
    };
    if width == 0 || height == 0 {
        return Err(AnimationError::encoding("frames have no pixels"));
    }
    let delay = frame_delay(duration_secs, frames.len())?;

    let mut data = Vec::new();
    {
        let mut encoder = Encoder::new(&mut data, gif_width, gif_height, &[])?;
        encoder.set_repeat(Repeat::Infinite)?;
        for image in frames {
            // the quantizer rewrites alpha in place, so work on a copy
            let mut rgba = image.as_raw().clone();
            let mut frame =
                Frame::from_rgba_speed(gif_width, gif_height, &mut rgba, QUANTIZE_SPEED);
            frame.delay = delay;
            // clear to background so transparent pixels don't show the previous frame
            frame.dispose = DisposalMethod::Background;
            encoder.write_frame(&frame)?;
        }
        // trailer gets written when the encoder drops
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn delay_is_split_evenly() {
        assert_eq!(frame_delay(5, 1).unwrap(), 500);
        assert_eq!(frame_delay(5, 41).unwrap(), 12);
        assert_eq!(frame_delay(1, 3).unwrap(), 33);
        assert_eq!(frame_delay(2, 3).unwrap(), 67);
    }

    #[test]
    fn delay_rounds_half_up() {
        // 1s / 8 = 12.5 units
        assert_eq!(frame_delay(1, 8).unwrap(), 13);
        // 1s / 200 = 0.5 units
        assert_eq!(frame_delay(1, 200).unwrap(), 1);
    }

    #[test]
    fn delay_rejects_degenerate_timing() {
        assert!(matches!(
            frame_delay(1, 201),
            Err(AnimationError::EncodingFailure(_))
        ));
        assert!(frame_delay(5, 0).is_err());
        assert!(frame_delay(0, 4).is_err());
        assert!(frame_delay(700, 1).is_err());
        assert_eq!(frame_delay(655, 1).unwrap(), 65500);
    }

    #[test]
    fn writes_a_gif() {
        let frames = vec![RgbaImage::from_pixel(4, 3, Rgba([0, 255, 0, 255])); 3];
        let data = encode(&frames, 3).unwrap();
        assert_eq!(&data[..6], b"GIF89a");
        assert_eq!(data.last(), Some(&0x3b));
    }

    #[test]
    fn mismatched_frames_fail() {
        let frames = vec![RgbaImage::new(4, 4), RgbaImage::new(4, 5)];
        let err = encode(&frames, 1).unwrap_err();
        assert!(matches!(err, AnimationError::EncodingFailure(_)));
    }

    #[test]
    fn empty_sequence_fails() {
        assert!(matches!(
            encode(&[], 5),
            Err(AnimationError::EncodingFailure(_))
        ));
    }

    #[test]
    fn oversized_frames_fail() {
        let frames = vec![RgbaImage::new(70_000, 1)];
        assert!(matches!(
            encode(&frames, 5),
            Err(AnimationError::EncodingFailure(_))
        ));
    }
}
