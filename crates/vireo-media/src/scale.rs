// crates/vireo-media/src/scale.rs
//
// Colour conversion from decoded frames to packed RGBA bytes at source
// resolution. The scaler context is created per frame and dropped right
// after: decoded pixel formats can change across seeks on some codecs, and
// a stale context would silently misinterpret the planes.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;

use crate::error::DecodeError;

/// Map deprecated full-range JPEG YUV formats onto their standard-range
/// siblings. The plane layout is identical; only the range tag differs, and
/// swscale warns (or refuses) on the J variants.
pub fn fold_deprecated_format(format: Pixel) -> Pixel {
    match format {
        Pixel::YUVJ420P => Pixel::YUV420P,
        Pixel::YUVJ422P => Pixel::YUV422P,
        Pixel::YUVJ444P => Pixel::YUV444P,
        Pixel::YUVJ440P => Pixel::YUV440P,
        other => other,
    }
}

/// Convert `frame` to packed 4-byte-per-pixel RGBA into `out`.
///
/// `out` must hold exactly `width * height * 4` bytes with a stride of
/// `width * 4`; the scaler's own output rows may carry padding, which is
/// stripped during the copy.
pub fn scale_frame_to_rgba(
    frame: &VideoFrame,
    width: u32,
    height: u32,
    out: &mut [u8],
) -> Result<(), DecodeError> {
    debug_assert_eq!(out.len(), width as usize * height as usize * 4);

    let src_format = fold_deprecated_format(frame.format());
    let mut scaler = SwsContext::get(
        src_format,
        frame.width(),
        frame.height(),
        Pixel::RGB0,
        width,
        height,
        Flags::BILINEAR,
    )
    .map_err(|_| DecodeError::ScalerUnavailable)?;

    let mut rgba = VideoFrame::empty();
    scaler
        .run(frame, &mut rgba)
        .map_err(DecodeError::ScaleFailed)?;

    // Destripe: copy only visible pixels, not stride padding.
    let stride = rgba.stride(0);
    let raw = rgba.data(0);
    let row_bytes = width as usize * 4;
    for row in 0..height as usize {
        let src = row * stride;
        out[row * row_bytes..(row + 1) * row_bytes].copy_from_slice(&raw[src..src + row_bytes]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_range_formats_fold_to_standard_range() {
        assert_eq!(fold_deprecated_format(Pixel::YUVJ420P), Pixel::YUV420P);
        assert_eq!(fold_deprecated_format(Pixel::YUVJ422P), Pixel::YUV422P);
        assert_eq!(fold_deprecated_format(Pixel::YUVJ444P), Pixel::YUV444P);
        assert_eq!(fold_deprecated_format(Pixel::YUVJ440P), Pixel::YUV440P);
    }

    #[test]
    fn other_formats_pass_through() {
        assert_eq!(fold_deprecated_format(Pixel::YUV420P), Pixel::YUV420P);
        assert_eq!(fold_deprecated_format(Pixel::RGB24), Pixel::RGB24);
        assert_eq!(fold_deprecated_format(Pixel::NV12), Pixel::NV12);
    }
}
