// crates/vireo-media/src/helpers/seek.rs
//
// Seek helper wrapping the container-level seek. All demuxer seeks in this
// crate route through here so every caller gets the same backward-to-keyframe
// behaviour and the same error shape.
//
// # Why backward seek (`..=seek_ts`)
// A forward seek lands on the keyframe AT OR AFTER the target. When the
// target falls mid-GOP that keyframe can be seconds away and every frame in
// between is lost to the decode stream. A backward seek lands on the keyframe
// BEFORE the target; the caller then decodes and discards pre-roll frames, so
// the next delivered frame is the first one at or after the target.

use ffmpeg_the_third as ffmpeg;

use crate::error::SeekError;
use vireo_core::helpers::time::AV_TIME_BASE;

/// Seek `ictx` backward to the keyframe preceding `target_secs`.
///
/// The target is clamped at zero; a zero target rewinds to the start of the
/// container. The codec buffers are NOT flushed here; that is per-stream
/// state the caller owns.
pub fn seek_backward_secs(
    ictx: &mut ffmpeg::format::context::Input,
    target_secs: f64,
    label: &'static str,
) -> Result<(), SeekError> {
    let target_secs = target_secs.max(0.0);
    let seek_ts = (target_secs * AV_TIME_BASE as f64) as i64;
    ictx.seek(seek_ts, ..=seek_ts)
        .map_err(|source| SeekError::SeekFailed {
            label,
            target_secs,
            source,
        })
}
