// crates/vireo-render/src/playback.rs
//
// Per-draw playback state machine. Each video sprite draw dispatches on
// (play_video, frame_position) into one of three modes:
//
//   | play_video | frame_position | mode  |
//   |------------|----------------|-------|
//   | true       | any            | PLAY  |
//   | false      | 0              | STOP  |
//   | false      | != 0           | SCRUB |
//
// All three mutate the entity's VideoData and the shared VideoTexture, then
// the batch renderer emits the quad. A mode that fails mid-way returns an
// error and the sprite skips this draw; the next draw retries.

use std::time::Duration;

use anyhow::{Context, Result};

use vireo_core::helpers::time::duration_seconds;
use vireo_core::VideoData;

use crate::gpu::GpuContext;
use crate::texture::VideoTexture;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    Play,
    Stop,
    Scrub,
}

pub fn mode_for(data: &VideoData) -> PlaybackMode {
    if data.play_video {
        PlaybackMode::Play
    } else if data.frame_position == 0 {
        PlaybackMode::Stop
    } else {
        PlaybackMode::Scrub
    }
}

/// A scrub draw seeks only when the requested frame differs from the one
/// already served.
fn scrub_needs_seek(frame_position: i64, last_scrub_frame: i64) -> bool {
    frame_position != last_scrub_frame
}

/// Restart-point rule for PLAY: the clock never runs behind the furthest
/// wall-clock point reached this session. Returns the time to force the
/// clock to (if any) and the updated restart point.
fn restart_point_step(restart_point: f64, now: f64) -> (Option<f64>, f64) {
    if restart_point > now {
        (Some(restart_point), restart_point)
    } else {
        (None, now.max(restart_point))
    }
}

fn should_loop(repeat: bool, now: f64, video_duration: f64) -> bool {
    repeat && video_duration > 0.0 && now >= video_duration
}

/// Copy the reader-side display counters into the entity when they changed,
/// so the editor UI reads them without touching decoder state.
fn sync_counters(texture: &VideoTexture, data: &mut VideoData) {
    let info = texture.info();
    if data.number_of_frames != info.num_frames {
        data.number_of_frames = info.num_frames;
    }
    if data.hours != info.hours {
        data.hours = info.hours;
    }
    if data.minutes != info.minutes {
        data.minutes = info.minutes;
    }
    if data.seconds != info.seconds {
        data.seconds = info.seconds;
    }
    if data.micros != info.micros {
        data.micros = info.micros;
    }
}

/// PLAY: advance a frame, keep the clock and audio in step, loop if asked.
pub fn advance_play(ctx: &GpuContext, texture: &mut VideoTexture, data: &mut VideoData) -> Result<()> {
    data.clock.arm();

    // Retire the previous frame's id before requesting a new one. This guard
    // is what keeps exactly one live id reachable per texture.
    if data.video_renderer_id != 0 {
        texture.delete_renderer_id(data.video_renderer_id);
    }

    if !data.use_external_audio {
        texture.read_and_play_audio(data.frame_position, data.seek_audio, data.pause_video);
    }

    if !data.is_rendering_video {
        data.clock.set_time(0.0);
        data.is_rendering_video = true;
    }

    // The user scrubbed before pressing play: start the session there.
    if data.frame_position != 0 {
        data.clock
            .set_time(data.frame_position as f64 / texture.info().framerate);
        texture
            .seek_video(data.frame_position)
            .context("seeking video to the pre-play scrub position")?;
        data.presentation_timestamp = data.frame_position;
        data.frame_position = 0;
        data.last_scrub_frame = 0;
    }

    data.video_renderer_id =
        texture.refresh_frame(ctx, &mut data.presentation_timestamp, data.pause_video)?;

    if data.pause_video {
        // Hold this frame: park both streams on it so resume re-decodes it,
        // and stop the clock.
        if !data.use_external_audio {
            texture
                .seek_av(data.presentation_timestamp, false)
                .context("parking streams on the paused frame")?;
        } else {
            texture
                .seek_video(data.presentation_timestamp)
                .context("parking video on the paused frame")?;
        }
        data.clock.set_time(0.0);
        return Ok(());
    }

    let (clock_override, restart_point) =
        restart_point_step(data.restart_point_from_pause, data.clock.now());
    if let Some(t) = clock_override {
        data.clock.set_time(t);
    }
    data.restart_point_from_pause = restart_point;

    let info = texture.info();
    data.presentation_time_in_seconds = info.ts_to_secs(data.presentation_timestamp);

    let duration = duration_seconds(info.hours, info.minutes, info.seconds, info.micros);
    if data.video_duration != duration {
        data.video_duration = duration;
    }
    let frame_interval = 1.0 / info.framerate.max(1.0);
    sync_counters(texture, data);

    // Sleep until this frame's presentation time. Each nap is bounded by one
    // frame interval so a mode change on the next draw is never far away.
    while data.presentation_time_in_seconds > data.clock.now() {
        let remaining = data.presentation_time_in_seconds - data.clock.now();
        std::thread::sleep(Duration::from_secs_f64(remaining.min(frame_interval).max(0.0)));
    }

    if should_loop(data.repeat_video, data.clock.now(), data.video_duration) {
        if !data.use_external_audio {
            // Audio device first, stream positions second.
            texture.close_audio();
        } else {
            texture
                .seek_video(0)
                .context("rewinding video for loop")?;
        }
        data.seek_audio = true;

        texture.delete_renderer_id(data.video_renderer_id);
        texture.close_video();
        data.video_renderer_id =
            texture.refresh_frame(ctx, &mut data.presentation_timestamp, data.pause_video)?;
        data.presentation_timestamp = 0;
        data.clock.set_time(0.0);
        data.restart_point_from_pause = 0.0;
    }

    Ok(())
}

/// STOP: the scene is not playing and no frame is requested. Reset to the
/// first frame once and release the audio device.
pub fn reset_stopped(ctx: &GpuContext, texture: &mut VideoTexture, data: &mut VideoData) -> Result<()> {
    sync_counters(texture, data);

    if texture.has_loaded_audio() {
        // Stop the audio callback before moving any stream cursor. The
        // device is released even under external audio; it was never started
        // for this sprite, and closing is idempotent.
        texture.close_audio();
        texture.seek_video(0).context("rewinding video on stop")?;
        data.seek_audio = true;

        texture.delete_renderer_id(data.video_renderer_id);
        texture.close_video();
        data.video_renderer_id =
            texture.refresh_frame(ctx, &mut data.presentation_timestamp, data.pause_video)?;
        data.presentation_timestamp = 0;
        data.clock.set_time(0.0);
        data.restart_point_from_pause = 0.0;
    }

    if data.is_rendering_video {
        texture.delete_renderer_id(data.video_renderer_id);
        texture.close_video();
        data.video_renderer_id =
            texture.refresh_frame(ctx, &mut data.presentation_timestamp, data.pause_video)?;
        data.presentation_timestamp = 0;
        data.clock.set_time(0.0);
        data.restart_point_from_pause = 0.0;
        data.is_rendering_video = false;
        data.last_scrub_frame = 0;
    }

    Ok(())
}

/// SCRUB: hold the requested frame visible without advancing the clock.
/// Seeks once per requested frame; repeated draws with the same input reuse
/// the already-served frame.
pub fn hold_scrub(ctx: &GpuContext, texture: &mut VideoTexture, data: &mut VideoData) -> Result<()> {
    sync_counters(texture, data);

    if !scrub_needs_seek(data.frame_position, data.last_scrub_frame) {
        return Ok(());
    }

    if texture.has_loaded_audio() {
        // Stop audio first; seeking a stream the callback is reading is not.
        if !data.use_external_audio {
            texture.close_audio();
            texture.seek_video(0).context("rewinding video for scrub")?;
        }
        data.seek_audio = true;
        data.clock.set_time(0.0);
        data.restart_point_from_pause = 0.0;
    }

    if data.is_rendering_video {
        data.clock.set_time(0.0);
        data.restart_point_from_pause = 0.0;
        data.is_rendering_video = false;
    }

    let target = data.frame_position * texture.video_packet_duration();
    texture
        .seek_video(target)
        .context("seeking video to the scrubbed frame")?;
    data.presentation_timestamp = target;

    texture.delete_renderer_id(data.video_renderer_id);
    data.video_renderer_id =
        texture.refresh_frame(ctx, &mut data.presentation_timestamp, data.pause_video)?;
    data.last_scrub_frame = data.frame_position;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_dispatch_follows_the_intent_table() {
        let mut data = VideoData::default();
        assert_eq!(mode_for(&data), PlaybackMode::Stop);

        data.frame_position = 15;
        assert_eq!(mode_for(&data), PlaybackMode::Scrub);

        // Play wins regardless of a pending frame position.
        data.play_video = true;
        assert_eq!(mode_for(&data), PlaybackMode::Play);
        data.frame_position = 0;
        assert_eq!(mode_for(&data), PlaybackMode::Play);
    }

    #[test]
    fn scrub_reseeks_only_on_a_new_frame() {
        assert!(scrub_needs_seek(15, 0));
        assert!(!scrub_needs_seek(15, 15));
        assert!(scrub_needs_seek(16, 15));
    }

    #[test]
    fn clock_is_pulled_forward_to_the_restart_point() {
        // A pause or loop moved the clock behind the restart point.
        let (clock_override, restart) = restart_point_step(5.0, 1.0);
        assert_eq!(clock_override, Some(5.0));
        assert_eq!(restart, 5.0);
    }

    #[test]
    fn restart_point_rises_with_the_clock() {
        let (clock_override, restart) = restart_point_step(2.0, 3.5);
        assert_eq!(clock_override, None);
        assert_eq!(restart, 3.5);
    }

    #[test]
    fn loop_fires_only_past_the_duration_with_repeat_set() {
        assert!(should_loop(true, 2.01, 2.0));
        assert!(should_loop(true, 2.0, 2.0));
        assert!(!should_loop(true, 1.99, 2.0));
        assert!(!should_loop(false, 10.0, 2.0));
        // An unknown duration never loops.
        assert!(!should_loop(true, 10.0, 0.0));
    }
}
