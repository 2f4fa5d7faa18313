// crates/vireo-core/src/components.rs
//
// Video sprite component data.
// Pure values: no ffmpeg, no wgpu, no device handles. The persisted part
// (VideoRendererComponent) round-trips through serde; the runtime part
// (VideoData) is rebuilt every session and never serialised.

use glam::Vec4;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::PlaybackClock;

/// What the editor writes to disk for a video sprite: which asset to play
/// and how to tint it. Everything else about playback is runtime state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VideoRendererComponent {
    /// Asset handle of the video texture.
    pub video:      Uuid,
    pub color:      Vec4,
    /// 0.0 = full colour, 1.0 = luma only.
    pub saturation: f32,
}

impl Default for VideoRendererComponent {
    fn default() -> Self {
        Self {
            video:      Uuid::nil(),
            color:      Vec4::ONE,
            saturation: 0.0,
        }
    }
}

/// Per-entity playback state, mutated on every draw.
///
/// One of these lives on each scene entity with a video sprite. It holds the
/// user intent (`play_video`, `pause_video`, `repeat_video`, `frame_position`)
/// and the controller's working state, including the entity's own clock.
#[derive(Clone, Debug)]
pub struct VideoData {
    // ── User intent ───────────────────────────────────────────────────────
    pub play_video:         bool,
    pub pause_video:        bool,
    pub repeat_video:       bool,
    /// Suppress this sprite's own audio; some other system plays it.
    pub use_external_audio: bool,
    pub use_billboard:      bool,
    /// Requested frame index. 0 means "live play".
    pub frame_position:     i64,

    // ── Controller state ──────────────────────────────────────────────────
    /// Last scrub frame actually served. A scrub draw re-seeks only when
    /// `frame_position` differs from this.
    pub last_scrub_frame:             i64,
    /// Stream-unit PTS of the last decoded frame.
    pub presentation_timestamp:       i64,
    /// Renderer id of the current frame's texture upload, 0 before the first.
    pub video_renderer_id:            u32,
    pub is_rendering_video:           bool,
    /// Highest wall-clock value observed this play session.
    pub restart_point_from_pause:     f64,
    pub presentation_time_in_seconds: f64,
    pub video_duration:               f64,
    pub seek_audio:                   bool,
    pub clock:                        PlaybackClock,

    // ── Mirrored display counters ─────────────────────────────────────────
    pub hours:            i32,
    pub minutes:          i32,
    pub seconds:          i32,
    pub micros:           i64,
    pub number_of_frames: i64,
}

impl VideoData {
    /// True once the entity's clock has been armed by the controller.
    pub fn has_initialized_timer(&self) -> bool {
        self.clock.is_armed()
    }
}

impl Default for VideoData {
    fn default() -> Self {
        Self {
            play_video:         false,
            pause_video:        false,
            repeat_video:       false,
            use_external_audio: false,
            use_billboard:      false,
            frame_position:     0,

            last_scrub_frame:             0,
            presentation_timestamp:       0,
            video_renderer_id:            0,
            is_rendering_video:           false,
            restart_point_from_pause:     0.0,
            presentation_time_in_seconds: 0.0,
            video_duration:               0.0,
            seek_audio:                   false,
            clock:                        PlaybackClock::new(),

            hours:            0,
            minutes:          0,
            seconds:          0,
            micros:           0,
            number_of_frames: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_data_defaults_to_stopped_at_frame_zero() {
        let data = VideoData::default();
        assert!(!data.play_video);
        assert_eq!(data.frame_position, 0);
        assert_eq!(data.video_renderer_id, 0);
        assert!(!data.has_initialized_timer());
    }

    #[test]
    fn component_round_trips_through_serde() {
        let src = VideoRendererComponent {
            video:      Uuid::new_v4(),
            color:      Vec4::new(1.0, 0.5, 0.25, 1.0),
            saturation: 0.75,
        };
        let json = serde_json::to_string(&src).unwrap();
        let back: VideoRendererComponent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.video, src.video);
        assert_eq!(back.color, src.color);
        assert_eq!(back.saturation, src.saturation);
    }

    #[test]
    fn default_component_is_untinted() {
        let c = VideoRendererComponent::default();
        assert_eq!(c.color, Vec4::ONE);
        assert_eq!(c.saturation, 0.0);
    }
}
