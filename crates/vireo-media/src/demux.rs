// crates/vireo-media/src/demux.rs
//
// Container probing: stream selection and the immutable per-file facts every
// other part of the pipeline reads (resolution, time base, framerate,
// duration split into display counters, frame count).

use std::path::{Path, PathBuf};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::media::Type;
use ffmpeg::Rational;

use crate::error::OpenError;
use vireo_core::helpers::time::{duration_seconds, split_duration_us};

/// Immutable facts about a media file, computed once at open.
#[derive(Clone, Debug)]
pub struct MediaInfo {
    pub path:               PathBuf,
    pub width:              u32,
    pub height:             u32,
    /// Time base of the selected video stream.
    pub time_base:          Rational,
    pub framerate:          f64,
    /// Container duration in `AV_TIME_BASE` units, padded by 5000 so the
    /// last frame is not truncated by the loop-around check.
    pub duration_us:        i64,
    pub num_frames:         i64,
    pub duration_seconds:   f64,
    pub hours:              i32,
    pub minutes:            i32,
    pub seconds:            i32,
    pub micros:             i64,
    pub video_stream_index: usize,
    pub audio_stream_index: Option<usize>,
}

/// Open the container at `path` for demuxing.
pub fn open_input(path: &Path) -> Result<ffmpeg::format::context::Input, OpenError> {
    ffmpeg::format::input(path).map_err(|source| match source {
        ffmpeg::Error::StreamNotFound => OpenError::NoStreamInfo(source),
        _ => OpenError::FileNotFound {
            path: path.display().to_string(),
            source,
        },
    })
}

/// Index of the first stream of `kind` whose codec has an available decoder.
///
/// Streams are scanned in container order, so "first video stream" means the
/// same stream the container's own tooling would pick. A stream whose codec
/// has no decoder on this build is skipped rather than failing the open.
pub fn find_decodable_stream(
    ictx: &ffmpeg::format::context::Input,
    kind: Type,
) -> Option<usize> {
    for stream in ictx.streams() {
        let params = stream.parameters();
        if ffmpeg::decoder::find(params.id()).is_none() {
            continue;
        }
        if params.medium() == kind {
            return Some(stream.index());
        }
    }
    None
}

/// Probe `ictx` for the facts in [`MediaInfo`].
///
/// Fails only when no decodable video stream exists; a missing audio stream
/// leaves `audio_stream_index` empty.
pub fn probe(ictx: &ffmpeg::format::context::Input, path: &Path) -> Result<MediaInfo, OpenError> {
    let video_stream_index =
        find_decodable_stream(ictx, Type::Video).ok_or(OpenError::NoVideoStream)?;
    let audio_stream_index = find_decodable_stream(ictx, Type::Audio);

    let stream = ictx
        .stream(video_stream_index)
        .ok_or(OpenError::NoVideoStream)?;

    // Parameters only exposes raw codec parameters; width/height live behind
    // the pointer.
    let (width, height) = unsafe {
        let p = stream.parameters().as_ptr();
        ((*p).width as u32, (*p).height as u32)
    };
    let time_base = stream.time_base();

    // r_frame_rate, not avg_frame_rate: the real frame cadence for CFR
    // content, which is what the scrub index arithmetic assumes.
    let framerate = f64::from(stream.rate());

    let duration_us = if ictx.duration() >= 0 {
        ictx.duration() + 5000
    } else {
        0
    };
    let (hours, minutes, seconds, micros) = split_duration_us(duration_us);
    let secs = duration_seconds(hours, minutes, seconds, micros);
    let num_frames = (framerate * secs) as i64;

    Ok(MediaInfo {
        path: path.to_path_buf(),
        width,
        height,
        time_base,
        framerate,
        duration_us,
        num_frames,
        duration_seconds: secs,
        hours,
        minutes,
        seconds,
        micros,
        video_stream_index,
        audio_stream_index,
    })
}

impl MediaInfo {
    /// Seconds represented by `ts` in this file's video time base.
    pub fn ts_to_secs(&self, ts: i64) -> f64 {
        ts as f64 * self.time_base.numerator() as f64 / self.time_base.denominator() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_file_is_an_open_error() {
        crate::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not_there.mp4");
        match open_input(&missing) {
            Err(OpenError::FileNotFound { path, .. }) => {
                assert!(path.contains("not_there.mp4"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn ts_to_secs_uses_the_stream_time_base() {
        let info = MediaInfo {
            path:               PathBuf::new(),
            width:              640,
            height:             360,
            time_base:          Rational::new(1, 90_000),
            framerate:          30.0,
            duration_us:        2_000_005,
            num_frames:         60,
            duration_seconds:   2.0,
            hours:              0,
            minutes:            0,
            seconds:            2,
            micros:             5,
            video_stream_index: 0,
            audio_stream_index: None,
        };
        assert_eq!(info.ts_to_secs(90_000), 1.0);
        assert_eq!(info.ts_to_secs(45_000), 0.5);
    }
}
