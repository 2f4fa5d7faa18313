// crates/vireo-media/src/error.rs
//
// Typed errors for the media pipeline. Policy:
//   - OpenError is fatal to the asset (the importer returns no asset).
//   - DecodeError is logged; the current draw keeps the previous frame.
//   - SeekError aborts the current draw's mode early; the next draw retries.
//   - AudioDeviceError drops the entity to silent playback for the session.
// The audio callback itself never surfaces errors; it emits silence.

use ffmpeg_the_third as ffmpeg;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("could not allocate a format context")]
    AllocFailed,
    #[error("could not open media file {path}: {source}")]
    FileNotFound {
        path:   String,
        source: ffmpeg::Error,
    },
    #[error("could not read stream info: {0}")]
    NoStreamInfo(ffmpeg::Error),
    #[error("no decodable video stream in file")]
    NoVideoStream,
    #[error("no decodable audio stream in file")]
    NoAudioStream,
    #[error("no decoder available for the stream codec")]
    CodecUnavailable,
    #[error("could not open codec: {0}")]
    CodecOpenFailed(ffmpeg::Error),
    #[error("could not allocate decode scratch: {0}")]
    ScratchAllocFailed(ffmpeg::Error),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to submit packet to decoder: {0}")]
    SendPacket(ffmpeg::Error),
    #[error("failed to receive frame from decoder: {0}")]
    ReceiveFrame(ffmpeg::Error),
    #[error("could not initialise the software scaler")]
    ScalerUnavailable,
    #[error("scaler failed on frame: {0}")]
    ScaleFailed(ffmpeg::Error),
    #[error("could not initialise the resampler: {0}")]
    ResamplerUnavailable(ffmpeg::Error),
    #[error("resampler failed on frame: {0}")]
    ResampleFailed(ffmpeg::Error),
    #[error("end of stream before any frame was decoded")]
    EndOfStream,
}

#[derive(Debug, Error)]
pub enum SeekError {
    #[error("{label} seek to {target_secs:.3}s failed: {source}")]
    SeekFailed {
        label:       &'static str,
        target_secs: f64,
        source:      ffmpeg::Error,
    },
    #[error("post-seek decode failed: {0}")]
    PostSeekDecode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum AudioDeviceError {
    #[error("no default audio output device")]
    NoDevice,
    #[error("could not build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("could not start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}
