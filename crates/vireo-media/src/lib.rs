// crates/vireo-media/src/lib.rs
//
// FFmpeg-backed media pipeline: container probing, on-demand video decode to
// RGBA, and the audio decode → resample → FIFO → device-callback chain.
//
// Everything here runs on the scene thread except the cpal output callback,
// which only ever touches the sample FIFO consumer and two atomics
// (paused, master volume).

pub mod audio;
pub mod demux;
pub mod error;
pub mod fifo;
pub mod output;
pub mod scale;
pub mod video;
mod helpers; // internal, not re-exported

pub use audio::{device_format_for, AudioReader, DeviceFormat};
pub use demux::MediaInfo;
pub use error::{AudioDeviceError, DecodeError, OpenError, SeekError};
pub use fifo::{sample_fifo, FifoConsumer, FifoProducer};
pub use output::AudioOutput;
pub use video::VideoReader;

/// Initialise the underlying FFmpeg libraries. Safe to call more than once.
pub fn init() -> Result<(), ffmpeg_the_third::Error> {
    ffmpeg_the_third::init()
}
