// crates/vireo-media/src/audio.rs
//
// Stateful per-file audio decoder: its own demux cursor (decoupling the
// audio and video read positions makes seek handling symmetric), a codec
// context, a format-only resampler, and the producer half of the sample
// FIFO the device callback drains.

use std::path::Path;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::error::EAGAIN;
use ffmpeg::Rational;

use crate::demux;
use crate::error::{DecodeError, OpenError, SeekError};
use crate::fifo::{sample_fifo, FifoConsumer, FifoProducer};
use crate::helpers::seek::seek_backward_secs;
use vireo_core::helpers::time::AV_TIME_BASE;

/// Sample formats the playback device is fed with. Planar source formats are
/// interleaved by the resampler; wide formats are narrowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceFormat {
    U8,
    S16,
    S32,
    F32,
}

impl DeviceFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            DeviceFormat::U8 => 1,
            DeviceFormat::S16 => 2,
            DeviceFormat::S32 => 4,
            DeviceFormat::F32 => 4,
        }
    }

    /// The packed ffmpeg sample format the resampler converts into.
    pub fn as_ffmpeg(self) -> Sample {
        match self {
            DeviceFormat::U8 => Sample::U8(SampleType::Packed),
            DeviceFormat::S16 => Sample::I16(SampleType::Packed),
            DeviceFormat::S32 => Sample::I32(SampleType::Packed),
            DeviceFormat::F32 => Sample::F32(SampleType::Packed),
        }
    }
}

/// Map a stream's native sample format onto the device format table.
///
/// | src (planar or packed) | device |
/// |------------------------|--------|
/// | U8                     | u8     |
/// | S16                    | s16    |
/// | S32, S64               | s32    |
/// | FLT, DBL               | f32    |
pub fn device_format_for(src: Sample) -> Option<DeviceFormat> {
    match src {
        Sample::U8(_) => Some(DeviceFormat::U8),
        Sample::I16(_) => Some(DeviceFormat::S16),
        Sample::I32(_) | Sample::I64(_) => Some(DeviceFormat::S32),
        Sample::F32(_) | Sample::F64(_) => Some(DeviceFormat::F32),
        Sample::None => None,
    }
}

/// Bytes needed to buffer `secs` seconds of interleaved samples, with one
/// second of slack so the tail frame always fits.
fn fifo_capacity_for(secs: f64, sample_rate: u32, channels: u16, bytes_per_sample: usize) -> usize {
    let secs = secs.max(0.0) + 1.0;
    (secs * sample_rate as f64) as usize * channels as usize * bytes_per_sample
}

pub struct AudioReader {
    ictx:             ffmpeg::format::context::Input,
    decoder:          ffmpeg::decoder::Audio,
    stream_index:     usize,
    /// Audio stream time base.
    time_base:        Rational,
    /// Time base seek targets arrive in: callers always pass video PTS.
    source_time_base: Rational,
    device_format:    DeviceFormat,
    channels:         u16,
    sample_rate:      u32,
    frame:            ffmpeg::util::frame::Audio,
    fifo_capacity:    usize,
    fifo:             Option<FifoProducer>,
    /// Consumer half created together with the producer; the output device
    /// takes it when it starts.
    pending_consumer: Option<FifoConsumer>,
    packet_duration:  i64,
}

impl AudioReader {
    /// Open `path` and bind a decoder to its first decodable audio stream.
    ///
    /// Unlike the video open, a missing audio stream is an error here;
    /// callers treat audio as optional and log instead of failing the asset.
    pub fn open(path: &Path, source_time_base: Rational) -> Result<Self, OpenError> {
        let ictx = demux::open_input(path)?;
        let stream_index = demux::find_decodable_stream(&ictx, ffmpeg::media::Type::Audio)
            .ok_or(OpenError::NoAudioStream)?;

        let (decoder, time_base) = {
            let stream = ictx.stream(stream_index).ok_or(OpenError::NoAudioStream)?;
            let codec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(OpenError::CodecOpenFailed)?;
            let decoder = codec_ctx
                .decoder()
                .audio()
                .map_err(OpenError::CodecOpenFailed)?;
            (decoder, stream.time_base())
        };

        let device_format =
            device_format_for(decoder.format()).ok_or(OpenError::CodecUnavailable)?;
        let channels = decoder.channels();
        let sample_rate = decoder.rate();

        let duration_secs = if ictx.duration() >= 0 {
            ictx.duration() as f64 / AV_TIME_BASE as f64
        } else {
            0.0
        };
        let fifo_capacity = fifo_capacity_for(
            duration_secs,
            sample_rate,
            channels,
            device_format.bytes_per_sample(),
        );

        Ok(Self {
            ictx,
            decoder,
            stream_index,
            time_base,
            source_time_base,
            device_format,
            channels,
            sample_rate,
            frame: ffmpeg::util::frame::Audio::empty(),
            fifo_capacity,
            fifo: None,
            pending_consumer: None,
            packet_duration: 0,
        })
    }

    pub fn device_format(&self) -> DeviceFormat {
        self.device_format
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn packet_duration(&self) -> i64 {
        self.packet_duration
    }

    pub fn reset_packet_duration(&mut self) {
        self.packet_duration = 0;
    }

    /// Consumer half of the sample FIFO, available once after the first
    /// `read_frame` allocated the ring.
    pub fn take_consumer(&mut self) -> Option<FifoConsumer> {
        self.pending_consumer.take()
    }

    /// Decode and resample the remaining audio packets into the FIFO.
    ///
    /// Only the sample format changes during resampling; the channel layout
    /// and rate are preserved, so `bytes = samples * channels *
    /// bytes_per_sample(device_format)` holds for every frame written.
    pub fn read_frame(&mut self) -> Result<(), DecodeError> {
        let mut resampler = ffmpeg::software::resampling::Context::get(
            self.decoder.format(),
            self.decoder.channel_layout(),
            self.decoder.rate(),
            self.device_format.as_ffmpeg(),
            self.decoder.channel_layout(),
            self.decoder.rate(),
        )
        .map_err(DecodeError::ResamplerUnavailable)?;

        if self.fifo.is_none() {
            let (producer, consumer) = sample_fifo(self.fifo_capacity);
            self.fifo = Some(producer);
            self.pending_consumer = Some(consumer);
        }
        let fifo = self.fifo.as_mut().expect("fifo allocated above");

        let channels = self.channels as usize;
        let bytes_per_sample = self.device_format.bytes_per_sample();

        for (stream, packet) in self.ictx.packets().flatten() {
            if stream.index() != self.stream_index {
                continue;
            }

            if self.packet_duration != packet.duration() && packet.duration() != 0 {
                self.packet_duration = packet.duration();
            }

            match self.decoder.send_packet(&packet) {
                Ok(()) => {}
                Err(ffmpeg::Error::Other { errno: EAGAIN }) => {}
                Err(e) => {
                    log::warn!("[media] audio packet rejected: {e}");
                    continue;
                }
            }

            loop {
                match self.decoder.receive_frame(&mut self.frame) {
                    Ok(()) => {
                        let mut resampled = ffmpeg::util::frame::Audio::empty();
                        resampler
                            .run(&self.frame, &mut resampled)
                            .map_err(DecodeError::ResampleFailed)?;

                        let bytes = resampled.samples() * channels * bytes_per_sample;
                        fifo.write_frame(&resampled.data(0)[..bytes]);
                    }
                    Err(ffmpeg::Error::Other { errno: EAGAIN }) | Err(ffmpeg::Error::Eof) => break,
                    Err(e) => return Err(DecodeError::ReceiveFrame(e)),
                }
            }
        }

        Ok(())
    }

    /// Seek backward to the keyframe preceding `ts` (video stream units),
    /// flush the codec, then decode and discard one frame.
    pub fn seek(&mut self, ts: i64) -> Result<(), SeekError> {
        let target_secs = ts as f64 * self.source_time_base.numerator() as f64
            / self.source_time_base.denominator() as f64;
        seek_backward_secs(&mut self.ictx, target_secs, "audio")?;
        self.decoder.flush();
        self.discard_one_frame()?;
        Ok(())
    }

    fn discard_one_frame(&mut self) -> Result<(), DecodeError> {
        for (stream, packet) in self.ictx.packets().flatten() {
            if stream.index() != self.stream_index {
                continue;
            }

            self.decoder
                .send_packet(&packet)
                .map_err(DecodeError::SendPacket)?;

            match self.decoder.receive_frame(&mut self.frame) {
                Ok(()) => return Ok(()),
                Err(ffmpeg::Error::Other { errno: EAGAIN }) | Err(ffmpeg::Error::Eof) => continue,
                Err(e) => return Err(DecodeError::ReceiveFrame(e)),
            }
        }
        Ok(())
    }

    /// Audio stream time base, exposed for diagnostics.
    pub fn time_base(&self) -> Rational {
        self.time_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_table_maps_planar_and_packed_alike() {
        for ty in [SampleType::Packed, SampleType::Planar] {
            assert_eq!(device_format_for(Sample::U8(ty)), Some(DeviceFormat::U8));
            assert_eq!(device_format_for(Sample::I16(ty)), Some(DeviceFormat::S16));
            assert_eq!(device_format_for(Sample::I32(ty)), Some(DeviceFormat::S32));
            assert_eq!(device_format_for(Sample::I64(ty)), Some(DeviceFormat::S32));
            assert_eq!(device_format_for(Sample::F32(ty)), Some(DeviceFormat::F32));
            assert_eq!(device_format_for(Sample::F64(ty)), Some(DeviceFormat::F32));
        }
        assert_eq!(device_format_for(Sample::None), None);
    }

    #[test]
    fn device_formats_resample_to_packed() {
        assert_eq!(
            DeviceFormat::S16.as_ffmpeg(),
            Sample::I16(SampleType::Packed)
        );
        assert_eq!(
            DeviceFormat::F32.as_ffmpeg(),
            Sample::F32(SampleType::Packed)
        );
    }

    #[test]
    fn sample_widths_match_the_wire_format() {
        assert_eq!(DeviceFormat::U8.bytes_per_sample(), 1);
        assert_eq!(DeviceFormat::S16.bytes_per_sample(), 2);
        assert_eq!(DeviceFormat::S32.bytes_per_sample(), 4);
        assert_eq!(DeviceFormat::F32.bytes_per_sample(), 4);
    }

    #[test]
    fn fifo_capacity_covers_the_whole_track_plus_slack() {
        // 2 s stereo s16 at 48 kHz: (2 + 1) * 48000 * 2 * 2 bytes.
        assert_eq!(fifo_capacity_for(2.0, 48_000, 2, 2), 576_000);
        // Unknown duration still leaves the slack second.
        assert_eq!(fifo_capacity_for(0.0, 44_100, 1, 4), 176_400);
    }
}
