// crates/vireo-media/src/video.rs
//
// Stateful per-file video decoder: one demux cursor, one codec context, one
// reusable frame. Decodes exactly one presentation-stamped frame per
// read_frame call; the playback controller decides when to call it.

use std::path::Path;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::error::EAGAIN;
use ffmpeg::Rational;

use crate::demux::{self, MediaInfo};
use crate::error::{DecodeError, OpenError, SeekError};
use crate::helpers::seek::seek_backward_secs;
use crate::scale;

pub struct VideoReader {
    ictx:            ffmpeg::format::context::Input,
    decoder:         ffmpeg::decoder::Video,
    stream_index:    usize,
    time_base:       Rational,
    width:           u32,
    height:          u32,
    /// Reusable decode target. After the first successful decode it always
    /// holds the most recent frame, which read_frame re-serves at EOF.
    frame:           ffmpeg::util::frame::video::Video,
    /// Last observed frame duration in stream units, learned lazily from
    /// the first successfully decoded frame. Translates scrub frame indices
    /// into seek timestamps.
    packet_duration: i64,
}

impl VideoReader {
    /// Open `path` and bind a decoder to its first decodable video stream.
    pub fn open(path: &Path) -> Result<(Self, MediaInfo), OpenError> {
        let ictx = demux::open_input(path)?;
        let info = demux::probe(&ictx, path)?;

        let decoder = {
            let stream = ictx
                .stream(info.video_stream_index)
                .ok_or(OpenError::NoVideoStream)?;
            let codec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(OpenError::CodecOpenFailed)?;
            codec_ctx
                .decoder()
                .video()
                .map_err(OpenError::CodecOpenFailed)?
        };

        Ok((
            Self {
                ictx,
                decoder,
                stream_index: info.video_stream_index,
                time_base: info.time_base,
                width: info.width,
                height: info.height,
                frame: ffmpeg::util::frame::video::Video::empty(),
                packet_duration: 0,
            },
            info,
        ))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn packet_duration(&self) -> i64 {
        self.packet_duration
    }

    /// Seconds represented by `ts` in this stream's time base.
    pub fn ts_to_secs(&self, ts: i64) -> f64 {
        ts as f64 * self.time_base.numerator() as f64 / self.time_base.denominator() as f64
    }

    /// Decode the next frame and convert it to packed RGBA in `out`.
    ///
    /// Writes the frame's PTS to `pts` unless `paused` is set, in which case
    /// the caller keeps showing its current timestamp. At end of stream the
    /// most recent frame is re-served; it is an error only if no frame was
    /// ever decoded.
    pub fn read_frame(
        &mut self,
        out: &mut [u8],
        pts: &mut i64,
        paused: bool,
    ) -> Result<(), DecodeError> {
        let mut got_frame = false;

        for (stream, mut packet) in self.ictx.packets().flatten() {
            packet.rescale_ts(stream.time_base(), self.time_base);
            if stream.index() != self.stream_index {
                continue;
            }

            self.decoder
                .send_packet(&packet)
                .map_err(DecodeError::SendPacket)?;

            match self.decoder.receive_frame(&mut self.frame) {
                Ok(()) => {
                    // The duration comes from the decoded frame, not the
                    // packet: with reordered or decoder-duplicated frames the
                    // two diverge, and scrub targets are frame-sized steps.
                    if self.packet_duration != self.frame.duration() {
                        self.packet_duration = self.frame.duration();
                    }
                    got_frame = true;
                    break;
                }
                Err(ffmpeg::Error::Other { errno: EAGAIN }) | Err(ffmpeg::Error::Eof) => continue,
                Err(e) => return Err(DecodeError::ReceiveFrame(e)),
            }
        }

        if !got_frame && self.frame.width() == 0 {
            return Err(DecodeError::EndOfStream);
        }

        if !paused {
            *pts = self.frame.pts().unwrap_or(*pts);
        }

        scale::scale_frame_to_rgba(&self.frame, self.width, self.height, out)
    }

    /// Seek backward to the keyframe preceding `ts` (stream units), flush the
    /// codec, then decode and discard one frame so the next `read_frame`
    /// yields the first frame at or after the target.
    pub fn seek(&mut self, ts: i64) -> Result<(), SeekError> {
        let target_secs = self.ts_to_secs(ts);
        seek_backward_secs(&mut self.ictx, target_secs, "video")?;
        self.decoder.flush();
        self.discard_one_frame()?;
        Ok(())
    }

    /// The container seek takes effect one frame late: decode one frame here
    /// so the caller's next read lands where it asked.
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
}
