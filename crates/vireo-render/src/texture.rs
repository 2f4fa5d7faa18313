// crates/vireo-render/src/texture.rs
//
// The video texture asset: one persistent RGBA8 GPU texture plus the
// decoder/demuxer/audio-output quartet for its file.
//
// Frame uploads reuse the same texture storage and bump a generation id
// instead of allocating a fresh GPU texture per frame. External code only
// ever compares renderer ids for equality, so the generation counter
// preserves the "new frame, new id" observable without the churn.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use vireo_media::{AudioOutput, AudioReader, MediaInfo, VideoReader};

use crate::gpu::GpuContext;

/// Creation parameters for the GPU texture backing a video asset.
#[derive(Clone, Copy, Debug)]
pub struct TextureSpecification {
    pub width:      u32,
    pub height:     u32,
    /// Linear mag filter when set; nearest otherwise. Min filter is always
    /// linear.
    pub use_linear: bool,
}

pub struct VideoTexture {
    spec:    TextureSpecification,
    path:    PathBuf,
    texture: wgpu::Texture,
    view:    Arc<wgpu::TextureView>,
    sampler: Arc<wgpu::Sampler>,

    info:  MediaInfo,
    video: Option<VideoReader>,
    audio: Option<AudioReader>,

    output: AudioOutput,
    /// Armed when an audio session must (re)configure and start the output
    /// device on its next read; cleared once the device is running.
    initialized_audio: bool,

    /// Reusable RGBA staging buffer, width * height * 4 bytes.
    scratch: Vec<u8>,

    /// Generation id of the frame currently in the texture; 0 = none live.
    renderer_id: u32,
    next_renderer_id: u32,

    /// Master volume, 0–100.
    volume: f32,
}

impl VideoTexture {
    /// Wrap an opened video reader in a GPU texture and upload the first
    /// frame as the initial thumbnail.
    pub fn new(
        ctx: &GpuContext,
        spec: TextureSpecification,
        path: PathBuf,
        video: VideoReader,
        info: MediaInfo,
    ) -> Self {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vireo.video_texture"),
            size: wgpu::Extent3d {
                width: spec.width,
                height: spec.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let mag_filter = if spec.use_linear {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let sampler = Arc::new(ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("vireo.video_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }));

        let scratch = vec![0u8; spec.width as usize * spec.height as usize * 4];

        let mut this = Self {
            spec,
            path,
            texture,
            view,
            sampler,
            info,
            video: Some(video),
            audio: None,
            output: AudioOutput::new(),
            initialized_audio: false,
            scratch,
            renderer_id: 0,
            next_renderer_id: 1,
            volume: 100.0,
        };

        // Initial thumbnail: one decoded frame, uploaded immediately.
        let mut pts = 0i64;
        let decoded = this
            .video
            .as_mut()
            .expect("video reader present at construction")
            .read_frame(&mut this.scratch, &mut pts, false);
        match decoded {
            Ok(()) => this.upload(ctx),
            Err(e) => log::warn!("[media] could not decode initial video frame: {e}"),
        }

        this
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn view(&self) -> &Arc<wgpu::TextureView> {
        &self.view
    }

    pub fn sampler(&self) -> &Arc<wgpu::Sampler> {
        &self.sampler
    }

    pub fn is_video_loaded(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_loaded_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Generation id of the live frame, 0 when none.
    pub fn renderer_id(&self) -> u32 {
        self.renderer_id
    }

    /// Last observed video packet duration in stream units; 0 until the
    /// first frame decodes and while the decoder is closed.
    pub fn video_packet_duration(&self) -> i64 {
        self.video.as_ref().map_or(0, |v| v.packet_duration())
    }

    pub fn audio_packet_duration(&self) -> i64 {
        self.audio.as_ref().map_or(0, |a| a.packet_duration())
    }

    pub fn reset_audio_packet_duration(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            audio.reset_packet_duration();
        }
    }

    /// Decode the next frame, upload it, and return the fresh renderer id.
    ///
    /// Reopens the decoder if it was closed (STOP mode and loop-around close
    /// it to rewind). `pts` is updated from the decoded frame unless
    /// `paused`, in which case the caller keeps its current timestamp.
    pub fn refresh_frame(&mut self, ctx: &GpuContext, pts: &mut i64, paused: bool) -> Result<u32> {
        if self.video.is_none() {
            let (video, info) = VideoReader::open(&self.path)
                .with_context(|| format!("reopening video {}", self.path.display()))?;
            self.video = Some(video);
            self.info = info;
        }

        self.video
            .as_mut()
            .expect("video reader opened above")
            .read_frame(&mut self.scratch, pts, paused)
            .context("decoding video frame")?;

        self.upload(ctx);
        Ok(self.renderer_id)
    }

    /// Retire a frame's renderer id. Must be called before the next
    /// `refresh_frame` for the old id; the texture storage itself is reused.
    pub fn delete_renderer_id(&mut self, renderer_id: u32) {
        if renderer_id != 0 && renderer_id == self.renderer_id {
            self.renderer_id = 0;
        }
    }

    fn upload(&mut self, ctx: &GpuContext) {
        ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.scratch,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.spec.width),
                rows_per_image: Some(self.spec.height),
            },
            wgpu::Extent3d {
                width: self.spec.width,
                height: self.spec.height,
                depth_or_array_layers: 1,
            },
        );

        self.renderer_id = self.next_renderer_id;
        self.next_renderer_id = self.next_renderer_id.checked_add(1).unwrap_or(1);
    }

    /// Open the audio side of the file without starting the device. Failure
    /// is non-fatal: the asset plays silent.
    pub fn preload_audio(&mut self) {
        if self.audio.is_some() {
            return;
        }
        match AudioReader::open(&self.path, self.info.time_base) {
            Ok(reader) => {
                self.audio = Some(reader);
                self.initialized_audio = true;
            }
            Err(e) => log::warn!(
                "[audio] no audio for {}: {e}",
                self.path.display()
            ),
        }
    }

    /// Per-draw audio service for the PLAY path.
    ///
    /// Opens the audio session if needed; on an armed session, optionally
    /// seeks to `ts` (video stream units), drains the stream into the FIFO,
    /// then configures and starts the output device once. Every call routes
    /// the paused latch to the callback.
    pub fn read_and_play_audio(&mut self, ts: i64, seek: bool, paused: bool) {
        self.preload_audio();
        let Some(audio) = self.audio.as_mut() else {
            return;
        };

        if self.initialized_audio {
            if seek {
                if let Err(e) = audio.seek(ts) {
                    log::warn!("[audio] could not seek audio to session start: {e}");
                    return;
                }
            }

            if let Err(e) = audio.read_frame() {
                log::warn!("[audio] could not decode audio stream: {e}");
                return;
            }

            if let Some(consumer) = audio.take_consumer() {
                let format = audio.device_format();
                let channels = audio.channels();
                let rate = audio.sample_rate();
                match self.output.init(format, channels, rate, consumer) {
                    Ok(()) => {
                        self.output.set_master_volume(self.volume / 100.0);
                        if let Err(e) = self.output.start() {
                            log::error!("[audio] could not start playback device: {e}");
                            self.output.uninit();
                        }
                    }
                    // Device failure falls back to silent playback for the
                    // session; decode state stays valid.
                    Err(e) => log::error!("[audio] could not open playback device: {e}"),
                }
            }

            self.initialized_audio = false;
        }

        self.output.set_paused(paused);
    }

    /// Seek the video stream to `ts` in stream units.
    pub fn seek_video(&mut self, ts: i64) -> Result<()> {
        self.video
            .as_mut()
            .context("video decoder is closed")?
            .seek(ts)?;
        Ok(())
    }

    /// Seek both streams to the same timestamp (video stream units) so a
    /// resume decodes the frame the pause landed on. `reset_audio` arms the
    /// next `read_and_play_audio` to rebuild the output device.
    pub fn seek_av(&mut self, ts: i64, reset_audio: bool) -> Result<()> {
        self.seek_video(ts)?;
        if let Some(audio) = self.audio.as_mut() {
            audio.seek(ts)?;
            if reset_audio && !self.initialized_audio {
                self.initialized_audio = true;
            }
        }
        Ok(())
    }

    /// Close the video decoder. The next `refresh_frame` reopens from the
    /// start of the container. Idempotent.
    pub fn close_video(&mut self) {
        self.video = None;
    }

    /// Stop and release the audio device and decode state. Idempotent.
    pub fn close_audio(&mut self) {
        self.output.stop();
        self.output.uninit();
        self.audio = None;
        self.initialized_audio = false;
    }

    pub fn volume_factor(&self) -> f32 {
        self.volume
    }

    /// Master volume in 0–100, applied to the running device immediately.
    pub fn set_volume_factor(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 100.0);
        self.output.set_master_volume(self.volume / 100.0);
    }
}

impl Drop for VideoTexture {
    fn drop(&mut self) {
        // Teardown order matters: silence the device before its FIFO goes.
        self.close_audio();
        self.close_video();
    }
}
