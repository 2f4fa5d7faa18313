// crates/vireo-media/src/output.rs
//
// Playback device bound to the sample FIFO. The cpal callback is the only
// code in the crate that runs on the real-time audio thread: it pops bytes
// from the FIFO, applies master volume, and pads with silence. It shares
// exactly two atomics with the scene thread (the paused latch and the
// volume), nothing else.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::DeviceFormat;
use crate::error::AudioDeviceError;
use crate::fifo::FifoConsumer;

/// Sample types the device callback can service.
///
/// `SILENCE` is the byte pattern the paused callback emits: unsigned 8-bit
/// audio is centred near 127, everything else at zero.
trait DeviceSample: bytemuck::Pod + cpal::SizedSample + 'static {
    const SILENCE: Self;
    fn scaled(self, volume: f32) -> Self;
}

impl DeviceSample for u8 {
    const SILENCE: Self = 127;
    fn scaled(self, volume: f32) -> Self {
        ((self as f32 - 128.0) * volume + 128.0).clamp(0.0, 255.0) as u8
    }
}

impl DeviceSample for i16 {
    const SILENCE: Self = 0;
    fn scaled(self, volume: f32) -> Self {
        (self as f32 * volume) as i16
    }
}

impl DeviceSample for i32 {
    const SILENCE: Self = 0;
    fn scaled(self, volume: f32) -> Self {
        (self as f64 * volume as f64) as i32
    }
}

impl DeviceSample for f32 {
    const SILENCE: Self = 0.0;
    fn scaled(self, volume: f32) -> Self {
        self * volume
    }
}

/// Thin capability over the default playback device.
///
/// Lifecycle: `init` then `start` on the first audible frame; `stop` then
/// `uninit` on close. `stop` and `uninit` are idempotent so teardown can run
/// from any state.
pub struct AudioOutput {
    stream: Option<cpal::Stream>,
    paused: Arc<AtomicBool>,
    volume: Arc<AtomicU32>,
}

impl AudioOutput {
    pub fn new() -> Self {
        Self {
            stream: None,
            paused: Arc::new(AtomicBool::new(false)),
            volume: Arc::new(AtomicU32::new(1.0_f32.to_bits())),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.stream.is_some()
    }

    /// Bind the FIFO consumer to a fresh output stream in the given format.
    /// Replaces any previous stream.
    pub fn init(
        &mut self,
        format: DeviceFormat,
        channels: u16,
        sample_rate: u32,
        fifo: FifoConsumer,
    ) -> Result<(), AudioDeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioDeviceError::NoDevice)?;
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match format {
            DeviceFormat::U8 => self.build_stream::<u8>(&device, &config, fifo)?,
            DeviceFormat::S16 => self.build_stream::<i16>(&device, &config, fifo)?,
            DeviceFormat::S32 => self.build_stream::<i32>(&device, &config, fifo)?,
            DeviceFormat::F32 => self.build_stream::<f32>(&device, &config, fifo)?,
        };

        self.stream = Some(stream);
        Ok(())
    }

    fn build_stream<T: DeviceSample>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut fifo: FifoConsumer,
    ) -> Result<cpal::Stream, AudioDeviceError> {
        let paused = Arc::clone(&self.paused);
        let volume = Arc::clone(&self.volume);

        // Real-time callback: no locks, no allocation, no logging. Underruns
        // and the paused state both come out as silence.
        let data_fn = move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if paused.load(Ordering::SeqCst) {
                data.fill(T::SILENCE);
                return; // paused does not drain the fifo
            }

            let read = {
                let bytes: &mut [u8] = bytemuck::cast_slice_mut(data);
                fifo.read_into(bytes)
            };
            let filled = read / std::mem::size_of::<T>();

            let vol = f32::from_bits(volume.load(Ordering::SeqCst));
            for sample in &mut data[..filled] {
                *sample = sample.scaled(vol);
            }
            for sample in &mut data[filled..] {
                *sample = T::SILENCE;
            }
        };

        let err_fn = |err| log::error!("[audio] output stream error: {err}");

        Ok(device.build_output_stream(config, data_fn, err_fn, None)?)
    }

    pub fn start(&self) -> Result<(), AudioDeviceError> {
        if let Some(stream) = &self.stream {
            stream.play()?;
        }
        Ok(())
    }

    /// Stop feeding the device. Safe to call repeatedly and without `init`.
    pub fn stop(&self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                log::warn!("[audio] could not pause output stream: {e}");
            }
        }
    }

    /// Release the device stream. The FIFO consumer bound to it is dropped.
    pub fn uninit(&mut self) {
        self.stream = None;
    }

    /// Latch read by the callback: while set, the callback emits silence and
    /// leaves the FIFO untouched.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn set_master_volume(&self, factor: f32) {
        let clamped = factor.clamp(0.0, 1.0);
        self.volume.store(clamped.to_bits(), Ordering::SeqCst);
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::SeqCst))
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_patterns_match_device_formats() {
        assert_eq!(u8::SILENCE, 127);
        assert_eq!(i16::SILENCE, 0);
        assert_eq!(i32::SILENCE, 0);
        assert_eq!(f32::SILENCE, 0.0);
    }

    #[test]
    fn volume_scaling_is_centred_for_u8() {
        // Full volume leaves samples alone.
        assert_eq!(200u8.scaled(1.0), 200);
        // Zero volume collapses to the midpoint, not to digital zero.
        assert_eq!(200u8.scaled(0.0), 128);
        assert_eq!(50u8.scaled(0.0), 128);
    }

    #[test]
    fn volume_scaling_attenuates_signed_and_float() {
        assert_eq!(1000i16.scaled(0.5), 500);
        assert_eq!(400_000i32.scaled(0.25), 100_000);
        assert_eq!(0.8f32.scaled(0.5), 0.4);
    }

    #[test]
    fn output_volume_is_clamped_to_unit_range() {
        let out = AudioOutput::new();
        out.set_master_volume(2.5);
        assert_eq!(out.master_volume(), 1.0);
        out.set_master_volume(-1.0);
        assert_eq!(out.master_volume(), 0.0);
        out.set_master_volume(0.37);
        assert_eq!(out.master_volume(), 0.37);
    }

    #[test]
    fn stop_and_uninit_are_safe_without_a_stream() {
        let mut out = AudioOutput::new();
        assert!(!out.is_initialized());
        out.stop();
        out.uninit();
        out.set_paused(true);
        assert!(out.start().is_ok());
    }
}
