// crates/vireo-media/src/fifo.rs
//
// Single-producer / single-consumer byte FIFO between the audio decoder
// (scene thread) and the output device callback (real-time thread).
//
// Samples are stored as raw interleaved bytes in the device format, so one
// code path serves u8/s16/s32/f32 alike. The consumer side never blocks and
// never allocates; the producer refuses to tear a frame across the ring's
// free space.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Writer half, owned by the audio decoder on the scene thread.
pub struct FifoProducer {
    prod: HeapProd<u8>,
}

/// Reader half, owned by the output device callback.
pub struct FifoConsumer {
    cons: HeapCons<u8>,
}

/// Allocate a FIFO holding `capacity` bytes of interleaved device-format
/// samples and split it into its two ends.
pub fn sample_fifo(capacity: usize) -> (FifoProducer, FifoConsumer) {
    let (prod, cons) = HeapRb::<u8>::new(capacity.max(1)).split();
    (FifoProducer { prod }, FifoConsumer { cons })
}

impl FifoProducer {
    /// Append one whole resampled frame. Returns the bytes written, either
    /// `frame.len()` or 0; a frame that does not fit is dropped rather than
    /// torn, so the reader only ever observes whole frames.
    pub fn write_frame(&mut self, frame: &[u8]) -> usize {
        if self.prod.vacant_len() < frame.len() {
            log::warn!(
                "[media] audio fifo full, dropping {} byte frame",
                frame.len()
            );
            return 0;
        }
        self.prod.push_slice(frame)
    }

    pub fn occupied_bytes(&self) -> usize {
        self.prod.occupied_len()
    }
}

impl FifoConsumer {
    /// Pop up to `out.len()` bytes into `out`, returning how many were
    /// written. Lock-free and allocation-free; safe on a real-time thread.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        self.cons.pop_slice(out)
    }

    pub fn occupied_bytes(&self) -> usize {
        self.cons.occupied_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_bytes() {
        let (mut prod, mut cons) = sample_fifo(64);
        // One stereo s16 frame of 4 samples: 4 * 2 * 2 bytes.
        let frame: Vec<u8> = (0u8..16).collect();
        assert_eq!(prod.write_frame(&frame), 16);

        let mut out = [0u8; 16];
        assert_eq!(cons.read_into(&mut out), 16);
        assert_eq!(&out[..], &frame[..]);
    }

    #[test]
    fn bytes_written_match_samples_times_channels_times_width() {
        let samples = 128;
        let channels = 2;
        let bytes_per_sample = 2; // s16
        let frame = vec![0u8; samples * channels * bytes_per_sample];

        let (mut prod, _cons) = sample_fifo(frame.len());
        assert_eq!(prod.write_frame(&frame), frame.len());
        assert_eq!(prod.occupied_bytes(), samples * channels * bytes_per_sample);
    }

    #[test]
    fn oversized_frame_is_dropped_not_torn() {
        let (mut prod, mut cons) = sample_fifo(8);
        assert_eq!(prod.write_frame(&[1u8; 16]), 0);
        assert_eq!(prod.occupied_bytes(), 0);

        let mut out = [0u8; 16];
        assert_eq!(cons.read_into(&mut out), 0);
    }

    #[test]
    fn short_read_returns_what_is_available() {
        let (mut prod, mut cons) = sample_fifo(32);
        prod.write_frame(&[7u8; 10]);

        let mut out = [0u8; 32];
        assert_eq!(cons.read_into(&mut out), 10);
        assert!(out[..10].iter().all(|&b| b == 7));
    }

    #[test]
    fn consumer_drains_across_multiple_callbacks() {
        let (mut prod, mut cons) = sample_fifo(64);
        prod.write_frame(&[1u8; 48]);

        let mut chunk = [0u8; 16];
        assert_eq!(cons.read_into(&mut chunk), 16);
        assert_eq!(cons.read_into(&mut chunk), 16);
        assert_eq!(cons.read_into(&mut chunk), 16);
        assert_eq!(cons.read_into(&mut chunk), 0);
    }
}
