//! [`AudioFrame`] and the [`FrameAssembler`] that cuts device audio into
//! fixed-length frames.

use super::resample::{downmix, f32_to_pcm16, StreamResampler};

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// A chunk of mono PCM16 audio at a fixed sample rate.
///
/// Produced by capture at a steady interval and consumed immediately by the
/// realtime channel; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Little-endian byte layout used on the wire.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Decode little-endian PCM16 bytes.  A trailing odd byte is ignored.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, sample_rate)
    }
}

// ---------------------------------------------------------------------------
// FrameAssembler
// ---------------------------------------------------------------------------

/// Converts raw device buffers into fixed-size [`AudioFrame`]s.
///
/// ```text
/// interleaved f32 @ device rate ─▶ downmix ─▶ resample ─▶ PCM16 ─▶ N-sample frames
/// ```
///
/// Samples that do not fill a whole frame are held until the next
/// [`push`](Self::push) or released by [`flush`](Self::flush).  The
/// resampler keeps its phase across pushes, so frames stay at the target
/// rate whatever buffer size the device uses.
pub struct FrameAssembler {
    resampler: StreamResampler,
    channels: u16,
    target_rate: u32,
    frame_samples: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    pub fn new(device_rate: u32, channels: u16, target_rate: u32, frame_samples: usize) -> Self {
        Self {
            resampler: StreamResampler::new(device_rate, target_rate),
            channels,
            target_rate,
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples),
        }
    }

    /// Feed one device buffer and return every frame that became complete.
    pub fn push(&mut self, data: &[f32]) -> Vec<AudioFrame> {
        let mono = downmix(data, self.channels);
        let converted = self.resampler.process(&mono);
        self.pending.extend(f32_to_pcm16(&converted));

        let whole = self.pending.len() / self.frame_samples * self.frame_samples;
        let ready: Vec<i16> = self.pending.drain(..whole).collect();
        ready
            .chunks(self.frame_samples)
            .map(|chunk| AudioFrame::new(chunk.to_vec(), self.target_rate))
            .collect()
    }

    /// Release the partial frame, if any.
    pub fn flush(&mut self) -> Option<AudioFrame> {
        if self.pending.is_empty() {
            return None;
        }
        let samples = std::mem::take(&mut self.pending);
        Some(AudioFrame::new(samples, self.target_rate))
    }

    /// Number of samples waiting for a full frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
