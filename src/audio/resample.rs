//! Sample format, channel and rate conversions.
//!
//! The realtime service speaks **24 kHz mono PCM16** while devices hand out
//! interleaved `f32` at whatever rate they prefer.  Capture and playback
//! meet in the middle with these helpers:
//!
//! 1. [`downmix`] — interleaved channels to mono.
//! 2. [`StreamResampler`] — linear interpolation between any two rates,
//!    continuous across chunk boundaries.
//! 3. [`f32_to_pcm16`] / [`pcm16_to_f32`] — sample format conversion.

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging channels.
///
/// * `channels == 1` returns the input as an owned `Vec`.
/// * `channels == 0` returns an empty vector.
/// * A trailing partial frame is dropped.
///
/// # Example
///
/// ```rust
/// use voice_chat::audio::downmix;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Rate
// ---------------------------------------------------------------------------

/// Streaming linear-interpolation resampler for mono audio.
///
/// Device buffers and audio deltas arrive in arbitrary sizes, so the read
/// position and the last input sample carry over between
/// [`process`](Self::process) calls.  Feeding a signal in pieces yields
/// exactly the samples a single call over the whole signal would.
///
/// Positions are kept as integers in units of `1 / to_rate` input samples,
/// so long streams never drift.  Output sample `k` sits at input position
/// `k * from_rate / to_rate`; it is emitted once the input sample after it
/// has arrived.
///
/// ```rust
/// use voice_chat::audio::StreamResampler;
///
/// let mut rs = StreamResampler::new(48_000, 24_000);
/// let mut out = rs.process(&[0.5_f32; 300]);
/// out.extend(rs.process(&[0.5_f32; 181]));
/// assert_eq!(out.len(), 240);
/// ```
#[derive(Debug, Clone)]
pub struct StreamResampler {
    from_rate: i64,
    to_rate: i64,
    /// Position of the next output sample relative to the start of the
    /// upcoming input chunk, in `1 / to_rate` input samples.  Ranges down to
    /// `-to_rate`, which addresses `last`.
    next: i64,
    /// Final sample of the previous chunk.
    last: Option<f32>,
}

impl StreamResampler {
    /// Zero or equal rates pass audio through unchanged.
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate: from_rate as i64,
            to_rate: to_rate as i64,
            next: 0,
            last: None,
        }
    }

    fn is_passthrough(&self) -> bool {
        self.from_rate == self.to_rate || self.from_rate == 0 || self.to_rate == 0
    }

    /// Resample the next chunk of the stream.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }
        let Some(&tail) = input.last() else {
            return Vec::new();
        };

        let n = input.len() as i64;
        let estimate = (n * self.to_rate / self.from_rate + 1) as usize;
        let mut out = Vec::with_capacity(estimate);

        loop {
            let idx = self.next.div_euclid(self.to_rate);
            if idx + 1 >= n {
                break;
            }
            let next = input[(idx + 1) as usize];
            let current = if idx < 0 {
                self.last.unwrap_or(next)
            } else {
                input[idx as usize]
            };
            let frac = self.next.rem_euclid(self.to_rate) as f32 / self.to_rate as f32;
            out.push(current + (next - current) * frac);
            self.next += self.from_rate;
        }

        self.next -= n * self.to_rate;
        self.last = Some(tail);
        out
    }
}

// ---------------------------------------------------------------------------
// Sample format
// ---------------------------------------------------------------------------

/// Convert `[-1.0, 1.0]` floats to PCM16, clamping out-of-range input.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

/// Convert PCM16 to floats in `[-1.0, 1.0]`.
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| (s as f32 / i16::MAX as f32).max(-1.0))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- channels ----------------------------------------------------------

    #[test]
    fn downmix_mono_is_copy() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix(&input, 1), input);
    }

    #[test]
    fn downmix_two_channel() {
        let out = downmix(&[1.0_f32, -1.0, 0.5, 0.5], 2);
        assert_eq!(out.len(), 2);
        assert!(out[0].abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn downmix_drops_partial_frame() {
        let out = downmix(&[0.2_f32, 0.2, 0.9], 2);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn downmix_zero_channels() {
        assert!(downmix(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- rate --------------------------------------------------------------

    fn sine(len: usize, freq: f32, rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn same_rate_is_passthrough() {
        let input: Vec<f32> = (0..240).map(|i| i as f32 / 240.0).collect();
        let mut rs = StreamResampler::new(24_000, 24_000);
        assert_eq!(rs.process(&input), input);
    }

    #[test]
    fn empty_chunk_yields_nothing() {
        let mut rs = StreamResampler::new(48_000, 24_000);
        assert!(rs.process(&[]).is_empty());
        assert_eq!(rs.process(&[0.5_f32; 480]).len(), 240);
    }

    #[test]
    fn one_second_44100_gives_exactly_24000() {
        let mut rs = StreamResampler::new(44_100, 24_000);
        let out = rs.process(&sine(44_100, 440.0, 44_100));
        assert_eq!(out.len(), 24_000);
    }

    #[test]
    fn chunked_stream_matches_single_pass() {
        // 44.1 kHz device buffers of 512 do not divide evenly into 24 kHz.
        let input = sine(44_100, 440.0, 44_100);
        let whole = StreamResampler::new(44_100, 24_000).process(&input);

        let mut rs = StreamResampler::new(44_100, 24_000);
        let streamed: Vec<f32> = input.chunks(512).flat_map(|c| rs.process(c)).collect();

        assert_eq!(streamed.len(), whole.len());
        let max_err = streamed
            .iter()
            .zip(&whole)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_err < 1e-6, "chunked output diverged by {max_err}");
    }

    #[test]
    fn upsampling_across_chunks_matches_single_pass() {
        let input = sine(2_400, 200.0, 24_000);
        let whole = StreamResampler::new(24_000, 44_100).process(&input);

        let mut rs = StreamResampler::new(24_000, 44_100);
        let mut streamed = Vec::new();
        let mut offset = 0;
        for size in [1_usize, 7, 100, 333, 959].iter().cycle() {
            if offset >= input.len() {
                break;
            }
            let end = (offset + size).min(input.len());
            streamed.extend(rs.process(&input[offset..end]));
            offset = end;
        }

        assert_eq!(streamed.len(), whole.len());
        for (a, b) in streamed.iter().zip(&whole) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn constant_signal_keeps_amplitude() {
        let mut rs = StreamResampler::new(44_100, 24_000);
        for &s in &rs.process(&[0.5_f32; 441]) {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn interpolates_between_samples_and_chunks() {
        // Doubling the rate inserts midpoints, including across the boundary.
        let mut rs = StreamResampler::new(1, 2);
        assert_eq!(rs.process(&[0.0, 1.0]), vec![0.0, 0.5]);
        assert_eq!(rs.process(&[0.0]), vec![1.0, 0.5]);
    }

    // ---- format ------------------------------------------------------------

    #[test]
    fn pcm16_conversion_clamps() {
        assert_eq!(f32_to_pcm16(&[0.0, 1.0, -1.0, 2.0, -2.0]), vec![
            0,
            i16::MAX,
            -i16::MAX,
            i16::MAX,
            -i16::MAX
        ]);
    }

    #[test]
    fn pcm16_to_f32_range() {
        let out = pcm16_to_f32(&[0, i16::MAX, i16::MIN]);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 1.0).abs() < 1e-6);
        assert_eq!(out[2], -1.0);
    }
}
