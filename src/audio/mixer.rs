//! Per-track FIFO queues mixed into one output stream.
//!
//! Every response streamed by the remote service gets its own track, keyed by
//! the response item identifier.  Samples inside one track are played strictly
//! in the order they were enqueued; concurrent tracks are summed so audio of
//! one response is never spliced into another's.
//!
//! # Example
//!
//! ```rust
//! use voice_chat::audio::TrackMixer;
//!
//! let mut mixer = TrackMixer::new();
//! mixer.enqueue("r1", &[0.25, 0.25]);
//! mixer.enqueue("r2", &[0.5]);
//!
//! let mut out = [0.0_f32; 3];
//! mixer.fill(&mut out);
//! assert_eq!(out, [0.75, 0.25, 0.0]);
//! ```

use std::collections::VecDeque;

struct Track {
    id: String,
    queue: VecDeque<f32>,
}

/// Mono sample mixer with independent FIFO tracks.
#[derive(Default)]
pub struct TrackMixer {
    tracks: Vec<Track>,
}

impl TrackMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `samples` to the track `track_id`, creating it when unseen.
    pub fn enqueue(&mut self, track_id: &str, samples: &[f32]) {
        match self.tracks.iter_mut().find(|t| t.id == track_id) {
            Some(track) => track.queue.extend(samples),
            None => self.tracks.push(Track {
                id: track_id.to_string(),
                queue: samples.iter().copied().collect(),
            }),
        }
    }

    /// Write the next `out.len()` mixed samples into `out`.
    ///
    /// Tracks are summed and the result clamped to `[-1.0, 1.0]`; slots with
    /// no queued audio are silent.  Drained tracks are removed.
    pub fn fill(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        for track in &mut self.tracks {
            let n = out.len().min(track.queue.len());
            for (slot, sample) in out.iter_mut().zip(track.queue.drain(..n)) {
                *slot += sample;
            }
        }
        self.tracks.retain(|t| !t.queue.is_empty());

        for slot in out.iter_mut() {
            *slot = slot.clamp(-1.0, 1.0);
        }
    }

    /// Discard every queued sample on every track.  Returns how many samples
    /// were dropped.
    pub fn interrupt(&mut self) -> usize {
        let dropped = self.queued();
        self.tracks.clear();
        dropped
    }

    /// Total number of samples waiting across all tracks.
    pub fn queued(&self) -> usize {
        self.tracks.iter().map(|t| t.queue.len()).sum()
    }

    /// Whether `track_id` still has audio queued.
    pub fn contains(&self, track_id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == track_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_track_plays_in_enqueue_order() {
        let mut mixer = TrackMixer::new();
        mixer.enqueue("r1", &[0.1, 0.2]);
        mixer.enqueue("r1", &[0.3]);

        let mut out = [0.0; 2];
        mixer.fill(&mut out);
        assert_eq!(out, [0.1, 0.2]);

        mixer.fill(&mut out);
        assert_eq!(out, [0.3, 0.0]);
        assert!(!mixer.contains("r1"));
    }

    #[test]
    fn interleaved_enqueues_keep_per_track_order() {
        let mut mixer = TrackMixer::new();
        mixer.enqueue("a", &[0.01]);
        mixer.enqueue("b", &[0.1]);
        mixer.enqueue("a", &[0.02]);
        mixer.enqueue("b", &[0.2]);

        let mut out = [0.0; 2];
        mixer.fill(&mut out);
        assert!((out[0] - 0.11).abs() < 1e-6);
        assert!((out[1] - 0.22).abs() < 1e-6);
    }

    #[test]
    fn partial_fill_leaves_remainder_queued() {
        let mut mixer = TrackMixer::new();
        mixer.enqueue("r1", &[0.1, 0.2, 0.3, 0.4]);

        let mut out = [0.0; 3];
        mixer.fill(&mut out);
        assert_eq!(out, [0.1, 0.2, 0.3]);
        assert_eq!(mixer.queued(), 1);
    }

    #[test]
    fn mix_is_clamped() {
        let mut mixer = TrackMixer::new();
        mixer.enqueue("a", &[0.8, -0.8]);
        mixer.enqueue("b", &[0.8, -0.8]);

        let mut out = [0.0; 2];
        mixer.fill(&mut out);
        assert_eq!(out, [1.0, -1.0]);
    }

    #[test]
    fn interrupt_discards_everything() {
        let mut mixer = TrackMixer::new();
        mixer.enqueue("a", &[0.1; 10]);
        mixer.enqueue("b", &[0.1; 5]);

        assert_eq!(mixer.interrupt(), 15);
        assert_eq!(mixer.queued(), 0);

        let mut out = [1.0; 4];
        mixer.fill(&mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn track_reused_after_draining_starts_fresh() {
        let mut mixer = TrackMixer::new();
        mixer.enqueue("r1", &[0.5]);
        let mut out = [0.0; 1];
        mixer.fill(&mut out);

        mixer.enqueue("r1", &[0.25]);
        mixer.fill(&mut out);
        assert_eq!(out, [0.25]);
    }
}
