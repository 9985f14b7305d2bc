//! cpal stream lifetime management shared by capture and playback.
//!
//! `cpal::Stream` is not `Send` on every platform, so it cannot live inside
//! an async device object that moves between tokio workers.  Instead each
//! stream is built and owned by a dedicated OS thread:
//!
//! ```text
//! async caller ──spawn──▶ [stream thread] build + play ──ready (oneshot)──▶ caller
//!                                         park on stop channel
//! StreamThread::drop ──▶ stop sender dropped ──▶ thread wakes, drops stream
//! ```

use std::sync::mpsc;
use std::thread;

use thiserror::Error;
use tokio::sync::oneshot;

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors raised by the capture and playback devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no {0} device found on the default audio host")]
    NoDevice(&'static str),

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("capture is already recording")]
    AlreadyRecording,

    #[error("device has not been started")]
    NotStarted,

    #[error("audio stream thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// StreamThread
// ---------------------------------------------------------------------------

/// RAII guard for a cpal stream running on its own thread.
///
/// Dropping the guard (or calling [`stop`](Self::stop)) releases the stream.
/// The drop never blocks: the thread is signalled and left to finish.
pub struct StreamThread {
    stop: Option<mpsc::Sender<()>>,
}

impl StreamThread {
    /// Run `build` on a new thread and wait until the stream is playing.
    ///
    /// `build` returns the started stream plus any value the caller needs
    /// back (typically the negotiated sample rate and channel count).
    pub async fn spawn<F, T>(name: &str, build: F) -> Result<(Self, T), DeviceError>
    where
        F: FnOnce() -> Result<(cpal::Stream, T), DeviceError> + Send + 'static,
        T: Send + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match build() {
                Ok((stream, info)) => {
                    if ready_tx.send(Ok(info)).is_err() {
                        return;
                    }
                    // Blocks until every sender is gone.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| DeviceError::Thread(e.to_string()))?;

        let info = ready_rx
            .await
            .map_err(|_| DeviceError::Thread(format!("{name} exited before the stream started")))??;

        Ok((
            Self {
                stop: Some(stop_tx),
            },
            info,
        ))
    }

    /// Signal the thread to release its stream.  Idempotent.
    pub fn stop(&mut self) {
        self.stop.take();
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
