//! In-memory capture, playback and channel doubles for session tests.
//!
//! All three write to one [`CallLog`] so tests can assert the exact order of
//! calls across devices.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::{AudioFrame, CaptureDevice, DeviceError, FrameSink, PlaybackDevice};
use crate::realtime::{
    ChannelError, ChannelEvent, ChannelState, ConversationChannel, SessionParameters,
};
use crate::credential::Credential;

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of the first call equal to `call`.
    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ---------------------------------------------------------------------------
// FakeCapture
// ---------------------------------------------------------------------------

/// Test-side handle feeding frames into the capture sink.
#[derive(Clone, Default)]
pub struct Microphone(pub Arc<Mutex<Option<FrameSink>>>);

impl Microphone {
    /// Deliver `frame` as if the audio thread produced it.  Returns `false`
    /// when capture is not recording.
    pub fn speak(&self, frame: AudioFrame) -> bool {
        match self.0.lock().unwrap().as_mut() {
            Some(sink) => {
                sink(frame);
                true
            }
            None => false,
        }
    }
}

pub struct FakeCapture {
    pub log: CallLog,
    pub mic: Microphone,
    pub fail_begin: bool,
}

#[async_trait]
impl CaptureDevice for FakeCapture {
    async fn begin(&mut self) -> Result<(), DeviceError> {
        self.log.push("capture.begin");
        if self.fail_begin {
            return Err(DeviceError::NoDevice("input"));
        }
        Ok(())
    }

    async fn record(&mut self, on_frame: FrameSink) -> Result<(), DeviceError> {
        self.log.push("capture.record");
        let mut sink = self.mic.0.lock().unwrap();
        if sink.is_some() {
            return Err(DeviceError::AlreadyRecording);
        }
        *sink = Some(on_frame);
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), DeviceError> {
        self.log.push("capture.pause");
        self.mic.0.lock().unwrap().take();
        Ok(())
    }

    async fn end(&mut self) -> Result<(), DeviceError> {
        self.log.push("capture.end");
        self.mic.0.lock().unwrap().take();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakePlayback
// ---------------------------------------------------------------------------

pub struct FakePlayback {
    pub log: CallLog,
    pub fail_connect: bool,
    /// Makes `interrupt` return an error, to exercise best-effort teardown.
    pub fail_interrupt: bool,
}

#[async_trait]
impl PlaybackDevice for FakePlayback {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        self.log.push("playback.connect");
        if self.fail_connect {
            return Err(DeviceError::NoDevice("output"));
        }
        Ok(())
    }

    fn enqueue(&mut self, samples: &[i16], track_id: &str) {
        self.log.push(format!("playback.enqueue({track_id},{samples:?})"));
    }

    async fn interrupt(&mut self) -> Result<(), DeviceError> {
        self.log.push("playback.interrupt");
        if self.fail_interrupt {
            return Err(DeviceError::Thread("speaker wedged".into()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.log.push("playback.close");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeChannel
// ---------------------------------------------------------------------------

/// Test-side handle emitting server events into the open channel.
#[derive(Clone, Default)]
pub struct Remote(Arc<Mutex<Option<mpsc::UnboundedSender<ChannelEvent>>>>);

impl Remote {
    pub fn emit(&self, event: ChannelEvent) -> bool {
        match self.0.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Drop the event sender without a goodbye, as a dead socket would.
    pub fn hang_up(&self) {
        self.0.lock().unwrap().take();
    }
}

pub struct FakeChannel {
    pub log: CallLog,
    pub remote: Remote,
    pub fail_connect: bool,
    state: ChannelState,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
}

impl FakeChannel {
    pub fn new(log: CallLog, remote: Remote, fail_connect: bool) -> Self {
        Self {
            log,
            remote,
            fail_connect,
            state: ChannelState::Closed,
            events: None,
        }
    }

    fn open(&self) -> bool {
        self.state == ChannelState::Open
    }
}

#[async_trait]
impl ConversationChannel for FakeChannel {
    async fn connect(&mut self, credential: &Credential) -> Result<(), ChannelError> {
        self.log.push(format!("channel.connect({})", credential.expose()));
        if self.fail_connect {
            return Err(ChannelError::ConnectionFailed("401 Unauthorized".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.remote.0.lock().unwrap() = Some(tx);
        self.events = Some(rx);
        self.state = ChannelState::Open;
        Ok(())
    }

    fn configure(&mut self, params: SessionParameters) {
        self.log.push(format!("channel.configure({})", params.instructions));
    }

    fn send_text(&mut self, text: &str) {
        if self.open() {
            self.log.push(format!("channel.send_text({text})"));
        }
    }

    fn send_audio_frame(&mut self, frame: &AudioFrame) {
        if self.open() {
            self.log
                .push(format!("channel.send_audio_frame({:?})", frame.samples));
        }
    }

    fn request_response(&mut self) {
        if self.open() {
            self.log.push("channel.request_response");
        }
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events.take()
    }

    fn disconnect(&mut self) {
        self.log.push("channel.disconnect");
        self.state = ChannelState::Closed;
        self.events = None;
        self.remote.0.lock().unwrap().take();
    }

    fn state(&self) -> ChannelState {
        self.state
    }
}
