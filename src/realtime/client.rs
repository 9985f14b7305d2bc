//! WebSocket implementation of [`ConversationChannel`].
//!
//! One connection spawns two tasks:
//!
//! ```text
//! send_* ──Message──▶ outgoing (mpsc) ──▶ [writer task] ──▶ WebSocket sink
//! WebSocket stream ──▶ [reader task] ── ServerEvent → ChannelEvent ──▶ events (mpsc)
//! ```
//!
//! The shared [`ChannelState`] gates both directions: sends are dropped
//! unless `Open`, and the reader stops forwarding once `disconnect` has run.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use super::channel::{ChannelError, ChannelEvent, ChannelState, ConversationChannel};
use super::events::{ClientEvent, ServerEvent, SessionParameters};
use crate::audio::AudioFrame;
use crate::config::{RealtimeConfig, DEFAULT_INSTRUCTIONS};
use crate::credential::Credential;

type SharedChannelState = Arc<Mutex<ChannelState>>;

fn read_state(state: &SharedChannelState) -> ChannelState {
    *state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &SharedChannelState, next: ChannelState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

// ---------------------------------------------------------------------------
// RealtimeClient
// ---------------------------------------------------------------------------

/// Realtime API client over `tokio-tungstenite`.
pub struct RealtimeClient {
    endpoint: String,
    connect_timeout: Duration,
    /// Sample rate of audio deltas received from the service.
    sample_rate: u32,
    params: SessionParameters,
    state: SharedChannelState,
    outgoing: Option<mpsc::UnboundedSender<Message>>,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    reader: Option<JoinHandle<()>>,
    /// Samples appended since the last commit.
    pending_input: usize,
}

impl RealtimeClient {
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration, sample_rate: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout,
            sample_rate,
            params: SessionParameters::new(DEFAULT_INSTRUCTIONS, "alloy"),
            state: Arc::new(Mutex::new(ChannelState::Closed)),
            outgoing: None,
            events: None,
            reader: None,
            pending_input: 0,
        }
    }

    pub fn from_config(config: &RealtimeConfig, sample_rate: u32) -> Self {
        Self::new(
            config.endpoint(),
            Duration::from_secs(config.connect_timeout_secs),
            sample_rate,
        )
    }

    /// Serialise and queue `event`.  Returns `false` when it was dropped.
    fn send(&self, event: &ClientEvent) -> bool {
        let Some(outgoing) = self.outgoing.as_ref() else {
            return false;
        };
        if read_state(&self.state) != ChannelState::Open {
            return false;
        }
        match serde_json::to_string(event) {
            Ok(json) => outgoing.send(Message::Text(json)).is_ok(),
            Err(e) => {
                log::error!("realtime: failed to encode client event: {e}");
                false
            }
        }
    }

    fn request(
        &self,
        credential: &Credential,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, ChannelError> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| ChannelError::ConnectionFailed(format!("invalid endpoint: {e}")))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| ChannelError::ConnectionFailed("API key is not a valid header".into()))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", bearer);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        Ok(request)
    }

    /// Pump the socket until it closes or the channel is disconnected.
    async fn read_loop<S>(
        mut stream: S,
        state: SharedChannelState,
        events: mpsc::UnboundedSender<ChannelEvent>,
        sample_rate: u32,
    ) where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        let reason = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let event = match ServerEvent::parse(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            log::warn!("realtime: unparseable server event: {e}");
                            continue;
                        }
                    };
                    if let Some(event) = event.into_channel_event(sample_rate) {
                        if read_state(&state) != ChannelState::Open {
                            return;
                        }
                        let _ = events.send(event);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".into());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break e.to_string(),
                None => break "connection ended".into(),
            }
        };

        let was_open = {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            let open = *guard == ChannelState::Open;
            *guard = ChannelState::Closed;
            open
        };
        if was_open {
            log::warn!("realtime: connection lost: {reason}");
            let _ = events.send(ChannelEvent::Disconnected { reason });
        }
    }
}

#[async_trait]
impl ConversationChannel for RealtimeClient {
    async fn connect(&mut self, credential: &Credential) -> Result<(), ChannelError> {
        let current = read_state(&self.state);
        if current != ChannelState::Closed {
            return Err(ChannelError::NotClosed(current));
        }
        // A previous connection that ended remotely may still hold handles.
        self.disconnect();

        write_state(&self.state, ChannelState::Connecting);
        log::info!("realtime: connecting to {}", self.endpoint);

        let request = match self.request(credential) {
            Ok(request) => request,
            Err(e) => {
                write_state(&self.state, ChannelState::Closed);
                return Err(e);
            }
        };
        let result = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await;
        let ws_stream = match result {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                write_state(&self.state, ChannelState::Closed);
                log::error!("realtime: connection failed: {e}");
                return Err(ChannelError::ConnectionFailed(e.to_string()));
            }
            Err(_) => {
                write_state(&self.state, ChannelState::Closed);
                log::error!("realtime: connection attempt timed out");
                return Err(ChannelError::Timeout);
            }
        };

        let (mut sink, stream) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    log::warn!("realtime: send failed: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // `Connected` goes first and the state must be `Open` before the
        // reader starts forwarding.
        let _ = event_tx.send(ChannelEvent::Connected);
        self.outgoing = Some(outgoing_tx);
        self.events = Some(event_rx);
        self.pending_input = 0;
        write_state(&self.state, ChannelState::Open);

        self.send(&ClientEvent::SessionUpdate {
            session: self.params.clone(),
        });
        self.reader = Some(tokio::spawn(Self::read_loop(
            stream,
            Arc::clone(&self.state),
            event_tx,
            self.sample_rate,
        )));

        log::info!("realtime: connected");
        Ok(())
    }

    fn configure(&mut self, params: SessionParameters) {
        self.params = params;
        if read_state(&self.state) == ChannelState::Open {
            self.send(&ClientEvent::SessionUpdate {
                session: self.params.clone(),
            });
        }
    }

    fn send_text(&mut self, text: &str) {
        if !self.send(&ClientEvent::user_text(text)) {
            log::warn!("realtime: dropping text turn, channel {}", self.state());
            return;
        }
        self.send(&ClientEvent::ResponseCreate);
    }

    fn send_audio_frame(&mut self, frame: &AudioFrame) {
        if self.send(&ClientEvent::append_audio(frame)) {
            self.pending_input += frame.samples.len();
            log::trace!("realtime: appended {} samples", frame.samples.len());
        } else {
            log::debug!(
                "realtime: dropping audio frame of {} samples, channel {}",
                frame.samples.len(),
                self.state()
            );
        }
    }

    fn request_response(&mut self) {
        if self.state() != ChannelState::Open {
            log::warn!("realtime: response requested on {} channel", self.state());
            return;
        }
        if self.pending_input > 0 {
            log::debug!("realtime: committing {} samples", self.pending_input);
            self.send(&ClientEvent::InputAudioCommit);
            self.pending_input = 0;
        }
        self.send(&ClientEvent::ResponseCreate);
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events.take()
    }

    fn disconnect(&mut self) {
        let was = read_state(&self.state);
        write_state(&self.state, ChannelState::Closed);

        if let Some(outgoing) = self.outgoing.take() {
            let _ = outgoing.send(Message::Close(None));
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.events = None;
        self.pending_input = 0;

        if was != ChannelState::Closed {
            log::info!("realtime: disconnected");
        }
    }

    fn state(&self) -> ChannelState {
        read_state(&self.state)
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::channel::ItemDelta;
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    fn credential() -> Credential {
        Credential::new("sk-test").unwrap()
    }

    /// Local WebSocket server: reports the Authorization header, forwards
    /// every text message it receives, and replays `script` to the client.
    async fn serve(
        script: Vec<String>,
        close_after_script: bool,
    ) -> (
        String,
        tokio::sync::oneshot::Receiver<Option<String>>,
        mpsc::UnboundedReceiver<Value>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (auth_tx, auth_rx) = tokio::sync::oneshot::channel();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let auth = req
                    .headers()
                    .get("Authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = auth_tx.send(auth);
                Ok(resp)
            };
            let ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();
            let (mut sink, mut stream) = ws.split();

            for text in script {
                sink.send(Message::Text(text)).await.unwrap();
            }
            if close_after_script {
                let _ = sink.close().await;
                return;
            }
            while let Some(Ok(msg)) = stream.next().await {
                if let Message::Text(text) = msg {
                    let _ = seen_tx.send(serde_json::from_str(&text).unwrap());
                }
            }
        });

        (format!("ws://{addr}/v1/realtime"), auth_rx, seen_rx)
    }

    async fn next_type(seen: &mut mpsc::UnboundedReceiver<Value>) -> String {
        let v = tokio::time::timeout(Duration::from_secs(5), seen.recv())
            .await
            .expect("server saw nothing")
            .expect("server gone");
        v["type"].as_str().unwrap_or_default().to_string()
    }

    #[test]
    fn new_client_is_closed() {
        let mut client = RealtimeClient::new("ws://127.0.0.1:1", Duration::from_secs(1), 24_000);
        assert_eq!(client.state(), ChannelState::Closed);
        assert!(client.take_events().is_none());
    }

    #[test]
    fn sends_while_closed_are_dropped() {
        let mut client = RealtimeClient::new("ws://127.0.0.1:1", Duration::from_secs(1), 24_000);
        client.send_audio_frame(&AudioFrame::new(vec![0; 10], 24_000));
        client.send_text("hi");
        client.request_response();
        assert_eq!(client.pending_input, 0);
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn refused_connection_returns_to_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut client =
            RealtimeClient::new(format!("ws://{addr}"), Duration::from_secs(5), 24_000);
        let result = client.connect(&credential()).await;

        assert!(matches!(result, Err(ChannelError::ConnectionFailed(_))));
        assert_eq!(client.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_tcp, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let mut client =
            RealtimeClient::new(format!("ws://{addr}"), Duration::from_millis(200), 24_000);
        let result = client.connect(&credential()).await;

        assert_eq!(result, Err(ChannelError::Timeout));
        assert_eq!(client.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn connect_sends_auth_and_session_update_first() {
        let (url, auth, mut seen) = serve(Vec::new(), false).await;
        let mut client = RealtimeClient::new(url, Duration::from_secs(5), 24_000);
        client.configure(SessionParameters::new("purr only", "alloy"));

        client.connect(&credential()).await.expect("connect");
        assert_eq!(client.state(), ChannelState::Open);
        assert_eq!(auth.await.unwrap().as_deref(), Some("Bearer sk-test"));

        let first = tokio::time::timeout(Duration::from_secs(5), seen.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first["type"], "session.update");
        assert_eq!(first["session"]["instructions"], "purr only");

        let mut events = client.take_events().expect("events");
        assert!(client.take_events().is_none());
        assert_eq!(events.recv().await, Some(ChannelEvent::Connected));

        let result = client.connect(&credential()).await;
        assert_eq!(result, Err(ChannelError::NotClosed(ChannelState::Open)));
        client.disconnect();
    }

    #[tokio::test]
    async fn commit_only_follows_appended_audio() {
        let (url, _auth, mut seen) = serve(Vec::new(), false).await;
        let mut client = RealtimeClient::new(url, Duration::from_secs(5), 24_000);
        client.connect(&credential()).await.expect("connect");
        assert_eq!(next_type(&mut seen).await, "session.update");

        client.request_response();
        assert_eq!(next_type(&mut seen).await, "response.create");

        client.send_audio_frame(&AudioFrame::new(vec![7; 240], 24_000));
        client.request_response();
        assert_eq!(next_type(&mut seen).await, "input_audio_buffer.append");
        assert_eq!(next_type(&mut seen).await, "input_audio_buffer.commit");
        assert_eq!(next_type(&mut seen).await, "response.create");

        client.send_text("Hello!");
        assert_eq!(next_type(&mut seen).await, "conversation.item.create");
        assert_eq!(next_type(&mut seen).await, "response.create");

        client.disconnect();
    }

    #[tokio::test]
    async fn server_events_arrive_in_order_then_disconnect() {
        let script = vec![
            r#"{"type":"session.created","session":{}}"#.to_string(),
            r#"{"type":"response.audio.delta","item_id":"r1","delta":"AQA="}"#.to_string(),
            r#"{"type":"response.audio.delta","item_id":"r1","delta":"AgA="}"#.to_string(),
        ];
        let (url, _auth, _seen) = serve(script, true).await;
        let mut client = RealtimeClient::new(url, Duration::from_secs(5), 24_000);
        client.connect(&credential()).await.expect("connect");
        let mut events = client.take_events().expect("events");

        let mut received = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_secs(5), events.recv()).await
        {
            let done = matches!(event, ChannelEvent::Disconnected { .. });
            received.push(event);
            if done {
                break;
            }
        }

        assert_eq!(received[0], ChannelEvent::Connected);
        let audio: Vec<Vec<i16>> = received
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::ConversationUpdated {
                    delta: Some(ItemDelta::Audio(s)),
                    ..
                } => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(audio, vec![vec![1], vec![2]]);
        assert!(matches!(
            received.last(),
            Some(ChannelEvent::Disconnected { .. })
        ));
        assert_eq!(client.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn local_disconnect_emits_nothing_further() {
        let (url, _auth, _seen) = serve(Vec::new(), false).await;
        let mut client = RealtimeClient::new(url, Duration::from_secs(5), 24_000);
        client.connect(&credential()).await.expect("connect");
        let mut events = client.take_events().expect("events");
        assert_eq!(events.recv().await, Some(ChannelEvent::Connected));

        client.disconnect();
        assert_eq!(client.state(), ChannelState::Closed);

        let next = tokio::time::timeout(Duration::from_secs(5), events.recv()).await;
        assert_eq!(next.expect("stream should end"), None);
    }
}
