//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` has no shutdown API.  Dropping [`HotkeyListener`] takes
//! the command sender away from the callback, so the session sees its
//! channel close; the thread itself stays parked in the rdev loop until the
//! process exits.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::session::SessionCommand;

// ---------------------------------------------------------------------------
// KeyLatch
// ---------------------------------------------------------------------------

/// Turns raw press/release events into one toggle per physical press.
///
/// Holding a key makes most platforms repeat `KeyPress`; only the first one
/// after a release counts.
#[derive(Debug, Default)]
pub struct KeyLatch {
    down: bool,
}

impl KeyLatch {
    /// Returns `true` when this press should toggle.
    pub fn press(&mut self) -> bool {
        !std::mem::replace(&mut self.down, true)
    }

    pub fn release(&mut self) {
        self.down = false;
    }
}

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to the running listener thread.  Drop it to stop forwarding.
pub struct HotkeyListener {
    commands: Arc<Mutex<Option<mpsc::Sender<SessionCommand>>>>,
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn the listener.  Each press of `key` sends
    /// [`SessionCommand::ToggleRecording`] on `commands`.
    pub fn start(key: rdev::Key, commands: mpsc::Sender<SessionCommand>) -> std::io::Result<Self> {
        let commands = Arc::new(Mutex::new(Some(commands)));
        let shared = Arc::clone(&commands);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let mut latch = KeyLatch::default();
                let result = rdev::listen(move |event| {
                    match event.event_type {
                        rdev::EventType::KeyPress(k) if k == key && latch.press() => {
                            log::debug!("hotkey: {key:?} pressed");
                            let sender = shared
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .clone();
                            let delivered = sender.is_some_and(|tx| {
                                tx.blocking_send(SessionCommand::ToggleRecording).is_ok()
                            });
                            if !delivered {
                                log::debug!("hotkey: session gone, ignoring key");
                            }
                        }
                        rdev::EventType::KeyRelease(k) if k == key => latch.release(),
                        _ => {}
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey: rdev::listen exited with error: {e:?}");
                }
            })?;

        log::info!("hotkey: listening for {key:?}");
        Ok(Self {
            commands,
            _thread: thread,
        })
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
