//! Global hotkey that toggles recording, backed by `rdev`.
//!
//! `rdev::listen()` blocks forever, so [`HotkeyListener::start`] runs it on a
//! dedicated OS thread and forwards [`SessionCommand::ToggleRecording`] into
//! the session's command channel on each key press.
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use voice_chat::hotkey::{parse_key, HotkeyListener};
//!
//! let (tx, _rx) = mpsc::channel(16);
//! let key = parse_key("F9").expect("unknown key");
//! let _listener = HotkeyListener::start(key, tx).expect("hotkey thread");
//! ```
//!
//! [`SessionCommand::ToggleRecording`]: crate::session::SessionCommand::ToggleRecording

pub mod listener;

pub use listener::{HotkeyListener, KeyLatch};

use rdev::Key;

const LETTERS: [Key; 26] = [
    Key::KeyA,
    Key::KeyB,
    Key::KeyC,
    Key::KeyD,
    Key::KeyE,
    Key::KeyF,
    Key::KeyG,
    Key::KeyH,
    Key::KeyI,
    Key::KeyJ,
    Key::KeyK,
    Key::KeyL,
    Key::KeyM,
    Key::KeyN,
    Key::KeyO,
    Key::KeyP,
    Key::KeyQ,
    Key::KeyR,
    Key::KeyS,
    Key::KeyT,
    Key::KeyU,
    Key::KeyV,
    Key::KeyW,
    Key::KeyX,
    Key::KeyY,
    Key::KeyZ,
];

const FUNCTION_KEYS: [Key; 12] = [
    Key::F1,
    Key::F2,
    Key::F3,
    Key::F4,
    Key::F5,
    Key::F6,
    Key::F7,
    Key::F8,
    Key::F9,
    Key::F10,
    Key::F11,
    Key::F12,
];

/// Parse a key name from the config into an [`rdev::Key`].
///
/// Accepts `F1`–`F12`, a handful of named keys and single ASCII letters,
/// all case-insensitive.  Unknown names yield `None`.
///
/// ```
/// use voice_chat::hotkey::parse_key;
///
/// assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
/// assert_eq!(parse_key("pause"), Some(rdev::Key::Pause));
/// assert_eq!(parse_key("m"), Some(rdev::Key::KeyM));
/// assert_eq!(parse_key("Ctrl+M"), None);
/// ```
pub fn parse_key(name: &str) -> Option<Key> {
    let upper = name.trim().to_ascii_uppercase();

    if let [c] = upper.as_bytes() {
        return c
            .is_ascii_uppercase()
            .then(|| LETTERS[(c - b'A') as usize]);
    }

    if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<usize>().ok()) {
        return (1..=12).contains(&n).then(|| FUNCTION_KEYS[n - 1]);
    }

    match upper.as_str() {
        "ESCAPE" | "ESC" => Some(Key::Escape),
        "SPACE" => Some(Key::Space),
        "RETURN" | "ENTER" => Some(Key::Return),
        "TAB" => Some(Key::Tab),
        "HOME" => Some(Key::Home),
        "END" => Some(Key::End),
        "PAGEUP" => Some(Key::PageUp),
        "PAGEDOWN" => Some(Key::PageDown),
        "INSERT" => Some(Key::Insert),
        "CAPSLOCK" => Some(Key::CapsLock),
        "SCROLLLOCK" => Some(Key::ScrollLock),
        "PAUSE" => Some(Key::Pause),
        "PRINTSCREEN" => Some(Key::PrintScreen),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_keys() {
        assert_eq!(parse_key("F1"), Some(Key::F1));
        assert_eq!(parse_key("f9"), Some(Key::F9));
        assert_eq!(parse_key("F12"), Some(Key::F12));
        assert_eq!(parse_key("F0"), None);
        assert_eq!(parse_key("F13"), None);
    }

    #[test]
    fn letters_are_case_insensitive() {
        assert_eq!(parse_key("a"), Some(Key::KeyA));
        assert_eq!(parse_key("Z"), Some(Key::KeyZ));
        assert_eq!(parse_key("1"), None);
    }

    #[test]
    fn named_keys() {
        assert_eq!(parse_key("Esc"), Some(Key::Escape));
        assert_eq!(parse_key("enter"), Some(Key::Return));
        assert_eq!(parse_key(" Space "), Some(Key::Space));
    }

    #[test]
    fn unknown_names() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("F"), Some(Key::KeyF));
        assert_eq!(parse_key("Fx"), None);
        assert_eq!(parse_key("Ctrl+V"), None);
    }
}
