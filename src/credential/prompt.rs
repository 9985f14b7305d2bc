//! Interactive credential prompt.

use std::io::{BufRead, IsTerminal, Write};

/// Asks the operator for a secret.  `None` means cancelled or unavailable.
pub trait CredentialPrompt: Send + Sync {
    fn ask(&self, label: &str) -> Option<String>;
}

/// Reads one line from the terminal.
///
/// Returns `None` without blocking when stdin is not attached to a terminal.
pub struct StdinPrompt;

impl CredentialPrompt for StdinPrompt {
    fn ask(&self, label: &str) -> Option<String> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            log::debug!("credential: stdin is not a terminal, skipping prompt");
            return None;
        }

        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{label}: ");
        let _ = stderr.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                log::warn!("credential: failed to read prompt input: {e}");
                None
            }
        }
    }
}

/// Prompt that never yields a value (prompting disabled in config).
pub struct NoPrompt;

impl CredentialPrompt for NoPrompt {
    fn ask(&self, _label: &str) -> Option<String> {
        None
    }
}
