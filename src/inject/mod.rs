//! Text injection and clipboard hand-off.
//!
//! Injection simulates keystrokes into whatever application currently holds
//! input focus. This crosses a process boundary, so it is only ever invoked
//! with user-confirmed buffer content, once per explicit insert action.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::DictationError;

/// Sink that types text into the focused external application.
pub trait TextInjector: Send {
    fn type_text(&mut self, text: &str) -> Result<(), DictationError>;
}

/// Keystroke injection via enigo.
///
/// A short delay before typing gives the user time to focus the target
/// application after confirming the insert.
pub struct EnigoInjector {
    focus_delay: Duration,
}

impl EnigoInjector {
    pub fn new(focus_delay: Duration) -> Self {
        Self { focus_delay }
    }
}

impl TextInjector for EnigoInjector {
    fn type_text(&mut self, text: &str) -> Result<(), DictationError> {
        use enigo::{Enigo, Keyboard, Settings};

        if text.is_empty() {
            return Ok(());
        }

        debug!("Injecting {} chars after {:?} delay", text.len(), self.focus_delay);
        std::thread::sleep(self.focus_delay);

        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| DictationError::Injection(e.to_string()))?;

        enigo
            .text(text)
            .map_err(|e| DictationError::Injection(e.to_string()))?;

        info!("Injected {} chars into focused application", text.len());
        Ok(())
    }
}

/// Write plain text to the system clipboard.
pub fn copy_to_clipboard(text: &str) -> Result<(), DictationError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| DictationError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| DictationError::Clipboard(e.to_string()))?;

    debug!("Copied {} chars to clipboard", text.len());
    Ok(())
}
