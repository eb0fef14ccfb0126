//! Transcript buffer: reconciles final transcript events with user edits.
//!
//! The buffer is a single authoritative text value. Final transcript segments
//! are appended with a single separating space and never overwrite text the
//! user has edited; the only destructive operations are the explicit
//! `set_user_text` (a direct user edit) and `clear`.

/// Accumulates committed transcript text across a dictation session.
#[derive(Debug, Default)]
pub struct TranscriptBuffer {
    committed: String,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a final transcript segment.
    ///
    /// The segment is whitespace-trimmed and joined to the existing text with
    /// exactly one space. Empty segments are ignored.
    pub fn append_final(&mut self, text: &str) {
        let segment = text.trim();
        if segment.is_empty() {
            return;
        }

        if !self.committed.is_empty() {
            self.committed.push(' ');
        }
        self.committed.push_str(segment);
    }

    /// Replace the buffer contents with directly edited user text.
    pub fn set_user_text(&mut self, text: &str) {
        self.committed = text.to_string();
    }

    /// Reset the buffer to empty.
    pub fn clear(&mut self) {
        self.committed.clear();
    }

    /// Current buffer contents.
    pub fn read(&self) -> String {
        self.committed.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_joins_with_single_space() {
        let mut buf = TranscriptBuffer::new();
        buf.append_final("hello");
        buf.append_final("world");
        assert_eq!(buf.read(), "hello world");
    }

    #[test]
    fn append_trims_redundant_whitespace() {
        let mut buf = TranscriptBuffer::new();
        buf.append_final("  hello ");
        buf.append_final("\tworld\n");
        assert_eq!(buf.read(), "hello world");
    }

    #[test]
    fn append_ignores_empty_segments() {
        let mut buf = TranscriptBuffer::new();
        buf.append_final("hello");
        buf.append_final("   ");
        buf.append_final("");
        assert_eq!(buf.read(), "hello");
    }

    #[test]
    fn appends_after_user_edit_never_overwrite() {
        let mut buf = TranscriptBuffer::new();
        buf.append_final("hello world");
        buf.set_user_text("hello, world!");
        buf.append_final("again");
        assert_eq!(buf.read(), "hello, world! again");
    }

    #[test]
    fn length_is_monotonic_between_resets() {
        let mut buf = TranscriptBuffer::new();
        let mut last_len = 0;
        for segment in ["one", "two", "  ", "three four", "five"] {
            buf.append_final(segment);
            assert!(buf.read().len() >= last_len);
            last_len = buf.read().len();
        }
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut buf = TranscriptBuffer::new();
        buf.append_final("something");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.read(), "");
    }
}
