//! Inline edit state machine
//!
//! Holds the edit buffer for one field. Deciding whether a commit trigger
//! should reach the network lives here; the network call itself does not.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    /// Enter commits
    SingleLine,
    /// Enter inserts a newline
    Multiline,
}

/// What ended the edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTrigger {
    Confirm,
    Blur,
    Enter,
}

/// Result of a commit trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitDecision {
    /// Not editing, or Enter in a multiline field. Still editing.
    Ignored,
    /// Buffer equals the original. Edit mode exited, nothing to send.
    Unchanged,
    /// Buffer is blank. Edit mode exited, nothing to send.
    Blank,
    /// Send this value. Edit mode stays on until [`InlineEdit::finish`].
    Submit(String),
}

#[derive(Debug, Clone)]
pub struct InlineEdit {
    kind: FieldKind,
    original: String,
    buffer: String,
    editing: bool,
    /// Set on `begin`, consumed by the host once the input exists
    focus_requested: bool,
    submitting: bool,
}

impl InlineEdit {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            original: String::new(),
            buffer: String::new(),
            editing: false,
            focus_requested: false,
            submitting: false,
        }
    }

    pub fn single_line() -> Self {
        Self::new(FieldKind::SingleLine)
    }

    pub fn multiline() -> Self {
        Self::new(FieldKind::Multiline)
    }

    /// Enter edit mode seeded with the current value
    pub fn begin(&mut self, current: &str) {
        self.original = current.to_string();
        self.buffer = current.to_string();
        self.editing = true;
        self.focus_requested = true;
        self.submitting = false;
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn set_buffer(&mut self, value: impl Into<String>) {
        if self.editing {
            self.buffer = value.into();
        }
    }

    /// True once after `begin`; the host focuses the input when it sees it
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    pub fn cancel(&mut self) {
        self.reset();
    }

    pub fn commit(&mut self, trigger: EditTrigger) -> CommitDecision {
        if !self.editing || self.submitting {
            return CommitDecision::Ignored;
        }
        if trigger == EditTrigger::Enter && self.kind == FieldKind::Multiline {
            return CommitDecision::Ignored;
        }

        let value = match self.kind {
            FieldKind::SingleLine => self.buffer.trim().to_string(),
            FieldKind::Multiline => self.buffer.clone(),
        };
        if value.trim().is_empty() {
            self.reset();
            return CommitDecision::Blank;
        }
        if value == self.original {
            self.reset();
            return CommitDecision::Unchanged;
        }

        // A blur fired by the submit itself must not send twice
        self.submitting = true;
        CommitDecision::Submit(value)
    }

    /// Leave edit mode after the submitted value was accepted or refused
    pub fn finish(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.editing = false;
        self.focus_requested = false;
        self.submitting = false;
        self.buffer.clear();
        self.original.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_commit_exits_without_submit() {
        let mut edit = InlineEdit::single_line();
        edit.begin("Weekly sync");
        assert!(edit.take_focus_request());
        assert!(!edit.take_focus_request());
        edit.set_buffer("  Weekly sync ");
        assert_eq!(edit.commit(EditTrigger::Blur), CommitDecision::Unchanged);
        assert!(!edit.is_editing());
    }

    #[test]
    fn test_blank_commit_is_rejected() {
        let mut edit = InlineEdit::single_line();
        edit.begin("Speaker 1");
        edit.set_buffer("   ");
        assert_eq!(edit.commit(EditTrigger::Confirm), CommitDecision::Blank);
        assert!(!edit.is_editing());
    }

    #[test]
    fn test_submit_trims_single_line() {
        let mut edit = InlineEdit::single_line();
        edit.begin("Speaker 1");
        edit.set_buffer(" Alice ");
        assert_eq!(
            edit.commit(EditTrigger::Enter),
            CommitDecision::Submit("Alice".to_string())
        );
        // Blur right after Enter
        assert_eq!(edit.commit(EditTrigger::Blur), CommitDecision::Ignored);
        edit.finish();
        assert!(!edit.is_editing());
    }

    #[test]
    fn test_enter_in_multiline_keeps_editing() {
        let mut edit = InlineEdit::multiline();
        edit.begin("# Minutes");
        edit.set_buffer("# Minutes\n- new item\n");
        assert_eq!(edit.commit(EditTrigger::Enter), CommitDecision::Ignored);
        assert!(edit.is_editing());
        assert_eq!(
            edit.commit(EditTrigger::Confirm),
            CommitDecision::Submit("# Minutes\n- new item\n".to_string())
        );
    }

    #[test]
    fn test_commit_when_not_editing() {
        let mut edit = InlineEdit::single_line();
        edit.set_buffer("ignored");
        assert_eq!(edit.buffer(), "");
        assert_eq!(edit.commit(EditTrigger::Confirm), CommitDecision::Ignored);
    }

    #[test]
    fn test_cancel() {
        let mut edit = InlineEdit::single_line();
        edit.begin("a");
        edit.set_buffer("b");
        edit.cancel();
        assert!(!edit.is_editing());
        assert_eq!(edit.buffer(), "");
    }
}
