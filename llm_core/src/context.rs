use crate::message::ChatMessage;

/// Bound on how much of a history is forwarded upstream.
///
/// Both limits are optional; the default forwards everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextWindow {
    pub max_messages: Option<usize>,
    pub max_chars: Option<usize>,
}

impl ContextWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_bounded(&self) -> bool {
        self.max_messages.is_some() || self.max_chars.is_some()
    }

    /// Longest suffix of `history` that fits both limits.
    ///
    /// The newest message is always kept, even when it alone is over
    /// `max_chars`, so the model always sees the turn it is answering.
    pub fn apply<'a>(&self, history: &'a [ChatMessage]) -> &'a [ChatMessage] {
        if history.is_empty() || !self.is_bounded() {
            return history;
        }

        let max_messages = self.max_messages.unwrap_or(usize::MAX).max(1);
        let max_chars = self.max_chars.unwrap_or(usize::MAX);

        let mut kept = 0;
        let mut chars = 0usize;
        for msg in history.iter().rev() {
            let next = chars.saturating_add(msg.text_len());
            if kept > 0 && (kept == max_messages || next > max_chars) {
                break;
            }
            kept += 1;
            chars = next;
        }

        &history[history.len() - kept..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("aaaa"),
            ChatMessage::model("bbbb"),
            ChatMessage::user("cccc"),
            ChatMessage::model("dddd"),
            ChatMessage::user("eeee"),
        ]
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let h = history();
        assert_eq!(ContextWindow::unbounded().apply(&h).len(), 5);
    }

    #[test]
    fn test_message_cap_keeps_newest() {
        let h = history();
        let window = ContextWindow { max_messages: Some(2), max_chars: None };
        let kept = window.apply(&h);
        assert_eq!(kept, &h[3..]);
    }

    #[test]
    fn test_char_budget_keeps_newest_suffix() {
        let h = history();
        let window = ContextWindow { max_messages: None, max_chars: Some(10) };
        // 4 + 4 fits, a third message would be 12
        assert_eq!(window.apply(&h), &h[3..]);
    }

    #[test]
    fn test_last_message_survives_tiny_budget() {
        let h = history();
        let window = ContextWindow { max_messages: Some(0), max_chars: Some(1) };
        assert_eq!(window.apply(&h), &h[4..]);
    }

    #[test]
    fn test_empty_history() {
        let window = ContextWindow { max_messages: Some(3), max_chars: Some(3) };
        assert!(window.apply(&[]).is_empty());
    }
}
