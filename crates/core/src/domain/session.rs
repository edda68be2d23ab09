//! Session attributes and the bounded conversation history.
//!
//! The dialogue front end owns the session; we round-trip a string map each
//! turn. Only three keys carry structure: the transcript history, the
//! phone-call scenario context, and the interaction key linking the call to
//! its durable record.

use std::collections::BTreeMap;

pub const ATTR_CONVERSATION_HISTORY: &str = "conversationHistory";
pub const ATTR_DYNAMIC_SCENARIO: &str = "dynamicScenario";
pub const ATTR_INTERACTION_KEY: &str = "interactionKey";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionAttributes(pub BTreeMap<String, String>);

impl SessionAttributes {
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    pub fn history(&self) -> ConversationHistory {
        ConversationHistory::from_raw(
            self.0.get(ATTR_CONVERSATION_HISTORY).cloned().unwrap_or_default(),
        )
    }

    pub fn set_history(&mut self, history: &ConversationHistory) {
        self.0.insert(ATTR_CONVERSATION_HISTORY.to_owned(), history.as_str().to_owned());
    }

    pub fn scenario(&self) -> Option<&str> {
        self.0.get(ATTR_DYNAMIC_SCENARIO).map(String::as_str).filter(|text| !text.is_empty())
    }

    pub fn set_scenario(&mut self, scenario: &str) {
        self.0.insert(ATTR_DYNAMIC_SCENARIO.to_owned(), scenario.to_owned());
    }

    pub fn interaction_key(&self) -> Option<&str> {
        self.0.get(ATTR_INTERACTION_KEY).map(String::as_str).filter(|key| !key.is_empty())
    }
}

/// Ordered `User:`/`Bot:` transcript lines, truncated to the most recent
/// `max_turns` exchanges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationHistory(String);

impl ConversationHistory {
    pub fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.0.lines().filter(|line| !line.is_empty()).count()
    }

    /// Append one `User`/`Bot` exchange and trim to the retention window.
    /// The append is skipped when the last stored line already equals the
    /// new bot line: the front end may replay a turn, and the transcript
    /// must not record the exchange twice.
    pub fn append_exchange(&mut self, user_input: &str, bot_response: &str, max_turns: usize) {
        let last_line = self.0.trim_end().lines().last().unwrap_or_default();
        if last_line == format!("Bot: {bot_response}") {
            return;
        }

        let mut lines: Vec<&str> = self.0.lines().filter(|line| !line.is_empty()).collect();
        let user_line = format!("User: {user_input}");
        let bot_line = format!("Bot: {bot_response}");
        lines.push(&user_line);
        lines.push(&bot_line);

        let keep = max_turns.saturating_mul(2);
        let start = lines.len().saturating_sub(keep);
        self.0 = lines[start..].join("\n");
    }

    /// Append only the user side of a turn, used when the transcript is
    /// handed off before a bot response exists.
    pub fn append_user_line(&mut self, user_input: &str) {
        if user_input.is_empty() {
            return;
        }
        if !self.0.is_empty() && !self.0.ends_with('\n') {
            self.0.push('\n');
        }
        self.0.push_str(&format!("User: {user_input}"));
    }

    /// Most recent `max_lines` transcript lines, joined.
    pub fn tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self.0.lines().filter(|line| !line.is_empty()).collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationHistory, SessionAttributes, ATTR_DYNAMIC_SCENARIO};

    #[test]
    fn duplicate_exchange_is_recorded_once() {
        let mut history = ConversationHistory::default();
        history.append_exchange("hi", "hello there", 10);
        history.append_exchange("hi", "hello there", 10);

        assert_eq!(history.as_str(), "User: hi\nBot: hello there");
        assert_eq!(history.line_count(), 2);
    }

    #[test]
    fn history_never_exceeds_twice_the_turn_window() {
        let mut history = ConversationHistory::default();
        for turn in 0..25 {
            history.append_exchange(&format!("question {turn}"), &format!("answer {turn}"), 10);
        }

        assert_eq!(history.line_count(), 20);
        assert!(history.as_str().starts_with("User: question 15"));
        assert!(history.as_str().ends_with("Bot: answer 24"));
    }

    #[test]
    fn differing_bot_lines_are_both_kept() {
        let mut history = ConversationHistory::default();
        history.append_exchange("hi", "hello", 10);
        history.append_exchange("hi", "hello again", 10);
        assert_eq!(history.line_count(), 4);
    }

    #[test]
    fn tail_keeps_only_the_most_recent_lines() {
        let mut history = ConversationHistory::default();
        for turn in 0..5 {
            history.append_exchange(&format!("u{turn}"), &format!("b{turn}"), 10);
        }
        let tail = history.tail(4);
        assert_eq!(tail, "User: u3\nBot: b3\nUser: u4\nBot: b4");
    }

    #[test]
    fn blank_scenario_attribute_reads_as_absent() {
        let mut attributes = SessionAttributes::default();
        attributes.0.insert(ATTR_DYNAMIC_SCENARIO.to_owned(), String::new());
        assert_eq!(attributes.scenario(), None);

        attributes.set_scenario("call script");
        assert_eq!(attributes.scenario(), Some("call script"));
    }

    #[test]
    fn user_line_append_handles_missing_trailing_newline() {
        let mut history = ConversationHistory::from_raw("User: hi\nBot: hello".to_owned());
        history.append_user_line("start the demo");
        assert_eq!(history.as_str(), "User: hi\nBot: hello\nUser: start the demo");
    }
}
