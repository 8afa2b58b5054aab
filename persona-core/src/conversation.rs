//! Append-only turn history plus the LLM chat-history projection.

use persona_protocol::{ChatMessage, Speaker, Transcript, TurnRecord};

pub struct Conversation {
    scenario_id: String,
    started_at: f64,
    turns: Vec<TurnRecord>,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(scenario_id: String, started_at: f64) -> Self {
        Self {
            scenario_id,
            started_at,
            turns: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn add_turn(&mut self, speaker: Speaker, text: String, now: f64) {
        let elapsed = (now - self.started_at).max(0.0);
        self.messages.push(ChatMessage {
            role: speaker.role(),
            content: text.clone(),
        });
        self.turns.push(TurnRecord {
            speaker,
            text,
            timestamp: now,
            elapsed: round2(elapsed),
        });
    }

    /// Last `n` entries of the LLM chat-history projection.
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn has_agent_turn(&self) -> bool {
        self.turns.iter().any(|t| t.speaker == Speaker::Agent)
    }

    pub fn snapshot(&self, now: f64) -> Transcript {
        Transcript {
            scenario_id: self.scenario_id.clone(),
            started_at: self.started_at,
            duration_seconds: round2((now - self.started_at).max(0.0)),
            turn_count: self.turns.len(),
            turns: self.turns.clone(),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_mapping_is_agent_to_user_patient_to_assistant() {
        let mut c = Conversation::new("s1".into(), 0.0);
        c.add_turn(Speaker::Agent, "hello".into(), 1.0);
        c.add_turn(Speaker::Patient, "hi there".into(), 2.0);
        assert_eq!(c.messages[0].role, persona_protocol::Role::User);
        assert_eq!(c.messages[1].role, persona_protocol::Role::Assistant);
    }

    #[test]
    fn recent_returns_the_last_n_messages() {
        let mut c = Conversation::new("s1".into(), 0.0);
        for i in 0..5 {
            c.add_turn(Speaker::Agent, format!("msg{i}"), i as f64);
        }
        let recent = c.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].content, "msg4");
    }

    #[test]
    fn recent_is_not_confused_by_n_larger_than_history() {
        let mut c = Conversation::new("s1".into(), 0.0);
        c.add_turn(Speaker::Agent, "only one".into(), 0.0);
        assert_eq!(c.recent(10).len(), 1);
    }

    #[test]
    fn snapshot_elapsed_matches_timestamp_minus_started_at() {
        let mut c = Conversation::new("s1".into(), 100.0);
        c.add_turn(Speaker::Agent, "a".into(), 103.456);
        let snap = c.snapshot(110.0);
        assert_eq!(snap.turn_count, 1);
        assert_eq!(snap.turns[0].elapsed, 3.46);
        assert_eq!(snap.duration_seconds, 10.0);
    }

    #[test]
    fn turn_order_is_append_order() {
        let mut c = Conversation::new("s1".into(), 0.0);
        c.add_turn(Speaker::Agent, "first".into(), 1.0);
        c.add_turn(Speaker::Patient, "second".into(), 2.0);
        let snap = c.snapshot(3.0);
        assert_eq!(snap.turns[0].text, "first");
        assert_eq!(snap.turns[1].text, "second");
        assert!(snap.turns[0].timestamp <= snap.turns[1].timestamp);
    }
}
