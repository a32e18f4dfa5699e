//! Session activity events
//!
//! An [`Event`] is the immutable unit of work flowing through the pipeline:
//! a user joining, leaving or reacting inside a live session.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Payload key carrying the reaction kind of a reaction event
pub const REACTION_TYPE_KEY: &str = "reaction_type";

/// Kinds of user activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A user entered the session
    JoinSession,
    /// A user left the session
    LeaveSession,
    /// A user reacted (payload carries the reaction kind)
    Reaction,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::JoinSession => write!(f, "join_session"),
            EventType::LeaveSession => write!(f, "leave_session"),
            EventType::Reaction => write!(f, "reaction"),
        }
    }
}

/// Known reaction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    Like,
    Love,
    Cheer,
    Applause,
    Fire,
    Heart,
}

impl ReactionType {
    /// Every known reaction kind, in counter order
    pub const ALL: [ReactionType; 6] = [
        ReactionType::Like,
        ReactionType::Love,
        ReactionType::Cheer,
        ReactionType::Applause,
        ReactionType::Fire,
        ReactionType::Heart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "like",
            ReactionType::Love => "love",
            ReactionType::Cheer => "cheer",
            ReactionType::Applause => "applause",
            ReactionType::Fire => "fire",
            ReactionType::Heart => "heart",
        }
    }

    /// Position of this kind's counter in per-session storage
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known reaction kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reaction type: {0}")]
pub struct UnknownReactionType(pub String);

impl FromStr for ReactionType {
    type Err = UnknownReactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReactionType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownReactionType(s.to_string()))
    }
}

/// An immutable record of a single user action inside a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,

    #[serde(rename = "type")]
    event_type: EventType,

    session_id: String,

    user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Map<String, Value>>,

    timestamp: DateTime<Utc>,
}

impl Event {
    /// Create a new event with a fresh id and the current UTC time
    pub fn new(
        event_type: EventType,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        payload: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            session_id: session_id.into(),
            user_id: user_id.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn join(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(EventType::JoinSession, session_id, user_id, None)
    }

    pub fn leave(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(EventType::LeaveSession, session_id, user_id, None)
    }

    pub fn reaction(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        reaction: ReactionType,
    ) -> Self {
        let mut payload = Map::new();
        payload.insert(
            REACTION_TYPE_KEY.to_string(),
            Value::String(reaction.as_str().to_string()),
        );
        Self::new(EventType::Reaction, session_id, user_id, Some(payload))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.payload.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Extract the reaction kind carried by a reaction event
    ///
    /// Returns `None` for non-reaction events and for payloads where the
    /// field is missing, not a string, or not a known kind.
    pub fn reaction_type(&self) -> Option<ReactionType> {
        if self.event_type != EventType::Reaction {
            return None;
        }
        self.payload
            .as_ref()?
            .get(REACTION_TYPE_KEY)?
            .as_str()?
            .parse()
            .ok()
    }

    /// Serialize event to JSON string (for JSONL)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize event from JSON string
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&EventType::JoinSession).unwrap();
        assert_eq!(json, "\"join_session\"");

        let parsed: EventType = serde_json::from_str("\"leave_session\"").unwrap();
        assert_eq!(parsed, EventType::LeaveSession);
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = Event::join("s1", "u1");
        let b = Event::join("s1", "u1");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_reaction_type_extraction() {
        let event = Event::reaction("s1", "u1", ReactionType::Fire);
        assert_eq!(event.reaction_type(), Some(ReactionType::Fire));
    }

    #[test]
    fn test_reaction_type_fails_soft() {
        let not_a_string = Event::new(
            EventType::Reaction,
            "s1",
            "u1",
            json!({"reaction_type": 42}).as_object().cloned(),
        );
        assert_eq!(not_a_string.reaction_type(), None);

        let unknown = Event::new(
            EventType::Reaction,
            "s1",
            "u1",
            json!({"reaction_type": "shrug"}).as_object().cloned(),
        );
        assert_eq!(unknown.reaction_type(), None);

        let missing = Event::new(EventType::Reaction, "s1", "u1", None);
        assert_eq!(missing.reaction_type(), None);

        // Non-reaction events never carry a reaction kind
        let join = Event::new(
            EventType::JoinSession,
            "s1",
            "u1",
            json!({"reaction_type": "like"}).as_object().cloned(),
        );
        assert_eq!(join.reaction_type(), None);
    }

    #[test]
    fn test_reaction_type_from_str() {
        for kind in ReactionType::ALL {
            assert_eq!(kind.as_str().parse::<ReactionType>(), Ok(kind));
        }
        assert!("LIKE".parse::<ReactionType>().is_err());
    }

    #[test]
    fn test_event_json_line() {
        let event = Event::reaction("session-1", "alice", ReactionType::Cheer);
        let line = event.to_json_line().unwrap();
        assert!(line.contains("\"type\":\"reaction\""));
        assert!(line.contains("\"session_id\":\"session-1\""));
        assert!(line.contains("\"reaction_type\":\"cheer\""));

        let parsed = Event::from_json_line(&line).unwrap();
        assert_eq!(parsed, event);
    }
}
