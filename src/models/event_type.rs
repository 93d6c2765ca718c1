//! Known event types. Raw events keep their `event_type` as a plain string so
//! that unrecognised values are grouped as-is; this enum only names the known set.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Login,
    Logout,
    Purchase,
    Error,
    Click,
    View,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Login,
        EventType::Logout,
        EventType::Purchase,
        EventType::Error,
        EventType::Click,
        EventType::View,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Login => "login",
            EventType::Logout => "logout",
            EventType::Purchase => "purchase",
            EventType::Error => "error",
            EventType::Click => "click",
            EventType::View => "view",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "login" => Some(EventType::Login),
            "logout" => Some(EventType::Logout),
            "purchase" => Some(EventType::Purchase),
            "error" => Some(EventType::Error),
            "click" => Some(EventType::Click),
            "view" => Some(EventType::View),
            _ => None,
        }
    }

    pub fn is_known(s: &str) -> bool {
        Self::from_str(s).is_some()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
