// ── Status reports surfaced to the hosting context ──

use serde::{Deserialize, Serialize};
use strum::Display;

pub const STATUS_CONNECTED: &str = "connected";
pub const STATUS_DISCONNECTED: &str = "disconnected";
pub const STATUS_NO_CREDENTIALS: &str = "no credentials";
pub const STATUS_CONNECTION_ERROR: &str = "connection error";
pub const STATUS_DOOR_UNLOCKED: &str = "Door unlocked";
pub const STATUS_UNLOCK_FAILED: &str = "Failed to unlock door";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusFill {
    Green,
    Red,
}

/// `{ "fill": "green" | "red", "text": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub fill: StatusFill,
    pub text: String,
}

impl StatusReport {
    pub fn green(text: impl Into<String>) -> Self {
        Self {
            fill: StatusFill::Green,
            text: text.into(),
        }
    }

    pub fn red(text: impl Into<String>) -> Self {
        Self {
            fill: StatusFill::Red,
            text: text.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.fill == StatusFill::Green
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        insta::assert_json_snapshot!(StatusReport::red(STATUS_NO_CREDENTIALS), @r#"
        {
          "fill": "red",
          "text": "no credentials"
        }
        "#);
    }
}
