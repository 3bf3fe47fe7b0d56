// ── Identity types ──
//
// Vendor identifiers are opaque strings. Wrapping them keeps device and
// location ids from being swapped in topic construction.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Vendor device identifier.
    DeviceId
);

string_id!(
    /// Vendor location identifier.
    LocationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_raw_value() {
        assert_eq!(DeviceId::from("D1").to_string(), "D1");
        assert_eq!(LocationId::new(String::from("L1")).as_str(), "L1");
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&DeviceId::from("12345")).unwrap_or_default();
        assert_eq!(json, r#""12345""#);
    }
}
