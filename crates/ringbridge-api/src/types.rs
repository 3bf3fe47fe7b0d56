//! Wire records exchanged with the vendor cloud.
//!
//! Field names follow the vendor JSON (`camelCase`). Device state is kept
//! as raw JSON: its shape is provider-defined and only ever passed through.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Hardware family reported by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    Intercom,
    Doorbell,
    Camera,
    Chime,
    #[serde(other)]
    Other,
}

/// A device as listed by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    pub location_id: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub description: String,
    /// Provider-defined device data at listing time.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A location and the devices installed there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

/// Push event families a device can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// Someone pressed the call button.
    Ding,
    /// The door was released.
    Unlocked,
    /// The device's data changed for any other reason.
    DataUpdate,
}

/// A single push event, carrying the device data at emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    pub kind: EventKind,
    pub snapshot: serde_json::Value,
}

/// A refresh token issued by the session service ahead of expiry.
#[derive(Debug, Clone)]
pub struct TokenUpdate {
    pub old_token: Option<SecretString>,
    pub new_token: SecretString,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_location_with_devices() {
        let json = r#"{
            "id": "L1",
            "name": "Home",
            "devices": [
                {
                    "id": "D1",
                    "locationId": "L1",
                    "kind": "intercom",
                    "description": "Front gate",
                    "data": { "battery_life": 87 }
                },
                {
                    "id": "D2",
                    "locationId": "L1",
                    "kind": "stick_up_cam"
                }
            ]
        }"#;

        let location: LocationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(location.id, "L1");
        assert_eq!(location.devices.len(), 2);
        assert_eq!(location.devices[0].kind, DeviceKind::Intercom);
        assert_eq!(location.devices[0].data["battery_life"], 87);
        // Unknown hardware families collapse to `Other`.
        assert_eq!(location.devices[1].kind, DeviceKind::Other);
        assert!(location.devices[1].data.is_null());
    }

    #[test]
    fn kind_display_is_path_friendly() {
        assert_eq!(DeviceKind::Intercom.to_string(), "intercom");
        assert_eq!(EventKind::DataUpdate.to_string(), "data_update");
        assert_eq!("ding".parse::<EventKind>().unwrap(), EventKind::Ding);
    }

    #[test]
    fn device_event_shape() {
        let event = DeviceEvent {
            kind: EventKind::Unlocked,
            snapshot: serde_json::json!({ "lock": "unlocked" }),
        };
        insta::assert_json_snapshot!(event, @r#"
        {
          "kind": "unlocked",
          "snapshot": {
            "lock": "unlocked"
          }
        }
        "#);
    }
}
