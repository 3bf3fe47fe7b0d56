// ── API-to-domain conversions ──
//
// Capabilities are decided here, once, from the hardware family the
// directory reports. Nothing downstream inspects the raw kind again to
// decide what a device can do.

use ringbridge_api::DeviceRecord;

use crate::model::{CapabilitySet, DeviceHandle, Snapshot};

impl From<DeviceRecord> for DeviceHandle {
    fn from(record: DeviceRecord) -> Self {
        let capabilities = CapabilitySet::for_kind(record.kind);
        DeviceHandle::new(
            record.id.into(),
            record.location_id.into(),
            record.kind,
            record.description,
            capabilities,
            Snapshot::new(record.data),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Capability;
    use ringbridge_api::DeviceKind;
    use serde_json::json;

    #[test]
    fn intercom_record_becomes_full_handle() {
        let record = DeviceRecord {
            id: "D1".into(),
            location_id: "L1".into(),
            kind: DeviceKind::Intercom,
            description: "Front gate".into(),
            data: json!({ "lock": "locked" }),
        };

        let handle = DeviceHandle::from(record);
        assert_eq!(handle.id().as_str(), "D1");
        assert_eq!(handle.location_id().as_str(), "L1");
        assert_eq!(handle.name(), "Front gate");
        assert!(handle.capabilities().contains(Capability::Unlock));
        assert_eq!(handle.latest_state().as_value()["lock"], "locked");
    }

    #[test]
    fn unknown_kind_has_no_capabilities() {
        let record = DeviceRecord {
            id: "X".into(),
            location_id: "L1".into(),
            kind: DeviceKind::Other,
            description: String::new(),
            data: serde_json::Value::Null,
        };
        assert!(DeviceHandle::from(record).capabilities().is_empty());
    }
}
