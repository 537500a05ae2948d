use crate::network::NetworkInfo;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_NAME: &str = "Unknown";
pub const DEFAULT_ICON: &str = "unknown.png";

// Aliveness x registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    AliveRegistered,
    AliveUnregistered,
    StoppedRegistered,
    StoppedUnregistered,
}

impl DeviceStatus {
    pub const ALL: [DeviceStatus; 4] = [
        DeviceStatus::AliveRegistered,
        DeviceStatus::AliveUnregistered,
        DeviceStatus::StoppedRegistered,
        DeviceStatus::StoppedUnregistered,
    ];

    pub fn classify(alive: bool, registered: bool) -> Self {
        match (alive, registered) {
            (true, true) => DeviceStatus::AliveRegistered,
            (true, false) => DeviceStatus::AliveUnregistered,
            (false, true) => DeviceStatus::StoppedRegistered,
            (false, false) => DeviceStatus::StoppedUnregistered,
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            DeviceStatus::AliveRegistered | DeviceStatus::AliveUnregistered
        )
    }

    pub fn color(&self) -> &'static str {
        match self {
            DeviceStatus::AliveRegistered => "green",
            DeviceStatus::AliveUnregistered => "orange",
            DeviceStatus::StoppedRegistered => "gray",
            DeviceStatus::StoppedUnregistered => "red",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::AliveRegistered => "Alive, registered",
            DeviceStatus::AliveUnregistered => "Alive, unregistered",
            DeviceStatus::StoppedRegistered => "Stopped, registered",
            DeviceStatus::StoppedUnregistered => "Stopped, unregistered",
        }
    }
}

pub fn is_registered(name: &str) -> bool {
    name != UNKNOWN_NAME
}

// One row of the dashboard table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub mac: String,
    pub ip: String,
    pub name: String,
    pub icon: String,
    pub vendor: String,
    pub last_seen: Option<i64>,
    pub last_seen_display: String,
    pub is_alive_now: bool,
    pub found_via_arp: bool,
    pub status: DeviceStatus,
    pub status_label: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub alive_registered: usize,
    pub alive_unregistered: usize,
    pub stopped_registered: usize,
    pub stopped_unregistered: usize,
}

impl StatusSummary {
    pub fn count(devices: &[DeviceRecord]) -> Self {
        let mut summary = Self::default();
        for device in devices {
            let slot = match device.status {
                DeviceStatus::AliveRegistered => &mut summary.alive_registered,
                DeviceStatus::AliveUnregistered => &mut summary.alive_unregistered,
                DeviceStatus::StoppedRegistered => &mut summary.stopped_registered,
                DeviceStatus::StoppedUnregistered => &mut summary.stopped_unregistered,
            };
            *slot += 1;
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceView {
    pub generated_at: String,
    pub network: Option<NetworkInfo>,
    pub active_devices: usize,
    pub summary: StatusSummary,
    pub devices: Vec<DeviceRecord>,
}

// Client-side edit of one row
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceEdit {
    pub mac: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_all_quadrants() {
        assert_eq!(
            DeviceStatus::classify(false, is_registered(UNKNOWN_NAME)),
            DeviceStatus::StoppedUnregistered
        );
        assert_eq!(
            DeviceStatus::classify(true, is_registered("Router")),
            DeviceStatus::AliveRegistered
        );
        assert_eq!(
            DeviceStatus::classify(true, false),
            DeviceStatus::AliveUnregistered
        );
        assert_eq!(
            DeviceStatus::classify(false, true),
            DeviceStatus::StoppedRegistered
        );
    }

    #[test]
    fn colors_follow_status() {
        let colors: Vec<_> = DeviceStatus::ALL.iter().map(DeviceStatus::color).collect();
        assert_eq!(colors, vec!["green", "orange", "gray", "red"]);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DeviceStatus::StoppedUnregistered).unwrap();
        assert_eq!(json, "\"stopped_unregistered\"");
    }

    #[test]
    fn edit_fields_are_optional() {
        let edit: DeviceEdit = serde_json::from_str(r#"{"mac":"aa:bb:cc:dd:ee:ff"}"#).unwrap();
        assert_eq!(edit.name, None);
        assert_eq!(edit.icon, None);
    }
}
