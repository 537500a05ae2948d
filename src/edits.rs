use crate::mac::normalize_mac;
use crate::models::{DeviceEdit, DEFAULT_ICON, UNKNOWN_NAME};
use crate::store::MacMap;

/// A name worth storing, or `None` when the device should fall back to "Unknown".
pub fn name_override(raw: Option<&str>) -> Option<String> {
    let name = raw.unwrap_or_default().trim();
    if name.is_empty() || name.eq_ignore_ascii_case(UNKNOWN_NAME) {
        None
    } else {
        Some(name.to_string())
    }
}

/// An icon worth storing, or `None` when the default icon applies.
pub fn icon_override(raw: &str) -> Option<String> {
    let icon = raw.trim();
    if icon.is_empty() || icon == DEFAULT_ICON {
        None
    } else {
        Some(icon.to_string())
    }
}

/// Applies client edits to the name and icon maps in place.
///
/// Edits without an `icon` leave the icon map alone. A missing `name` clears the name.
pub fn apply_edits(names: &mut MacMap, icons: &mut MacMap, edits: &[DeviceEdit]) {
    for edit in edits {
        let mac = normalize_mac(&edit.mac);

        match name_override(edit.name.as_deref()) {
            Some(name) => {
                names.insert(mac.clone(), name);
            }
            None => {
                names.remove(&mac);
            }
        }

        if let Some(icon) = edit.icon.as_deref() {
            match icon_override(icon) {
                Some(icon) => {
                    icons.insert(mac, icon);
                }
                None => {
                    icons.remove(&mac);
                }
            }
        }
    }
}
