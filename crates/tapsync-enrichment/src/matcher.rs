//! Weak-key correlation of hardware addresses to platform device ids.
//!
//! A MAC is not a stable foreign key: the platform may have recorded the
//! same interface as several devices over time, or none at all. The match
//! therefore resolves to zero, one, or many device ids, and callers see
//! the "not found" case explicitly.

use std::collections::HashMap;

use crate::client::Device;

/// Case-normalized map from hardware address to the matching device ids.
#[derive(Debug, Default)]
pub struct DeviceMatch {
    by_mac: HashMap<String, Vec<u64>>,
}

impl DeviceMatch {
    /// Build the map from a device search result. Layer-3 records are
    /// skipped; the cloud metadata belongs on the layer-2 device.
    #[must_use]
    pub fn from_devices(devices: &[Device]) -> Self {
        let mut by_mac: HashMap<String, Vec<u64>> = HashMap::new();
        for device in devices.iter().filter(|d| !d.is_l3) {
            by_mac
                .entry(device.macaddr.to_lowercase())
                .or_default()
                .push(device.id);
        }
        Self { by_mac }
    }

    /// Device ids recorded for a hardware address, if any.
    #[must_use]
    pub fn lookup(&self, mac: &str) -> Option<&[u64]> {
        self.by_mac.get(&mac.to_lowercase()).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: u64, macaddr: &str, is_l3: bool) -> Device {
        Device {
            id,
            macaddr: macaddr.to_string(),
            is_l3,
        }
    }

    #[test]
    fn matches_are_case_normalized() {
        let devices = vec![device(7, "AA:BB:CC:DD:EE:FF", false)];
        let matches = DeviceMatch::from_devices(&devices);
        assert_eq!(matches.lookup("aa:bb:cc:dd:ee:ff"), Some(&[7u64][..]));
        assert_eq!(matches.lookup("AA:BB:CC:DD:EE:FF"), Some(&[7u64][..]));
    }

    #[test]
    fn layer3_records_are_excluded() {
        let devices = vec![
            device(1, "aa:bb:cc:dd:ee:ff", true),
            device(2, "aa:bb:cc:dd:ee:ff", false),
        ];
        let matches = DeviceMatch::from_devices(&devices);
        assert_eq!(matches.lookup("aa:bb:cc:dd:ee:ff"), Some(&[2u64][..]));
    }

    #[test]
    fn one_mac_may_match_many_devices() {
        let devices = vec![
            device(1, "aa:bb:cc:dd:ee:ff", false),
            device(2, "aa:bb:cc:dd:ee:ff", false),
        ];
        let matches = DeviceMatch::from_devices(&devices);
        assert_eq!(matches.lookup("aa:bb:cc:dd:ee:ff").unwrap().len(), 2);
    }

    #[test]
    fn unknown_mac_is_not_found() {
        let matches = DeviceMatch::from_devices(&[]);
        assert!(matches.lookup("aa:bb:cc:dd:ee:ff").is_none());
    }
}
