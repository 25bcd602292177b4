use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::store::{read_versioned_array, write_versioned_array};

/// A paired operator device. The push token is persisted but never included
/// in public payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedDevice {
    pub device_id: String,
    pub platform: String,
    pub label: String,
    pub push_token: String,
    pub paired_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl PairedDevice {
    /// Wire payload for dashboards. Excludes the push token.
    pub fn public_payload(&self) -> Value {
        json!({
            "deviceId": self.device_id,
            "platform": self.platform,
            "label": self.label,
            "pairedAt": self.paired_at,
            "lastSeenAt": self.last_seen_at,
        })
    }
}

/// Disk-backed device registry. `pair` is an idempotent upsert.
pub struct DeviceRegistry {
    devices: BTreeMap<String, PairedDevice>,
    state_path: Option<PathBuf>,
}

impl DeviceRegistry {
    pub fn new(state_path: Option<impl AsRef<Path>>) -> Self {
        let mut registry = Self {
            devices: BTreeMap::new(),
            state_path: state_path.map(|p| p.as_ref().to_path_buf()),
        };
        registry.load();
        registry
    }

    pub fn pair(
        &mut self,
        device_id: &str,
        platform: &str,
        label: &str,
        push_token: &str,
        now: DateTime<Utc>,
    ) -> Result<PairedDevice> {
        let device = match self.devices.get_mut(device_id) {
            Some(existing) => {
                existing.platform = platform.to_string();
                existing.label = label.to_string();
                existing.push_token = push_token.to_string();
                existing.last_seen_at = now;
                existing.clone()
            }
            None => {
                let device = PairedDevice {
                    device_id: device_id.to_string(),
                    platform: platform.to_string(),
                    label: label.to_string(),
                    push_token: push_token.to_string(),
                    paired_at: now,
                    last_seen_at: now,
                };
                self.devices.insert(device_id.to_string(), device.clone());
                device
            }
        };
        self.save()?;
        Ok(device)
    }

    pub fn list(&self) -> Vec<&PairedDevice> {
        self.devices.values().collect()
    }

    pub fn unpair(&mut self, device_id: &str) -> Result<bool> {
        let removed = self.devices.remove(device_id).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn register_push(
        &mut self,
        device_id: &str,
        push_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PairedDevice>> {
        let Some(device) = self.devices.get_mut(device_id) else {
            return Ok(None);
        };
        device.push_token = push_token.to_string();
        device.last_seen_at = now;
        let device = device.clone();
        self.save()?;
        Ok(Some(device))
    }

    /// Queue a test notification. There is no real push provider behind
    /// this; the outcome payload tells the operator whether the device was
    /// found.
    pub fn notify_test(&mut self, device_id: &str, message: &str, now: DateTime<Utc>) -> Result<Value> {
        let Some(device) = self.devices.get_mut(device_id) else {
            return Ok(json!({"status": "missing_device", "deviceId": device_id}));
        };
        device.last_seen_at = now;
        self.save()?;
        Ok(json!({"status": "queued", "deviceId": device_id, "message": message}))
    }

    fn load(&mut self) {
        let Some(ref path) = self.state_path else {
            return;
        };
        for raw in read_versioned_array(path, "devices") {
            match serde_json::from_value::<PairedDevice>(raw) {
                Ok(device) => {
                    self.devices.insert(device.device_id.clone(), device);
                }
                Err(err) => warn!(error = %err, "skipping malformed device record"),
            }
        }
    }

    fn save(&self) -> Result<()> {
        let Some(ref path) = self.state_path else {
            return Ok(());
        };
        let items = self
            .devices
            .values()
            .map(|d| serde_json::to_value(d).expect("device serialization must not fail"))
            .collect();
        write_versioned_array(path, "devices", items)
    }
}
