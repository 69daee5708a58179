//! Flexible-ISA flags per provider and account type, persisted as one JSON blob

use super::clock::{Clock, SystemClock};
use super::store::{KeyValueStore, StoreError};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Storage slot holding the serialized settings map
pub const SETTINGS_SLOT: &str = "isa_account_settings";

/// Composite key -> setting, as persisted
pub type SettingsMap = BTreeMap<String, IsaAccountSetting>;

/// Flexible flag for one (provider, ISA type) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IsaAccountSetting {
    pub is_flexible: bool,
    /// Provider name as entered, e.g. "Vanguard"
    pub provider: String,
    /// ISA type as entered, e.g. "stocks_shares"
    pub isa_type: String,
    /// When the flag was last written (ISO-8601, UTC)
    #[serde(with = "iso_millis")]
    #[schemars(with = "String")]
    pub created_date: DateTime<Utc>,
}

/// Lowercase `"{provider}_{isa_type}"` with each whitespace run replaced by `_`.
///
/// No trimming: `" A  B "` + `"x"` gives `"_a_b__x"`. Distinct pairs that
/// normalize to the same key share one setting.
pub fn derive_key(provider: &str, isa_type: &str) -> String {
    let joined = format!("{}_{}", provider, isa_type).to_lowercase();
    let mut key = String::with_capacity(joined.len());
    let mut in_whitespace = false;
    for ch in joined.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                key.push('_');
            }
            in_whitespace = true;
        } else {
            key.push(ch);
            in_whitespace = false;
        }
    }
    key
}

/// Settings store over a single slot of a `KeyValueStore`.
///
/// Mutations hold a writer lock across load, modify and persist, so concurrent
/// `set`/`delete` calls through the same instance never drop each other's
/// updates. Two instances over the same backing slot are not coordinated.
pub struct IsaSettings<S, C = SystemClock> {
    store: S,
    clock: C,
    writer: Mutex<()>,
}

impl<S: KeyValueStore> IsaSettings<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> IsaSettings<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        IsaSettings {
            store,
            clock,
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every stored setting. A missing, unreadable or corrupt blob reads as empty.
    pub fn load_all(&self) -> SettingsMap {
        let raw = match self.store.read(SETTINGS_SLOT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SettingsMap::new(),
            Err(err) => {
                log::warn!("Failed to read ISA settings, using defaults: {}", err);
                return SettingsMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("Ignoring unparseable ISA settings: {}", err);
                SettingsMap::new()
            }
        }
    }

    pub fn get(&self, provider: &str, isa_type: &str) -> Option<IsaAccountSetting> {
        self.load_all().remove(&derive_key(provider, isa_type))
    }

    /// `false` when no setting exists
    pub fn is_flexible(&self, provider: &str, isa_type: &str) -> bool {
        self.get(provider, isa_type)
            .is_some_and(|setting| setting.is_flexible)
    }

    /// Upsert the flag. `created_date` is restamped on every write, including
    /// updates to an existing setting.
    pub fn set(
        &self,
        provider: &str,
        isa_type: &str,
        is_flexible: bool,
    ) -> Result<IsaAccountSetting, StoreError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut settings = self.load_all();
        let key = derive_key(provider, isa_type);
        let setting = IsaAccountSetting {
            is_flexible,
            provider: provider.to_string(),
            isa_type: isa_type.to_string(),
            created_date: self.clock.now(),
        };
        settings.insert(key.clone(), setting.clone());
        self.persist(&settings)?;
        log::info!("Saved ISA setting {} (flexible: {})", key, is_flexible);
        Ok(setting)
    }

    /// Returns whether a setting was removed. Nothing is written when absent.
    pub fn delete(&self, provider: &str, isa_type: &str) -> Result<bool, StoreError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut settings = self.load_all();
        let key = derive_key(provider, isa_type);
        if settings.remove(&key).is_none() {
            log::debug!("No ISA setting {} to delete", key);
            return Ok(false);
        }
        self.persist(&settings)?;
        log::info!("Deleted ISA setting {}", key);
        Ok(true)
    }

    /// Drop every stored setting
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.remove(SETTINGS_SLOT)
    }

    fn persist(&self, settings: &SettingsMap) -> Result<(), StoreError> {
        let blob = serde_json::to_string(settings)?;
        self.store.write(SETTINGS_SLOT, &blob)
    }
}

mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::store::MemoryStore;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 10, 9, 30, 0).unwrap()
    }

    fn settings() -> IsaSettings<MemoryStore, FixedClock> {
        IsaSettings::with_clock(MemoryStore::new(), FixedClock(fixed_time()))
    }

    #[test]
    fn derive_key_lowercases_and_collapses_whitespace() {
        assert_eq!(derive_key("Monzo", "Cash ISA"), "monzo_cash_isa");
        assert_eq!(derive_key("Vanguard", "stocks_shares"), "vanguard_stocks_shares");
        assert_eq!(derive_key("Hargreaves  Lansdown", "Stocks\t&\nShares"), "hargreaves_lansdown_stocks_&_shares");
    }

    #[test]
    fn derive_key_does_not_trim() {
        assert_eq!(derive_key(" A  B ", "x"), "_a_b__x");
        assert_eq!(derive_key("", ""), "_");
    }

    #[test]
    fn derive_key_collisions_share_a_setting() {
        let store = settings();
        store.set("Monzo", "Cash ISA", true).unwrap();
        store.set("monzo", "cash   isa", false).unwrap();

        let all = store.load_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all["monzo_cash_isa"].provider, "monzo");
        assert!(!store.is_flexible("Monzo", "Cash ISA"));
    }

    #[test]
    fn set_then_get() {
        let store = settings();
        let saved = store.set("Vanguard", "stocks_shares", true).unwrap();
        let loaded = store.get("Vanguard", "stocks_shares").unwrap();

        assert_eq!(saved, loaded);
        assert!(loaded.is_flexible);
        assert_eq!(loaded.provider, "Vanguard");
        assert_eq!(loaded.isa_type, "stocks_shares");
        assert_eq!(loaded.created_date, fixed_time());
    }

    #[test]
    fn absent_is_distinct_from_not_flexible() {
        let store = settings();
        store.set("Monzo", "cash", false).unwrap();

        assert_eq!(store.get("Unknown", "cash"), None);
        assert!(!store.is_flexible("Unknown", "cash"));
        assert_eq!(store.get("Monzo", "cash").map(|s| s.is_flexible), Some(false));
    }

    #[test]
    fn set_restamps_created_date() {
        let backing = MemoryStore::new();
        IsaSettings::with_clock(&backing, FixedClock(fixed_time()))
            .set("Trading 212", "cash", true)
            .unwrap();

        let later = fixed_time() + chrono::Duration::days(3);
        IsaSettings::with_clock(&backing, FixedClock(later))
            .set("Trading 212", "cash", false)
            .unwrap();

        let setting = IsaSettings::new(&backing).get("Trading 212", "cash").unwrap();
        assert_eq!(setting.created_date, later);
        assert!(!setting.is_flexible);
    }

    #[test]
    fn delete_removes_and_reports() {
        let store = settings();
        store.set("Monzo", "cash", true).unwrap();
        store.set("Vanguard", "stocks_shares", true).unwrap();

        assert!(store.delete("Monzo", "cash").unwrap());
        assert!(!store.delete("Monzo", "cash").unwrap());
        assert_eq!(store.get("Monzo", "cash"), None);
        assert!(store.get("Vanguard", "stocks_shares").is_some());
    }

    #[test]
    fn delete_of_absent_key_does_not_write() {
        let store = settings();
        store.store().reject_writes(true);
        assert!(!store.delete("Nobody", "cash").unwrap());
    }

    #[test]
    fn corrupt_blob_reads_as_empty() {
        let store = settings();
        store.store().write(SETTINGS_SLOT, "{not json").unwrap();
        assert!(store.load_all().is_empty());
        assert!(!store.is_flexible("Monzo", "cash"));

        // the next write replaces the corrupt blob
        store.set("Monzo", "cash", true).unwrap();
        assert!(store.is_flexible("Monzo", "cash"));
    }

    #[test]
    fn write_failure_propagates() {
        let store = settings();
        store.store().reject_writes(true);
        let err = store.set("Monzo", "cash", true).unwrap_err();
        assert!(matches!(err, StoreError::WriteRejected(ref slot) if slot == SETTINGS_SLOT));
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn blob_uses_camel_case_and_iso_timestamps() {
        let store = settings();
        store.set("Vanguard", "stocks_shares", true).unwrap();
        let raw = store.store().read(SETTINGS_SLOT).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &json["vanguard_stocks_shares"];
        assert_eq!(entry["isFlexible"], true);
        assert_eq!(entry["provider"], "Vanguard");
        assert_eq!(entry["isaType"], "stocks_shares");
        assert_eq!(entry["createdDate"], "2025-04-10T09:30:00.000Z");
    }

    #[test]
    fn reads_blobs_with_offsets() {
        let store = settings();
        let blob = r#"{"monzo_cash":{"isFlexible":true,"provider":"Monzo","isaType":"cash","createdDate":"2024-11-02T10:15:30.250+01:00"}}"#;
        store.store().write(SETTINGS_SLOT, blob).unwrap();
        let setting = store.get("Monzo", "cash").unwrap();
        assert_eq!(
            setting.created_date,
            Utc.with_ymd_and_hms(2024, 11, 2, 9, 15, 30).unwrap() + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn clear_removes_everything() {
        let store = settings();
        store.set("Monzo", "cash", true).unwrap();
        store.clear().unwrap();
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn concurrent_sets_through_one_store_are_not_lost() {
        let store = settings();
        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    store.set(&format!("Provider {}", i), "cash", i % 2 == 0).unwrap();
                });
            }
        });
        assert_eq!(store.load_all().len(), 8);
    }
}
