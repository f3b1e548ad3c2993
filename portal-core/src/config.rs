//! Configuration loading. `TomlConfigStore` loads `config.toml` the way
//! `uwb-simulator/src/main.rs` loads its own: read the file next to the
//! binary, fall back to the bundled default via `include_str!`, then parse.
//! `SystemConfig` resolves every recognised key against a `ConfigStore`,
//! substituting the documented default and logging once when a key is
//! absent or malformed (§7 "configuration absent/invalid").

use std::collections::HashMap;

use portal_wire::{ChannelId, Thresholds};
use toml::Value;
use tracing::warn;

use crate::error::CoreError;

/// Abstracts the "key/value store" spec.md §6 loads configuration from, so a
/// GeV5-style flat `.ini` source could back the same core without touching it.
pub trait ConfigStore: Send + Sync {
    fn get_str(&self, key: &str) -> Option<String>;
}

/// Default TOML-backed store. Flattens nested tables so `[channels] D1_ON =
/// 1` resolves under the bare legacy key name `D1_ON`, matching flat
/// `.ini`-style sources that might back this trait instead.
pub struct TomlConfigStore {
    flat: HashMap<String, String>,
}

impl TomlConfigStore {
    pub fn load(path: &str) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)
            .unwrap_or_else(|_| include_str!("../config.toml").to_string());
        let value: Value = toml::from_str(&raw)?;
        let mut flat = HashMap::new();
        flatten_into(&value, &mut flat);
        Ok(Self { flat })
    }
}

fn flatten_into(value: &Value, out: &mut HashMap<String, String>) {
    if let Value::Table(table) = value {
        for (key, v) in table {
            match v {
                Value::Table(_) => flatten_into(v, out),
                other => {
                    out.insert(key.clone(), scalar_to_string(other));
                }
            }
        }
    }
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => if *b { "1".to_string() } else { "0".to_string() },
        other => other.to_string(),
    }
}

impl ConfigStore for TomlConfigStore {
    fn get_str(&self, key: &str) -> Option<String> {
        self.flat.get(key).cloned()
    }
}

fn resolve<T: std::str::FromStr>(store: &dyn ConfigStore, key: &str, default: T) -> T {
    match store.get_str(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("config key `{key}` malformed (`{raw}`), using default");
            default
        }),
        None => default,
    }
}

fn resolve_bool(store: &dyn ConfigStore, key: &str, default: bool) -> bool {
    match store.get_str(key) {
        Some(raw) => raw != "0",
        None => default,
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub thresholds: Thresholds,
}

/// Resolved, validated configuration for one run (spec.md §6 and §10.4).
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub sample_time_s: f64,
    pub distance_cellules_m: f64,
    pub mode_sans_cellules: bool,
    pub sim: bool,
    pub hardware_host: String,
    pub hardware_port: u16,
    pub arm_delay_s: f64,
    pub min_off_s: f64,
    pub stable_s: f64,
    pub confirm_timeout_s: f64,
    pub channels: HashMap<ChannelId, ChannelConfig>,
}

impl SystemConfig {
    pub fn resolve(store: &dyn ConfigStore) -> Self {
        let multiple = resolve(store, "multiple", 1.5);
        let n1_default = resolve(store, "seuil2", 10000.0);
        let low_default = resolve(store, "low", 10.0);
        let high_default = resolve(store, "high", 1000.0);
        let n2_factor = resolve(store, "n2_factor", 1.5);
        let reset_ratio = resolve(store, "reset_ratio", 0.8);

        let mut channels = HashMap::new();
        for id in ChannelId::all() {
            let n = id.get();
            let enabled = resolve_bool(store, &format!("D{n}_ON"), true);
            let thresholds = Thresholds {
                low: resolve(store, &format!("D{n}_LOW"), low_default),
                high: resolve(store, &format!("D{n}_HIGH"), high_default),
                n1: resolve(store, &format!("D{n}_N1"), n1_default),
                n2_factor: resolve(store, &format!("D{n}_N2_FACTOR"), n2_factor),
                reset_ratio: resolve(store, &format!("D{n}_RESET_RATIO"), reset_ratio),
                multiple: resolve(store, &format!("D{n}_MULTIPLE"), multiple),
            };
            channels.insert(id, ChannelConfig { enabled, thresholds });
        }

        SystemConfig {
            sample_time_s: resolve(store, "sample_time", 0.1),
            distance_cellules_m: resolve(store, "distance_cellules", 0.75),
            mode_sans_cellules: resolve_bool(store, "Mode_sans_cellules", false),
            sim: resolve_bool(store, "SIM", true),
            hardware_host: resolve(store, "host", "127.0.0.1".to_string()),
            hardware_port: resolve(store, "port", 8080u16),
            arm_delay_s: resolve(store, "arm_delay_s", 2.0),
            min_off_s: resolve(store, "min_off_s", 0.2),
            stable_s: resolve(store, "stable_s", 0.2),
            confirm_timeout_s: resolve(store, "confirm_timeout_s", 15.0),
            channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    struct MapStore(StdHashMap<&'static str, &'static str>);
    impl ConfigStore for MapStore {
        fn get_str(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|s| s.to_string())
        }
    }

    #[test]
    fn missing_keys_fall_back_to_documented_defaults() {
        let store = MapStore(StdHashMap::new());
        let cfg = SystemConfig::resolve(&store);
        assert_eq!(cfg.sample_time_s, 0.1);
        assert_eq!(cfg.channels.len(), 12);
        assert!(cfg.channels[&ChannelId::new(1).unwrap()].enabled);
    }

    #[test]
    fn malformed_value_falls_back_and_does_not_panic() {
        let mut m = StdHashMap::new();
        m.insert("sample_time", "not-a-number");
        let store = MapStore(m);
        let cfg = SystemConfig::resolve(&store);
        assert_eq!(cfg.sample_time_s, 0.1);
    }

    #[test]
    fn per_channel_override_wins_over_global_default() {
        let mut m = StdHashMap::new();
        m.insert("D3_ON", "0");
        m.insert("seuil2", "10000");
        m.insert("D3_N1", "5000");
        let store = MapStore(m);
        let cfg = SystemConfig::resolve(&store);
        let ch3 = &cfg.channels[&ChannelId::new(3).unwrap()];
        assert!(!ch3.enabled);
        assert_eq!(ch3.thresholds.n1, 5000.0);
        let ch1 = &cfg.channels[&ChannelId::new(1).unwrap()];
        assert_eq!(ch1.thresholds.n1, 10000.0);
    }
}
