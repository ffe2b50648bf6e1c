use std::collections::HashMap;

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::error::BridgeError;

pub const ENGINE_CONTEXT_KEY: &str = "volga.engine_context";
pub const UDF_CONTEXT_KEY: &str = "volga.udf_context";
pub const PLAN_FRAGMENT_KEY: &str = "volga.plan_fragment";
pub const SPLIT_INDEX_KEY: &str = "volga.split_index";
pub const INPUT_LIMITS_KEY: &str = "volga.input_limits";
pub const AGGREGATE_WARNING_KEY: &str = "aggregate.warning";
pub const SCHEMA_TUPLE_ENABLED_KEY: &str = "volga.schema_tuple.enabled";

/// String-keyed configuration shipped with every job and task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConf {
    entries: HashMap<String, Value>,
}

impl JobConf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: HashMap<String, Value>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.entries.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Accepts both JSON booleans and the string form ("true", case-insensitive).
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s.eq_ignore_ascii_case("true")),
            _ => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.entries.insert(key.into(), Value::from(value));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores `object` as a base64 bincode payload under `key`.
    pub fn set_object<T: Serialize>(&mut self, key: impl Into<String>, object: &T) -> Result<()> {
        let encoded = encode_object(object)?;
        self.entries.insert(key.into(), Value::String(encoded));
        Ok(())
    }

    /// Decodes the payload stored under `key`. `Ok(None)` when the key is absent.
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, BridgeError> {
        let Some(value) = self.entries.get(key) else {
            return Ok(None);
        };
        let encoded = value.as_str().ok_or_else(|| {
            BridgeError::task_context(key, format!("expected a string payload, found {}", value))
        })?;
        decode_object(encoded)
            .map(Some)
            .map_err(|e| BridgeError::task_context(key, e))
    }

    pub fn require_object<T: DeserializeOwned>(&self, key: &str) -> Result<T, BridgeError> {
        self.get_object(key)?.ok_or_else(|| BridgeError::MissingTaskConfig {
            key: key.to_string(),
        })
    }
}

pub fn encode_object<T: Serialize>(object: &T) -> Result<String> {
    let bytes = bincode::serialize(object)?;
    Ok(STANDARD.encode(bytes))
}

pub fn decode_object<T: DeserializeOwned>(
    encoded: &str,
) -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
    let bytes = STANDARD.decode(encoded)?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Settings the task bridge reads out of a job configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Route operator warnings into counters instead of logging each one.
    pub aggregate_warning: bool,
    pub schema_tuple_enabled: bool,
    /// Per-input record limits, indexed by input index. Negative means unlimited.
    pub input_limits: Vec<i64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            aggregate_warning: false,
            schema_tuple_enabled: true,
            input_limits: Vec::new(),
        }
    }
}

impl BridgeConfig {
    pub fn input_limit(&self, input_index: usize) -> Option<u64> {
        self.input_limits
            .get(input_index)
            .copied()
            .filter(|limit| *limit >= 0)
            .map(|limit| limit as u64)
    }
}

pub fn parse_bridge_config_from_job_config(conf: &JobConf) -> BridgeConfig {
    let defaults = BridgeConfig::default();
    let input_limits = conf
        .get(INPUT_LIMITS_KEY)
        .and_then(|v| v.as_array())
        .map(|values| values.iter().map(|v| v.as_i64().unwrap_or(-1)).collect())
        .unwrap_or_default();

    BridgeConfig {
        aggregate_warning: conf
            .get_bool(AGGREGATE_WARNING_KEY)
            .unwrap_or(defaults.aggregate_warning),
        schema_tuple_enabled: conf
            .get_bool(SCHEMA_TUPLE_ENABLED_KEY)
            .unwrap_or(defaults.schema_tuple_enabled),
        input_limits,
    }
}
