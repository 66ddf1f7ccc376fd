use std::collections::{BTreeMap, HashMap};

use dronenode_proto::UNKNOWN;
use serde::Deserialize;
use serde_json::Value;

/// Mode table as it appears in the config file. Defaults to ArduCopter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModeTableConfig {
    /// Code used when a mode name is not in the table.
    pub default_code: u32,
    pub table: BTreeMap<String, u32>,
}

impl Default for ModeTableConfig {
    fn default() -> Self {
        let table = [
            ("STABILIZE", 0),
            ("ACRO", 1),
            ("ALT_HOLD", 2),
            ("AUTO", 3),
            ("GUIDED", 4),
            ("LOITER", 5),
            ("RTL", 6),
            ("CIRCLE", 7),
            ("LAND", 9),
        ]
        .into_iter()
        .map(|(name, code)| (name.to_string(), code))
        .collect();
        Self { default_code: 0, table }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModeTableError {
    #[error("mode table is empty")]
    Empty,
    #[error("mode name {0:?} appears more than once (names are case-insensitive)")]
    DuplicateName(String),
    #[error("modes {first:?} and {second:?} share custom_mode code {code}")]
    DuplicateCode { code: u32, first: String, second: String },
}

/// Bidirectional name <-> custom_mode mapping for one autopilot family.
#[derive(Debug, Clone)]
pub struct ModeTable {
    by_name: HashMap<String, u32>,
    by_code: HashMap<u32, String>,
    default_code: u32,
}

impl ModeTable {
    pub fn from_config(cfg: &ModeTableConfig) -> Result<Self, ModeTableError> {
        if cfg.table.is_empty() {
            return Err(ModeTableError::Empty);
        }
        let mut by_name = HashMap::new();
        let mut by_code: HashMap<u32, String> = HashMap::new();
        for (name, &code) in &cfg.table {
            let name = name.trim().to_ascii_uppercase();
            if by_name.insert(name.clone(), code).is_some() {
                return Err(ModeTableError::DuplicateName(name));
            }
            if let Some(first) = by_code.insert(code, name.clone()) {
                return Err(ModeTableError::DuplicateCode { code, first, second: name });
            }
        }
        Ok(Self { by_name, by_code, default_code: cfg.default_code })
    }

    /// ArduCopter table.
    pub fn arducopter() -> Self {
        let cfg = ModeTableConfig::default();
        let by_code = cfg.table.iter().map(|(name, &code)| (code, name.clone())).collect();
        Self { by_name: cfg.table.into_iter().collect(), by_code, default_code: cfg.default_code }
    }

    /// Unknown names resolve to the configured default code.
    pub fn name_to_code(&self, name: &str) -> u32 {
        self.by_name
            .get(&name.trim().to_ascii_uppercase())
            .copied()
            .unwrap_or(self.default_code)
    }

    pub fn code_to_name(&self, code: u32) -> &str {
        self.by_code.get(&code).map(String::as_str).unwrap_or(UNKNOWN)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn default_code(&self) -> u32 {
        self.default_code
    }
}

/// A mode request as accepted by `setMode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeInput {
    Name(String),
    Code(u32),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModeInputError {
    #[error("mode must be a name, a non-negative integer code, or an object with one of `value`, `mode`, `input`; got {0}")]
    Unrecognized(String),
}

const MODE_KEYS: [&str; 3] = ["value", "mode", "input"];

impl ModeInput {
    /// Strict parse: a string, an integer, or `{"value"|"mode"|"input": <string|integer>}`.
    /// Anything else is rejected rather than probed.
    pub fn from_json(v: &Value) -> Result<Self, ModeInputError> {
        if let Some(m) = Self::scalar(v) {
            return Ok(m);
        }
        if let Value::Object(map) = v {
            if map.len() == 1 {
                if let Some((key, inner)) = map.iter().next() {
                    if MODE_KEYS.contains(&key.as_str()) {
                        if let Some(m) = Self::scalar(inner) {
                            return Ok(m);
                        }
                    }
                }
            }
        }
        Err(ModeInputError::Unrecognized(v.to_string()))
    }

    fn scalar(v: &Value) -> Option<Self> {
        match v {
            Value::String(s) if !s.trim().is_empty() => Some(ModeInput::Name(s.clone())),
            Value::Number(n) => n.as_u64().and_then(|c| u32::try_from(c).ok()).map(ModeInput::Code),
            _ => None,
        }
    }

    pub fn resolve(&self, table: &ModeTable) -> u32 {
        match self {
            ModeInput::Name(name) => table.name_to_code(name),
            ModeInput::Code(code) => *code,
        }
    }
}

impl From<&str> for ModeInput {
    fn from(name: &str) -> Self {
        ModeInput::Name(name.to_string())
    }
}
