//! Serialization and Persistence
//!
//! Fin sets are saved and loaded as JSON documents holding the complete
//! mixing configuration of every fin, in positional order.

use crate::error::{ConfigError, MixError};
use crate::fin::Fin;
use crate::registry::FinRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current fin-set schema version
pub const FIN_SET_VERSION: u32 = 1;

/// Serializable fin set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinSetDef {
    /// Schema version for forward compatibility
    pub version: u32,

    /// Fin set metadata
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Fins in positional order
    #[serde(default)]
    pub fins: Vec<Fin>,
}

impl FinSetDef {
    /// Create a new empty fin set definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: FIN_SET_VERSION,
            name: name.into(),
            author: None,
            description: None,
            fins: vec![],
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Append a fin
    pub fn with_fin(mut self, fin: Fin) -> Self {
        self.fins.push(fin);
        self
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load and version-check a fin set file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let def = Self::from_json(&content)?;
        if def.version > FIN_SET_VERSION {
            return Err(ConfigError::InvalidValue {
                field: "version".into(),
                message: format!(
                    "fin set version {} is newer than supported version {}",
                    def.version, FIN_SET_VERSION
                ),
            });
        }
        Ok(def)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Default for FinSetDef {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl FinRegistry {
    /// Export the current configuration
    pub fn to_def(&self, name: &str) -> FinSetDef {
        FinSetDef {
            fins: self.to_vec(),
            ..FinSetDef::new(name)
        }
    }

    /// Build a registry from a definition
    pub fn from_def(def: &FinSetDef) -> Self {
        let mut registry = Self::new();
        for fin in &def.fins {
            registry.add_fin(fin.clone());
        }
        registry
    }

    /// Replace the configuration in place, keeping surviving handles
    pub fn load_def(&mut self, def: &FinSetDef) -> Result<(), MixError> {
        self.set_fins(def.fins.clone())
    }
}
