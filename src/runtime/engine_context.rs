use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdfDefinition {
    /// Fully qualified name.
    pub name: String,
    pub implementation: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdfRegistry {
    definitions: BTreeMap<String, UdfDefinition>,
}

impl UdfRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: UdfDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Looks `name` up as given, then under every import prefix in order.
    pub fn resolve(&self, name: &str, package_import_list: &[String]) -> Option<&UdfDefinition> {
        if let Some(definition) = self.definitions.get(name) {
            return Some(definition);
        }
        package_import_list.iter().find_map(|prefix| {
            let qualified = format!("{}{}", prefix, name);
            self.definitions.get(&qualified)
        })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Generated tuple schemas shipped with the script, keyed by schema id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRuntimeConfig {
    pub schemas: BTreeMap<u32, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRuntime {
    schemas: BTreeMap<u32, Vec<String>>,
}

impl SchemaRuntime {
    /// An empty runtime when schema tuples are disabled; operators then fall back
    /// to generic tuples.
    pub fn initialize(config: &SchemaRuntimeConfig, enabled: bool) -> Self {
        if !enabled {
            return Self::default();
        }
        Self {
            schemas: config.schemas.clone(),
        }
    }

    pub fn schema(&self, id: u32) -> Option<&[String]> {
        self.schemas.get(&id).map(|fields| fields.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Script-level engine state serialized on the coordinator and rebuilt in every task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineContext {
    pub udf_registry: UdfRegistry,
    pub package_import_list: Vec<String>,
    pub schema_runtime: SchemaRuntimeConfig,
    pub properties: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udf(name: &str) -> UdfDefinition {
        UdfDefinition {
            name: name.to_string(),
            implementation: "builtin".to_string(),
            arguments: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_through_import_list() {
        let mut registry = UdfRegistry::new();
        registry.register(udf("volga.builtin.Upper"));

        let imports = vec!["volga.user.".to_string(), "volga.builtin.".to_string()];
        assert_eq!(
            registry.resolve("Upper", &imports).map(|d| d.name.as_str()),
            Some("volga.builtin.Upper")
        );
        assert!(registry.resolve("volga.builtin.Upper", &[]).is_some());
        assert!(registry.resolve("Upper", &[]).is_none());
    }

    #[test]
    fn test_schema_runtime_disabled_is_empty() {
        let mut config = SchemaRuntimeConfig::default();
        config.schemas.insert(7, vec!["a".to_string()]);

        assert!(SchemaRuntime::initialize(&config, false).is_empty());
        let runtime = SchemaRuntime::initialize(&config, true);
        assert_eq!(runtime.schema(7), Some(&["a".to_string()][..]));
    }
}
