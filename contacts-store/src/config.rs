use std::collections::HashMap;

/// Construction parameters recognized by the engine (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The manager/database identity; combined with `auto_test` to form the
    /// on-disk file name `contacts-store{-test?}-<uuid>`.
    pub database_id: String,
    pub nonprivileged: bool,
    pub auto_test: bool,
    pub merge_presence_changes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_id: "org.example.contacts".to_string(),
            nonprivileged: false,
            auto_test: false,
            merge_presence_changes: false,
        }
    }
}

impl EngineConfig {
    pub fn new(database_id: impl Into<String>) -> Self {
        EngineConfig {
            database_id: database_id.into(),
            ..Default::default()
        }
    }

    /// Parses the string-keyed construction parameters the way the original
    /// engine's `QVariantMap` parameters are interpreted: `"true"`/`"1"` is
    /// truthy, anything else (including absence) is falsy.
    pub fn from_params(database_id: impl Into<String>, params: &HashMap<String, String>) -> Self {
        let mut config = EngineConfig::new(database_id);
        if let Some(v) = params.get("nonprivileged") {
            config.nonprivileged = is_truthy(v);
        }
        if let Some(v) = params.get("autoTest") {
            config.auto_test = is_truthy(v);
        }
        if let Some(v) = params.get("mergePresenceChanges") {
            config.merge_presence_changes = is_truthy(v);
        }
        config
    }

    /// The on-disk database file name, per spec.md §6.
    pub fn database_file_name(&self, uuid: &uuid::Uuid) -> String {
        if self.auto_test {
            format!("contacts-store-test-{uuid}")
        } else {
            format!("contacts-store-{uuid}")
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "true" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_truthy_and_falsy_strings() {
        let mut params = HashMap::new();
        params.insert("nonprivileged".to_string(), "true".to_string());
        params.insert("autoTest".to_string(), "1".to_string());
        params.insert("mergePresenceChanges".to_string(), "false".to_string());
        let config = EngineConfig::from_params("org.example", &params);
        assert!(config.nonprivileged);
        assert!(config.auto_test);
        assert!(!config.merge_presence_changes);
    }

    #[test]
    fn unknown_values_are_falsy() {
        let mut params = HashMap::new();
        params.insert("nonprivileged".to_string(), "yes".to_string());
        let config = EngineConfig::from_params("org.example", &params);
        assert!(!config.nonprivileged);
    }
}
