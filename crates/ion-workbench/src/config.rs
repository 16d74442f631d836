use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use ion_types::ObjectType;
use serde::{Deserialize, Serialize};

use crate::error::{WorkbenchError, WorkbenchResult};

/// Configuration for one workbench.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Bound on every remote round trip, in seconds.
    pub request_timeout: u64,
    /// Whether pull and push ship the object tree of each branch head.
    pub get_head_content: bool,
    /// Fetch rounds a remote-aware checkout or link resolution performs
    /// before giving up.
    pub fetch_attempts: usize,
    /// Inserts between dead-entry sweeps of the shared element cache.
    pub cache_prune_interval: usize,
    /// Object types never shipped or checked out.
    pub excluded_types: Vec<ObjectType>,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            request_timeout: 30,
            get_head_content: true,
            fetch_attempts: 3,
            cache_prune_interval: ion_store::DEFAULT_PRUNE_INTERVAL,
            excluded_types: Vec::new(),
        }
    }
}

impl WorkbenchConfig {
    pub fn from_toml_str(s: &str) -> WorkbenchResult<Self> {
        toml::from_str(s).map_err(|e| WorkbenchError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> WorkbenchResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> WorkbenchResult<String> {
        toml::to_string(self).map_err(|e| WorkbenchError::Config(e.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn excluded_set(&self) -> HashSet<ObjectType> {
        self.excluded_types.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = WorkbenchConfig::default();
        assert_eq!(c.request_timeout, 30);
        assert!(c.get_head_content);
        assert_eq!(c.fetch_attempts, 3);
        assert_eq!(c.cache_prune_interval, 256);
        assert!(c.excluded_types.is_empty());
        assert_eq!(c.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = WorkbenchConfig::from_toml_str(
            r#"
            request_timeout = 5
            get_head_content = false

            [[excluded_types]]
            object_id = 2001
            version = 1
            "#,
        )
        .unwrap();
        assert_eq!(c.request_timeout, 5);
        assert!(!c.get_head_content);
        assert_eq!(c.fetch_attempts, 3);
        assert!(c.excluded_set().contains(&ObjectType::new(2001, 1)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fetch_attempts = 7").unwrap();
        let c = WorkbenchConfig::load(file.path()).unwrap();
        assert_eq!(c.fetch_attempts, 7);
        assert_eq!(c.request_timeout, 30);
    }

    #[test]
    fn config_survives_toml() {
        let c = WorkbenchConfig {
            excluded_types: vec![ObjectType::new(9, 2)],
            ..WorkbenchConfig::default()
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(WorkbenchConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            WorkbenchConfig::from_toml_str("request_timeout = \"soon\""),
            Err(WorkbenchError::Config(_))
        ));
    }
}
