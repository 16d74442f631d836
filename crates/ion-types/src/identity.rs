use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of one versioned object graph.
///
/// Repository keys are random UUIDs assigned at creation and carried in the
/// mutable head, so every process holding a copy of the repository agrees on
/// its name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryKey(String);

impl RepositoryKey {
    /// Generate a fresh random repository key.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing key, e.g. one received on the wire.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidRepositoryKey(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short identifier (first 8 characters).
    pub fn short_id(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Debug for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepositoryKey({})", self.short_id())
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a branch within one repository.
///
/// Branch keys are random 8-hex-character strings shared by every copy of the
/// repository.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchKey(String);

impl BranchKey {
    /// Generate a fresh random branch key.
    pub fn generate() -> Self {
        let bytes: [u8; 4] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    /// Validate and wrap an existing branch key.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() != 8 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidBranchKey(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BranchKey({})", self.0)
    }
}

impl fmt::Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
