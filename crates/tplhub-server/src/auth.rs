//! API-key capability check

use std::collections::HashMap;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Header carrying the caller's credential
pub const API_KEY_HEADER: &str = "X-API-Key";

/// A single capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl Permission {
    fn bit(self) -> u8 {
        match self {
            Permission::Read => 1,
            Permission::Write => 1 << 1,
            Permission::Admin => 1 << 2,
        }
    }
}

/// Resolved key table: credential to granted capability bits
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashMap<String, u8>,
}

impl ApiKeys {
    pub fn new(config: &HashMap<String, Vec<Permission>>) -> Self {
        let keys = config
            .iter()
            .map(|(key, perms)| (key.clone(), perms.iter().fold(0, |acc, p| acc | p.bit())))
            .collect();
        Self { keys }
    }

    pub fn allows(&self, key: &str, required: Permission) -> bool {
        self.keys
            .get(key)
            .is_some_and(|granted| granted & required.bit() != 0)
    }

    /// Check the request's credential against `required`
    pub fn authorize(&self, headers: &HeaderMap, required: Permission) -> Result<()> {
        let key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        if self.allows(key, required) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// Keys written to a freshly created config file
pub fn default_keys() -> HashMap<String, Vec<Permission>> {
    use Permission::*;
    HashMap::from([
        ("admin-key".to_string(), vec![Read, Write, Admin]),
        ("writer-key".to_string(), vec![Read, Write]),
        ("reader-key".to_string(), vec![Read]),
    ])
}
