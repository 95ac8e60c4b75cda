//! Key-to-Query Mapping Router
//!
//! The router turns memcached keys into parameterized row lookups. Each
//! configured mapping binds a logical name to one (table, key column,
//! value columns) tuple; at startup every mapping is compiled into a
//! SELECT and validated against the database, and lookups then route by
//! key namespace:
//!
//! ```text
//! get user:42              lookup "user:42"  via mapping "default"
//! get @@users.42           lookup "42"       via mapping "users"
//! get @@users.a.b          lookup "a.b"      via mapping "users"
//! ```
//!
//! A `@@`-prefixed key without a `.` is a client error. An unknown
//! mapping name is reported as a plain miss: from the client's point of
//! view a missing namespace and a missing key look the same.
//!
//! The router is built once and read-only afterwards; it performs no
//! locking of its own. It also serves as the gateway's default `Setter`
//! and `Deleter`: sets are accepted and discarded, deletes always
//! report not-found, since there is nothing to mutate behind a
//! read-through gateway.

mod table;

pub use table::QueryError;

use crate::commands::{Deleter, Getter, NotFound, Setter};
use crate::config::MappingConfig;
use crate::protocol::{Item, Response};
use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use std::collections::HashMap;
use table::TableMapping;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Prefix selecting an explicit mapping namespace.
const MAPPING_PREFIX: &str = "@@";
/// Separates the mapping name from the sub-key.
const MAPPING_SEP: char = '.';
/// Mapping used for keys without a namespace prefix.
const DEFAULT_MAPPING: &str = "default";
/// Joins value columns in rendered values and splits them in config.
pub(crate) const VALUE_SEPARATOR: &str = "|";

/// Errors raised while building the router. All of them are fatal: the
/// process must not start serving with a partially compiled registry.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("failed to prepare mapping {mapping}: {source}")]
    Prepare {
        mapping: String,
        source: sqlx::Error,
    },
    #[error("duplicate mapping name {0}")]
    DuplicateMapping(String),
}

/// The compiled mapping registry.
pub struct MappingRouter {
    tables: HashMap<String, TableMapping>,
}

impl MappingRouter {
    /// Compiles every configured mapping against `pool`. Statement
    /// preparation failure refuses construction.
    pub async fn connect(
        pool: MySqlPool,
        mappings: &[MappingConfig],
    ) -> Result<Self, RouterError> {
        let mut tables = HashMap::with_capacity(mappings.len());
        for mapping in mappings {
            let table = TableMapping::prepare(pool.clone(), mapping).await?;
            if tables.insert(mapping.name.clone(), table).is_some() {
                return Err(RouterError::DuplicateMapping(mapping.name.clone()));
            }
            info!(mapping = %mapping.name, table = %mapping.table, "prepared mapping");
        }
        Ok(Self { tables })
    }

    /// Number of registered mappings.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Splits a raw client key into (mapping name, sub-key).
fn mapping_key(raw: &str) -> Result<(&str, &str), BadKeyFormat> {
    match raw.strip_prefix(MAPPING_PREFIX) {
        Some(rest) => rest.split_once(MAPPING_SEP).ok_or(BadKeyFormat),
        None => Ok((DEFAULT_MAPPING, raw)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BadKeyFormat;

#[async_trait]
impl Getter for MappingRouter {
    async fn get(&self, key: &str) -> Option<Response> {
        let (name, sub_key) = match mapping_key(key) {
            Ok(parts) => parts,
            Err(BadKeyFormat) => {
                return Some(Response::ClientError("bad key format".to_string()))
            }
        };

        let table = match self.tables.get(name) {
            Some(table) => table,
            None => {
                debug!(mapping = %name, "no such mapping, treating as miss");
                return None;
            }
        };

        match table.get(sub_key).await {
            Ok(Some(mut item)) => {
                // Hand the original client key back, prefix included.
                item.key = key.to_string();
                Some(Response::Item(item))
            }
            Ok(None) => None,
            Err(err) => {
                warn!(mapping = %name, error = %err, "lookup failed");
                Some(Response::ClientError(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl Setter for MappingRouter {
    /// Accepts and discards the item; the backing tables are never
    /// written. The client still sees `STORED`.
    async fn set(&self, item: Item) -> Option<Response> {
        debug!(key = %item.key, bytes = item.value.len(), "discarding set");
        None
    }
}

#[async_trait]
impl Deleter for MappingRouter {
    /// Nothing is ever deleted from the backing tables.
    async fn delete(&self, _key: &str) -> Result<(), NotFound> {
        Err(NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key_uses_default_mapping() {
        assert_eq!(mapping_key("user:42"), Ok(("default", "user:42")));
    }

    #[test]
    fn test_namespaced_key() {
        assert_eq!(mapping_key("@@users.42"), Ok(("users", "42")));
    }

    #[test]
    fn test_sub_key_keeps_later_dots() {
        assert_eq!(mapping_key("@@users.a.b.c"), Ok(("users", "a.b.c")));
    }

    #[test]
    fn test_prefix_without_dot_is_invalid() {
        assert_eq!(mapping_key("@@bad"), Err(BadKeyFormat));
        assert_eq!(mapping_key("@@"), Err(BadKeyFormat));
    }

    #[test]
    fn test_empty_name_and_sub_key_parse() {
        // Degenerate but well-formed: the dot is present.
        assert_eq!(mapping_key("@@.k"), Ok(("", "k")));
        assert_eq!(mapping_key("@@users."), Ok(("users", "")));
    }

    #[test]
    fn test_single_at_is_a_plain_key() {
        assert_eq!(mapping_key("@users.42"), Ok(("default", "@users.42")));
    }
}
