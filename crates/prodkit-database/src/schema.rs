//! Tenant to schema mapping.
//!
//! Pure and deterministic: the same tenant id always yields the same schema
//! name, and no I/O is performed. Distinct tenant ids always yield distinct
//! schema names.

use std::fmt;

use sha2::{Digest, Sha256};

use prodkit_core::config::DatabaseConfig;

/// PostgreSQL limit on identifier length, in bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Separator in front of the digest of a rewritten tenant id. Names built
/// from ids that needed no rewriting never contain it.
const DIGEST_SEPARATOR: &str = "__";

/// Hex digits of the SHA-256 digest kept in a rewritten name.
const DIGEST_HEX_LEN: usize = 16;

/// Schema used when no tenant is active.
pub const DEFAULT_SPECIAL_SCHEMA: &str = "public";

/// Prefix for per-tenant schemas.
pub const DEFAULT_TENANT_PREFIX: &str = "tenant_";

/// A resolved storage namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaName(String);

impl SchemaName {
    /// Wrap an already-resolved schema name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw schema name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a double-quoted SQL identifier.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SchemaName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Maps tenant identifiers to schema names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaResolver {
    special_schema: String,
    tenant_prefix: String,
}

impl SchemaResolver {
    /// Create a resolver with an explicit special schema and tenant prefix.
    pub fn new(special_schema: impl Into<String>, tenant_prefix: impl Into<String>) -> Self {
        Self {
            special_schema: special_schema.into(),
            tenant_prefix: tenant_prefix.into(),
        }
    }

    /// Resolver configured from the `database` section.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(&config.special_schema, &config.tenant_schema_prefix)
    }

    /// Schema for `tenant_id`; a missing or empty id maps to the special schema.
    ///
    /// An id made of `[a-z0-9_]` that fits the identifier limit is used as
    /// is: `tenant_{id}`. Any other id is sanitized, shortened and suffixed
    /// with `__` and a digest of the raw id, e.g. `tenant_acme_eu__1f0c...`.
    pub fn resolve(&self, tenant_id: Option<&str>) -> SchemaName {
        match tenant_id {
            Some(id) if !id.is_empty() => {
                let plain = format!("{}{}", self.tenant_prefix, id);
                if is_plain_identifier(&plain) && id.chars().all(is_safe_char) {
                    return SchemaName(plain);
                }
                SchemaName(self.digest_name(id))
            }
            _ => SchemaName(self.special_schema.clone()),
        }
    }

    fn digest_name(&self, id: &str) -> String {
        let digest = Sha256::digest(id.as_bytes());
        let suffix: String = digest
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()[..DIGEST_HEX_LEN]
            .to_string();

        let mut name = self.tenant_prefix.clone();
        name.extend(id.chars().map(sanitize_char));
        let budget = MAX_IDENTIFIER_LEN - DIGEST_SEPARATOR.len() - DIGEST_HEX_LEN;
        truncate_at_boundary(&mut name, budget);
        while name.ends_with('_') {
            name.pop();
        }

        name.push_str(DIGEST_SEPARATOR);
        name.push_str(&suffix);
        name
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

fn is_plain_identifier(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN && !name.contains(DIGEST_SEPARATOR)
}

fn truncate_at_boundary(name: &mut String, max_len: usize) {
    let mut end = name.len().min(max_len);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name.truncate(end);
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SPECIAL_SCHEMA, DEFAULT_TENANT_PREFIX)
    }
}

/// Resolve with the default special schema and tenant prefix.
pub fn resolve_schema(tenant_id: Option<&str>) -> SchemaName {
    SchemaResolver::default().resolve(tenant_id)
}

fn sanitize_char(c: char) -> char {
    let c = c.to_ascii_lowercase();
    if is_safe_char(c) { c } else { '_' }
}
