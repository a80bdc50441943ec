//! Correlation fields bound for the duration of a unit of work.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

/// Key under which the unit of work's own correlation id is bound.
pub const CORRELATION_ID: &str = "correlation_id";

/// Ordered key/value fields describing the current unit of work.
///
/// Binding never mutates the ambient value: [`LogContext::bind`] returns an
/// extended copy that the caller scopes around the inner work, so the
/// fields disappear again when that scope ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    fields: BTreeMap<String, String>,
}

scoped_context! {
    static LOG_CONTEXT: LogContext;
}

impl LogContext {
    /// Copy of `self` with `fields` added, replacing existing keys.
    pub fn bind<I, K, V>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = self.clone();
        next.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        next
    }

    /// Copy of `self` with `keys` removed.
    pub fn unbind(&self, keys: &[&str]) -> Self {
        let mut next = self.clone();
        for key in keys {
            next.fields.remove(*key);
        }
        next
    }

    /// Value bound under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// The bound correlation id.
    pub fn correlation_id(&self) -> Option<&str> {
        self.get(CORRELATION_ID)
    }

    /// Iterate over bound fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether no fields are bound.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.fields {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Fresh random correlation id.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
