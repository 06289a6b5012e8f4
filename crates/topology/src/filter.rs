//! Selecting services by id, role and host

use crate::record::ConfigRecord;

/// Matches everything
pub const WILDCARD: &str = "*";

/// Service selector; each field is either `*` or an exact value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    pub id: String,
    pub role: String,
    pub host: String,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            id: WILDCARD.to_string(),
            role: WILDCARD.to_string(),
            host: WILDCARD.to_string(),
        }
    }
}

impl FilterOptions {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.id == WILDCARD && self.role == WILDCARD && self.host == WILDCARD
    }

    pub fn matches<R: ConfigRecord + ?Sized>(&self, record: &R) -> bool {
        field_matches(&self.id, record.id())
            && field_matches(&self.role, record.role())
            && field_matches(&self.host, record.host())
    }
}

fn field_matches(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

/// Keep the records selected by `options`, preserving order
pub fn filter_configs<R: ConfigRecord + Clone>(configs: &[R], options: &FilterOptions) -> Vec<R> {
    configs
        .iter()
        .filter(|c| options.matches(*c))
        .cloned()
        .collect()
}
