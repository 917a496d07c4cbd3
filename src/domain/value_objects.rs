use serde::{Deserialize, Serialize};

/// A MySQL character set name, e.g. `utf8mb4`, `latin1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Charset(pub String);

impl Charset {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A MySQL collation name, e.g. `utf8mb4_unicode_ci`.
///
/// Invariant: a collation name starts with the name of the charset it
/// belongs to, followed by `_` (how MySQL names them). `belongs_to` relies
/// on that convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collation(pub String);

impl Collation {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this collation is defined for the given charset.
    pub fn belongs_to(&self, charset: &Charset) -> bool {
        self.0
            .strip_prefix(charset.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }
}

impl std::fmt::Display for Collation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Free-form row filter expression, applied verbatim as a WHERE clause to
/// the source query during data migration. Never parsed or validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowFilter(pub Option<String>);

impl RowFilter {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn expr(expr: impl Into<String>) -> Self {
        Self(Some(expr.into()))
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collation_belongs_to_matching_charset() {
        let c = Collation("utf8mb4_unicode_ci".into());
        assert!(c.belongs_to(&Charset("utf8mb4".into())));
        assert!(!c.belongs_to(&Charset("latin1".into())));
    }

    #[test]
    fn collation_prefix_must_be_whole_charset_name() {
        // utf8mb4_bin must not be reported as a utf8 collation
        let c = Collation("utf8mb4_bin".into());
        assert!(!c.belongs_to(&Charset("utf8".into())));
    }
}
