use thiserror::Error;

/// Convenience alias for `Result<T, SqlError>`.
pub type SqlResult<T> = Result<T, SqlError>;

/// Error classification for reporting decisions.
///
/// - `Parse`          — malformed AST shape; the statement never made sense
/// - `Semantic`       — the statement is well-formed but names or shapes
///                      do not resolve against the catalog / scopes
/// - `NotImplemented` — recognized construct the planner does not support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Semantic,
    NotImplemented,
}

/// Frontend and planner errors. All variants abort the statement they
/// occur in; no partial plan is ever returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("table {0} not exists")]
    UnknownTable(String),

    #[error("column {0} not found")]
    UnknownColumn(String),

    #[error("ambiguous column name {0}")]
    AmbiguousColumn(String),

    #[error("duplicate table alias {0}")]
    DuplicateAlias(String),

    #[error("unknown type name: {0}")]
    UnknownType(String),

    #[error("semantic error: {0}")]
    Semantic(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl SqlError {
    /// Classify this error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlError::Parse(_) => ErrorKind::Parse,
            SqlError::NotImplemented(_) => ErrorKind::NotImplemented,
            SqlError::UnknownTable(_)
            | SqlError::UnknownColumn(_)
            | SqlError::AmbiguousColumn(_)
            | SqlError::DuplicateAlias(_)
            | SqlError::UnknownType(_)
            | SqlError::Semantic(_) => ErrorKind::Semantic,
        }
    }

    /// Returns true for name-resolution and shape errors.
    pub fn is_semantic(&self) -> bool {
        self.kind() == ErrorKind::Semantic
    }

    /// Returns true for malformed-AST errors.
    pub fn is_parse(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }

    /// Construct a generic semantic error.
    pub fn semantic(msg: impl Into<String>) -> Self {
        SqlError::Semantic(msg.into())
    }
}

#[cfg(test)]
mod error_classification {
    use super::*;

    #[test]
    fn test_unknown_table_is_semantic() {
        let e = SqlError::UnknownTable("foo".into());
        assert_eq!(e.kind(), ErrorKind::Semantic);
        assert!(e.is_semantic());
        assert!(!e.is_parse());
        assert_eq!(e.to_string(), "table foo not exists");
    }

    #[test]
    fn test_ambiguous_column_message() {
        let e = SqlError::AmbiguousColumn("a1".into());
        assert_eq!(e.to_string(), "ambiguous column name a1");
        assert!(e.is_semantic());
    }

    #[test]
    fn test_parse_is_not_semantic() {
        let e = SqlError::Parse("odd CASE arm count".into());
        assert_eq!(e.kind(), ErrorKind::Parse);
        assert!(!e.is_semantic());
    }

    #[test]
    fn test_not_implemented_kind() {
        let e = SqlError::NotImplemented("lateral join".into());
        assert_eq!(e.kind(), ErrorKind::NotImplemented);
    }
}
