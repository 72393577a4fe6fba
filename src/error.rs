//! Unified error model for the interpretation boundary. Cache misses, time
//! recognition failures and per-rule resolution errors degrade internally
//! (logged, never fatal); only the errors below leave the crate.

use thiserror::Error;

/// SQL compilation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    #[error("query names no tables")]
    NoTables,
    #[error("unsupported number of tables: {0}")]
    UnsupportedTableCount(usize),
}

/// Errors surfaced by the interpreter facade.
#[derive(Debug, Error)]
pub enum InterpretError {
    /// No compiled automaton for the tenant: the lexicon was never loaded,
    /// the source could not supply it, or the automaton build failed.
    #[error("no matching automaton for tenant `{tenant}`; sentence cannot be tokenized")]
    AutomatonMissing { tenant: String },

    /// A service mailbox is closed; the interpreter was stopped.
    #[error("{service} service is not running")]
    ServiceStopped { service: &'static str },

    #[error(transparent)]
    Sql(#[from] SqlError),
}

impl InterpretError {
    pub fn automaton_missing(tenant: impl Into<String>) -> InterpretError {
        InterpretError::AutomatonMissing { tenant: tenant.into() }
    }
}

pub type InterpretResult<T> = Result<T, InterpretError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_tenant_and_table_count() {
        let e = InterpretError::automaton_missing("acme");
        assert!(e.to_string().contains("acme"));
        let s = SqlError::UnsupportedTableCount(3);
        assert_eq!(s.to_string(), "unsupported number of tables: 3");
    }

    #[test]
    fn sql_errors_convert_into_interpret_errors() {
        let e: InterpretError = SqlError::NoTables.into();
        assert!(matches!(e, InterpretError::Sql(SqlError::NoTables)));
    }
}
