//! Statement cache: memoized parameterized SQL per entity and operation.
//!
//! Insert and select text is composed once per `(entity, kind)` and reused
//! for the life of the cache. The first call for a key fixes its text: later
//! calls get the stored statement back regardless of the columns they pass,
//! so callers must always ask for a given key with the same column set.
//!
//! Update text is composed on every call and never stored, since callers
//! update arbitrary column subsets.
//!
//! Identifiers are validated before composition; values are always bound
//! through `?` placeholders.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::SyncError;

/// Operation a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    Select,
    Update,
}

#[derive(Debug, Default)]
struct Inner {
    /// Scratch buffer reused for every composition.
    buffer: String,
    statements: HashMap<(String, StatementKind), String>,
}

/// Shared cache of generated statement text.
#[derive(Debug, Default)]
pub struct StatementCache {
    inner: Mutex<Inner>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the statement for `(entity, kind)`, composing it if needed.
    ///
    /// Each entry of `filters` adds a `<filter> = ?` term to the `WHERE`
    /// clause, joined with `AND`; their placeholders come after the value
    /// placeholders.
    pub fn get_or_build(
        &self,
        entity: &str,
        kind: StatementKind,
        columns: &[&str],
        filters: &[&str],
    ) -> Result<String, SyncError> {
        // The lookup, the composition and the store share one lock section.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Inner { buffer, statements } = &mut *guard;

        if kind != StatementKind::Update {
            if let Some(cached) = statements.get(&(entity.to_string(), kind)) {
                return Ok(cached.clone());
            }
        }

        validate(entity, columns, filters)?;
        compose(buffer, entity, kind, columns, filters);
        let text = buffer.clone();

        if kind != StatementKind::Update {
            statements.insert((entity.to_string(), kind), text.clone());
        }
        Ok(text)
    }

    /// `INSERT INTO <entity> (<columns>) VALUES (?, ...)`
    pub fn insert(&self, entity: &str, columns: &[&str]) -> Result<String, SyncError> {
        self.get_or_build(entity, StatementKind::Insert, columns, &[])
    }

    /// `SELECT <columns> FROM <entity> [WHERE <filter> = ?]`
    pub fn select(
        &self,
        entity: &str,
        columns: &[&str],
        filter: Option<&str>,
    ) -> Result<String, SyncError> {
        let filters: &[&str] = match &filter {
            Some(filter) => std::slice::from_ref(filter),
            None => &[],
        };
        self.get_or_build(entity, StatementKind::Select, columns, filters)
    }

    /// `UPDATE <entity> SET <col> = ?, ... WHERE <key> = ? [AND ...]`: never cached.
    pub fn update(
        &self,
        entity: &str,
        columns: &[&str],
        keys: &[&str],
    ) -> Result<String, SyncError> {
        self.get_or_build(entity, StatementKind::Update, columns, keys)
    }

    /// Number of stored statements.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .statements
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate(entity: &str, columns: &[&str], filters: &[&str]) -> Result<(), SyncError> {
    check_identifier(entity)?;
    if columns.is_empty() {
        return Err(SyncError::EmptyColumns {
            entity: entity.to_string(),
        });
    }
    for column in columns {
        check_identifier(column)?;
    }
    for filter in filters {
        check_identifier(filter)?;
    }
    Ok(())
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*` only.
pub fn check_identifier(name: &str) -> Result<(), SyncError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SyncError::InvalidIdentifier(name.to_string()))
    }
}

fn compose(
    buffer: &mut String,
    entity: &str,
    kind: StatementKind,
    columns: &[&str],
    filters: &[&str],
) {
    buffer.clear();
    match kind {
        StatementKind::Insert => {
            buffer.push_str("INSERT INTO ");
            buffer.push_str(entity);
            buffer.push_str(" (");
            buffer.push_str(&columns.join(", "));
            buffer.push_str(") VALUES (");
            buffer.push_str(&vec!["?"; columns.len()].join(", "));
            buffer.push(')');
        }
        StatementKind::Select => {
            buffer.push_str("SELECT ");
            buffer.push_str(&columns.join(", "));
            buffer.push_str(" FROM ");
            buffer.push_str(entity);
        }
        StatementKind::Update => {
            buffer.push_str("UPDATE ");
            buffer.push_str(entity);
            buffer.push_str(" SET ");
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    buffer.push_str(", ");
                }
                buffer.push_str(column);
                buffer.push_str(" = ?");
            }
        }
    }
    // Inserts never carry a WHERE clause.
    if kind == StatementKind::Insert {
        return;
    }
    for (i, filter) in filters.iter().enumerate() {
        buffer.push_str(if i == 0 { " WHERE " } else { " AND " });
        buffer.push_str(filter);
        buffer.push_str(" = ?");
    }
}
