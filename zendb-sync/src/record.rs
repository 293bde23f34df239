//! Sink-side view of entity records.
//!
//! [`Record`] is the capability the batch importer is generic over: where a
//! record goes, which columns it fills, the values it binds and the cursor
//! that marks progress once it is stored.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use zendb_core::types::{Group, Organization, Ticket, TicketField, TicketMetric, User};

use crate::importer::ChildImport;

/// Stored in place of an absent optional timestamp. Means "unknown", not the epoch.
pub const UNKNOWN_TIMESTAMP: i64 = 0;

pub trait Record {
    /// Target table.
    const TABLE: &'static str;
    /// Column order of [`Record::values`].
    const COLUMNS: &'static [&'static str];
    /// Columns updates are matched on, together identifying one row.
    const KEYS: &'static [&'static str] = &["id"];
    /// Columns owned by post-processing; conflict updates leave them alone.
    const PRESERVED: &'static [&'static str] = &[];

    /// Row values, one per entry of [`Record::COLUMNS`].
    fn values(&self) -> Vec<Value>;

    /// Progress marker recorded once this record is stored.
    fn cursor(&self) -> i64;

    /// Import embedded child collections. Runs right after this record's own
    /// insert was attempted, whether or not that insert succeeded.
    fn import_children(&self, _children: &mut ChildImport<'_>) {}
}

/// One custom field value of a ticket, stored in `ticket_metadata`.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketCustomField {
    pub ticket_id: i64,
    pub field_id: i64,
    pub value: serde_json::Value,
}

fn unix(ts: &DateTime<Utc>) -> Value {
    Value::Integer(ts.timestamp())
}

fn unix_or_unknown(ts: Option<&DateTime<Utc>>) -> Value {
    Value::Integer(ts.map(DateTime::timestamp).unwrap_or(UNKNOWN_TIMESTAMP))
}

fn opt_int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

fn opt_text(value: Option<&String>) -> Value {
    value.map(|s| Value::Text(s.clone())).unwrap_or(Value::Null)
}

fn json_text(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

impl Record for TicketField {
    const TABLE: &'static str = "ticket_fields";
    const COLUMNS: &'static [&'static str] = &["id", "title"];

    fn values(&self) -> Vec<Value> {
        vec![Value::Integer(self.id), Value::Text(self.title.clone())]
    }

    fn cursor(&self) -> i64 {
        self.id
    }
}

impl Record for Group {
    const TABLE: &'static str = "groups";
    const COLUMNS: &'static [&'static str] = &["id", "name", "created_at", "updated_at"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.name.clone()),
            unix(&self.created_at),
            unix(&self.updated_at),
        ]
    }

    fn cursor(&self) -> i64 {
        self.id
    }
}

impl Record for Organization {
    const TABLE: &'static str = "organizations";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "created_at", "updated_at", "group_id"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.name.clone()),
            unix(&self.created_at),
            unix(&self.updated_at),
            opt_int(self.group_id),
        ]
    }

    fn cursor(&self) -> i64 {
        self.id
    }
}

impl Record for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "email",
        "name",
        "created_at",
        "organization_id",
        "default_group_id",
        "role",
        "time_zone",
        "updated_at",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            opt_text(self.email.as_ref()),
            Value::Text(self.name.clone()),
            unix(&self.created_at),
            opt_int(self.organization_id),
            opt_int(self.default_group_id),
            Value::Text(self.role.clone()),
            opt_text(self.time_zone.as_ref()),
            unix(&self.updated_at),
        ]
    }

    fn cursor(&self) -> i64 {
        self.id
    }
}

impl Record for Ticket {
    const TABLE: &'static str = "tickets";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "subject",
        "status",
        "requester_id",
        "submitter_id",
        "assignee_id",
        "organization_id",
        "group_id",
        "created_at",
        "updated_at",
        "version",
        "component",
        "priority",
        "solved_at",
    ];
    const PRESERVED: &'static [&'static str] = &["version", "component", "priority", "solved_at"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            opt_text(self.subject.as_ref()),
            Value::Text(self.status.clone()),
            opt_int(self.requester_id),
            opt_int(self.submitter_id),
            opt_int(self.assignee_id),
            opt_int(self.organization_id),
            opt_int(self.group_id),
            unix(&self.created_at),
            unix(&self.updated_at),
            // Filled in later by post-processing statements.
            Value::Text(String::new()),
            Value::Text(String::new()),
            Value::Text(String::new()),
            Value::Integer(UNKNOWN_TIMESTAMP),
        ]
    }

    fn cursor(&self) -> i64 {
        self.id
    }

    fn import_children(&self, children: &mut ChildImport<'_>) {
        if self.custom_fields.is_empty() {
            return;
        }
        let fields: Vec<TicketCustomField> = self
            .custom_fields
            .iter()
            .map(|field| TicketCustomField {
                ticket_id: self.id,
                field_id: field.id,
                value: field.value.clone(),
            })
            .collect();
        children.apply(&fields);
    }
}

impl Record for TicketCustomField {
    const TABLE: &'static str = "ticket_metadata";
    const COLUMNS: &'static [&'static str] = &["ticket_id", "field_id", "value"];
    const KEYS: &'static [&'static str] = &["ticket_id", "field_id"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.ticket_id),
            Value::Integer(self.field_id),
            json_text(&self.value),
        ]
    }

    fn cursor(&self) -> i64 {
        self.field_id
    }
}

impl Record for TicketMetric {
    const TABLE: &'static str = "ticket_metrics";
    const COLUMNS: &'static [&'static str] =
        &["id", "created_at", "updated_at", "ticket_id", "replies", "solved_at"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            unix_or_unknown(self.created_at.as_ref()),
            unix_or_unknown(self.updated_at.as_ref()),
            Value::Integer(self.ticket_id),
            Value::Integer(self.replies),
            unix_or_unknown(self.solved_at.as_ref()),
        ]
    }

    fn cursor(&self) -> i64 {
        self.id
    }
}
