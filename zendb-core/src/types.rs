//! Domain types for synchronized help-desk entities.
//!
//! Records deserialize straight from the source's JSON pages. Timestamps are
//! kept as `DateTime<Utc>`; conversion to the sink's Unix-seconds columns
//! happens in `zendb-sync`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resource metadata
// ---------------------------------------------------------------------------

/// A record type the source can list or export.
///
/// `COLLECTION` is both the endpoint path segment and the JSON key that holds
/// the records of one page (`users.json` → `{"users": [...]}`).
pub trait Resource: DeserializeOwned + Send + 'static {
    const COLLECTION: &'static str;
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// One synchronized entity stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    TicketFields,
    Groups,
    Organizations,
    Users,
    Tickets,
    TicketMetrics,
}

impl Feed {
    /// Dependency order of one pass: lookup tables first, then the
    /// cursor-tracked feeds, then metrics.
    pub const PASS_ORDER: [Feed; 6] = [
        Feed::TicketFields,
        Feed::Groups,
        Feed::Organizations,
        Feed::Users,
        Feed::Tickets,
        Feed::TicketMetrics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feed::TicketFields => "ticket_fields",
            Feed::Groups => "groups",
            Feed::Organizations => "organizations",
            Feed::Users => "users",
            Feed::Tickets => "tickets",
            Feed::TicketMetrics => "ticket_metrics",
        }
    }

    /// Name of the persisted checkpoint, or `None` for feeds that are
    /// re-listed in full on every pass.
    pub fn checkpoint_name(self) -> Option<&'static str> {
        match self {
            Feed::Organizations => Some("organization_export"),
            Feed::Users => Some("user_export"),
            Feed::Tickets => Some("ticket_export"),
            Feed::TicketFields | Feed::Groups | Feed::TicketMetrics => None,
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feed::PASS_ORDER
            .into_iter()
            .find(|feed| feed.as_str() == s)
            .ok_or_else(|| format!("unknown feed '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Entity records
// ---------------------------------------------------------------------------

/// Ticket field definition (lookup table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketField {
    pub id: i64,
    pub title: String,
}

/// Agent group (lookup table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default)]
    pub default_group_id: Option<i64>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub time_zone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    #[serde(default)]
    pub subject: Option<String>,
    pub status: String,
    #[serde(default)]
    pub requester_id: Option<i64>,
    #[serde(default)]
    pub submitter_id: Option<i64>,
    #[serde(default)]
    pub assignee_id: Option<i64>,
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Embedded child collection, persisted to its own table.
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

/// A custom field value embedded in a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: i64,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Per-ticket metrics. Timestamps may be missing upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMetric {
    pub id: i64,
    pub ticket_id: i64,
    #[serde(default)]
    pub replies: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub solved_at: Option<DateTime<Utc>>,
}

impl Resource for TicketField {
    const COLLECTION: &'static str = "ticket_fields";
}

impl Resource for Group {
    const COLLECTION: &'static str = "groups";
}

impl Resource for Organization {
    const COLLECTION: &'static str = "organizations";
}

impl Resource for User {
    const COLLECTION: &'static str = "users";
}

impl Resource for Ticket {
    const COLLECTION: &'static str = "tickets";
}

impl Resource for TicketMetric {
    const COLLECTION: &'static str = "ticket_metrics";
}
