//! zendb core library: entity types, feeds, configuration, errors.
//!
//! - [`types`]: entity records and the [`Feed`] pass order
//! - [`config`]: [`Config`] loading and validation
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ConflictPolicy, DatabaseConfig, ScheduleConfig, ZendeskConfig};
pub use error::ConfigError;
pub use types::{
    CustomField, Feed, Group, Organization, Resource, Ticket, TicketField, TicketMetric, User,
};
