//! MongoApi Core Library
//!
//! This crate provides the transport-independent pieces of the MongoApi client:
//! - Query state builder and its wire serialization
//! - The result record returned by every client operation
//! - Client configuration

pub mod config;
pub mod models;
pub mod query;

// Re-export commonly used types
pub use config::ClientConfig;
pub use models::QueryResult;
pub use query::{
    Applied, Condition, Operator, QueryParams, QueryState, Rejection, SortDirection,
    SortDirective, DEFAULT_COLLECTION, DEFAULT_DATABASE,
};
