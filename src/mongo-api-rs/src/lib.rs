//! MongoApi Client Library
//!
//! Fluent, blocking HTTP client for MongoApi REST servers.
//!
//! ```rust,no_run
//! use mongo_api_rs::{ClientConfig, MongoApiClient};
//!
//! fn main() -> mongo_api_rs::Result<()> {
//!     let mut client = MongoApiClient::new(ClientConfig::new("localhost", 9875))?;
//!
//!     let adults = client
//!         .from_db("shop")
//!         .from_table("users")
//!         .and_where("age", ">=", 18)
//!         .sort_by("created_at", "desc")
//!         .per_page(10)
//!         .select();
//!
//!     if !adults.status() {
//!         eprintln!("{}", adults.error().unwrap_or("unknown error"));
//!     }
//!     Ok(())
//! }
//! ```

mod client;
pub mod dispatch;

pub use client::MongoApiClient;
pub use dispatch::{Dispatcher, PreparedRequest};
pub use mongo_api_core::{ClientConfig, QueryResult, QueryState};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("Error: Server not responding, due to: {0}")]
    Connection(String),

    #[error("Internal Server Error (500): {0}")]
    Server(String),

    #[error("Unexpected response ({status}): {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ClientError> for QueryResult {
    fn from(err: ClientError) -> Self {
        QueryResult::failure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
