pub mod client;
pub mod config;
pub mod connector;
pub mod document;
pub mod error;

// Re-export commonly used types
pub use client::JiraServiceManagementClient;
pub use config::Config;
pub use connector::{DocumentBatches, JiraServiceManagementConnector, SecondsSinceUnixEpoch};
pub use document::{Document, DocumentSource, Section};
pub use error::{ConnectorError, Result};
