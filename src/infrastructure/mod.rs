// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod error;
pub mod http_fetcher;
pub mod memory_route;
pub mod query_string;
pub mod tracing_notifier;
