// Application layer - Normalization, caching, route sync and refresh coordination
pub mod cache;
pub mod debounce;
pub mod engine;
pub mod normalizer;
pub mod ports;
pub mod remote_fetcher;
pub mod route_sync;
