// Domain layer - Plain data shared by every other layer
pub mod analytics;
pub mod filter;
pub mod state;
