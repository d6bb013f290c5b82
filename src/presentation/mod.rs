// Presentation layer - Display-ready projections of engine state
pub mod format;
pub mod view_models;
