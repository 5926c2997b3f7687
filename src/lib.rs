// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod engine;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod sync;
pub mod types;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;
