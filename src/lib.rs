pub mod actor;
pub mod auth;
pub mod config;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod moderation;
pub mod models;
pub mod openapi;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod resolution;
pub mod routes;
pub mod storage; // asset store backends
pub mod visibility;

// Re-export commonly used items for tests / external users
pub use actor::Actor;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use routes::{config, AppState};
