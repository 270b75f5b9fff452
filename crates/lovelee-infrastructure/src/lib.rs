//! Infrastructure layer for the Lovelee couple core.
//!
//! Provides the in-memory [`DocumentStore`](lovelee_core::store::DocumentStore)
//! backend, atomic file persistence, and configuration loading.

pub mod config_service;
pub mod fault;
pub mod memory_store;
pub mod paths;
pub mod storage;

pub use config_service::ConfigService;
pub use fault::FaultInjector;
pub use memory_store::InMemoryDocumentStore;
pub use paths::LoveleePaths;
