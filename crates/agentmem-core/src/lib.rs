pub mod config;
pub mod error;
pub mod io;
pub mod key;
pub mod paths;
pub mod record;
pub mod resolver;
pub mod service;
pub mod store;
pub mod summary;

pub use config::{MemoryConfig, StoreConfig};
pub use error::{MemoryError, Result};
pub use record::{ActionRecord, ActionRef, ActionStatus, NewAction, Payload};
pub use resolver::DependencyResolver;
pub use service::SharedMemory;
pub use store::{open_store, ActionStore, InMemoryStore, RedbStore};
pub use summary::{ActionDigest, AgentSummary, StatusCounts, StatusSummary};
