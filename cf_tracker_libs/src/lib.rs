pub mod catalog;
pub mod codeforces;
pub mod config;
pub mod models;
pub mod rating;
pub mod reminder;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod sync;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use codeforces::{CodeforcesApi, RateLimitedClient, UpstreamError};
pub use config::Config;
pub use service::{ServiceError, SyncService};
pub use store::{MemoryStore, PgStore, Store, StoreError};
