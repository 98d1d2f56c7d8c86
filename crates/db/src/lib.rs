pub mod connection;
pub mod fixtures;
pub mod repositories;

pub use connection::LazyConnection;
pub use fixtures::{DemoAgenda, SeedResult, VerificationResult};
pub use repositories::{
    AgendaRepository, InMemoryStore, KeyValueStore, RedisStore, StoreError, WriteOp,
};
