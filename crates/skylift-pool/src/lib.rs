//! skylift-pool — the live executor capacity registry.
//!
//! Executors periodically advertise their spare capacity on the message
//! bus. This crate holds the authoritative, expiring view of those
//! advertisements:
//!
//! - **`advertisement`** — the `Advertisement` domain type and feature values
//! - **`messages`** — bus wire messages and their parse errors
//! - **`store`** — the `AdvertisementStore` registry (upsert, snapshot,
//!   reservation, instance bookkeeping, pruning)
//!
//! The store is the only mutable shared state in the placement core. It is
//! `Clone` (shared inner) so the bus-ingestion path and the query path can
//! hold the same registry without ambient globals.

pub mod advertisement;
pub mod messages;
pub mod store;

pub use advertisement::{Advertisement, AppId, DEFAULT_ZONE, ExecutorId, FeatureValue};
pub use messages::{AdvertisementMessage, MessageError, ShutdownMessage};
pub use store::{ADVERTISEMENT_EXPIRY, AdvertisementStore};
