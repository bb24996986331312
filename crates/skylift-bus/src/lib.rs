//! skylift-bus — the publish/subscribe seam of the placement core.
//!
//! The real control plane talks to an external bus; the core only needs
//! the subscription surface. `MessageBus` abstracts it over JSON payloads,
//! and `InProcessBus` provides the in-process implementation used for
//! single-process wiring and tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub mod inproc;

pub use inproc::InProcessBus;

/// Future type returned by message handlers.
pub type BoxFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Callback invoked with each payload delivered on a subscribed subject.
pub type MessageHandler = Arc<dyn Fn(Value) -> BoxFuture + Send + Sync>;

/// A publish/subscribe bus carrying JSON payloads.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Register `handler` for every future payload on `subject`.
    async fn subscribe(&self, subject: &str, handler: MessageHandler);

    /// Deliver `payload` to every subscriber of `subject`.
    async fn publish(&self, subject: &str, payload: Value);
}
