//! In-process bus implementation.
//!
//! Delivers each published payload to every subscriber of the subject,
//! in subscription order, awaiting each handler before the next. Good
//! enough for single-process wiring and for tests; a networked bus
//! client implements the same trait in production.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{MessageBus, MessageHandler};

pub struct InProcessBus {
    subscriptions: RwLock<HashMap<String, Vec<MessageHandler>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn subscribe(&self, subject: &str, handler: MessageHandler) {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.entry(subject.to_string()).or_default().push(handler);
    }

    async fn publish(&self, subject: &str, payload: Value) {
        let handlers = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions.get(subject).cloned()
        };

        match handlers {
            Some(handlers) => {
                for handler in handlers {
                    handler(payload.clone()).await;
                }
            }
            None => debug!(%subject, "publish with no subscribers"),
        }
    }
}
