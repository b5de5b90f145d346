//! Access control for bot handlers
//!
//! [`AccessGate::wrap`] turns any `(request, context) -> Future` handler into
//! a [`Restricted`] handler that only runs for allow-listed users. Everyone
//! else is dropped silently: the attempt is logged and nothing is sent back.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use teloxide::types::Message;
use tracing::{info, warn};

/// The user a request originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sender<'a> {
    pub id: i64,
    pub name: &'a str,
}

/// Anything the gate can attribute to a user.
pub trait Origin {
    /// `None` for updates without a user (channel posts, service messages).
    fn sender(&self) -> Option<Sender<'_>>;
}

impl Origin for Message {
    fn sender(&self) -> Option<Sender<'_>> {
        self.from.as_ref().map(|user| Sender {
            id: user.id.0 as i64,
            name: user.first_name.as_str(),
        })
    }
}

/// Shared allow-list check.
#[derive(Debug, Clone)]
pub struct AccessGate {
    allowed: Arc<BTreeSet<i64>>,
}

impl AccessGate {
    pub fn new(allowed: BTreeSet<i64>) -> Self {
        Self {
            allowed: Arc::new(allowed),
        }
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed.contains(&user_id)
    }

    /// Guard `handler` behind this gate.
    pub fn wrap<H>(&self, handler: H) -> Restricted<H> {
        Restricted {
            gate: self.clone(),
            handler,
        }
    }

    /// Decide whether a request may proceed, logging the outcome.
    fn admit<R: Origin>(&self, request: &R) -> bool {
        let Some(sender) = request.sender() else {
            warn!("Gate received an update with no originating user");
            return false;
        };

        if !self.is_allowed(sender.id) {
            warn!(
                "Unauthorized access attempt by user_id: {} (Name: {})",
                sender.id, sender.name
            );
            return false;
        }

        info!("Authorized access for user_id: {} (Name: {})", sender.id, sender.name);
        true
    }
}

/// A handler that only runs for allow-listed users.
#[derive(Debug, Clone)]
pub struct Restricted<H> {
    gate: AccessGate,
    handler: H,
}

impl<H> Restricted<H> {
    /// Run the wrapped handler if the sender is allowed.
    ///
    /// Returns `None` without calling the handler otherwise.
    pub async fn call<R, C, Fut, T>(&self, request: R, context: C) -> Option<T>
    where
        R: Origin,
        H: Fn(R, C) -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.gate.admit(&request) {
            return None;
        }
        Some((self.handler)(request, context).await)
    }
}
