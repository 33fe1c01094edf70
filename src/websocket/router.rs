//! Inbound frame parsing and kind-based dispatch.
//!
//! Messages go to every subscription of the matching kind. Topic parameters
//! are not checked here; the server is trusted to only push what a
//! subscription asked for.

use super::registry::SubscriptionRegistry;
use crate::types::InboundMessage;
use log::*;
use std::panic::{self, AssertUnwindSafe};

/// Parses and routes one text frame. Returns how many callbacks ran.
///
/// Unparseable frames are logged and dropped.
pub fn dispatch(text: &str, registry: &SubscriptionRegistry) -> usize {
    match InboundMessage::parse(text) {
        Ok(message) => route(&message, registry),
        Err(e) => {
            warn!("Dropping unparseable frame ({}): {:.120}", e, text);
            0
        }
    }
}

pub fn route(message: &InboundMessage, registry: &SubscriptionRegistry) -> usize {
    let kind = match message.message_type.topic() {
        Some(kind) => kind,
        None => {
            warn!(
                "Ignoring message with unrecognized type (id={:?})",
                message.id
            );
            return 0;
        }
    };

    let mut delivered = 0;
    for subscription in registry.matching(kind) {
        let callback = &subscription.callback;
        match panic::catch_unwind(AssertUnwindSafe(|| callback(message))) {
            Ok(()) => delivered += 1,
            Err(_) => error!(
                "Callback for subscription {} panicked while handling {:?}",
                subscription.id, message.message_type
            ),
        }
    }
    trace!(
        "Routed {:?} message to {} {:?} subscription(s)",
        message.message_type,
        delivered,
        kind
    );
    delivered
}
