//! Reconciliation pipeline
//!
//! Inbound status events (webhook or poll) flow through [`reconcile`];
//! [`poller`] is the scheduled fallback for missed webhooks; [`push`] is
//! the durable outbound queue toward the POS.

pub mod poller;
pub mod push;
pub mod reconcile;
