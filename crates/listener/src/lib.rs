//! Webhook receiver for the issue bot.
//!
//! Verifies each delivery's `X-Hub-Signature-256`, decodes the payload into a
//! [`pipeline::Trigger`], and hands it to a [`pipeline::TriggerSink`] without
//! waiting for the work it causes. The response is sent as soon as the
//! trigger is submitted.

mod events;
mod server;
mod signature;

pub use events::{parse_delivery, Delivery, PayloadError};
pub use server::{router, serve, WebhookState};
pub use signature::{sign, verify_signature, SignatureError};
