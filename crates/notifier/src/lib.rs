//! Delivery workers for the Redis notification queue.
//!
//! Channels: in-app (the inbox row itself), email through the Resend HTTP API,
//! and tenant webhooks. Transient failures retry with exponential backoff;
//! permanent ones and exhausted attempts go to the dead-letter list.

pub mod backoff;
pub mod channels;
pub mod error;
pub mod worker;
