//! Notification engine: rule evaluation, cadence and dedupe policy, recipient
//! resolution, fan-out onto the delivery queue, and scheduled jobs.

pub mod cadence;
pub mod condition;
pub mod dedupe;
pub mod dispatch;
pub mod inbox;
pub mod jobs;
pub mod processor;
pub mod queue;
pub mod recipients;
pub mod rules;
pub mod template;
