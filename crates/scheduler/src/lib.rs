//! Scheduled job runner: claims due jobs and executes reminders, escalations
//! and expiry sweeps.

pub mod runner;
pub mod tasks;
