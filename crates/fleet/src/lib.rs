//! Business services for the fleet: accounts, yachts, logbook, manifest,
//! engines, crew, purchasing, documents and offline sync.
//!
//! Every operation is scoped to the caller's tenant through [`Actor`]
//! and checks the caller's role before writing.
//!
//! [`Actor`]: bosun_common::permissions::Actor

pub mod accounts;
pub mod crew;
pub mod documents;
pub mod engines;
pub mod events;
pub mod logbook;
pub mod manifest;
pub mod purchase_orders;
pub mod sync;
pub mod yachts;
