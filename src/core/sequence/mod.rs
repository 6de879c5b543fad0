//! Journey sequencer
//!
//! Assigns every patient's events a total order and a dense, strictly
//! increasing sequence number, resolving out-of-order arrivals by inserting
//! at the chronological position and renumbering only the trailing events.
//! Sequencing for different patients is independent; sequencing for one
//! patient is serialized by the store's per-patient lock.

pub mod journey;

pub use journey::{InsertOutcome, PatientJourney};
