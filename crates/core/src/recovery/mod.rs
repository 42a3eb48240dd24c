//! Repair of paid orders that never received lyrics.
//!
//! A sweep re-enters the lyric pipeline for every such order. It relies on the
//! pipeline's idempotency, so sweeps may overlap each other and organic
//! generation requests.

mod config;
mod sweep;

pub use config::RecoveryConfig;
pub use sweep::{RecoverySweep, SweepOutcome, SweepReport, SweepResult};
