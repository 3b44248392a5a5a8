//! Brewing arithmetic for brewsync.
//!
//! - [`units`]: scalar conversions (volume, mass, gravity, color, water density)
//! - [`calculator`]: derived recipe metrics with the conditional-overwrite policy
//! - [`session`]: brew-session derivations (boil volumes, mash, carbonation)

pub mod calculator;
pub mod session;
pub mod units;

pub use calculator::{GravityTotals, recalculate};
pub use session::{BoilVolumes, MashSummary};
