//! Reconciliation and sync orchestration for brewsync.
//!
//! This crate ties the local stores, the calculator, and the remote client
//! together into the push/list/diff/delete workflows and the watching daemon.

pub mod reconcile;
pub mod sync;
pub mod watch;

pub use reconcile::{SyncAction, reconcile, reconcile_brew, reconcile_recipe};
pub use sync::{
    ListEntry, LocalSource, PushReport, SilentReporter, SyncEngine, SyncReporter, sorted_json,
};
pub use watch::ChangeWatcher;
