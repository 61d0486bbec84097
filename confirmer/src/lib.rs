//! Confirmation task — drives one bundle to confirmation.
//!
//! A tangle node may never select a bundle's tip for consensus; the two
//! remedies are promotion (attach small zero-value bundles referencing the
//! tip) and reattachment (fresh tip selection and proof-of-work on a copy
//! of the bundle). The [`Confirmer`] runs both as independent cancellable
//! loops, together with a promotability check feeding them a shared
//! consistency verdict, and races all three against a confirmation
//! watcher. Every state transition is reported on an update stream that
//! closes once, after the confirm event.

pub mod cancel;
pub mod error;
mod state;
pub mod task;
pub mod throttle;
pub mod update;

pub use cancel::CancelHandle;
pub use error::ConfirmerError;
pub use task::{Confirmer, ConfirmerParams, SolidityPredicate};
pub use update::{ConfirmerUpdate, UpdateKind};
