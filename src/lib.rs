// src/lib.rs

//! nfvpkg — VM image package reconciliation for Cisco NFVIS hosts
//!
//! Converges the registration state of a named VM image on an NFVIS host
//! against a desired state (`present` or `absent`). Invocations are
//! idempotent: a run only acts when the observed inventory disagrees with
//! the desired state.
//!
//! # Architecture
//!
//! - Reconcile-first: the image inventory is re-queried on every run, never
//!   cached across invocations
//! - Blocking I/O: one invocation, one logical thread, no retries — the
//!   first failure terminates the run
//! - Injected collaborators: the management API client and the SCP uploader
//!   are supplied to the reconciler at construction time
//! - Check mode: reports the action that would be taken without performing
//!   any network side effect

pub mod api;
mod error;
pub mod inventory;
pub mod reconcile;
pub mod report;
pub mod transfer;

pub use error::{Error, Result};
