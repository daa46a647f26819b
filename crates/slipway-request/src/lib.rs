//! Slipway Request - The request action engine.
//!
//! A request declares one or more actions: submit sources, delete a
//! container, move development, grant a role, stage or release a maintenance
//! incident. This crate turns such declarations into validated, authorized
//! and fully concrete actions:
//!
//! - [`action`]: the action kind registry and the action record itself
//! - [`validate`]: structural sanity and per-request uniqueness checks
//! - [`permission`]: source/target authorization against the backend
//! - [`expand`]: link-chasing expansion into concrete per-package actions
//! - [`review`]: default reviewer resolution
//! - [`wire`]: the serialized action document and notification payloads
//! - [`diff`]: change detection between source and target
//!
//! All backend state is reached through the
//! [`BuildService`](slipway_core::backend::BuildService) trait; the engine
//! itself keeps no state beyond the actions it is handed.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![warn(unreachable_pub)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod action;
pub mod diff;
pub mod error;
pub mod expand;
pub mod permission;
pub mod review;
pub mod validate;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{
    AcceptInfo, ActionKind, DerivePatch, RequestAction, ReviewPriority, SourceRef,
    SourceUpdatePolicy, TargetRef,
};
pub use diff::{contains_change, source_diff};
pub use error::{RequestError, RequestResult};
pub use expand::{ExpandOptions, Expansion, check_expand_errors, expand_targets};
pub use permission::{
    check_full_permission, check_source_access, check_source_permission, check_target_permission,
};
pub use review::default_reviewers;
pub use validate::{ActionField, FieldError, check_sanity, check_uniqueness};
pub use wire::{notify_params, parse_action, render_action};
