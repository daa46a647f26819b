//! Convenience re-exports of the types most callers need.

pub use crate::action::{
    AcceptInfo, ActionKind, DerivePatch, RequestAction, ReviewPriority, SourceRef,
    SourceUpdatePolicy, TargetRef,
};
pub use crate::diff::{contains_change, source_diff};
pub use crate::error::{RequestError, RequestResult};
pub use crate::expand::{ExpandOptions, Expansion, check_expand_errors, expand_targets};
pub use crate::permission::{
    check_full_permission, check_source_access, check_source_permission, check_target_permission,
};
pub use crate::review::default_reviewers;
pub use crate::validate::{ActionField, FieldError, check_sanity, check_uniqueness};
pub use crate::wire::{notify_params, parse_action, render_action};
