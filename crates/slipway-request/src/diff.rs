//! Change detection over the external diff service.

use slipway_core::backend::BuildService;
use slipway_core::endpoint::Direction;

use crate::action::RequestAction;
use crate::error::{RequestError, RequestResult};

/// Compute the content diff between the action's source and target.
///
/// Actions without both endpoints (role grants, deletions) have no source
/// diff and yield an empty string.
///
/// # Errors
///
/// [`RequestError::DiffComputationFailed`] wrapping the underlying timeout
/// or transport failure from the diff collaborator.
pub async fn source_diff<B: BuildService + ?Sized>(
    backend: &B,
    action: &RequestAction,
) -> RequestResult<String> {
    let (Some(source), Some(target)) = (
        action.endpoint(Direction::Source),
        action.endpoint(Direction::Target),
    ) else {
        return Ok(String::new());
    };
    let rev = action.source.as_ref().and_then(|s| s.rev.as_deref());
    backend
        .source_diff(&source, rev, &target)
        .await
        .map_err(RequestError::DiffComputationFailed)
}

/// Whether the action's source introduces any change relative to its target.
///
/// Fail-safe on purpose: when the diff cannot be computed the answer is
/// `true`, so an undiffable request is never silently treated as a no-op
/// and dropped. Direct diff consumers use [`source_diff`] and see the error.
pub async fn contains_change<B: BuildService + ?Sized>(
    backend: &B,
    action: &RequestAction,
) -> bool {
    match source_diff(backend, action).await {
        Ok(diff) => !diff.is_empty(),
        Err(error) => {
            tracing::warn!(
                action = %action.kind,
                %error,
                "diff not computable, assuming the source contains a change"
            );
            true
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, SourceRef, TargetRef};
    use crate::testing::MockBuildService;

    fn submit() -> RequestAction {
        RequestAction::new(ActionKind::Submit)
            .unwrap()
            .with_source(SourceRef::package("home:alice", "pkgA"))
            .with_target(TargetRef::package("standard", "pkgA"))
    }

    #[tokio::test]
    async fn test_contains_change_reflects_diff() {
        let mut backend = MockBuildService::new();
        backend.set_diff("home:alice", "pkgA", "standard", "pkgA", "+ line");
        assert!(contains_change(&backend, &submit()).await);

        backend.set_diff("home:alice", "pkgA", "standard", "pkgA", "");
        assert!(!contains_change(&backend, &submit()).await);
    }

    #[tokio::test]
    async fn test_diff_failure_degrades_to_change() {
        let mut backend = MockBuildService::new();
        backend.fail_diff("home:alice", "pkgA", "standard", "pkgA");
        assert!(matches!(
            source_diff(&backend, &submit()).await,
            Err(RequestError::DiffComputationFailed(_))
        ));
        assert!(contains_change(&backend, &submit()).await);
    }

    #[tokio::test]
    async fn test_actions_without_endpoints_have_no_diff() {
        let backend = MockBuildService::new();
        let action = RequestAction::new(ActionKind::Delete).unwrap();
        assert_eq!(source_diff(&backend, &action).await.unwrap(), "");
        assert!(!contains_change(&backend, &action).await);
    }
}
