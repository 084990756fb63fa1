//! Classification of platform failures.
//!
//! The platform reports benign conditions in different shapes: the
//! Kubernetes API returns structured status codes, Helm only prints text.
//! Every "is this actually fine" decision lives here so the gateway code
//! can absorb benign outcomes in one step per call.

use crate::error::{ControlError, ControlResult};

use super::helm::HelmFailure;

/// Result of a platform call once benign failures are absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The call did what was asked.
    Done(T),
    /// The target was already in the requested state.
    AlreadySatisfied,
}

impl<T> Outcome<T> {
    /// Whether the call changed anything.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Kubernetes reported that the object already exists.
#[must_use]
pub fn is_conflict(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(status) if status.code == 409)
}

/// Kubernetes reported that the object does not exist.
#[must_use]
pub fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(status) if status.code == 404)
}

/// Absorb "already exists" from a create call.
pub fn absorb_conflict<T>(result: Result<T, kube::Error>) -> ControlResult<Outcome<T>> {
    match result {
        Ok(value) => Ok(Outcome::Done(value)),
        Err(e) if is_conflict(&e) => Ok(Outcome::AlreadySatisfied),
        Err(e) => Err(ControlError::Kube(e)),
    }
}

/// Absorb "not found" from a delete call.
pub fn absorb_not_found<T>(result: Result<T, kube::Error>) -> ControlResult<Outcome<T>> {
    match result {
        Ok(value) => Ok(Outcome::Done(value)),
        Err(e) if is_not_found(&e) => Ok(Outcome::AlreadySatisfied),
        Err(e) => Err(ControlError::Kube(e)),
    }
}

/// Helm refused an install because the release name is taken.
///
/// Other "already exists" failures, such as a rendered manifest colliding
/// with a foreign resource, abort the install and are not benign.
#[must_use]
pub fn helm_already_installed(failure: &HelmFailure) -> bool {
    failure.stderr().is_some_and(|stderr| {
        stderr
            .to_ascii_lowercase()
            .contains("cannot re-use a name that is still in use")
    })
}

/// Helm could not find the release it was asked to act on.
#[must_use]
pub fn helm_release_missing(failure: &HelmFailure) -> bool {
    failure
        .stderr()
        .is_some_and(|stderr| stderr.to_ascii_lowercase().contains("not found"))
}

/// Absorb "already installed" from a Helm install.
pub fn absorb_helm_installed<T>(result: Result<T, HelmFailure>) -> ControlResult<Outcome<T>> {
    match result {
        Ok(value) => Ok(Outcome::Done(value)),
        Err(f) if helm_already_installed(&f) => Ok(Outcome::AlreadySatisfied),
        Err(f) => Err(f.into()),
    }
}

/// Absorb "release not found" from a Helm uninstall.
pub fn absorb_helm_missing<T>(result: Result<T, HelmFailure>) -> ControlResult<Outcome<T>> {
    match result {
        Ok(value) => Ok(Outcome::Done(value)),
        Err(f) if helm_release_missing(&f) => Ok(Outcome::AlreadySatisfied),
        Err(f) => Err(f.into()),
    }
}
