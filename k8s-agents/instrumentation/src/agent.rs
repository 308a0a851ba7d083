use k8s_openapi::api::core::v1::Pod;
use thiserror::Error;

use crate::{crd::AgentSpec, language::Language};

/// Reasons a language agent could not be prepared for a container.
///
/// Never fatal for the injection: the language is skipped and the others proceed.
#[derive(Debug, Error)]
pub enum AgentInjectError {
    #[error("Pod has no spec")]
    PodSpecNotFound,

    #[error("No container at index {0}")]
    ContainerNotFound(usize),

    #[error("{language} agent is not supported: {reason}")]
    Unsupported { language: Language, reason: String },
}

/// Prepares a language agent for one container: mounts, init containers, agent specific
/// variables, and for [`crate::language::AgentPlacement::Sidecar`] languages, the sidecar
/// itself, appended as the last container.
///
/// Receives the pod by reference and returns the prepared copy, so a failure leaves the
/// caller's pod untouched.
pub trait AgentInjector {
    fn inject(
        &self,
        language: Language,
        agent: &AgentSpec,
        pod: &Pod,
        container_index: usize,
    ) -> Result<Pod, AgentInjectError>;
}

impl<F> AgentInjector for F
where
    F: Fn(Language, &AgentSpec, &Pod, usize) -> Result<Pod, AgentInjectError>,
{
    fn inject(
        &self,
        language: Language,
        agent: &AgentSpec,
        pod: &Pod,
        container_index: usize,
    ) -> Result<Pod, AgentInjectError> {
        self(language, agent, pod, container_index)
    }
}
