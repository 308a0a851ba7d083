//! Computes the resource attributes of an instrumented container.
//!
//! Precedence, highest first:
//!
//! 1. Attributes the container already declares in [`envs::RESOURCE_ATTRIBUTES`]. These are
//!    never written again.
//! 2. Attributes from the [`Instrumentation`] resource. Those containing `,` or `=` are dropped,
//!    they could not be read back from the variable.
//! 3. Topology of the pod and its owners. Empty values are left out.

use k8s_agents_env::{
    envs,
    resource::{ResourceAttribute, ResourceAttributes, TopologyAttributes},
};
use k8s_agents_kube::{lookup::OwnerLookup, owner::OwnerResolver};
use k8s_openapi::api::core::v1::{Container, Namespace, Pod};
use tracing::{warn, Level};

use crate::crd::Instrumentation;

/// Attributes the container declares in its own [`envs::RESOURCE_ATTRIBUTES`] literal value.
///
/// Malformed pairs are ignored, a variable sourced through `valueFrom` declares nothing.
pub fn declared_attributes(container: &Container) -> ResourceAttributes {
    let Ok(declared) =
        envs::RESOURCE_ATTRIBUTES.try_from_spec(container.env.as_deref().unwrap_or_default());

    declared.unwrap_or_default()
}

/// `namespace.pod.container`, or an empty string if any of the parts is unknown.
pub fn service_instance_id(namespace: &str, pod: &str, container: &str) -> String {
    let parts = [namespace, pod, container];

    if parts.iter().any(|part| part.is_empty()) {
        String::new()
    } else {
        parts.join(".")
    }
}

/// Resource attributes to add to the container at `container_index`, without the ones it
/// already declares.
///
/// Owner resolution is best effort, so this never fails: whatever could not be resolved is
/// missing from the result.
#[tracing::instrument(
    level = Level::DEBUG,
    skip(resolver, instrumentation, namespace, pod),
    fields(
        namespace = namespace.metadata.name.as_deref(),
        pod = pod.metadata.name.as_deref(),
    ),
    ret(Display)
)]
pub async fn build_resource_map<L>(
    resolver: &OwnerResolver<L>,
    instrumentation: &Instrumentation,
    namespace: &Namespace,
    pod: &Pod,
    container_index: usize,
) -> ResourceAttributes
where
    L: OwnerLookup,
{
    let container = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.containers.get(container_index));
    let declared = container.map(declared_attributes).unwrap_or_default();

    let mut attributes: ResourceAttributes = instrumentation
        .spec
        .resource
        .attributes
        .iter()
        .filter(|(key, _)| !declared.contains_key(key))
        .filter(|(key, value)| {
            let readable = ResourceAttributes::reads_back(key, value);
            if !readable {
                warn!(
                    attribute = %key,
                    %value,
                    "resource attribute cannot be written back without separators, dropped"
                );
            }
            readable
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let namespace_name = namespace.metadata.name.as_deref().unwrap_or_default();
    let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
    let container_name = container.map(|container| container.name.as_str()).unwrap_or_default();

    let mut topology = TopologyAttributes::from([
        (ResourceAttribute::K8sNamespaceName, namespace_name.to_owned()),
        (ResourceAttribute::K8sContainerName, container_name.to_owned()),
        (ResourceAttribute::K8sPodName, pod_name.to_owned()),
        (
            ResourceAttribute::K8sPodUid,
            pod.metadata.uid.clone().unwrap_or_default(),
        ),
        (
            ResourceAttribute::K8sNodeName,
            pod.spec
                .as_ref()
                .and_then(|spec| spec.node_name.clone())
                .unwrap_or_default(),
        ),
        (
            ResourceAttribute::ServiceInstanceId,
            service_instance_id(namespace_name, pod_name, container_name),
        ),
    ]);

    topology.extend(
        resolver
            .resolve(
                namespace_name,
                &pod.metadata,
                instrumentation.spec.resource.add_k8s_uid_attributes,
            )
            .await,
    );

    for (attribute, value) in topology {
        if value.is_empty() || declared.contains(attribute) || attributes.contains(attribute) {
            continue;
        }

        attributes.insert(attribute, value);
    }

    attributes
}
