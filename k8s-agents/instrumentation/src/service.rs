use k8s_agents_env::resource::{ResourceAttribute, ResourceAttributes};
use k8s_openapi::api::core::v1::Pod;

/// Owners preferred as the service name, before falling back to the pod itself.
const SERVICE_NAME_SOURCES: [ResourceAttribute; 5] = [
    ResourceAttribute::K8sDeploymentName,
    ResourceAttribute::K8sStatefulSetName,
    ResourceAttribute::K8sJobName,
    ResourceAttribute::K8sCronJobName,
    ResourceAttribute::K8sPodName,
];

/// Name of the logical service behind the container at `container_index`: its workload, else
/// the pod, else the container's own name.
pub fn choose_service_name(
    pod: &Pod,
    attributes: &ResourceAttributes,
    container_index: usize,
) -> String {
    SERVICE_NAME_SOURCES
        .into_iter()
        .filter_map(|attribute| attributes.get(attribute))
        .find(|name| !name.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            pod.spec
                .as_ref()
                .and_then(|spec| spec.containers.get(container_index))
                .map(|container| container.name.clone())
        })
        .unwrap_or_default()
}

/// Last `:` separated segment of the container image, used as `service.version`.
///
/// A segment that still contains a path separator is not a tag, e.g. `registry:5000/app` or
/// `team/app`. An image without any `:` reads as its own version.
pub fn choose_service_version(image: &str) -> Option<&str> {
    let tag = image.rsplit(':').next()?;

    (!tag.is_empty() && !tag.contains('/')).then_some(tag)
}
