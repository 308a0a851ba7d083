use k8s_agents_env::{
    checked_env::{CheckedEnv, StringRepr},
    envs,
    list::{insert_if_absent, move_to_end},
    resource::{ResourceAttribute, ResourceAttributes},
};
use k8s_agents_kube::{lookup::OwnerLookup, owner::OwnerResolver};
use k8s_openapi::{
    api::core::v1::{Container, EnvVar, Namespace, Pod},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use tracing::{debug, warn, Level};

use crate::{
    agent::AgentInjector,
    attributes::{build_resource_map, declared_attributes},
    config::InjectorConfig,
    crd::Instrumentation,
    language::{AgentPlacement, LanguageInstrumentations},
    service::{choose_service_name, choose_service_version},
};

/// Comma separated names of the containers a sidecar agent observes. Only the first one that
/// exists in the pod is instrumented.
pub const GO_CONTAINER_NAMES_ANNOTATION: &str = "instrumentation.newrelic.com/go-container-names";

/// Stamps agent configuration into pods.
///
/// Every call works on its own pod and keeps no state between calls, so one injector can
/// serve concurrent admissions.
#[derive(Debug)]
pub struct SdkInjector<L, A> {
    resolver: OwnerResolver<L>,
    agents: A,
    config: InjectorConfig,
}

impl<L, A> SdkInjector<L, A>
where
    L: OwnerLookup,
    A: AgentInjector,
{
    pub fn new(lookup: L, agents: A, config: InjectorConfig) -> Self {
        let resolver = OwnerResolver::new(lookup)
            .with_retry_policy(config.retry_policy())
            .with_max_depth(config.max_owner_depth);

        SdkInjector {
            resolver,
            agents,
            config,
        }
    }

    pub fn lookup(&self) -> &L {
        self.resolver.lookup()
    }

    /// Prepares the agent of every language in `instrumentations` and configures it.
    ///
    /// In-process agents are configured in the container called `container_name`, or the first
    /// container when there is no such container. Sidecar agents observe the container picked
    /// by [`GO_CONTAINER_NAMES_ANNOTATION`] and are configured in the sidecar itself.
    ///
    /// A language whose agent could not be prepared is skipped, it never fails the injection.
    #[tracing::instrument(
        level = Level::DEBUG,
        skip(self, instrumentations, namespace, pod),
        fields(
            namespace = namespace.metadata.name.as_deref(),
            pod = pod.metadata.name.as_deref(),
        )
    )]
    pub async fn inject(
        &self,
        instrumentations: &LanguageInstrumentations,
        namespace: &Namespace,
        mut pod: Pod,
        container_name: &str,
    ) -> Pod {
        if containers(&pod).is_empty() {
            return pod;
        }

        let primary_index = container_index(&pod, container_name).unwrap_or(0);
        let namespace_name = namespace.metadata.name.as_deref().unwrap_or_default();
        // Admitted pods are often only named by their `generateName` prefix.
        let pod_name = pod
            .metadata
            .name
            .clone()
            .or_else(|| pod.metadata.generate_name.clone())
            .unwrap_or_default();

        for (&language, instrumentation) in instrumentations {
            debug!(
                %language,
                instrumentation = instrumentation.metadata.name.as_deref(),
                "injecting instrumentation into pod"
            );

            let app_index = match language.placement() {
                AgentPlacement::InProcess => primary_index,
                AgentPlacement::Sidecar => {
                    let names = annotation_value(
                        &namespace.metadata,
                        &pod.metadata,
                        GO_CONTAINER_NAMES_ANNOTATION,
                    )
                    .unwrap_or_default();

                    names
                        .split(',')
                        .map(str::trim)
                        .find_map(|name| container_index(&pod, name))
                        .unwrap_or(0)
                }
            };

            let prepared = match self.agents.inject(
                language,
                instrumentation.agent(language),
                &pod,
                app_index,
            ) {
                Ok(prepared) => prepared,
                Err(error) => {
                    warn!(
                        namespace = namespace_name,
                        pod = %pod_name,
                        %language,
                        reason = %error,
                        container = container_name_at(&pod, app_index),
                        "skipping agent injection"
                    );
                    continue;
                }
            };

            let agent_index = match language.placement() {
                AgentPlacement::InProcess => Some(app_index),
                AgentPlacement::Sidecar => containers(&prepared).len().checked_sub(1),
            };

            let Some(agent_index) = agent_index.filter(|index| {
                container_name_at(&prepared, *index).is_some()
                    && container_name_at(&prepared, app_index).is_some()
            }) else {
                warn!(
                    namespace = namespace_name,
                    pod = %pod_name,
                    %language,
                    reason = "prepared pod lost the instrumented container",
                    container = container_name_at(&pod, app_index),
                    "skipping agent injection"
                );
                continue;
            };

            pod = prepared;
            self.inject_config(instrumentation, namespace, &mut pod, agent_index, app_index)
                .await;
        }

        pod
    }

    /// Writes the common configuration into the container at `agent_index`, describing the
    /// application running in the container at `app_index`. Both are the same container for
    /// in-process agents.
    async fn inject_config(
        &self,
        instrumentation: &Instrumentation,
        namespace: &Namespace,
        pod: &mut Pod,
        agent_index: usize,
        app_index: usize,
    ) {
        let mut attributes =
            build_resource_map(&self.resolver, instrumentation, namespace, pod, app_index).await;
        let service_name = choose_service_name(pod, &attributes, app_index);
        let service_version = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.containers.get(app_index))
            .and_then(|container| container.image.as_deref())
            .and_then(choose_service_version)
            .map(str::to_owned);

        let Some(container) = pod
            .spec
            .as_mut()
            .and_then(|spec| spec.containers.get_mut(agent_index))
        else {
            return;
        };

        let declared = declared_attributes(container);
        attributes.retain(|key, _| !declared.contains_key(key));

        let env = container.env.get_or_insert_with(Vec::new);
        let spec = &instrumentation.spec;

        for var in &spec.env {
            insert_if_absent(env, var.clone());
        }

        insert_if_absent(env, envs::APP_NAME.as_k8s_spec(&service_name));
        insert_if_absent(
            env,
            envs::LICENSE_KEY.as_secret_key_ref(
                &self.config.license_key_secret,
                &self.config.license_key_secret_key,
                true,
            ),
        );
        insert_if_absent(env, envs::LABELS.as_k8s_spec(&self.config.labels));
        insert_if_absent(env, envs::SERVICE_NAME.as_k8s_spec(&service_name));

        if !spec.exporter.endpoint.is_empty() {
            insert_if_absent(
                env,
                envs::EXPORTER_OTLP_ENDPOINT.as_k8s_spec(&spec.exporter.endpoint),
            );
        }

        let mut downward = DownwardAttributes {
            env: &mut *env,
            attributes: &mut attributes,
            declared: &declared,
        };
        downward.reference(ResourceAttribute::K8sPodName, envs::POD_NAME, "metadata.name");
        if spec.resource.add_k8s_uid_attributes {
            downward.reference(ResourceAttribute::K8sPodUid, envs::POD_UID, "metadata.uid");
        }

        if !downward.is_known(ResourceAttribute::ServiceVersion) {
            if let Some(version) = service_version {
                downward
                    .attributes
                    .insert(ResourceAttribute::ServiceVersion, version);
            }
        }

        downward.reference(ResourceAttribute::K8sNodeName, envs::NODE_NAME, "spec.nodeName");

        write_resource_attributes(env, &attributes);

        if envs::PROPAGATORS.index_in(env).is_none() && !spec.propagators.is_empty() {
            let propagators = spec
                .propagators
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            insert_if_absent(env, envs::PROPAGATORS.as_k8s_spec(&propagators));
        }

        if let Some(sampler) = spec.sampler.sampler_type {
            if envs::TRACES_SAMPLER.index_in(env).is_none()
                && envs::TRACES_SAMPLER_ARG.index_in(env).is_none()
            {
                insert_if_absent(env, envs::TRACES_SAMPLER.as_k8s_spec(&sampler.to_string()));

                if let Some(argument) = spec
                    .sampler
                    .argument
                    .as_ref()
                    .filter(|argument| !argument.is_empty())
                {
                    insert_if_absent(env, envs::TRACES_SAMPLER_ARG.as_k8s_spec(argument));
                }
            }
        }

        let index = envs::RESOURCE_ATTRIBUTES.index_in(env);
        move_to_end(env, index);
    }
}

/// Falls back to runtime resolved variables for the attributes that are not known when the
/// pod is admitted.
struct DownwardAttributes<'a> {
    env: &'a mut Vec<EnvVar>,
    attributes: &'a mut ResourceAttributes,
    declared: &'a ResourceAttributes,
}

impl DownwardAttributes<'_> {
    fn is_known(&self, attribute: ResourceAttribute) -> bool {
        self.attributes.contains(attribute) || self.declared.contains(attribute)
    }

    fn reference(
        &mut self,
        attribute: ResourceAttribute,
        var: CheckedEnv<StringRepr<String>>,
        field_path: &str,
    ) {
        if self.is_known(attribute) {
            return;
        }

        insert_if_absent(self.env, var.as_field_ref(field_path));
        self.attributes.insert(attribute, var.reference());
    }
}

/// Adds `attributes` to the [`envs::RESOURCE_ATTRIBUTES`] of `env`.
///
/// An existing literal value is extended, never rewritten. A value sourced through `valueFrom`
/// is left alone.
fn write_resource_attributes(env: &mut Vec<EnvVar>, attributes: &ResourceAttributes) {
    if attributes.is_empty() {
        return;
    }

    let Some(var) = envs::RESOURCE_ATTRIBUTES
        .index_in(env)
        .and_then(|index| env.get_mut(index))
    else {
        insert_if_absent(env, envs::RESOURCE_ATTRIBUTES.as_k8s_spec(attributes));
        return;
    };

    if var.value_from.is_some() {
        return;
    }

    let value = var.value.get_or_insert_with(String::new);
    if !value.is_empty() && !value.ends_with(',') {
        value.push(',');
    }
    value.push_str(&attributes.to_env_value());
}

fn containers(pod: &Pod) -> &[Container] {
    pod.spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default()
}

fn container_index(pod: &Pod, name: &str) -> Option<usize> {
    containers(pod)
        .iter()
        .position(|container| container.name == name)
}

fn container_name_at(pod: &Pod, index: usize) -> Option<&str> {
    containers(pod)
        .get(index)
        .map(|container| container.name.as_str())
}

/// Non-empty annotation of the pod, else of its namespace.
fn annotation_value<'a>(
    namespace: &'a ObjectMeta,
    pod: &'a ObjectMeta,
    annotation: &str,
) -> Option<&'a str> {
    [pod, namespace]
        .into_iter()
        .filter_map(|meta| meta.annotations.as_ref()?.get(annotation))
        .map(String::as_str)
        .find(|value| !value.is_empty())
}
