use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use k8s_agents_env::envs;
use k8s_openapi::api::core::v1::EnvVar;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{InstrumentationError, Result},
    language::Language,
};

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

pub const MANAGED_BY: &str = "k8s-agents-operator";

/// Annotation on an [`Instrumentation`] providing the agent image of `language` when the resource
/// leaves it empty.
pub fn default_image_annotation(language: Language) -> String {
    format!("instrumentation.newrelic.com/default-auto-instrumentation-{language}-image")
}

/// Describes how pods selected by the operator get instrumented.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "newrelic.com",
    version = "v1alpha1",
    kind = "Instrumentation",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationSpec {
    #[serde(default)]
    pub exporter: Exporter,

    #[serde(default)]
    pub resource: ResourceSpec,

    /// Written to `OTEL_PROPAGATORS` in the given order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub propagators: Vec<Propagator>,

    #[serde(default)]
    pub sampler: Sampler,

    /// Variables added to every instrumented container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default)]
    pub java: AgentSpec,

    #[serde(default)]
    pub nodejs: AgentSpec,

    #[serde(default)]
    pub python: AgentSpec,

    #[serde(default)]
    pub dotnet: AgentSpec,

    #[serde(default)]
    pub php: AgentSpec,

    #[serde(default)]
    pub go: AgentSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Exporter {
    /// OTLP endpoint, written to `OTEL_EXPORTER_OTLP_ENDPOINT` when not empty.
    #[serde(default)]
    pub endpoint: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// Extra resource attributes. Computed attributes never override these.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Adds `k8s.*.uid` attributes next to the names.
    #[serde(default, rename = "addK8sUIDAttributes")]
    pub add_k8s_uid_attributes: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub sampler_type: Option<SamplerType>,

    /// Sampler dependent, e.g. the ratio for `traceidratio`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum SamplerType {
    #[serde(rename = "always_on")]
    AlwaysOn,
    #[serde(rename = "always_off")]
    AlwaysOff,
    #[serde(rename = "traceidratio")]
    TraceIdRatio,
    #[serde(rename = "parentbased_always_on")]
    ParentBasedAlwaysOn,
    #[serde(rename = "parentbased_always_off")]
    ParentBasedAlwaysOff,
    #[serde(rename = "parentbased_traceidratio")]
    ParentBasedTraceIdRatio,
    #[serde(rename = "jaeger_remote")]
    JaegerRemote,
    #[serde(rename = "parentbased_jaeger_remote")]
    ParentBasedJaegerRemote,
    #[serde(rename = "xray")]
    XRay,
}

impl SamplerType {
    pub const fn as_str(self) -> &'static str {
        match self {
            SamplerType::AlwaysOn => "always_on",
            SamplerType::AlwaysOff => "always_off",
            SamplerType::TraceIdRatio => "traceidratio",
            SamplerType::ParentBasedAlwaysOn => "parentbased_always_on",
            SamplerType::ParentBasedAlwaysOff => "parentbased_always_off",
            SamplerType::ParentBasedTraceIdRatio => "parentbased_traceidratio",
            SamplerType::JaegerRemote => "jaeger_remote",
            SamplerType::ParentBasedJaegerRemote => "parentbased_jaeger_remote",
            SamplerType::XRay => "xray",
        }
    }
}

impl Display for SamplerType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Propagator {
    TraceContext,
    Baggage,
    B3,
    B3Multi,
    Jaeger,
    XRay,
    OtTrace,
    None,
}

impl Propagator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Propagator::TraceContext => "tracecontext",
            Propagator::Baggage => "baggage",
            Propagator::B3 => "b3",
            Propagator::B3Multi => "b3multi",
            Propagator::Jaeger => "jaeger",
            Propagator::XRay => "xray",
            Propagator::OtTrace => "ottrace",
            Propagator::None => "none",
        }
    }
}

impl Display for Propagator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-language agent settings, consumed by the [`crate::agent::AgentInjector`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// Image containing the agent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Variables added to the container the agent is configured in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

impl Instrumentation {
    pub fn agent(&self, language: Language) -> &AgentSpec {
        let spec = &self.spec;
        match language {
            Language::Java => &spec.java,
            Language::NodeJs => &spec.nodejs,
            Language::Python => &spec.python,
            Language::DotNet => &spec.dotnet,
            Language::Php => &spec.php,
            Language::Go => &spec.go,
        }
    }

    fn agent_mut(&mut self, language: Language) -> &mut AgentSpec {
        let spec = &mut self.spec;
        match language {
            Language::Java => &mut spec.java,
            Language::NodeJs => &mut spec.nodejs,
            Language::Python => &mut spec.python,
            Language::DotNet => &mut spec.dotnet,
            Language::Php => &mut spec.php,
            Language::Go => &mut spec.go,
        }
    }

    /// Fills the missing managed-by label and, for every language without an image, the image
    /// from its [`default_image_annotation`].
    pub fn apply_defaults(&mut self) {
        info!(name = %self.name_any(), "default");

        self.labels_mut()
            .entry(MANAGED_BY_LABEL.to_owned())
            .and_modify(|value| {
                if value.is_empty() {
                    MANAGED_BY.clone_into(value);
                }
            })
            .or_insert_with(|| MANAGED_BY.to_owned());

        for language in Language::ALL {
            if !self.agent(language).image.is_empty() {
                continue;
            }

            if let Some(image) = self
                .annotations()
                .get(&default_image_annotation(language))
                .cloned()
            {
                self.agent_mut(language).image = image;
            }
        }
    }

    /// Only variables the agents read may be declared, see [`envs::is_agent_env`].
    pub fn validate(&self) -> Result<()> {
        info!(name = %self.name_any(), "validate");

        self.spec
            .env
            .iter()
            .chain(
                Language::ALL
                    .into_iter()
                    .flat_map(|language| self.agent(language).env.iter()),
            )
            .find(|env| !envs::is_agent_env(&env.name))
            .map_or(Ok(()), |env| {
                Err(InstrumentationError::InvalidEnvName(env.name.clone()))
            })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn env(name: &str) -> EnvVar {
        EnvVar {
            name: name.into(),
            value: Some("value".into()),
            value_from: None,
        }
    }

    #[test]
    fn deserializes_resource() {
        let instrumentation: Instrumentation = serde_json::from_value(json!({
            "apiVersion": "newrelic.com/v1alpha1",
            "kind": "Instrumentation",
            "metadata": { "name": "newrelic-instrumentation", "namespace": "operator" },
            "spec": {
                "exporter": { "endpoint": "https://otlp.nr-data.net:4318" },
                "resource": {
                    "attributes": { "team": "checkout" },
                    "addK8sUIDAttributes": true
                },
                "propagators": ["tracecontext", "baggage", "b3multi"],
                "sampler": { "type": "parentbased_traceidratio", "argument": "0.25" },
                "java": { "image": "newrelic/newrelic-java-init:latest" }
            }
        }))
        .unwrap();

        let spec = &instrumentation.spec;
        assert_eq!(spec.exporter.endpoint, "https://otlp.nr-data.net:4318");
        assert!(spec.resource.add_k8s_uid_attributes);
        assert_eq!(
            spec.propagators,
            [Propagator::TraceContext, Propagator::Baggage, Propagator::B3Multi]
        );
        assert_eq!(
            spec.sampler.sampler_type,
            Some(SamplerType::ParentBasedTraceIdRatio)
        );
        assert_eq!(
            instrumentation.agent(Language::Java).image,
            "newrelic/newrelic-java-init:latest"
        );
        assert!(instrumentation.agent(Language::Go).image.is_empty());
    }

    #[rstest]
    #[case(SamplerType::TraceIdRatio)]
    #[case(SamplerType::ParentBasedJaegerRemote)]
    #[case(SamplerType::XRay)]
    fn sampler_display_matches_serde(#[case] sampler: SamplerType) {
        assert_eq!(
            serde_json::to_value(sampler).unwrap(),
            json!(sampler.to_string())
        );
    }

    #[rstest]
    #[case(Propagator::TraceContext)]
    #[case(Propagator::B3Multi)]
    #[case(Propagator::OtTrace)]
    fn propagator_display_matches_serde(#[case] propagator: Propagator) {
        assert_eq!(
            serde_json::to_value(propagator).unwrap(),
            json!(propagator.to_string())
        );
    }

    #[test]
    fn defaults_images_from_annotations() {
        let mut instrumentation = Instrumentation::new("newrelic", InstrumentationSpec::default());
        instrumentation.spec.python.image = "custom/python:1".into();
        instrumentation.annotations_mut().extend([
            (
                default_image_annotation(Language::Java),
                "newrelic/java:2".to_owned(),
            ),
            (
                default_image_annotation(Language::Python),
                "newrelic/python:2".to_owned(),
            ),
        ]);

        instrumentation.apply_defaults();

        assert_eq!(instrumentation.spec.java.image, "newrelic/java:2");
        assert_eq!(instrumentation.spec.python.image, "custom/python:1");
        assert!(instrumentation.spec.go.image.is_empty());
        assert_eq!(
            instrumentation.labels().get(MANAGED_BY_LABEL).map(String::as_str),
            Some(MANAGED_BY)
        );
    }

    #[test]
    fn keeps_existing_managed_by() {
        let mut instrumentation = Instrumentation::new("newrelic", InstrumentationSpec::default());
        instrumentation
            .labels_mut()
            .insert(MANAGED_BY_LABEL.to_owned(), "helm".to_owned());

        instrumentation.apply_defaults();

        assert_eq!(
            instrumentation.labels().get(MANAGED_BY_LABEL).map(String::as_str),
            Some("helm")
        );
    }

    #[test]
    fn accepts_agent_env() {
        let mut instrumentation = Instrumentation::new("newrelic", InstrumentationSpec::default());
        instrumentation.spec.env = vec![env("OTEL_EXPORTER_OTLP_HEADERS")];
        instrumentation.spec.java.env = vec![env("NEW_RELIC_LOG_LEVEL")];

        assert!(instrumentation.validate().is_ok());
    }

    #[rstest]
    #[case::common(vec![env("JAVA_TOOL_OPTIONS")], vec![])]
    #[case::per_language(vec![env("OTEL_LOG_LEVEL")], vec![env("PYTHONPATH")])]
    fn rejects_foreign_env(#[case] common: Vec<EnvVar>, #[case] python: Vec<EnvVar>) {
        let mut instrumentation = Instrumentation::new("newrelic", InstrumentationSpec::default());
        instrumentation.spec.env = common;
        instrumentation.spec.python.env = python;

        assert!(matches!(
            instrumentation.validate(),
            Err(InstrumentationError::InvalidEnvName(_))
        ));
    }

    #[test]
    fn common_env_is_reported_first() {
        let mut instrumentation = Instrumentation::new("newrelic", InstrumentationSpec::default());
        instrumentation.spec.env = vec![env("OTEL_LOG_LEVEL"), env("JAVA_TOOL_OPTIONS")];
        instrumentation.spec.java.env = vec![env("CLASSPATH")];

        assert!(matches!(
            instrumentation.validate(),
            Err(InstrumentationError::InvalidEnvName(name)) if name == "JAVA_TOOL_OPTIONS"
        ));
    }
}
