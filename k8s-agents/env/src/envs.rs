//! Definitions of environment variables stamped into instrumented containers.
//!
//! If you want to add some more, please do it here.

use crate::checked_env::{CheckedEnv, CommaSeparatedRepr, ResourceAttributesRepr, StringRepr};

/// Prefix of every variable read by the New Relic agents.
pub const NEW_RELIC_PREFIX: &str = "NEW_RELIC_";

/// Prefix of every variable read by the OpenTelemetry SDKs.
pub const OTEL_PREFIX: &str = "OTEL_";

/// Application name reported by the New Relic agent.
pub const APP_NAME: CheckedEnv<StringRepr<String>> = CheckedEnv::new("NEW_RELIC_APP_NAME");

/// License key, always sourced from a secret.
pub const LICENSE_KEY: CheckedEnv<StringRepr<String>> = CheckedEnv::new("NEW_RELIC_LICENSE_KEY");

/// Marks the container as instrumented by the operator.
pub const LABELS: CheckedEnv<StringRepr<String>> = CheckedEnv::new("NEW_RELIC_LABELS");

pub const SERVICE_NAME: CheckedEnv<StringRepr<String>> = CheckedEnv::new("OTEL_SERVICE_NAME");

pub const EXPORTER_OTLP_ENDPOINT: CheckedEnv<StringRepr<String>> =
    CheckedEnv::new("OTEL_EXPORTER_OTLP_ENDPOINT");

/// The aggregated `key=value,...` resource attributes.
///
/// Its value may reference [`POD_NAME`], [`POD_UID`] and [`NODE_NAME`] with the `$(NAME)`
/// syntax, so it has to come after them in the env list.
pub const RESOURCE_ATTRIBUTES: CheckedEnv<ResourceAttributesRepr> =
    CheckedEnv::new("OTEL_RESOURCE_ATTRIBUTES");

/// Downward API reference to `metadata.name`.
pub const POD_NAME: CheckedEnv<StringRepr<String>> =
    CheckedEnv::new("OTEL_RESOURCE_ATTRIBUTES_POD_NAME");

/// Downward API reference to `metadata.uid`.
pub const POD_UID: CheckedEnv<StringRepr<String>> =
    CheckedEnv::new("OTEL_RESOURCE_ATTRIBUTES_POD_UID");

/// Downward API reference to `spec.nodeName`.
pub const NODE_NAME: CheckedEnv<StringRepr<String>> =
    CheckedEnv::new("OTEL_RESOURCE_ATTRIBUTES_NODE_NAME");

pub const PROPAGATORS: CheckedEnv<CommaSeparatedRepr<String>> =
    CheckedEnv::new("OTEL_PROPAGATORS");

pub const TRACES_SAMPLER: CheckedEnv<StringRepr<String>> = CheckedEnv::new("OTEL_TRACES_SAMPLER");

pub const TRACES_SAMPLER_ARG: CheckedEnv<StringRepr<String>> =
    CheckedEnv::new("OTEL_TRACES_SAMPLER_ARG");

/// Whether the agents would read a variable with this name.
pub fn is_agent_env(name: &str) -> bool {
    name.starts_with(NEW_RELIC_PREFIX) || name.starts_with(OTEL_PREFIX)
}
