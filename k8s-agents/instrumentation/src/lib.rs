#![warn(clippy::indexing_slicing)]

//! Decides which environment an instrumented container gets, and stamps it into the pod.
//!
//! [`sdk::SdkInjector`] is the entry point: for every configured [`language::Language`] it asks
//! an [`agent::AgentInjector`] to prepare the agent, then writes the common New Relic and
//! OpenTelemetry configuration, with resource attributes computed by [`attributes`].

pub mod agent;
pub mod attributes;
pub mod config;
pub mod crd;
pub mod error;
pub mod language;
pub mod logging;
pub mod sdk;
pub mod service;
