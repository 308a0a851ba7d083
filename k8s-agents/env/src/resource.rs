//! Resource attributes carried by [`crate::envs::RESOURCE_ATTRIBUTES`].

use std::{collections::BTreeMap, fmt};

/// Resource attribute keys the operator knows how to compute, named after the OpenTelemetry
/// semantic conventions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceAttribute {
    K8sNamespaceName,
    K8sContainerName,
    K8sPodName,
    K8sPodUid,
    K8sNodeName,
    K8sReplicaSetName,
    K8sReplicaSetUid,
    K8sDeploymentName,
    K8sDeploymentUid,
    K8sStatefulSetName,
    K8sStatefulSetUid,
    K8sDaemonSetName,
    K8sDaemonSetUid,
    K8sJobName,
    K8sJobUid,
    K8sCronJobName,
    K8sCronJobUid,
    ServiceInstanceId,
    ServiceVersion,
}

impl ResourceAttribute {
    pub const fn key(self) -> &'static str {
        match self {
            Self::K8sNamespaceName => "k8s.namespace.name",
            Self::K8sContainerName => "k8s.container.name",
            Self::K8sPodName => "k8s.pod.name",
            Self::K8sPodUid => "k8s.pod.uid",
            Self::K8sNodeName => "k8s.node.name",
            Self::K8sReplicaSetName => "k8s.replicaset.name",
            Self::K8sReplicaSetUid => "k8s.replicaset.uid",
            Self::K8sDeploymentName => "k8s.deployment.name",
            Self::K8sDeploymentUid => "k8s.deployment.uid",
            Self::K8sStatefulSetName => "k8s.statefulset.name",
            Self::K8sStatefulSetUid => "k8s.statefulset.uid",
            Self::K8sDaemonSetName => "k8s.daemonset.name",
            Self::K8sDaemonSetUid => "k8s.daemonset.uid",
            Self::K8sJobName => "k8s.job.name",
            Self::K8sJobUid => "k8s.job.uid",
            Self::K8sCronJobName => "k8s.cronjob.name",
            Self::K8sCronJobUid => "k8s.cronjob.uid",
            Self::ServiceInstanceId => "service.instance.id",
            Self::ServiceVersion => "service.version",
        }
    }
}

impl fmt::Display for ResourceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Topology attributes keyed by [`ResourceAttribute`], as produced by resolvers.
pub type TopologyAttributes = BTreeMap<ResourceAttribute, String>;

/// Final attribute set, keys sorted lexicographically.
///
/// Holds both [`ResourceAttribute`] keys and arbitrary keys declared by users.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceAttributes(BTreeMap<String, String>);

impl ResourceAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient parser for the `k1=v1,k2=v2` format.
    ///
    /// Whitespace around a pair is trimmed, pairs that do not split on `=` into exactly two
    /// parts are skipped.
    pub fn parse(value: &str) -> Self {
        value
            .split(',')
            .filter_map(|pair| {
                let mut parts = pair.trim().split('=');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(key), Some(value), None) => Some((key.to_owned(), value.to_owned())),
                    _ => None,
                }
            })
            .collect()
    }

    /// Whether `key=value` survives a round trip through [`Self::parse`], i.e. neither part
    /// contains a separator or surrounding whitespace.
    pub fn reads_back(key: &str, value: &str) -> bool {
        Self::parse(&format!("{key}={value}")).get_key(key) == Some(value)
    }

    pub fn get(&self, attribute: ResourceAttribute) -> Option<&str> {
        self.get_key(attribute.key())
    }

    pub fn get_key(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, attribute: ResourceAttribute) -> bool {
        self.contains_key(attribute.key())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, attribute: ResourceAttribute, value: impl Into<String>) {
        self.insert_key(attribute.key(), value);
    }

    pub fn insert_key(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.0.retain(|key, value| keep(key, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `key=value` pairs in key order, joined with `,`.
    pub fn to_env_value(&self) -> String {
        self.iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for ResourceAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_env_value())
    }
}

impl FromIterator<(String, String)> for ResourceAttributes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn serializes_in_key_order() {
        let mut attributes = ResourceAttributes::new();
        attributes.insert(ResourceAttribute::K8sPodName, "pod");
        attributes.insert_key("a.custom", "1");
        attributes.insert(ResourceAttribute::K8sNamespaceName, "ns");

        let first = attributes.to_env_value();
        assert_eq!(first, "a.custom=1,k8s.namespace.name=ns,k8s.pod.name=pod");
        assert_eq!(first, attributes.to_string());
    }

    #[test]
    fn empty_serializes_to_empty_string() {
        assert_eq!(ResourceAttributes::new().to_env_value(), "");
    }

    #[rstest]
    #[case("", &[])]
    #[case("a=1", &[("a", "1")])]
    #[case(" a=1 , b=2", &[("a", "1"), ("b", "2")])]
    #[case("a=1,broken,c=3", &[("a", "1"), ("c", "3")])]
    #[case("a=b=c,d=", &[("d", "")])]
    #[case("k8s.pod.name=$(OTEL_RESOURCE_ATTRIBUTES_POD_NAME)", &[("k8s.pod.name", "$(OTEL_RESOURCE_ATTRIBUTES_POD_NAME)")])]
    fn parses_leniently(#[case] value: &str, #[case] expected: &[(&str, &str)]) {
        let parsed = ResourceAttributes::parse(value);
        assert_eq!(parsed.iter().collect::<Vec<_>>(), expected);
    }

    #[rstest]
    #[case("team", "checkout", true)]
    #[case("team", "", true)]
    #[case("link", "https://x/?a=b", false)]
    #[case("owners", "a,b", false)]
    #[case("a=b", "1", false)]
    #[case(" team", "checkout", false)]
    fn separators_do_not_read_back(
        #[case] key: &str,
        #[case] value: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(ResourceAttributes::reads_back(key, value), expected);
    }

    #[test]
    fn typed_and_raw_keys_agree() {
        let mut attributes = ResourceAttributes::new();
        attributes.insert_key("service.version", "1.0");

        assert!(attributes.contains(ResourceAttribute::ServiceVersion));
        assert_eq!(attributes.get(ResourceAttribute::ServiceVersion), Some("1.0"));
    }

    #[test]
    fn retain_drops_rejected_keys() {
        let mut attributes = ResourceAttributes::parse("a=1,b=2,c=3");
        let declared = ResourceAttributes::parse("b=x");

        attributes.retain(|key, _| !declared.contains_key(key));

        assert_eq!(attributes.to_env_value(), "a=1,c=3");
    }
}
