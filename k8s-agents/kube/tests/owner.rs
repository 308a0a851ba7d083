use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use k8s_agents_env::resource::ResourceAttribute;
use k8s_agents_kube::{
    error::{KubeApiError, Result},
    lookup::OwnerLookup,
    owner::OwnerResolver,
    retry::RetryPolicy,
};
use k8s_openapi::{
    api::apps::v1::ReplicaSet,
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference},
};
use kube::core::ErrorResponse;
use rstest::rstest;

/// In-memory cluster that only becomes consistent after `not_found_first` reads.
#[derive(Default)]
struct FakeLookup {
    replica_sets: HashMap<String, ReplicaSet>,
    not_found_first: usize,
    internal_error: bool,
    calls: AtomicUsize,
}

impl FakeLookup {
    fn with_replica_set(mut self, name: &str, owners: Vec<OwnerReference>) -> Self {
        self.replica_sets.insert(
            name.to_owned(),
            ReplicaSet {
                metadata: ObjectMeta {
                    name: Some(name.to_owned()),
                    namespace: Some("shop".to_owned()),
                    owner_references: Some(owners),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OwnerLookup for FakeLookup {
    async fn replica_set(&self, namespace: &str, name: &str) -> Result<ReplicaSet> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if self.internal_error {
            return Err(KubeApiError::KubeError(kube::Error::Api(ErrorResponse {
                status: "Failure".into(),
                message: "etcd is down".into(),
                reason: "InternalError".into(),
                code: 500,
            })));
        }

        if call < self.not_found_first {
            return Err(KubeApiError::not_found("ReplicaSet", namespace, name));
        }

        self.replica_sets
            .get(name)
            .cloned()
            .ok_or_else(|| KubeApiError::not_found("ReplicaSet", namespace, name))
    }
}

fn owner(kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "apps/v1".into(),
        kind: kind.into(),
        name: name.into(),
        uid: format!("{name}-uid"),
        controller: Some(true),
        ..Default::default()
    }
}

fn pod_meta(owners: Vec<OwnerReference>) -> ObjectMeta {
    ObjectMeta {
        name: Some("checkout-7d9c-abcde".into()),
        namespace: Some("shop".into()),
        owner_references: Some(owners),
        ..Default::default()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        attempts: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn direct_owner_needs_no_lookup() {
    let resolver = OwnerResolver::new(FakeLookup::default());

    let attributes = resolver
        .resolve("shop", &pod_meta(vec![owner("StatefulSet", "db")]), false)
        .await;

    assert_eq!(
        attributes.get(&ResourceAttribute::K8sStatefulSetName).map(String::as_str),
        Some("db")
    );
    assert!(!attributes.contains_key(&ResourceAttribute::K8sStatefulSetUid));
    assert_eq!(resolver.lookup().calls(), 0);
}

#[tokio::test]
async fn deployment_surfaces_through_replica_set() {
    let lookup = FakeLookup::default()
        .with_replica_set("checkout-7d9c", vec![owner("Deployment", "checkout")]);
    let resolver = OwnerResolver::new(lookup);

    let attributes = resolver
        .resolve(
            "shop",
            &pod_meta(vec![owner("ReplicaSet", "checkout-7d9c")]),
            true,
        )
        .await;

    let expected = [
        (ResourceAttribute::K8sReplicaSetName, "checkout-7d9c"),
        (ResourceAttribute::K8sReplicaSetUid, "checkout-7d9c-uid"),
        (ResourceAttribute::K8sDeploymentName, "checkout"),
        (ResourceAttribute::K8sDeploymentUid, "checkout-uid"),
    ];
    assert_eq!(attributes.len(), expected.len());
    for (attribute, value) in expected {
        assert_eq!(attributes.get(&attribute).map(String::as_str), Some(value));
    }
}

#[tokio::test]
async fn unknown_kinds_are_ignored() {
    let resolver = OwnerResolver::new(FakeLookup::default());

    let attributes = resolver
        .resolve(
            "shop",
            &pod_meta(vec![owner("Rollout", "canary"), owner("cronjob", "nightly")]),
            false,
        )
        .await;

    assert_eq!(attributes.len(), 1);
    assert_eq!(
        attributes.get(&ResourceAttribute::K8sCronJobName).map(String::as_str),
        Some("nightly")
    );
}

#[tokio::test]
async fn retries_until_replica_set_is_visible() {
    let lookup = FakeLookup {
        not_found_first: 2,
        ..Default::default()
    }
    .with_replica_set("checkout-7d9c", vec![owner("Deployment", "checkout")]);
    let resolver = OwnerResolver::new(lookup).with_retry_policy(fast_retry());

    let attributes = resolver
        .resolve(
            "shop",
            &pod_meta(vec![owner("ReplicaSet", "checkout-7d9c")]),
            false,
        )
        .await;

    assert_eq!(
        attributes.get(&ResourceAttribute::K8sDeploymentName).map(String::as_str),
        Some("checkout")
    );
    assert_eq!(resolver.lookup().calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn missing_replica_set_exhausts_default_budget() {
    let resolver = OwnerResolver::new(FakeLookup::default());

    let attributes = resolver
        .resolve(
            "shop",
            &pod_meta(vec![owner("ReplicaSet", "checkout-7d9c")]),
            false,
        )
        .await;

    assert_eq!(resolver.lookup().calls(), 20);
    assert_eq!(attributes.len(), 1);
    assert!(attributes.contains_key(&ResourceAttribute::K8sReplicaSetName));
    assert!(!attributes.contains_key(&ResourceAttribute::K8sDeploymentName));
}

#[tokio::test]
async fn other_errors_are_not_retried() {
    let lookup = FakeLookup {
        internal_error: true,
        ..Default::default()
    };
    let resolver = OwnerResolver::new(lookup).with_retry_policy(fast_retry());

    let attributes = resolver
        .resolve(
            "shop",
            &pod_meta(vec![owner("ReplicaSet", "checkout-7d9c")]),
            false,
        )
        .await;

    assert_eq!(resolver.lookup().calls(), 1);
    assert_eq!(attributes.len(), 1);
}

#[tokio::test]
async fn self_owned_replica_set_terminates() {
    let lookup = FakeLookup::default()
        .with_replica_set("loop", vec![owner("ReplicaSet", "loop")]);
    let resolver = OwnerResolver::new(lookup).with_max_depth(3);

    let attributes = resolver
        .resolve("shop", &pod_meta(vec![owner("ReplicaSet", "loop")]), false)
        .await;

    assert_eq!(resolver.lookup().calls(), 2);
    assert_eq!(
        attributes.get(&ResourceAttribute::K8sReplicaSetName).map(String::as_str),
        Some("loop")
    );
}

#[rstest]
#[case::clamped(0, 0, false)]
#[case::direct_only(1, 0, false)]
#[case::through_replica_set(2, 1, true)]
#[tokio::test]
async fn max_depth_bounds_lookups(
    #[case] max_depth: usize,
    #[case] calls: usize,
    #[case] deployment: bool,
) {
    let lookup = FakeLookup::default()
        .with_replica_set("checkout-7d9c", vec![owner("Deployment", "checkout")]);
    let resolver = OwnerResolver::new(lookup).with_max_depth(max_depth);

    let attributes = resolver
        .resolve(
            "shop",
            &pod_meta(vec![owner("ReplicaSet", "checkout-7d9c")]),
            false,
        )
        .await;

    assert_eq!(resolver.lookup().calls(), calls);
    assert_eq!(
        attributes.get(&ResourceAttribute::K8sReplicaSetName).map(String::as_str),
        Some("checkout-7d9c")
    );
    assert_eq!(
        attributes.contains_key(&ResourceAttribute::K8sDeploymentName),
        deployment
    );
}
