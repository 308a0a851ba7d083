use std::borrow::Cow;

use k8s_agents_env::resource::{ResourceAttribute, TopologyAttributes};
use k8s_openapi::{api::apps::v1::ReplicaSet, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use tracing::{error, warn, Level};

use crate::{lookup::OwnerLookup, retry::RetryPolicy};

/// Owner chains longer than this are treated as malformed.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Controller kinds that can own a workload's pods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadKind {
    ReplicaSet,
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
    CronJob,
}

impl WorkloadKind {
    /// Matches an owner reference `kind`, ignoring case.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "replicaset" => Some(WorkloadKind::ReplicaSet),
            "deployment" => Some(WorkloadKind::Deployment),
            "statefulset" => Some(WorkloadKind::StatefulSet),
            "daemonset" => Some(WorkloadKind::DaemonSet),
            "job" => Some(WorkloadKind::Job),
            "cronjob" => Some(WorkloadKind::CronJob),
            _ => None,
        }
    }

    pub const fn name_attribute(self) -> ResourceAttribute {
        match self {
            WorkloadKind::ReplicaSet => ResourceAttribute::K8sReplicaSetName,
            WorkloadKind::Deployment => ResourceAttribute::K8sDeploymentName,
            WorkloadKind::StatefulSet => ResourceAttribute::K8sStatefulSetName,
            WorkloadKind::DaemonSet => ResourceAttribute::K8sDaemonSetName,
            WorkloadKind::Job => ResourceAttribute::K8sJobName,
            WorkloadKind::CronJob => ResourceAttribute::K8sCronJobName,
        }
    }

    pub const fn uid_attribute(self) -> ResourceAttribute {
        match self {
            WorkloadKind::ReplicaSet => ResourceAttribute::K8sReplicaSetUid,
            WorkloadKind::Deployment => ResourceAttribute::K8sDeploymentUid,
            WorkloadKind::StatefulSet => ResourceAttribute::K8sStatefulSetUid,
            WorkloadKind::DaemonSet => ResourceAttribute::K8sDaemonSetUid,
            WorkloadKind::Job => ResourceAttribute::K8sJobUid,
            WorkloadKind::CronJob => ResourceAttribute::K8sCronJobUid,
        }
    }
}

/// Walks an object's owner references up to the workload that manages it.
///
/// Only a [`WorkloadKind::ReplicaSet`] is fetched from the cluster, so that the Deployment
/// behind a pod's ReplicaSet can be named. Resolution is best effort: a failed lookup is logged
/// and ends the walk at that owner, it never fails the caller.
#[derive(Debug)]
pub struct OwnerResolver<L> {
    lookup: L,
    retry: RetryPolicy,
    max_depth: usize,
}

impl<L> OwnerResolver<L>
where
    L: OwnerLookup,
{
    pub fn new(lookup: L) -> Self {
        OwnerResolver {
            lookup,
            retry: RetryPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Levels of owners to record, the direct owners being the first. Always at least one.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Name (and UID when `include_uid`) of every recognized owner of `metadata`, following
    /// fetched ReplicaSets to their own owners.
    #[tracing::instrument(
        level = Level::DEBUG,
        skip(self, metadata),
        fields(object = metadata.name.as_deref()),
        ret
    )]
    pub async fn resolve(
        &self,
        namespace: &str,
        metadata: &ObjectMeta,
        include_uid: bool,
    ) -> TopologyAttributes {
        let mut attributes = TopologyAttributes::new();
        let mut current = Cow::Borrowed(metadata);
        let mut depth = 1;

        loop {
            let mut replica_set = None;

            for owner in current.owner_references.iter().flatten() {
                let Some(kind) = WorkloadKind::from_kind(&owner.kind) else {
                    continue;
                };

                attributes.insert(kind.name_attribute(), owner.name.clone());
                if include_uid {
                    attributes.insert(kind.uid_attribute(), owner.uid.clone());
                }

                if kind == WorkloadKind::ReplicaSet {
                    replica_set = Some(owner.name.clone());
                }
            }

            let Some(name) = replica_set else {
                return attributes;
            };

            // The owners of the fetched ReplicaSet would be one level too deep.
            if depth >= self.max_depth {
                warn!(
                    namespace,
                    replicaset = %name,
                    max_depth = self.max_depth,
                    "owner chain is deeper than expected, stopped resolving"
                );
                return attributes;
            }

            match self.fetch_replica_set(namespace, &name).await {
                Some(replica_set) => current = Cow::Owned(replica_set.metadata),
                None => return attributes,
            }
            depth += 1;
        }
    }

    async fn fetch_replica_set(&self, namespace: &str, name: &str) -> Option<ReplicaSet> {
        self.retry
            .retry_not_found(|| self.lookup.replica_set(namespace, name))
            .await
            .inspect_err(|error| {
                error!(%error, replicaset = name, namespace, "failed to get replicaset");
            })
            .ok()
    }
}
