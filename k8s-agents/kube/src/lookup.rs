use k8s_openapi::{api::apps::v1::ReplicaSet, NamespaceResourceScope};
use kube::{Api, Client};

use crate::error::Result;

/// Remote reads the owner resolution needs from the cluster.
///
/// Implemented for [`Client`]; tests provide their own.
pub trait OwnerLookup {
    #[allow(async_fn_in_trait)]
    async fn replica_set(&self, namespace: &str, name: &str) -> Result<ReplicaSet>;
}

impl OwnerLookup for Client {
    #[tracing::instrument(level = "trace", skip(self), err)]
    async fn replica_set(&self, namespace: &str, name: &str) -> Result<ReplicaSet> {
        let api: Api<ReplicaSet> = get_k8s_resource_api(self, Some(namespace));
        Ok(api.get(name).await?)
    }
}

pub fn get_k8s_resource_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    if let Some(namespace) = namespace {
        Api::namespaced(client.clone(), namespace)
    } else {
        Api::default_namespaced(client.clone())
    }
}
