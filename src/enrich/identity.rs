// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use log::{debug, warn};

use crate::{
    model::{Endpoint, ResourceKind, ServiceRecord},
    store::{CollectionNames, DocumentStore, Filter, decode},
};

const LOAD_BALANCER_IPS_FIELD: &str = "loadbalancerips";

/// Resolves endpoints against the pod and service inventory. Lookups never
/// fail: misses and store errors degrade to the fallback cluster or leave the
/// endpoint untouched.
#[derive(Clone, Copy)]
pub struct IdentityResolver<'a> {
    store: &'a dyn DocumentStore,
    collections: &'a CollectionNames,
    fallback_cluster: &'a str,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        collections: &'a CollectionNames,
        fallback_cluster: &'a str,
    ) -> Self {
        Self {
            store,
            collections,
            fallback_cluster,
        }
    }

    pub async fn resolve_cluster(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
    ) -> String {
        let Some(collection) = kind.inventory(self.collections) else {
            return self.fallback_cluster.to_string();
        };
        let filter = Filter::And(vec![
            Filter::eq("name", name),
            Filter::eq("namespace", namespace),
        ]);
        match self.store.find_one(collection, filter).await {
            Ok(Some(document)) => match document.get_str("cluster") {
                Ok(cluster) if !cluster.is_empty() => cluster.to_string(),
                _ => {
                    debug!("{kind} {namespace}/{name} has no cluster in `{collection}`");
                    self.fallback_cluster.to_string()
                }
            },
            Ok(None) => {
                debug!("{kind} {namespace}/{name} not found in `{collection}`");
                self.fallback_cluster.to_string()
            }
            Err(err) => {
                warn!("cluster lookup for {kind} {namespace}/{name} failed: {err}");
                self.fallback_cluster.to_string()
            }
        }
    }

    /// Fills in namespace and name of an endpoint whose namespace is
    /// `"Unknown"` from the service exposing its IP through a load balancer.
    /// Returns false when the endpoint stays unidentified.
    pub async fn backfill(&self, endpoint: &mut Endpoint) -> bool {
        if !endpoint.is_unidentified() {
            return true;
        }
        let collection = self.collections.services.as_str();
        let filter = Filter::contains(LOAD_BALANCER_IPS_FIELD, endpoint.ip.as_str());
        let document = match self.store.find_one(collection, filter).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!("no service exposes load balancer IP {}", endpoint.ip);
                return false;
            }
            Err(err) => {
                warn!("service lookup for IP {} failed: {err}", endpoint.ip);
                return false;
            }
        };
        match decode::<ServiceRecord>(collection, document) {
            Ok(service) => {
                endpoint.kind = ResourceKind::Service;
                endpoint.namespace = service.namespace;
                endpoint.name = service.name;
                true
            }
            Err(err) => {
                warn!("{err}");
                false
            }
        }
    }
}
