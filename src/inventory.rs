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

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::PodRecord;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub name: String,
    pub namespaces: BTreeSet<String>,
}

/// Groups pods by cluster, collecting the distinct namespaces seen in each.
pub fn aggregate_clusters<'a>(
    pods: impl IntoIterator<Item = &'a PodRecord>,
) -> Vec<ClusterSummary> {
    let mut grouped: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for pod in pods {
        grouped
            .entry(pod.cluster.as_str())
            .or_default()
            .insert(pod.namespace.clone());
    }
    grouped
        .into_iter()
        .map(|(name, namespaces)| ClusterSummary {
            name: name.to_string(),
            namespaces,
        })
        .collect()
}
