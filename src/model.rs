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

use std::{collections::BTreeMap, fmt::Display};

use mongodb::bson::{Bson, oid::ObjectId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::store::CollectionNames;

/// Namespace placeholder written by the collector when it could not attribute
/// an endpoint to a workload.
pub const UNKNOWN_NAMESPACE: &str = "Unknown";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResourceKind {
    Pod,
    Service,
    #[default]
    Unknown,
    Other(String),
}

impl ResourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Pod => "Pod",
            ResourceKind::Service => "Service",
            ResourceKind::Unknown => "Unknown",
            ResourceKind::Other(raw) => raw.as_str(),
        }
    }

    /// Inventory collection that owns resources of this kind, if any.
    pub fn inventory<'a>(&self, collections: &'a CollectionNames) -> Option<&'a str> {
        match self {
            ResourceKind::Pod => Some(collections.pods.as_str()),
            ResourceKind::Service => Some(collections.services.as_str()),
            ResourceKind::Unknown | ResourceKind::Other(_) => None,
        }
    }
}

impl From<String> for ResourceKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pod" => ResourceKind::Pod,
            "Service" => ResourceKind::Service,
            "Unknown" => ResourceKind::Unknown,
            _ => ResourceKind::Other(value),
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of an observed call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub cluster: String,
    pub namespace: String,
    pub name: String,
    pub kind: ResourceKind,
    pub ip: String,
    pub port: String,
}

impl Endpoint {
    pub fn is_unidentified(&self) -> bool {
        self.namespace == UNKNOWN_NAMESPACE
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrafficLogRecord {
    pub id: i64,
    pub timestamp: String,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub method: String,
    pub path: String,
    pub response_code: i32,
}

impl Serialize for TrafficLogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TrafficLogView {
            id: self.id,
            time_stamp: &self.timestamp,
            src_cluster: &self.source.cluster,
            src_namespace: &self.source.namespace,
            src_name: &self.source.name,
            src_type: self.source.kind.as_str(),
            src_ip: &self.source.ip,
            src_port: &self.source.port,
            dst_cluster: &self.destination.cluster,
            dst_namespace: &self.destination.namespace,
            dst_name: &self.destination.name,
            dst_type: self.destination.kind.as_str(),
            dst_ip: &self.destination.ip,
            dst_port: &self.destination.port,
            method: &self.method,
            path: &self.path,
            response_code: self.response_code,
        }
        .serialize(serializer)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrafficLogView<'a> {
    id: i64,
    time_stamp: &'a str,
    src_cluster: &'a str,
    src_namespace: &'a str,
    src_name: &'a str,
    src_type: &'a str,
    #[serde(rename = "srcIP")]
    src_ip: &'a str,
    src_port: &'a str,
    dst_cluster: &'a str,
    dst_namespace: &'a str,
    dst_name: &'a str,
    dst_type: &'a str,
    #[serde(rename = "dstIP")]
    dst_ip: &'a str,
    dst_port: &'a str,
    method: &'a str,
    path: &'a str,
    response_code: i32,
}

/// Traffic log as written by the collector. Absent fields decode to their
/// zero value; the timestamp keeps its raw BSON form for the codec.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredTrafficLog {
    pub id: i64,
    pub timestamp: Bson,
    pub srccluster: String,
    pub srcnamespace: String,
    pub srcname: String,
    pub srctype: String,
    pub srcip: String,
    pub srcport: String,
    pub dstcluster: String,
    pub dstnamespace: String,
    pub dstname: String,
    pub dsttype: String,
    pub dstip: String,
    pub dstport: String,
    pub method: String,
    pub path: String,
    pub responsecode: i32,
}

impl StoredTrafficLog {
    /// Splits into the record shape and the raw timestamp, which the caller
    /// renders into `TrafficLogRecord::timestamp`.
    pub fn into_parts(self) -> (TrafficLogRecord, Bson) {
        let record = TrafficLogRecord {
            id: self.id,
            timestamp: String::new(),
            source: Endpoint {
                cluster: self.srccluster,
                namespace: self.srcnamespace,
                name: self.srcname,
                kind: self.srctype.into(),
                ip: self.srcip,
                port: self.srcport,
            },
            destination: Endpoint {
                cluster: self.dstcluster,
                namespace: self.dstnamespace,
                name: self.dstname,
                kind: self.dsttype.into(),
                ip: self.dstip,
                port: self.dstport,
            },
            method: self.method,
            path: self.path,
            response_code: self.responsecode,
        };
        (record, self.timestamp)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PodRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub identity: Option<ObjectId>,
    pub cluster: String,
    pub namespace: String,
    pub name: String,
    #[serde(rename = "nodename")]
    pub node_name: String,
    #[serde(rename = "podip")]
    pub pod_ip: String,
    pub status: String,
    #[serde(rename = "creationtimestamp")]
    pub creation_timestamp: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub identity: Option<ObjectId>,
    pub cluster: String,
    pub namespace: String,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "clusterip")]
    pub cluster_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ports: Vec<ServicePort>,
    #[serde(rename = "loadbalancerips", deserialize_with = "null_as_default")]
    pub load_balancer_ips: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePort {
    pub port: i32,
    #[serde(rename = "targetport")]
    pub target_port: i32,
    pub protocol: String,
}

/// Envoy statistics snapshot, served back unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvoyMetrics {
    #[serde(rename(serialize = "timeStamp", deserialize = "timestamp"))]
    pub timestamp: String,
    pub namespace: String,
    pub name: String,
    #[serde(rename(serialize = "ipAddress", deserialize = "ipaddress"))]
    pub ip_address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub metrics: BTreeMap<String, MetricValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricValue {
    #[serde(deserialize_with = "null_as_default")]
    pub value: BTreeMap<String, String>,
}

/// Collectors write empty slices and maps as BSON `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
