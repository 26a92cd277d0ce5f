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

use std::fmt::Display;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mongodb::bson::{self, Bson, Document, doc};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Single-pass stream of raw documents. Consuming it is destructive.
pub type DocumentCursor = BoxStream<'static, Result<Document, StoreError>>;

/// Read-only access to the document collections backing the service.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        query: FindQuery,
    ) -> Result<DocumentCursor, StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("query on `{collection}` failed: {message}")]
    Query { collection: String, message: String },
    #[error("failed to decode document from `{collection}`: {message}")]
    Decode { collection: String, message: String },
}

pub fn decode<T: DeserializeOwned>(collection: &str, document: Document) -> Result<T, StoreError> {
    bson::from_document(document).map_err(|err| StoreError::Decode {
        collection: collection.to_string(),
        message: err.to_string(),
    })
}

#[derive(Clone, Debug)]
pub struct CollectionNames {
    pub logs: String,
    pub pods: String,
    pub services: String,
    pub metrics: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            logs: "APILogs".into(),
            pods: "Pods".into(),
            services: "Services".into(),
            metrics: "EnvoyMetrics".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    Eq { field: String, value: String },
    /// Array field holding `value`, or a scalar field equal to it.
    Contains { field: String, value: String },
    /// Field interpreted as a base-10 integer, compared numerically.
    AtLeast { field: String, value: i64 },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<String>) -> Self {
        Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn contains(field: &str, value: impl Into<String>) -> Self {
        Filter::Contains {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn at_least(field: &str, value: i64) -> Self {
        Filter::AtLeast {
            field: field.to_string(),
            value,
        }
    }

    pub fn to_document(&self) -> Document {
        match self {
            Filter::All => Document::new(),
            Filter::Eq { field, value } | Filter::Contains { field, value } => {
                let mut document = Document::new();
                document.insert(field.clone(), value.clone());
                document
            }
            Filter::AtLeast { field, value } => {
                doc! { "$expr": { "$gte": [numeric_field(field), *value] } }
            }
            Filter::And(filters) if filters.is_empty() => Document::new(),
            Filter::And(filters) => doc! { "$and": sub_documents(filters) },
            Filter::Or(filters) if filters.is_empty() => doc! { "$expr": false },
            Filter::Or(filters) => doc! { "$or": sub_documents(filters) },
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_document())
    }
}

fn sub_documents(filters: &[Filter]) -> Vec<Document> {
    filters.iter().map(Filter::to_document).collect()
}

/// `$convert` expression turning a decimal-string field into a long; values
/// that do not parse become null and never satisfy a numeric comparison.
pub(crate) fn numeric_field(field: &str) -> Document {
    doc! {
        "$convert": {
            "input": format!("${field}"),
            "to": "long",
            "onError": Bson::Null,
            "onNull": Bson::Null,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn direction(self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// Sort on a decimal-string field by its numeric value.
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Option<SortKey>,
}

impl FindQuery {
    pub fn matching(filter: Filter) -> Self {
        Self { filter, sort: None }
    }
}

impl Display for FindQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter={}", self.filter)?;
        if let Some(sort) = &self.sort {
            write!(f, " sort={}:{:?}", sort.field, sort.order)?;
        }
        Ok(())
    }
}
