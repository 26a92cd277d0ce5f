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

//! In-memory store used by tests. Filters are evaluated the way the MongoDB
//! backend translates them, and every call is counted.

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use mongodb::bson::{self, Bson, Document};
use serde::Serialize;

use super::core::{DocumentCursor, DocumentStore, Filter, FindQuery, SortOrder, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Document>>,
    failing: HashSet<String>,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn with<T: Serialize>(self, collection: &str, items: &[T]) -> Self {
        let documents = items
            .iter()
            .map(|item| bson::to_document(item).expect("fixture must serialize to a document"))
            .collect();
        self.with_documents(collection, documents)
    }

    pub fn with_documents(mut self, collection: &str, documents: Vec<Document>) -> Self {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        self
    }

    /// Every query against `collection` fails with a connection error.
    pub fn failing(mut self, collection: &str) -> Self {
        self.failing.insert(collection.to_string());
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn matching(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(collection) {
            return Err(StoreError::Connection(format!(
                "`{collection}` is unreachable"
            )));
        }
        Ok(self
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| evaluate(filter, document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        query: FindQuery,
    ) -> Result<DocumentCursor, StoreError> {
        let mut documents = self.matching(collection, &query.filter)?;
        if let Some(sort) = &query.sort {
            documents.sort_by_key(|document| numeric(document.get(&sort.field)));
            if sort.order == SortOrder::Desc {
                documents.reverse();
            }
        }
        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.matching(collection, &filter)?.into_iter().next())
    }
}

fn evaluate(filter: &Filter, document: &Document) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq { field, value } => document.get(field) == Some(&Bson::String(value.clone())),
        Filter::Contains { field, value } => match document.get(field) {
            Some(Bson::Array(items)) => items.contains(&Bson::String(value.clone())),
            Some(Bson::String(text)) => text == value,
            _ => false,
        },
        Filter::AtLeast { field, value } => {
            numeric(document.get(field)).is_some_and(|number| number >= *value)
        }
        Filter::And(filters) => filters.iter().all(|inner| evaluate(inner, document)),
        Filter::Or(filters) => filters.iter().any(|inner| evaluate(inner, document)),
    }
}

fn numeric(value: Option<&Bson>) -> Option<i64> {
    match value? {
        Bson::String(text) => text.parse().ok(),
        Bson::Int32(number) => Some(i64::from(*number)),
        Bson::Int64(number) => Some(*number),
        _ => None,
    }
}
