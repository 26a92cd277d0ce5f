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

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStream, TryStreamExt, stream};
use log::{debug, info};
use mongodb::{
    Client, Database,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind},
    options::ClientOptions,
};
use tokio::time::{Instant, timeout, timeout_at};

use super::core::{DocumentCursor, DocumentStore, Filter, FindQuery, StoreError, numeric_field};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SORT_KEY: &str = "__sort_key";

/// MongoDB-backed store. The client pools connections internally and is
/// shared by every request for the lifetime of the process.
pub struct MongoStore {
    database: Database,
    timeout: Duration,
}

impl MongoStore {
    pub async fn connect(
        uri: &str,
        database: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|err| StoreError::Connection(format!("invalid MongoDB URI: {err}")))?;
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(timeout);
        let client = Client::with_options(options)
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        info!("MongoDB client created for database `{database}`");
        Ok(Self {
            database: client.database(database),
            timeout,
        })
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        timeout(self.timeout, self.database.run_command(doc! { "ping": 1 }))
            .await
            .map_err(|_| StoreError::Connection(format!("ping timed out after {:?}", self.timeout)))?
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(
        &self,
        collection: &str,
        query: FindQuery,
    ) -> Result<DocumentCursor, StoreError> {
        let deadline = Instant::now() + self.timeout;
        let limit = self.timeout;
        let pipeline = aggregate_pipeline(&query);
        debug!("aggregate on `{collection}`: {pipeline:?}");
        let cursor = timeout_at(
            deadline,
            self.database
                .collection::<Document>(collection)
                .aggregate(pipeline),
        )
        .await
        .map_err(|_| timed_out(collection, limit))?
        .map_err(|err| classify(collection, err))?;

        Ok(until_deadline(cursor, collection, deadline, limit))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError> {
        timeout(
            self.timeout,
            self.database
                .collection::<Document>(collection)
                .find_one(filter.to_document()),
        )
        .await
        .map_err(|_| timed_out(collection, self.timeout))?
        .map_err(|err| classify(collection, err))
    }
}

/// Yields from `documents` until `deadline`; a pull that is still pending at
/// the deadline ends the stream with a query error.
fn until_deadline<S>(
    documents: S,
    collection: &str,
    deadline: Instant,
    limit: Duration,
) -> DocumentCursor
where
    S: TryStream<Ok = Document, Error = MongoError> + Unpin + Send + 'static,
{
    let name = collection.to_string();
    stream::try_unfold((documents, name), move |(mut documents, name)| async move {
        match timeout_at(deadline, documents.try_next()).await {
            Err(_) => Err(timed_out(&name, limit)),
            Ok(Err(err)) => Err(classify(&name, err)),
            Ok(Ok(Some(document))) => Ok(Some((document, (documents, name)))),
            Ok(Ok(None)) => Ok(None),
        }
    })
    .boxed()
}

/// `find` runs as an aggregation so the sort can use the numeric value of a
/// decimal-string field instead of its lexicographic order.
fn aggregate_pipeline(query: &FindQuery) -> Vec<Document> {
    let mut pipeline = vec![doc! { "$match": query.filter.to_document() }];
    if let Some(sort) = &query.sort {
        let mut key = Document::new();
        key.insert(SORT_KEY, numeric_field(&sort.field));
        let mut order = Document::new();
        order.insert(SORT_KEY, sort.order.direction());
        let mut hidden = Document::new();
        hidden.insert(SORT_KEY, 0);
        pipeline.push(doc! { "$addFields": key });
        pipeline.push(doc! { "$sort": order });
        pipeline.push(doc! { "$project": hidden });
    }
    pipeline
}

fn classify(collection: &str, err: MongoError) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
            StoreError::Connection(err.to_string())
        }
        _ => StoreError::Query {
            collection: collection.to_string(),
            message: err.to_string(),
        },
    }
}

fn timed_out(collection: &str, limit: Duration) -> StoreError {
    StoreError::Query {
        collection: collection.to_string(),
        message: format!("timed out after {limit:?}"),
    }
}
