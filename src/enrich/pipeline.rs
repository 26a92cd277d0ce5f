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

use futures::{FutureExt, Stream, TryStreamExt, future};
use log::debug;

use crate::{
    model::{StoredTrafficLog, TrafficLogRecord},
    store::{DocumentCursor, StoreError, decode},
};

use super::{identity::IdentityResolver, timestamp};

/// Whether records whose endpoints could not be backfilled are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrichMode {
    /// Keep every record, identified or not.
    Bulk,
    /// Drop records with an endpoint left unidentified after backfill.
    Filtered,
}

pub struct EnrichmentPipeline<'a> {
    resolver: IdentityResolver<'a>,
    collection: &'a str,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(resolver: IdentityResolver<'a>, collection: &'a str) -> Self {
        Self {
            resolver,
            collection,
        }
    }

    /// Decodes and enriches the cursor one record at a time. The first
    /// document that fails to decode ends the stream with that error.
    pub fn enrich(
        &'a self,
        cursor: DocumentCursor,
        mode: EnrichMode,
    ) -> impl Stream<Item = Result<TrafficLogRecord, StoreError>> + Send + 'a {
        cursor
            .and_then(move |document| {
                future::ready(decode::<StoredTrafficLog>(self.collection, document))
            })
            .try_filter_map(move |stored| self.enrich_record(stored, mode).map(Ok))
    }

    pub async fn enrich_record(
        &self,
        stored: StoredTrafficLog,
        mode: EnrichMode,
    ) -> Option<TrafficLogRecord> {
        let (mut record, raw_timestamp) = stored.into_parts();
        record.source.cluster = self
            .resolver
            .resolve_cluster(
                &record.source.kind,
                &record.source.name,
                &record.source.namespace,
            )
            .await;
        record.destination.cluster = self
            .resolver
            .resolve_cluster(
                &record.destination.kind,
                &record.destination.name,
                &record.destination.namespace,
            )
            .await;
        let source_identified = self.resolver.backfill(&mut record.source).await;
        let destination_identified = self.resolver.backfill(&mut record.destination).await;
        record.timestamp = timestamp::to_display(&raw_timestamp);

        if mode == EnrichMode::Filtered && !(source_identified && destination_identified) {
            debug!(
                "dropping log {}: source identified={}, destination identified={}",
                record.id, source_identified, destination_identified
            );
            return None;
        }
        Some(record)
    }
}
