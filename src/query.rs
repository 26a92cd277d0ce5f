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

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::{
    duration::parse_duration,
    error::AppError,
    model::TrafficLogRecord,
    store::{Filter, FindQuery, SortKey, SortOrder},
};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Parses an optional window such as `10m`. Absent or empty values select
/// the default window; anything else must parse.
pub fn parse_window(raw: Option<&str>) -> Result<Duration, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_WINDOW),
        Some(text) => Ok(parse_duration(text)?),
    }
}

/// Selects logs stamped at or after `now - window`. The stored timestamp is
/// a decimal string, so the bound is compared numerically.
pub fn build_filter(window: Duration, order: Option<SortOrder>, now: DateTime<Utc>) -> FindQuery {
    let cutoff = TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .map(|cutoff| cutoff.timestamp())
        .unwrap_or(i64::MIN);
    FindQuery {
        filter: Filter::at_least(TIMESTAMP_FIELD, cutoff),
        sort: order.map(|order| SortKey {
            field: TIMESTAMP_FIELD.to_string(),
            order,
        }),
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct FilterCondition {
    pub cluster: String,
    pub namespace: String,
}

impl FilterCondition {
    /// Either endpoint may supply the cluster, and either may supply the
    /// namespace.
    pub fn matches(&self, record: &TrafficLogRecord) -> bool {
        let cluster = record.source.cluster == self.cluster
            || record.destination.cluster == self.cluster;
        let namespace = record.source.namespace == self.namespace
            || record.destination.namespace == self.namespace;
        cluster && namespace
    }
}

/// Non-empty list of conditions; a record is kept when any of them matches.
#[derive(Clone, Debug)]
pub struct ConditionSet(Vec<FilterCondition>);

impl ConditionSet {
    pub fn new(conditions: Vec<FilterCondition>) -> Result<Self, AppError> {
        if conditions.is_empty() {
            return Err(AppError::BadRequest(
                "namespaces must contain at least one condition".into(),
            ));
        }
        Ok(Self(conditions))
    }

    pub fn matches(&self, record: &TrafficLogRecord) -> bool {
        self.0.iter().any(|condition| condition.matches(record))
    }
}
