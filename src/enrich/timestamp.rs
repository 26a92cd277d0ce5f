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

use chrono::{TimeZone, Utc};
use log::warn;
use mongodb::bson::Bson;

pub const DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
pub const UNKNOWN_TIMESTAMP: &str = "unknown";

/// Renders a stored timestamp (decimal Unix seconds) as RFC 3339 UTC.
/// Strings that are not integers pass through; other BSON types become
/// `"unknown"`.
pub fn to_display(raw: &Bson) -> String {
    match raw {
        Bson::String(text) => match text.parse::<i64>() {
            Ok(secs) => match Utc.timestamp_opt(secs, 0).single() {
                Some(datetime) => datetime.format(DISPLAY_FORMAT).to_string(),
                None => {
                    warn!("timestamp out of range: {text}");
                    text.clone()
                }
            },
            Err(_) => {
                warn!("invalid timestamp format: {text}");
                text.clone()
            }
        },
        other => {
            warn!("unknown timestamp format: {other}");
            UNKNOWN_TIMESTAMP.to_string()
        }
    }
}

/// The stored timestamp as text, without rendering.
pub fn as_stored(raw: &Bson) -> String {
    match raw {
        Bson::String(text) => text.clone(),
        Bson::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub fn parse_display(display: &str) -> Option<i64> {
    chrono::NaiveDateTime::parse_from_str(display, DISPLAY_FORMAT)
        .ok()
        .map(|datetime| datetime.and_utc().timestamp())
}
