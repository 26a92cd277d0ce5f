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

//! Compact duration literals such as `10m`, `1h30m`, `1.5h` or `300ms`.

use std::time::Duration;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1},
    combinator::{all_consuming, map_res, opt, recognize},
    error::{Error as NomError, context},
    multi::many1,
    sequence::pair,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("invalid duration `{0}`")]
    Invalid(String),
    #[error("duration `{0}` is out of range")]
    OutOfRange(String),
}

type NomResult<'a, T> = IResult<&'a str, T, NomError<&'a str>>;

pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let trimmed = input.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    let (_, components) = all_consuming(many1(component))
        .parse(trimmed)
        .map_err(|_| DurationError::Invalid(input.to_string()))?;

    let mut total_ns = 0f64;
    for (value, unit_ns) in components {
        total_ns += value * unit_ns;
    }
    if !total_ns.is_finite() || total_ns > u64::MAX as f64 {
        return Err(DurationError::OutOfRange(input.to_string()));
    }
    Ok(Duration::from_nanos(total_ns.round() as u64))
}

fn component(input: &str) -> NomResult<'_, (f64, f64)> {
    context("duration component", pair(number, unit)).parse(input)
}

fn number(input: &str) -> NomResult<'_, f64> {
    map_res(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        |text: &str| text.parse::<f64>(),
    )
    .parse(input)
}

fn unit(input: &str) -> NomResult<'_, f64> {
    context(
        "duration unit",
        alt((
            tag("ns").map(|_| 1.0),
            tag("us").map(|_| 1_000.0),
            tag("µs").map(|_| 1_000.0),
            tag("μs").map(|_| 1_000.0),
            tag("ms").map(|_| 1_000_000.0),
            tag("s").map(|_| 1_000_000_000.0),
            tag("m").map(|_| 60_000_000_000.0),
            tag("h").map(|_| 3_600_000_000_000.0),
        )),
    )
    .parse(input)
}
