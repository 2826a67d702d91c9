// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Counter Domain Model
//!
//! The counter lives in the remote repository as a set of tags named
//! `<prefix->build-number-<N>`. The current value is the largest `N` among
//! the matching tags; the next value is one above it. Superseded tags are
//! removed after every successful claim, so a healthy repository carries
//! one tag per counter and at most a handful while cleanup is lagging.
//!
//! | Type | Role |
//! |------|------|
//! | `BuildNumber` | The integer handed to the pipeline |
//! | `CounterPrefix` | Namespaces one counter among several in a repository |
//! | `CounterReference` | One counter tag as read from the store |
//! | `CounterSnapshot` | All tags returned by one listing |
//! | `Allocation` | Result of [`allocate`]: next value plus sweep candidates |

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::config::EmptyCounterPolicy;

/// Maximum number of counter tags that may legitimately coexist.
///
/// More than this means cleanup has been failing across several runs and
/// the namespace needs an operator.
pub const STALENESS_THRESHOLD: usize = 5;

/// Git namespace holding the counter tags.
pub const TAG_NAMESPACE: &str = "refs/tags/";

const COUNTER_STEM: &str = "build-number-";

/// A build number as published to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildNumber(u64);

impl BuildNumber {
    /// Value claimed when the repository has no counter tags yet.
    pub const FIRST: BuildNumber = BuildNumber(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// The successor, or `None` at `u64::MAX`.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BuildNumber {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

/// Optional namespace in front of `build-number-`.
///
/// An empty prefix is valid and yields bare `build-number-<N>` tags.
/// A non-empty prefix is joined with a `-` separator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CounterPrefix(String);

impl CounterPrefix {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tag name without the number, e.g. `web-build-number-`.
    pub fn stem(&self) -> String {
        if self.0.is_empty() {
            COUNTER_STEM.to_string()
        } else {
            format!("{}-{}", self.0, COUNTER_STEM)
        }
    }

    /// Full tag name for `value`, e.g. `web-build-number-42`.
    pub fn tag_name(&self, value: BuildNumber) -> String {
        format!("{}{}", self.stem(), value)
    }

    /// Pattern matching exactly this counter's tags and capturing the number.
    ///
    /// Anchored at both ends so `myweb-build-number-3` never counts for
    /// prefix `web`, and `build-number-3-rc` never counts at all.
    pub fn matcher(&self) -> Regex {
        let pattern = format!(r"^{}(\d+)$", regex::escape(&self.stem()));
        Regex::new(&pattern).expect("escaped literal plus a digit group is a valid pattern")
    }
}

impl fmt::Display for CounterPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One tag as listed by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterReference {
    /// Tag name without the `refs/tags/` namespace.
    pub name: String,

    /// Commit the tag points at. Irrelevant to ordering.
    pub commit: String,
}

impl CounterReference {
    pub fn new(name: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit: commit.into(),
        }
    }

    /// Fully qualified ref, e.g. `refs/tags/build-number-7`.
    pub fn ref_path(&self) -> String {
        format!("{}{}", TAG_NAMESPACE, self.name)
    }
}

/// Tags read from the store at one point in time.
///
/// Two snapshots taken back to back may differ: the store offers no
/// transactions and other pipeline runs mutate it concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub references: Vec<CounterReference>,
}

impl CounterSnapshot {
    pub fn new(references: Vec<CounterReference>) -> Self {
        Self { references }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// References belonging to `prefix`'s counter, in listing order.
    pub fn matching(&self, prefix: &CounterPrefix) -> Vec<&CounterReference> {
        let matcher = prefix.matcher();
        self.references
            .iter()
            .filter(|r| matcher.is_match(&r.name))
            .collect()
    }
}

/// Counter state derived from a snapshot, before any policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterState {
    /// Largest number among the matching tags, `None` when there are none.
    pub current: Option<BuildNumber>,

    /// Every matching tag. All of them are superseded once a new value is claimed.
    pub entries: Vec<CounterReference>,
}

/// Outcome of [`allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Value to claim.
    pub next: BuildNumber,

    /// Value the snapshot held, `None` for a fresh counter.
    pub current: Option<BuildNumber>,

    /// Deletion candidates once `next` is claimed.
    pub stale: Vec<CounterReference>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CounterError {
    #[error(
        "Too many {stem} refs in repository, found {count}, expected at most {threshold}. \
         Check your tags: {}",
        .names.join(", ")
    )]
    CorruptedCounterState {
        stem: String,
        count: usize,
        threshold: usize,
        names: Vec<String>,
    },

    #[error("Counter tag '{reference}' carries an unparseable number '{digits}'")]
    Parse { reference: String, digits: String },

    #[error("No {stem} refs in repository. Check your tags!")]
    NoCounter { stem: String },

    #[error("Counter {stem} is at {current} and cannot be incremented")]
    Overflow { stem: String, current: BuildNumber },
}

/// Reads `prefix`'s counter out of `snapshot`.
///
/// Fails with [`CounterError::CorruptedCounterState`] when more than
/// [`STALENESS_THRESHOLD`] tags match, whatever their numbers.
pub fn inspect(
    snapshot: &CounterSnapshot,
    prefix: &CounterPrefix,
) -> Result<CounterState, CounterError> {
    let matcher = prefix.matcher();
    let matching: Vec<&CounterReference> = snapshot
        .references
        .iter()
        .filter(|r| matcher.is_match(&r.name))
        .collect();

    if matching.len() > STALENESS_THRESHOLD {
        return Err(CounterError::CorruptedCounterState {
            stem: prefix.stem(),
            count: matching.len(),
            threshold: STALENESS_THRESHOLD,
            names: matching.iter().map(|r| r.name.clone()).collect(),
        });
    }

    let mut entries = Vec::new();
    let mut current: Option<BuildNumber> = None;
    for reference in matching {
        let digits = matcher
            .captures(&reference.name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or_default();

        let value: BuildNumber = digits.parse().map_err(|_| CounterError::Parse {
            reference: reference.name.clone(),
            digits: digits.to_string(),
        })?;

        current = Some(current.map_or(value, |c| c.max(value)));
        entries.push(reference.clone());
    }

    Ok(CounterState { current, entries })
}

/// Computes the next build number for `prefix` from `snapshot`.
///
/// Duplicate numbers (`build-number-7` next to `build-number-07`) are not an
/// error; both become sweep candidates and contribute 7 to the maximum.
pub fn allocate(
    snapshot: &CounterSnapshot,
    prefix: &CounterPrefix,
    on_empty: EmptyCounterPolicy,
) -> Result<Allocation, CounterError> {
    let state = inspect(snapshot, prefix)?;

    let next = match state.current {
        Some(current) => current.next().ok_or_else(|| CounterError::Overflow {
            stem: prefix.stem(),
            current,
        })?,
        None => match on_empty {
            EmptyCounterPolicy::StartAtOne => BuildNumber::FIRST,
            EmptyCounterPolicy::Fail => {
                return Err(CounterError::NoCounter { stem: prefix.stem() });
            }
        },
    };

    Ok(Allocation {
        next,
        current: state.current,
        stale: state.entries,
    })
}
