use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::RankscanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(u64);

impl ProfileId {
    pub fn new(value: u64) -> Result<Self, RankscanError> {
        if value == 0 {
            return Err(RankscanError::InvalidRange(
                "profile ids start at 1".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Canonical locator for this profile under `base_url`.
    pub fn reference(self, base_url: &str) -> String {
        format!("{base_url}{}", self.0)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of profile ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdRange {
    start: u64,
    end: u64,
}

impl IdRange {
    pub fn new(start: u64, end: u64) -> Result<Self, RankscanError> {
        if start == 0 {
            return Err(RankscanError::InvalidRange(
                "range must start at 1 or above".to_string(),
            ));
        }
        if start > end {
            return Err(RankscanError::InvalidRange(format!(
                "start {start} is greater than end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn id_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// The id `offset` places after `start`, if it is still inside the range.
    pub fn nth_id(&self, offset: u64) -> Option<ProfileId> {
        self.start
            .checked_add(offset)
            .filter(|id| *id <= self.end)
            .map(ProfileId)
    }

    /// Contiguous windows of at most `width` ids, in ascending order.
    pub fn windows(&self, width: usize) -> Windows {
        Windows {
            next: self.start,
            end: self.end,
            width: width.max(1) as u64,
            exhausted: false,
        }
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

impl FromStr for IdRange {
    type Err = RankscanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (start, end) = trimmed
            .split_once("..=")
            .or_else(|| trimmed.split_once('-'))
            .ok_or_else(|| RankscanError::InvalidRange(value.to_string()))?;
        let start = start
            .trim()
            .parse::<u64>()
            .map_err(|_| RankscanError::InvalidRange(value.to_string()))?;
        let end = end
            .trim()
            .parse::<u64>()
            .map_err(|_| RankscanError::InvalidRange(value.to_string()))?;
        Self::new(start, end)
    }
}

pub struct Windows {
    next: u64,
    end: u64,
    width: u64,
    exhausted: bool,
}

impl Iterator for Windows {
    type Item = Vec<ProfileId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.width - 1).min(self.end);
        if end == self.end {
            self.exhausted = true;
        } else {
            self.next = end + 1;
        }
        Some((start..=end).map(ProfileId).collect())
    }
}

/// One extracted rank, keyed by the profile it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRecord {
    pub reference: String,
    pub rank: i64,
}

impl RankRecord {
    pub fn new(reference: impl Into<String>, rank: i64) -> Self {
        Self {
            reference: reference.into(),
            rank,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Fixed windows of `concurrency` ids with a barrier between windows.
    #[default]
    Window,
    /// `concurrency` long-lived workers pulling ids from a shared cursor.
    Pool,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Window => write!(f, "window"),
            DispatchMode::Pool => write!(f, "pool"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactMode {
    /// Rewrite the whole artifact, sorted by rank, on every flush.
    #[default]
    Sorted,
    /// Append each record as it arrives; the artifact is never sorted.
    Append,
}

impl fmt::Display for ArtifactMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactMode::Sorted => write!(f, "sorted"),
            ArtifactMode::Append => write!(f, "append"),
        }
    }
}
