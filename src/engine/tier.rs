//! Tier keys and per-tier value triples.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three sizing presets, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKey {
    Starter,
    PerfectFit,
    BeastMode,
}

impl TierKey {
    /// All tiers in ascending order.
    pub const ALL: [TierKey; 3] = [Self::Starter, Self::PerfectFit, Self::BeastMode];

    /// Wire name (`"perfect_fit"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::PerfectFit => "perfect_fit",
            Self::BeastMode => "beast_mode",
        }
    }
}

impl fmt::Display for TierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Starter => "Starter",
            Self::PerfectFit => "Perfect Fit",
            Self::BeastMode => "Beast Mode",
        };
        f.write_str(label)
    }
}

impl FromStr for TierKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(Self::Starter),
            "perfect_fit" | "perfectFit" => Ok(Self::PerfectFit),
            "beast_mode" | "beastMode" => Ok(Self::BeastMode),
            other => Err(format!(
                "unknown tier \"{other}\", expected starter, perfect_fit or beast_mode"
            )),
        }
    }
}

/// A value per tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierValues<T> {
    pub starter: T,
    pub perfect_fit: T,
    pub beast_mode: T,
}

impl<T> TierValues<T> {
    pub fn get(&self, key: TierKey) -> &T {
        match key {
            TierKey::Starter => &self.starter,
            TierKey::PerfectFit => &self.perfect_fit,
            TierKey::BeastMode => &self.beast_mode,
        }
    }

    pub fn from_fn(mut f: impl FnMut(TierKey) -> T) -> Self {
        Self {
            starter: f(TierKey::Starter),
            perfect_fit: f(TierKey::PerfectFit),
            beast_mode: f(TierKey::BeastMode),
        }
    }

    /// Builds all three values with a fallible function, lowest tier first.
    pub fn try_from_fn<E>(mut f: impl FnMut(TierKey) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            starter: f(TierKey::Starter)?,
            perfect_fit: f(TierKey::PerfectFit)?,
            beast_mode: f(TierKey::BeastMode)?,
        })
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> TierValues<U> {
        TierValues {
            starter: f(&self.starter),
            perfect_fit: f(&self.perfect_fit),
            beast_mode: f(&self.beast_mode),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TierKey, &T)> {
        TierKey::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}

impl TierValues<f64> {
    pub fn as_array(&self) -> [f64; 3] {
        [self.starter, self.perfect_fit, self.beast_mode]
    }
}
