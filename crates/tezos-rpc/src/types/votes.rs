//! Governance types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::heterogeneous::leading_pair;

/// A delegate's vote in the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub pkh: String,
    /// `yay`, `nay` or `pass`.
    pub ballot: String,
}

/// A delegate and its voting weight in rolls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotListing {
    pub pkh: String,
    pub rolls: i64,
}

/// Ballot totals, weighted by rolls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballots {
    pub yay: i64,
    pub nay: i64,
    pub pass: i64,
}

/// A proposal and the number of rolls supporting it, encoded as `[hash, count]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub proposal_hash: String,
    pub supporter_count: i64,
}

impl<'de> Deserialize<'de> for Proposal {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let (proposal_hash, supporter_count) = leading_pair(d)?;
        Ok(Self {
            proposal_hash,
            supporter_count,
        })
    }
}

/// Kind of the current voting period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKind(pub String);

impl PeriodKind {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_proposal(&self) -> bool {
        self.0 == "proposal"
    }

    pub fn is_testing_vote(&self) -> bool {
        self.0 == "testing_vote"
    }

    pub fn is_testing(&self) -> bool {
        self.0 == "testing"
    }

    pub fn is_promotion_vote(&self) -> bool {
        self.0 == "promotion_vote"
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
