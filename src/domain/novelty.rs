use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU64;

use super::{Listing, Match, Watch};

/// Union of keywords across all watches, in first-seen order.
/// Two sets are equal when they hold the same keywords, whatever the order.
#[derive(Clone, Debug, Default)]
pub struct ActiveKeywords {
    ordered: Vec<String>,
}

impl ActiveKeywords {
    pub fn from_watches(watches: &[Watch]) -> Self {
        Self::from_keywords(watches.iter().flat_map(|w| w.keywords.iter().cloned()))
    }

    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for k in keywords {
            let k = k.into();
            if seen.insert(k.clone()) {
                ordered.push(k);
            }
        }
        Self { ordered }
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ordered.clone()
    }
}

impl PartialEq for ActiveKeywords {
    fn eq(&self, other: &Self) -> bool {
        // entries are unique, so equal length + containment is set equality
        self.ordered.len() == other.ordered.len()
            && self.ordered.iter().all(|k| other.ordered.contains(k))
    }
}

impl Eq for ActiveKeywords {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetReason {
    KeywordDrift,
    Periodic,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::KeywordDrift => write!(f, "keyword-drift"),
            ResetReason::Periodic => write!(f, "periodic"),
        }
    }
}

/// Outcome of classifying one keyword's result set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub matches: Vec<Match>,
    /// Every id in the result set; committed to the seen set at the end of the cycle.
    pub observed: Vec<String>,
}

/// Tracks which listing ids are already known in the current epoch.
///
/// The seen set only grows between resets. A reset clears it wholesale and the
/// first cycle afterwards emits nothing, it only repopulates the set.
#[derive(Debug, Default)]
pub struct NoveltyTracker {
    seen: HashSet<String>,
    baseline: ActiveKeywords,
    last_commit: Option<u64>,
}

impl NoveltyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_history(&self) -> bool {
        !self.seen.is_empty()
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn baseline(&self) -> &ActiveKeywords {
        &self.baseline
    }

    /// Runs the reset checks for `cycle` and records `keywords` as the new baseline.
    pub fn begin_cycle(
        &mut self,
        cycle: u64,
        keywords: &ActiveKeywords,
        clear_every: Option<NonZeroU64>,
    ) -> Option<ResetReason> {
        let mut reason = None;

        if self.has_history() && self.baseline != *keywords {
            self.reset();
            reason = Some(ResetReason::KeywordDrift);
        }

        if let Some(n) = clear_every {
            if cycle % n.get() == 0 {
                self.reset();
                reason.get_or_insert(ResetReason::Periodic);
            }
        }

        self.baseline = keywords.clone();
        reason
    }

    /// `listings` must be ordered newest-created first.
    pub fn classify(&self, keyword: &str, listings: &[Listing]) -> Classification {
        if listings.is_empty() {
            return Classification::default();
        }

        // an unseen listing older than the newest known one was relisted, not new
        let floor = listings
            .iter()
            .find(|l| self.seen.contains(&l.id))
            .map(|l| l.created)
            .unwrap_or(0);

        let matches = if self.has_history() {
            listings
                .iter()
                .filter(|l| !self.seen.contains(&l.id) && l.created > floor)
                .map(|l| Match {
                    listing: l.clone(),
                    keyword: keyword.to_string(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Classification {
            matches,
            observed: listings.iter().map(|l| l.id.clone()).collect(),
        }
    }

    /// Adds a cycle's observed ids in one batch. A commit from a cycle older
    /// than the last committed one is rejected and returns false.
    pub fn commit<I>(&mut self, cycle: u64, observed: I) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        if self.last_commit.is_some_and(|last| cycle < last) {
            return false;
        }
        self.seen.extend(observed);
        self.last_commit = Some(cycle);
        true
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}
