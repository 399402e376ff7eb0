//! Expansion of a recurring seed into dated occurrences.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tally_domain::{Entry, SeriesIdentity, SeriesKey};
use uuid::Uuid;

/// Upper bound on occurrences produced by a single generation run.
pub const MAX_OCCURRENCES_PER_RUN: usize = 1024;

/// Occurrences produced by one generation run, already routed by due date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generated {
    pub committed: Vec<Entry>,
    pub pending: Vec<Entry>,
    /// How many of the emitted entries took over the id of a discarded tail entry.
    pub reused: usize,
}

impl Generated {
    pub fn len(&self) -> usize {
        self.committed.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.pending.is_empty()
    }

    /// Entries that did not exist in any form before the run.
    pub fn inserted(&self) -> usize {
        self.len() - self.reused
    }

    fn route(&mut self, entry: Entry, now: DateTime<Utc>) {
        if entry.is_due(now) {
            self.committed.push(entry);
        } else {
            self.pending.push(entry);
        }
    }
}

/// Produces the occurrences of a series up to its visibility horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccurrenceGenerator {
    identity: SeriesIdentity,
}

impl OccurrenceGenerator {
    pub fn new(identity: SeriesIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> SeriesIdentity {
        self.identity
    }

    /// Generates the forward tail of `seed`'s series.
    ///
    /// Pending members of the series dated after `now` are removed from `pending`
    /// first; their identifiers are handed back to regenerated occurrences that land
    /// on the same date. Committed entries are only read.
    ///
    /// When members of the series remain after that, stepping resumes after the
    /// latest of them and the seed only serves as a template. Otherwise the seed
    /// itself is emitted, even beyond the horizon, and stepping starts from it.
    /// The seed's cancellation cut-off and skipped dates are honoured.
    pub fn generate(
        &self,
        seed: &Entry,
        now: DateTime<Utc>,
        committed: &[Entry],
        pending: &mut Vec<Entry>,
    ) -> Generated {
        let mut generated = Generated::default();
        let Some(key) = SeriesKey::of(seed, self.identity) else {
            return generated;
        };
        let horizon = seed.recurrence.policy().horizon(now);

        let mut reusable: HashMap<DateTime<Utc>, Uuid> = HashMap::new();
        pending.retain(|entry| {
            if entry.date > now && key.matches(entry, self.identity) {
                reusable.entry(entry.date).or_insert(entry.id);
                false
            } else {
                true
            }
        });

        let latest = committed
            .iter()
            .chain(pending.iter())
            .filter(|entry| key.matches(entry, self.identity))
            .map(|entry| entry.date)
            .max();

        if latest.is_none() {
            generated.route(seed.clone(), now);
        }

        let mut cursor = seed.recurrence.next_date(latest.unwrap_or(seed.date));
        while let Some(date) = cursor {
            if date > horizon || seed.ends_before.is_some_and(|end| date >= end) {
                break;
            }
            cursor = seed.recurrence.next_date(date);
            if !seed.allows_occurrence_on(date) {
                continue;
            }
            if generated.len() >= MAX_OCCURRENCES_PER_RUN {
                tracing::warn!(
                    seed = %seed.id,
                    limit = MAX_OCCURRENCES_PER_RUN,
                    "occurrence limit reached; series truncated"
                );
                break;
            }
            let id = match reusable.remove(&date) {
                Some(id) => {
                    generated.reused += 1;
                    id
                }
                None => Uuid::new_v4(),
            };
            generated.route(seed.occurrence(id, date), now);
        }

        tracing::debug!(
            seed = %seed.id,
            recurrence = %seed.recurrence,
            committed = generated.committed.len(),
            pending = generated.pending.len(),
            reused = generated.reused,
            "generated occurrences"
        );
        generated
    }
}
