//! The transition-relation database.
//!
//! Flattening deposits one `(guard, values)` row per successfully
//! encoded cutpoint edge; exporters read the result back out. The
//! database is a multimap keyed by guard term, plus an append-only list
//! of registered cutpoint locations. It never interprets the terms it
//! holds.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::terms::{TermFactory, TermId};

/// The value bindings of one transition, in emission order.
pub type ValueVector = Vec<TermId>;

#[derive(Debug, Default, Clone)]
pub struct TransRelationDB {
    locations: Vec<TermId>,
    transitions: IndexMap<TermId, Vec<ValueVector>>,
}

impl TransRelationDB {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a cutpoint location. Duplicates are kept; callers that
    /// want a set use [`location_set`](Self::location_set).
    pub fn register_location(&mut self, loc: TermId) {
        self.locations.push(loc);
    }

    /// Records one transition under `guard`. Guards repeat freely; each
    /// call appends another value vector to the guard's row.
    pub fn add_transition(&mut self, guard: TermId, values: ValueVector) {
        self.transitions.entry(guard).or_default().push(values);
    }

    /// Value vectors recorded under `guard`, copied out.
    pub fn transitions(&self, guard: TermId) -> Vec<ValueVector> {
        self.transitions.get(&guard).cloned().unwrap_or_default()
    }

    /// Every registered location in registration order, duplicates
    /// included.
    pub fn locations(&self) -> &[TermId] {
        &self.locations
    }

    /// Registered locations with duplicates collapsed, first-seen order.
    pub fn location_set(&self) -> IndexSet<TermId> {
        self.locations.iter().copied().collect()
    }

    /// Distinct guards recorded so far, insertion order.
    pub fn guards(&self) -> impl Iterator<Item = TermId> + '_ {
        self.transitions.keys().copied()
    }

    pub fn num_guards(&self) -> usize {
        self.transitions.len()
    }

    /// Total number of recorded transitions across all guards.
    pub fn num_transitions(&self) -> usize {
        self.transitions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty() && self.locations.is_empty()
    }

    /// Drops all locations and transitions, keeping the allocation.
    pub fn clear(&mut self) {
        self.locations.clear();
        self.transitions.clear();
    }

    /// Copies the current contents into an exportable snapshot. The
    /// database stays usable; later mutations do not touch the snapshot.
    pub fn snapshot(&self) -> DbSnapshot {
        DbSnapshot {
            locations: self.locations.clone(),
            transitions: self
                .transitions
                .iter()
                .map(|(&g, rows)| (g, rows.clone()))
                .collect(),
        }
    }
}

/// A detached copy of the database, ready for serialization or export.
#[derive(Debug, Clone, Serialize)]
pub struct DbSnapshot {
    pub locations: Vec<TermId>,
    pub transitions: Vec<(TermId, Vec<ValueVector>)>,
}

impl DbSnapshot {
    /// The export contract: one `guard => binding` implication per
    /// recorded value term. A solver-facing exporter asserts each of
    /// these.
    pub fn implications(&self, factory: &mut TermFactory) -> Vec<TermId> {
        let mut out = Vec::new();
        for (guard, rows) in &self.transitions {
            for row in rows {
                for &term in row {
                    out.push(factory.mk_implies(*guard, term));
                }
            }
        }
        out
    }
}
