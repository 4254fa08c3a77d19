//! Overlap detection: which units cover the same land.
//!
//! The scan runs in three phases:
//!
//! 1. Bulk-load an R-tree of unit envelopes. It is read-only afterwards.
//! 2. Rayon workers query the tree with each unit's envelope and confirm
//!    candidates `j > i` with the exact interior-intersection predicate,
//!    producing a list of overlap edges.
//! 3. A single consumer drains the edges into a [`DisjointSet`].
//!
//! Envelope queries make candidate generation roughly `O(n log n)`. When
//! many envelopes overlap each other (dense high-rise footprints, long
//! diagonal parcels) the predicate count degrades toward `O(n²)`; true
//! overlaps are rare and local in real parcel layers, so this is accepted.
//!
//! Nothing here mutates units. The result is a [`Components`] assignment
//! consumed by [`crate::merge::merge_clusters`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

use crate::config::CancelToken;
use crate::error::EngineError;
use crate::geometry;
use crate::unit::ParcelUnit;

/// Union-find over unit indices whose root is always the smallest member.
///
/// Attaching the larger root under the smaller one makes the representative
/// independent of the order edges arrive in.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of `i`, compressing the path behind it.
    pub fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }

        root
    }

    /// Join the sets of `a` and `b`. Returns `false` if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }

        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[hi] = lo;
        true
    }

    /// Freeze into a per-index leader table.
    pub fn into_components(mut self) -> Components {
        let leader_of = (0..self.len()).map(|i| self.find(i)).collect();
        Components { leader_of }
    }
}

/// Settled component assignment. `leader_of[i]` is the smallest index in
/// the component containing unit `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Components {
    leader_of: Vec<usize>,
}

impl Components {
    /// Every unit alone in its own component.
    pub fn singletons(len: usize) -> Self {
        Self {
            leader_of: (0..len).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.leader_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leader_of.is_empty()
    }

    #[inline]
    pub fn leader_of(&self, i: usize) -> usize {
        self.leader_of[i]
    }

    pub fn leaders(&self) -> &[usize] {
        &self.leader_of
    }

    /// Member lists ordered by leader, members ascending.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut slot_of_leader = vec![usize::MAX; self.leader_of.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for (i, &leader) in self.leader_of.iter().enumerate() {
            // Leaders are the minimum of their set, so they are seen first.
            if slot_of_leader[leader] == usize::MAX {
                slot_of_leader[leader] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot_of_leader[leader]].push(i);
        }

        groups
    }

    pub fn component_count(&self) -> usize {
        self.leader_of
            .iter()
            .enumerate()
            .filter(|&(i, &l)| i == l)
            .count()
    }

    /// Components with at least two members.
    pub fn cluster_count(&self) -> usize {
        self.groups().iter().filter(|g| g.len() > 1).count()
    }
}

#[derive(Debug, Clone)]
struct IndexedEnvelope {
    idx: usize,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

/// Read-only bounding-box index over a unit slice.
pub struct SpatialIndex {
    tree: RTree<IndexedEnvelope>,
    envelopes: Vec<Option<AABB<[f64; 2]>>>,
}

impl SpatialIndex {
    pub fn build(units: &[ParcelUnit]) -> Self {
        let envelopes: Vec<Option<AABB<[f64; 2]>>> = units
            .par_iter()
            .map(|unit| geometry::envelope(&unit.geometry))
            .collect();

        let entries: Vec<IndexedEnvelope> = envelopes
            .iter()
            .copied()
            .enumerate()
            .filter_map(|(idx, env)| env.map(|env| IndexedEnvelope { idx, env }))
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
            envelopes,
        }
    }

    /// Indices whose envelope intersects the envelope of unit `i`, `i` excluded.
    pub fn candidates(&self, i: usize) -> Vec<usize> {
        let Some(env) = self.envelopes.get(i).copied().flatten() else {
            return Vec::new();
        };

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&env)
            .map(|e| e.idx)
            .filter(|&j| j != i)
            .collect();
        hits.sort_unstable();
        hits
    }
}

/// Shared progress counter for parallel scans.
struct Progress {
    start: Instant,
    seen: AtomicUsize,
    every: usize,
    total: usize,
}

impl Progress {
    fn new(every: usize, total: usize) -> Self {
        Self {
            start: Instant::now(),
            seen: AtomicUsize::new(0),
            every: every.max(1),
            total,
        }
    }

    #[inline]
    fn bump(&self) {
        let count = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.every == 0 {
            let elapsed = self.start.elapsed().as_secs_f64().max(1e-9);
            info!(
                "overlap scan: {:>9}/{} units, {:8.0} units/s",
                count,
                self.total,
                count as f64 / elapsed
            );
        }
    }
}

/// Confirmed overlap edges `(i, j)` with `i < j`, ordered.
fn overlap_edges(
    units: &[ParcelUnit],
    index: &SpatialIndex,
    cancel: &CancelToken,
    progress_every: usize,
) -> Result<Vec<(usize, usize)>, EngineError> {
    let progress = Progress::new(progress_every, units.len());

    let per_unit: Vec<Vec<(usize, usize)>> = (0..units.len())
        .into_par_iter()
        .map(|i| {
            if cancel.is_cancelled() {
                return Vec::new();
            }
            let edges = index
                .candidates(i)
                .into_iter()
                .filter(|&j| j > i)
                .filter(|&j| geometry::interiors_intersect(&units[i].geometry, &units[j].geometry))
                .map(|j| (i, j))
                .collect();
            progress.bump();
            edges
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled {
            stage: "overlap detection",
        });
    }

    Ok(per_unit.into_iter().flatten().collect())
}

/// Partition `units` into connected components of the overlap relation.
pub fn detect_overlaps(
    units: &[ParcelUnit],
    cancel: &CancelToken,
    progress_every: usize,
) -> Result<Components, EngineError> {
    let index = SpatialIndex::build(units);
    let edges = overlap_edges(units, &index, cancel, progress_every)?;

    let mut sets = DisjointSet::new(units.len());
    let mut joins = 0usize;
    for (i, j) in &edges {
        if sets.union(*i, *j) {
            joins += 1;
        }
    }

    let components = sets.into_components();
    debug!(
        "overlap detection: {} units, {} overlap edges, {} joins, {} clusters",
        units.len(),
        edges.len(),
        joins,
        components.cluster_count()
    );
    Ok(components)
}

/// Run detection twice and insist on identical leaders.
///
/// A diagnostic for test runs; production code calls [`detect_overlaps`].
pub fn detect_overlaps_checked(
    units: &[ParcelUnit],
    cancel: &CancelToken,
) -> Result<Components, EngineError> {
    let first = detect_overlaps(units, cancel, usize::MAX)?;
    let second = detect_overlaps(units, cancel, usize::MAX)?;
    ensure_same_leaders(&first, &second)?;
    Ok(first)
}

pub fn ensure_same_leaders(first: &Components, second: &Components) -> Result<(), EngineError> {
    let diverged = first
        .leaders()
        .iter()
        .zip(second.leaders())
        .position(|(a, b)| a != b);

    match diverged {
        Some(index) => Err(EngineError::NonDeterministicOrderingDetected {
            index,
            first: first.leader_of(index),
            second: second.leader_of(index),
        }),
        None if first.len() != second.len() => Err(EngineError::NonDeterministicOrderingDetected {
            index: first.len().min(second.len()),
            first: first.len(),
            second: second.len(),
        }),
        None => Ok(()),
    }
}
