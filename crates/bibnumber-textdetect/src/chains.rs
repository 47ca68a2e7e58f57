//! Grouping filtered components into line-like chains.
//!
//! Chains start as pairs of similar, nearby components and grow by absorbing
//! other chains that share an endpoint and point the same way. Merging runs in
//! passes; inside a pass every comparison reads the chains as mutated by the
//! merges performed before it, so a chain can absorb several others in one pass.

use std::f32::consts::PI;

use bibnumber_core::{ratio_within, BoundingBox};
use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::filter::FilteredComponent;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Paired components differ in median stroke width by at most this factor.
pub const MAX_MEDIAN_RATIO: f32 = 3.0;
/// Paired components differ in each bounding box extent by at most this factor.
pub const MAX_DIM_RATIO: f32 = 2.0;
/// Squared center distance over squared smaller height must stay below this.
pub const MAX_DIST_RATIO: f32 = 0.8;
/// Largest angle between merged chain directions.
pub const MAX_MERGE_ANGLE: f32 = PI / 10.0;

/// A chain under construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Chain {
    /// Endpoint component indices.
    pub p: usize,
    pub q: usize,
    /// Member components; may hold duplicates until finalization.
    pub components: Vec<usize>,
    /// Unit vector from `q`'s center towards `p`'s center.
    pub direction: Vector2<f32>,
    /// Squared distance between the endpoint centers.
    pub dist: f32,
}

impl Chain {
    fn shared_endpoints(&self, other: &Chain) -> usize {
        [
            self.p == other.p,
            self.p == other.q,
            self.q == other.p,
            self.q == other.q,
        ]
        .iter()
        .filter(|&&shared| shared)
        .count()
    }

    /// Recompute `dist` and `direction` from the current endpoints. A zero
    /// vector leaves the previous direction in place.
    fn refresh_geometry(&mut self, components: &[FilteredComponent]) {
        let d = components[self.p].center - components[self.q].center;
        self.dist = d.norm_squared();
        let norm = d.norm();
        if norm > 0.0 {
            self.direction = d / norm;
        }
    }
}

/// A finalized chain as handed to the OCR stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextChain {
    /// Sorted, de-duplicated component indices.
    pub components: Vec<usize>,
    pub p: usize,
    pub q: usize,
    pub direction: Vector2<f32>,
    /// Union of the member component boxes.
    pub bbox: BoundingBox,
}

#[inline]
fn safe_acos(cos: f32) -> f32 {
    cos.clamp(-1.0, 1.0).acos()
}

/// Seed a chain for every compatible pair `(i, j)`, `i < j`.
pub fn pair_chains(components: &[FilteredComponent]) -> Vec<Chain> {
    let mut chains = Vec::new();
    for (i, a) in components.iter().enumerate() {
        for (j, b) in components.iter().enumerate().skip(i + 1) {
            if !ratio_within(a.median_stroke, b.median_stroke, MAX_MEDIAN_RATIO) {
                continue;
            }
            if !ratio_within(a.dimensions.x, b.dimensions.x, MAX_DIM_RATIO)
                || !ratio_within(a.dimensions.y, b.dimensions.y, MAX_DIM_RATIO)
            {
                continue;
            }
            let d = a.center - b.center;
            let dist = d.norm_squared();
            let min_height = a.dimensions.y.min(b.dimensions.y);
            if dist / (min_height * min_height) >= MAX_DIST_RATIO {
                continue;
            }
            let norm = d.norm();
            if norm <= 0.0 {
                continue;
            }
            chains.push(Chain {
                p: i,
                q: j,
                components: vec![i, j],
                direction: d / norm,
                dist,
            });
        }
    }
    chains
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EndpointUpdate {
    P(usize),
    Q(usize),
}

/// Decide whether `a` absorbs `b`, and which endpoint of `a` moves.
fn merge_rule(a: &Chain, b: &Chain) -> Option<EndpointUpdate> {
    if a.shared_endpoints(b) != 1 {
        return None;
    }
    let aligned = safe_acos(a.direction.dot(&b.direction)) < MAX_MERGE_ANGLE;
    let opposed = safe_acos(a.direction.dot(&-b.direction)) < MAX_MERGE_ANGLE;

    if a.p == b.p {
        opposed.then_some(EndpointUpdate::P(b.q))
    } else if a.p == b.q {
        aligned.then_some(EndpointUpdate::P(b.p))
    } else if a.q == b.p {
        aligned.then_some(EndpointUpdate::Q(b.q))
    } else {
        opposed.then_some(EndpointUpdate::Q(b.p))
    }
}

/// One merge pass. Returns the number of merges; absorbed chains are removed
/// and the rest stable-sorted by component count, longest first.
fn merge_pass(chains: &mut Vec<Chain>, components: &[FilteredComponent]) -> usize {
    let n = chains.len();
    let mut absorbed = vec![false; n];
    let mut merges = 0;

    for i in 0..n {
        for j in 0..n {
            if i == j || absorbed[i] || absorbed[j] {
                continue;
            }
            let Some(update) = merge_rule(&chains[i], &chains[j]) else {
                continue;
            };
            let taken = std::mem::take(&mut chains[j].components);
            let chain = &mut chains[i];
            match update {
                EndpointUpdate::P(p) => chain.p = p,
                EndpointUpdate::Q(q) => chain.q = q,
            }
            chain.components.extend(taken);
            chain.refresh_geometry(components);
            absorbed[j] = true;
            merges += 1;
        }
    }

    let mut flags = absorbed.into_iter();
    chains.retain(|_| !flags.next().unwrap_or(false));
    chains.sort_by(|a, b| b.components.len().cmp(&a.components.len()));
    merges
}

/// Merge until a pass changes nothing. Returns the chains and the number of
/// passes that merged something.
pub fn merge_chains(
    mut chains: Vec<Chain>,
    components: &[FilteredComponent],
) -> (Vec<Chain>, usize) {
    chains.sort_by(|a, b| a.dist.total_cmp(&b.dist));
    let mut passes = 0;
    while merge_pass(&mut chains, components) > 0 {
        passes += 1;
    }
    (chains, passes)
}

/// `a ⊆ b` for sorted, de-duplicated slices.
fn is_subset(a: &[usize], b: &[usize]) -> bool {
    let mut it = b.iter();
    a.iter().all(|x| it.any(|y| y == x))
}

/// De-duplicate members, drop short chains and chains covered by another.
///
/// Of two chains with equal member sets the earlier one survives.
pub fn finalize_chains(mut chains: Vec<Chain>, min_chain_len: usize) -> Vec<Chain> {
    for chain in chains.iter_mut() {
        chain.components.sort_unstable();
        chain.components.dedup();
    }
    chains.retain(|c| c.components.len() >= min_chain_len);

    let covered: Vec<bool> = chains
        .iter()
        .enumerate()
        .map(|(i, a)| {
            chains.iter().enumerate().any(|(j, b)| {
                j != i
                    && is_subset(&a.components, &b.components)
                    && (a.components.len() < b.components.len() || j < i)
            })
        })
        .collect();
    chains
        .into_iter()
        .zip(covered)
        .filter_map(|(c, is_covered)| (!is_covered).then_some(c))
        .collect()
}

/// Union of the boxes of `members`.
pub fn chain_bbox(members: &[usize], components: &[FilteredComponent]) -> Option<BoundingBox> {
    members
        .iter()
        .map(|&k| components[k].bbox)
        .reduce(|acc, b| acc.union(&b))
}

/// Counts reported alongside the chains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    pub seeds: usize,
    pub merge_passes: usize,
    pub merged: usize,
}

/// Seed, merge and finalize chains over the filtered components.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(components = components.len()))
)]
pub fn build_chains(
    components: &[FilteredComponent],
    min_chain_len: usize,
) -> (Vec<TextChain>, ChainStats) {
    let seeds = pair_chains(components);
    let seed_count = seeds.len();
    let (merged, merge_passes) = merge_chains(seeds, components);
    let merged_count = merged.len();
    let finals = finalize_chains(merged, min_chain_len);

    let chains: Vec<TextChain> = finals
        .into_iter()
        .filter_map(|c| {
            let bbox = chain_bbox(&c.components, components)?;
            Some(TextChain {
                components: c.components,
                p: c.p,
                q: c.q,
                direction: c.direction,
                bbox,
            })
        })
        .collect();

    debug!(
        "chains: seeds={} passes={} merged={} final={}",
        seed_count,
        merge_passes,
        merged_count,
        chains.len()
    );
    (
        chains,
        ChainStats {
            seeds: seed_count,
            merge_passes,
            merged: merged_count,
        },
    )
}
