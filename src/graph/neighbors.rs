use serde::Deserialize;
use tracing::{debug, warn};

use crate::build::{BuildError, CancelToken};
use crate::event::Event;

use super::SimilarityEdge;
use super::similarity::TagSet;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct NeighborConfig {
    pub k: usize,
    pub threshold: f32,
    /// Hard cap on tagged events compared pairwise.
    pub max_events: usize,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            k: 4,
            threshold: 0.15,
            max_events: 2000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborSelection {
    pub edges: Vec<SimilarityEdge>,
    /// Tagged events beyond `max_events`, in input order.
    pub excluded: Vec<String>,
    pub comparisons: usize,
}

struct Candidate {
    index: usize,
    similarity: f32,
}

pub fn select_neighbors(
    events: &[Event],
    config: &NeighborConfig,
    token: &CancelToken,
) -> Result<NeighborSelection, BuildError> {
    let k = config.k.max(1);
    let mut selection = NeighborSelection::default();

    let mut tagged = Vec::with_capacity(events.len().min(config.max_events));
    for event in events {
        let tags = TagSet::new(&event.tags);
        if tags.is_empty() {
            continue;
        }
        if tagged.len() >= config.max_events {
            selection.excluded.push(event.id.clone());
        } else {
            tagged.push((event.id.as_str(), tags));
        }
    }

    if !selection.excluded.is_empty() {
        warn!(
            cap = config.max_events,
            excluded = selection.excluded.len(),
            "event count exceeds similarity cap; excess events stay unconnected"
        );
    }

    let mut candidates = Vec::new();
    for (source_index, (source_id, source_tags)) in tagged.iter().enumerate() {
        token.check()?;

        candidates.clear();
        for (target_index, (_, target_tags)) in tagged.iter().enumerate() {
            if target_index == source_index || !source_tags.shares_any(target_tags) {
                continue;
            }

            selection.comparisons += 1;
            let similarity = source_tags.jaccard(target_tags);
            if similarity > config.threshold {
                candidates.push(Candidate {
                    index: target_index,
                    similarity,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.index.cmp(&b.index))
        });

        for candidate in candidates.iter().take(k) {
            selection.edges.push(SimilarityEdge {
                source: (*source_id).to_owned(),
                target: tagged[candidate.index].0.to_owned(),
                similarity: candidate.similarity,
            });
        }
    }

    debug!(
        tagged = tagged.len(),
        comparisons = selection.comparisons,
        edges = selection.edges.len(),
        "selected nearest neighbors"
    );

    Ok(selection)
}
