use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::build::{BuildError, CancelToken};
use crate::event::Event;
use crate::util::title_case;

use super::Cluster;
use super::similarity::TagSet;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Groups smaller than this are not emitted.
    pub min_cluster_size: usize,
    pub max_clusters: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 2,
            max_clusters: 24,
        }
    }
}

/// Greedy tag-bucket grouping: the most frequent tag claims every event
/// carrying it that no earlier tag has claimed.
pub fn extract_clusters(
    events: &[Event],
    config: &ClusterConfig,
    token: &CancelToken,
) -> Result<Vec<Cluster>, BuildError> {
    token.check()?;

    let tag_sets = events
        .iter()
        .map(|event| TagSet::new(&event.tags))
        .collect::<Vec<_>>();

    let mut members_by_tag: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, tags) in tag_sets.iter().enumerate() {
        for tag in tags.iter() {
            members_by_tag.entry(tag).or_default().push(index);
        }
    }

    let mut ranked_tags = members_by_tag.iter().collect::<Vec<_>>();
    ranked_tags.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    let min_size = config.min_cluster_size.max(2);
    let mut assigned = vec![false; events.len()];
    let mut clusters = Vec::new();

    for (seed_tag, candidates) in ranked_tags {
        if clusters.len() >= config.max_clusters {
            break;
        }
        if candidates.len() < min_size {
            // Sorted by frequency, so no later tag can reach the minimum.
            break;
        }

        let members = candidates
            .iter()
            .copied()
            .filter(|&index| !assigned[index])
            .collect::<Vec<_>>();
        if members.len() < min_size {
            continue;
        }

        for &index in &members {
            assigned[index] = true;
        }

        clusters.push(Cluster {
            id: format!("cluster:{seed_tag}"),
            label: title_case(seed_tag),
            common_tags: common_tags(seed_tag, &members, &tag_sets),
            members: members
                .iter()
                .map(|&index| events[index].id.clone())
                .collect(),
        });
    }

    clusters.sort_by(|a, b| b.size().cmp(&a.size()).then_with(|| a.id.cmp(&b.id)));

    debug!(
        clusters = clusters.len(),
        clustered = assigned.iter().filter(|flag| **flag).count(),
        "extracted clusters"
    );

    Ok(clusters)
}

fn common_tags(seed_tag: &str, members: &[usize], tag_sets: &[TagSet]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &index in members {
        for tag in tag_sets[index].iter() {
            *counts.entry(tag).or_default() += 1;
        }
    }

    let mut majority = counts
        .into_iter()
        .filter(|&(tag, count)| tag != seed_tag && count * 2 > members.len())
        .collect::<Vec<_>>();
    majority.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    std::iter::once(seed_tag.to_owned())
        .chain(majority.into_iter().map(|(tag, _)| tag.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn extract(events: &[Event]) -> Vec<Cluster> {
        extract_clusters(events, &ClusterConfig::default(), &CancelToken::detached()).unwrap()
    }

    #[test]
    fn groups_events_sharing_the_most_common_tag() {
        let events = vec![
            Event::new("e1", "E1", &["a", "b"]),
            Event::new("e2", "E2", &["a", "b", "c"]),
            Event::new("e3", "E3", &["x", "y"]),
            Event::new("e4", "E4", &[]),
        ];

        let clusters = extract(&events);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id, "cluster:a");
        assert_eq!(clusters[0].label, "A");
        assert_eq!(clusters[0].members, vec!["e1", "e2"]);
        assert_eq!(clusters[0].common_tags, vec!["a", "b"]);
    }

    #[test]
    fn clusters_never_overlap() {
        let events = vec![
            Event::new("1", "1", &["music", "outdoor"]),
            Event::new("2", "2", &["music"]),
            Event::new("3", "3", &["music", "food"]),
            Event::new("4", "4", &["food", "outdoor"]),
            Event::new("5", "5", &["food"]),
            Event::new("6", "6", &["outdoor"]),
        ];

        let clusters = extract(&events);
        let mut seen = HashSet::new();
        for cluster in &clusters {
            assert!(cluster.size() >= 2);
            for member in &cluster.members {
                assert!(seen.insert(member.clone()), "{member} appears twice");
            }
        }
        assert_eq!(clusters[0].id, "cluster:food");
        assert_eq!(clusters[0].members, vec!["3", "4", "5"]);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let events = (0..40)
            .map(|index| {
                let tags = [["jazz", "rock", "techno"][index % 3], ["free", "paid"][index % 2]];
                Event::new(format!("e{index}"), "Event", &tags)
            })
            .collect::<Vec<_>>();

        assert_eq!(extract(&events), extract(&events));
    }

    #[test]
    fn respects_cluster_limit() {
        let events = (0..10)
            .map(|index| {
                let tag = format!("t{}", index / 2);
                Event::new(format!("e{index}"), "Event", &[tag.as_str()])
            })
            .collect::<Vec<_>>();
        let config = ClusterConfig {
            max_clusters: 3,
            ..ClusterConfig::default()
        };
        let clusters = extract_clusters(&events, &config, &CancelToken::detached()).unwrap();
        assert_eq!(clusters.len(), 3);
    }
}
