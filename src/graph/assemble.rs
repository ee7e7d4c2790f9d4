use std::collections::HashSet;

use tracing::debug;

use crate::build::{BuildError, CancelToken};
use crate::config::Settings;
use crate::event::Event;
use crate::util::{UNCATEGORIZED, category_color, cluster_color, truncate_label};

use super::cluster::extract_clusters;
use super::neighbors::{NeighborSelection, select_neighbors};
use super::{Cluster, ClusterNode, EventNode, GraphNode, RenderedGraph};

const LABEL_MAX_CHARS: usize = 32;

fn event_node(event: &Event) -> EventNode {
    let category = event
        .category
        .as_deref()
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .unwrap_or(UNCATEGORIZED)
        .to_owned();

    EventNode {
        color: category_color(&category),
        label: truncate_label(event.title.trim(), LABEL_MAX_CHARS),
        category,
        event: event.clone(),
    }
}

fn cluster_node(cluster: &Cluster, order: usize) -> ClusterNode {
    ClusterNode {
        size: 12.0 + (cluster.size() as f32).sqrt() * 6.0,
        color: cluster_color(order),
        cluster: cluster.clone(),
    }
}

pub fn assemble(
    events: &[Event],
    selection: NeighborSelection,
    clusters: Vec<Cluster>,
) -> RenderedGraph {
    let mut nodes = Vec::with_capacity(events.len() + clusters.len());
    nodes.extend(events.iter().map(|event| GraphNode::Event(event_node(event))));
    nodes.extend(
        clusters
            .iter()
            .enumerate()
            .map(|(order, cluster)| GraphNode::Cluster(cluster_node(cluster, order))),
    );

    RenderedGraph {
        nodes,
        edges: selection.edges,
        clusters,
        excluded: selection.excluded,
    }
}

/// Runs neighbor selection, clustering and assembly for one generation.
pub fn build_rendered_graph(
    events: &[Event],
    settings: &Settings,
    token: &CancelToken,
) -> Result<RenderedGraph, BuildError> {
    let selection = select_neighbors(events, &settings.neighbors, token)?;
    let clusters = extract_clusters(events, &settings.clusters, token)?;
    token.check()?;

    let graph = assemble(events, selection, clusters);
    debug!(
        generation = token.generation(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        clusters = graph.clusters.len(),
        "assembled graph"
    );
    Ok(graph)
}

/// Keeps event nodes whose fields contain `query` as a case-insensitive
/// substring, plus every cluster. The query is matched as given; a blank
/// query keeps everything. The cluster list is global structure and
/// survives any query unchanged.
pub fn filter_graph(graph: &RenderedGraph, query: &str) -> RenderedGraph {
    if query.trim().is_empty() {
        return graph.clone();
    }
    let needle = query.to_lowercase();

    let nodes = graph
        .nodes
        .iter()
        .filter(|node| match node {
            GraphNode::Event(node) => node.event.matches_query(&needle),
            GraphNode::Cluster(_) => true,
        })
        .cloned()
        .collect::<Vec<_>>();

    let present = nodes
        .iter()
        .filter(|node| node.is_event())
        .map(GraphNode::id)
        .collect::<HashSet<_>>();

    let edges = graph
        .edges
        .iter()
        .filter(|edge| {
            present.contains(edge.source.as_str()) && present.contains(edge.target.as_str())
        })
        .cloned()
        .collect();

    RenderedGraph {
        edges,
        clusters: graph.clusters.clone(),
        excluded: graph.excluded.clone(),
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Vec<Event> {
        vec![
            Event::new("jazz-1", "Rooftop Jazz", &["jazz", "outdoor"]).with_category("Music"),
            Event::new("jazz-2", "Jazz Brunch", &["jazz", "food"]).with_category("Music"),
            Event::new("food-1", "Street Food Market", &["food", "outdoor"])
                .with_description("Dumplings and tacos"),
            Event::new("film-1", "Cult Film Night", &["film"]),
        ]
    }

    fn build(events: &[Event]) -> RenderedGraph {
        build_rendered_graph(events, &Settings::default(), &CancelToken::detached()).unwrap()
    }

    #[test]
    fn event_nodes_precede_cluster_nodes() {
        let graph = build(&events());
        assert_eq!(graph.event_count(), 4);
        let first_cluster = graph.nodes.iter().position(|node| !node.is_event());
        assert_eq!(first_cluster, Some(4));
        assert_eq!(graph.nodes.len(), 4 + graph.clusters.len());
    }

    #[test]
    fn uncategorized_events_get_fallback_category() {
        let graph = build(&events());
        let film = graph.node("film-1").and_then(GraphNode::as_event).unwrap();
        assert_eq!(film.category, UNCATEGORIZED);
        assert_eq!(film.label, "Cult Film Night");
    }

    #[test]
    fn rebuild_is_idempotent() {
        let events = events();
        assert_eq!(build(&events), build(&events));
    }

    #[test]
    fn filter_drops_dangling_edges_and_keeps_clusters() {
        let graph = build(&events());
        assert!(!graph.clusters.is_empty());

        for query in ["jazz", "FOOD", "dumplings", "music", "nothing-matches", ""] {
            let filtered = filter_graph(&graph, query);
            assert_eq!(filtered.clusters, graph.clusters);
            assert_eq!(
                filtered.nodes.iter().filter(|node| !node.is_event()).count(),
                graph.clusters.len()
            );

            let present = filtered
                .events()
                .map(|node| node.event.id.as_str())
                .collect::<HashSet<_>>();
            for edge in &filtered.edges {
                assert!(present.contains(edge.source.as_str()));
                assert!(present.contains(edge.target.as_str()));
            }
        }
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let graph = build(&events());
        let filtered = filter_graph(&graph, "JAZZ");
        let ids = filtered
            .events()
            .map(|node| node.event.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["jazz-1", "jazz-2"]);
        assert!(filter_graph(&graph, "   ") == graph);
    }

    #[test]
    fn filter_matches_query_as_given() {
        let graph = build(&events());
        let ids = |query: &str| {
            filter_graph(&graph, query)
                .events()
                .map(|node| node.event.id.clone())
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(" jazz"), vec!["jazz-1"]);
        assert_eq!(ids("jazz "), vec!["jazz-2"]);
        assert_eq!(ids("food "), vec!["food-1"]);
    }
}
