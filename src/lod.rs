//! Zoom-driven level-of-detail policy.
//!
//! Below [`CLUSTER_ZOOM`] the graph is summarized by cluster nodes, above
//! [`INDIVIDUAL_ZOOM`] every event is drawn with its label, and in between
//! the two representations are blended. Small graphs always show individual
//! events.

use serde::Serialize;

pub const CLUSTER_ZOOM: f32 = 0.5;
pub const INDIVIDUAL_ZOOM: f32 = 0.8;
pub const SMALL_GRAPH_NODES: usize = 100;
pub const DENSE_GRAPH_NODES: usize = 200;

const FADED_NODE_OPACITY: f32 = 0.3;
const FULL_LABEL_OPACITY: f32 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VisibilityDecision {
    pub show_clusters: bool,
    pub show_individuals: bool,
    pub in_transition: bool,
    pub node_opacity: f32,
    pub label_opacity: f32,
    pub show_edges: bool,
}

impl VisibilityDecision {
    /// Selected or hovered nodes keep full label opacity at any zoom.
    pub fn label_opacity_for(&self, highlighted: bool) -> f32 {
        if highlighted { 1.0 } else { self.label_opacity }
    }
}

pub fn level_of_detail(zoom: f32, event_node_count: usize) -> VisibilityDecision {
    let show_clusters = zoom < CLUSTER_ZOOM;
    let show_individuals = zoom > INDIVIDUAL_ZOOM || event_node_count < SMALL_GRAPH_NODES;
    let in_transition = (CLUSTER_ZOOM..=INDIVIDUAL_ZOOM).contains(&zoom);

    let (node_opacity, label_opacity) = if show_individuals {
        (1.0, FULL_LABEL_OPACITY)
    } else if in_transition {
        let progress = ((zoom - CLUSTER_ZOOM) / (INDIVIDUAL_ZOOM - CLUSTER_ZOOM)).clamp(0.0, 1.0);
        (
            FADED_NODE_OPACITY + (1.0 - FADED_NODE_OPACITY) * progress,
            FULL_LABEL_OPACITY * progress,
        )
    } else {
        (FADED_NODE_OPACITY, 0.0)
    };

    VisibilityDecision {
        show_clusters,
        show_individuals,
        in_transition,
        node_opacity,
        label_opacity,
        show_edges: !(zoom <= CLUSTER_ZOOM && event_node_count >= DENSE_GRAPH_NODES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_graph_shows_clusters_and_individuals_together() {
        let decision = level_of_detail(0.3, 50);
        assert!(decision.show_clusters);
        assert!(decision.show_individuals);
        assert!(!decision.in_transition);
    }

    #[test]
    fn zoomed_in_dense_graph_shows_individuals_only() {
        let decision = level_of_detail(0.9, 500);
        assert!(!decision.show_clusters);
        assert!(decision.show_individuals);
        assert_eq!(decision.node_opacity, 1.0);
        assert!(decision.show_edges);
    }

    #[test]
    fn transition_band_blends_opacity() {
        let decision = level_of_detail(0.6, 300);
        assert!(decision.in_transition);
        assert!(!decision.show_clusters);
        assert!(!decision.show_individuals);

        let progress = (0.6 - 0.5) / 0.3;
        assert!((decision.node_opacity - (0.3 + 0.7 * progress)).abs() < 1e-5);
        assert!((decision.label_opacity - 0.9 * progress).abs() < 1e-5);
    }

    #[test]
    fn transition_endpoints_are_inclusive() {
        assert!(level_of_detail(0.5, 300).in_transition);
        assert!(level_of_detail(0.8, 300).in_transition);
        assert!(!level_of_detail(0.81, 300).in_transition);
        assert!((level_of_detail(0.5, 300).node_opacity - 0.3).abs() < 1e-5);
    }

    #[test]
    fn edges_hidden_only_when_far_out_on_dense_graphs() {
        assert!(!level_of_detail(0.5, 200).show_edges);
        assert!(!level_of_detail(0.2, 1000).show_edges);
        assert!(level_of_detail(0.51, 200).show_edges);
        assert!(level_of_detail(0.2, 199).show_edges);
    }

    #[test]
    fn highlighted_nodes_override_label_opacity() {
        let decision = level_of_detail(0.2, 1000);
        assert_eq!(decision.label_opacity, 0.0);
        assert_eq!(decision.label_opacity_for(true), 1.0);
        assert_eq!(decision.label_opacity_for(false), 0.0);
    }

    #[test]
    fn decision_is_deterministic() {
        assert_eq!(level_of_detail(0.65, 150), level_of_detail(0.65, 150));
    }
}
