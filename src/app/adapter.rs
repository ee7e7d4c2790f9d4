use std::collections::{HashMap, HashSet};

use eframe::egui::{Color32, Pos2, Rect, Vec2};
use party_graph::graph::{GraphNode, RenderedGraph};
use party_graph::layout::{LayoutPositions, node_radius};
use party_graph::lod::VisibilityDecision;

use super::render_utils::{blend_color, circle_visible, edge_visible, rgb_color, world_to_screen};

const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
const HOVERED_COLOR: Color32 = Color32::from_rgb(255, 164, 101);
const RELATED_COLOR: Color32 = Color32::from_rgb(241, 146, 94);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SceneNodeKind {
    Event,
    Cluster,
}

pub(super) struct SceneNode {
    pub(super) index: usize,
    pub(super) kind: SceneNodeKind,
    pub(super) center: Pos2,
    pub(super) radius: f32,
    pub(super) fill: Color32,
    pub(super) outline: Color32,
    pub(super) label: Option<(String, f32)>,
}

pub(super) struct SceneEdge {
    pub(super) start: Pos2,
    pub(super) end: Pos2,
    pub(super) width: f32,
    pub(super) color: Color32,
}

/// Screen-space draw list for one frame.
#[derive(Default)]
pub(super) struct Scene {
    pub(super) clusters: Vec<SceneNode>,
    pub(super) edges: Vec<SceneEdge>,
    pub(super) events: Vec<SceneNode>,
}

pub(super) struct Viewport {
    pub(super) rect: Rect,
    pub(super) pan: Vec2,
    pub(super) zoom: f32,
}

#[derive(Default)]
pub(super) struct Highlight<'a> {
    pub(super) selected: Option<&'a str>,
    pub(super) hovered: Option<&'a str>,
    pub(super) related: HashSet<&'a str>,
}

impl<'a> Highlight<'a> {
    pub(super) fn new(
        graph: &'a RenderedGraph,
        selected: Option<&'a str>,
        hovered: Option<&'a str>,
    ) -> Self {
        let mut related = HashSet::new();
        if let Some(selected) = selected {
            for edge in &graph.edges {
                if edge.source == selected {
                    related.insert(edge.target.as_str());
                } else if edge.target == selected {
                    related.insert(edge.source.as_str());
                }
            }
            if let Some(GraphNode::Cluster(cluster)) = graph.node(selected) {
                related.extend(cluster.cluster.members.iter().map(String::as_str));
            }
        }
        Self {
            selected,
            hovered,
            related,
        }
    }

    fn is_focus(&self, id: &str) -> bool {
        self.selected == Some(id) || self.hovered == Some(id)
    }
}

/// Translates the immutable graph value into draw primitives according to
/// the level-of-detail decision.
pub(super) fn build_scene(
    graph: &RenderedGraph,
    positions: &LayoutPositions,
    decision: &VisibilityDecision,
    viewport: &Viewport,
    highlight: &Highlight<'_>,
) -> Scene {
    let mut scene = Scene::default();
    let event_radius =
        (node_radius(graph.event_count()) * viewport.zoom.powf(0.40)).clamp(2.5, 24.0);
    let draw_events = decision.show_individuals || decision.in_transition;
    let mut drawn_events = HashMap::new();

    for (index, node) in graph.nodes.iter().enumerate() {
        let Some(world) = positions.points().get(index).copied().filter(|p| p.is_finite()) else {
            continue;
        };
        let center = world_to_screen(viewport.rect, viewport.pan, viewport.zoom, world);
        let id = node.id();
        let focused = highlight.is_focus(id);
        let related = highlight.related.contains(id);

        match node {
            GraphNode::Event(event) => {
                if !(draw_events || focused || related) {
                    continue;
                }
                if !circle_visible(viewport.rect, center, event_radius) {
                    continue;
                }

                let opacity = if focused || related {
                    1.0
                } else {
                    decision.node_opacity
                };
                let base = rgb_color(event.color, opacity);
                let fill = if highlight.selected == Some(id) {
                    SELECTED_COLOR
                } else if highlight.hovered == Some(id) {
                    HOVERED_COLOR
                } else if related {
                    blend_color(base, RELATED_COLOR, 0.55)
                } else {
                    base
                };

                let label_opacity = decision.label_opacity_for(focused);
                let label = (label_opacity > 0.01).then(|| (event.label.clone(), label_opacity));

                drawn_events.insert(id, center);
                scene.events.push(SceneNode {
                    index,
                    kind: SceneNodeKind::Event,
                    center,
                    radius: if focused { event_radius * 1.35 } else { event_radius },
                    fill,
                    outline: Color32::from_rgba_unmultiplied(15, 15, 15, (190.0 * opacity) as u8),
                    label,
                });
            }
            GraphNode::Cluster(cluster) => {
                if !(decision.show_clusters || focused) {
                    continue;
                }
                let radius = (cluster.size * 1.6).clamp(14.0, 64.0);
                if !circle_visible(viewport.rect, center, radius) {
                    continue;
                }

                scene.clusters.push(SceneNode {
                    index,
                    kind: SceneNodeKind::Cluster,
                    center,
                    radius,
                    fill: rgb_color(cluster.color, if focused { 0.45 } else { 0.22 }),
                    outline: rgb_color(cluster.color, 0.85),
                    label: Some((
                        format!("{} ({})", cluster.cluster.label, cluster.cluster.size()),
                        decision.label_opacity_for(true),
                    )),
                });
            }
        }
    }

    if decision.show_edges {
        let zoom_sqrt = viewport.zoom.sqrt();
        for edge in &graph.edges {
            let (Some(&start), Some(&end)) = (
                drawn_events.get(edge.source.as_str()),
                drawn_events.get(edge.target.as_str()),
            ) else {
                continue;
            };
            if !edge_visible(viewport.rect, start, end, 2.5) {
                continue;
            }

            let touches_selection = highlight.selected.is_some_and(|selected| {
                edge.source == selected || edge.target == selected
            });
            let (width, color) = if touches_selection {
                ((2.5 * zoom_sqrt).clamp(1.2, 4.4), RELATED_COLOR)
            } else {
                let alpha = 60.0 + edge.similarity.clamp(0.0, 1.0) * 150.0;
                (
                    (1.18 * zoom_sqrt * (0.5 + edge.similarity)).clamp(0.5, 3.4),
                    Color32::from_rgba_unmultiplied(
                        150,
                        160,
                        175,
                        (alpha * decision.node_opacity) as u8,
                    ),
                )
            };
            scene.edges.push(SceneEdge {
                start,
                end,
                width,
                color,
            });
        }
    }

    scene
}

/// Topmost scene node under `pointer`, events before clusters.
pub(super) fn hit_test(scene: &Scene, pointer: Pos2) -> Option<usize> {
    let nearest = |nodes: &[SceneNode]| {
        nodes
            .iter()
            .filter_map(|node| {
                let distance = node.center.distance(pointer);
                (distance <= node.radius.max(6.0)).then_some((node.index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    };
    nearest(&scene.events).or_else(|| nearest(&scene.clusters))
}

#[cfg(test)]
mod tests {
    use eframe::egui::{pos2, vec2};
    use party_graph::graph::build_rendered_graph;
    use party_graph::layout::{LayoutConfig, run_layout};
    use party_graph::lod::level_of_detail;
    use party_graph::{CancelToken, Event, Settings};

    use super::*;

    fn fixture() -> (RenderedGraph, LayoutPositions) {
        let events = vec![
            Event::new("a", "Rooftop Jazz", &["jazz", "outdoor"]),
            Event::new("b", "Jazz Brunch", &["jazz", "outdoor", "food"]),
            Event::new("c", "Cult Film", &["film"]),
        ];
        let token = CancelToken::detached();
        let graph = build_rendered_graph(&events, &Settings::default(), &token).unwrap();
        let layout = run_layout(&graph, &LayoutConfig::default(), &token).unwrap();
        (graph, layout.positions)
    }

    fn viewport(zoom: f32) -> Viewport {
        Viewport {
            rect: Rect::from_min_size(pos2(0.0, 0.0), vec2(1e6, 1e6)),
            pan: Vec2::ZERO,
            zoom,
        }
    }

    #[test]
    fn small_graph_draws_events_edges_and_clusters_far_out() {
        let (graph, positions) = fixture();
        let decision = level_of_detail(0.3, graph.event_count());
        let scene = build_scene(
            &graph,
            &positions,
            &decision,
            &viewport(0.3),
            &Highlight::default(),
        );

        assert_eq!(scene.events.len(), 3);
        assert_eq!(scene.clusters.len(), graph.clusters.len());
        assert_eq!(scene.edges.len(), graph.edges.len());
    }

    #[test]
    fn zoomed_in_hides_clusters() {
        let (graph, positions) = fixture();
        let decision = level_of_detail(1.2, graph.event_count());
        let scene = build_scene(
            &graph,
            &positions,
            &decision,
            &viewport(1.2),
            &Highlight::default(),
        );
        assert!(scene.clusters.is_empty());
        assert!(scene.events.iter().all(|node| node.label.is_some()));
    }

    #[test]
    fn selection_marks_neighbors_as_related() {
        let (graph, _) = fixture();
        let highlight = Highlight::new(&graph, Some("a"), None);
        assert!(highlight.related.contains("b"));
        assert!(!highlight.related.contains("c"));
    }
}
