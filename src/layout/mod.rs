mod collision;
mod forces;
mod point;
mod quadtree;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::build::{BuildError, CancelToken};
use crate::graph::{GraphNode, RenderedGraph};

pub use collision::{
    CollisionReport, center_cleanup, centroid, iterations_per_pass, min_distance, node_radius,
    resolve_collisions,
};
pub use point::{Point, point};

use forces::{SimulationParams, Spring, initial_positions, simulate};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub iterations: usize,
    /// World units per sqrt(node) of the initial ring.
    pub spread: f32,
    pub center_cleanup: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 300,
            spread: 120.0,
            center_cleanup: true,
        }
    }
}

/// Node positions, index-aligned with `RenderedGraph::nodes`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutPositions {
    points: Vec<Point>,
    index_by_id: HashMap<String, usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PositionEntry<'a> {
    pub id: &'a str,
    pub x: f32,
    pub y: f32,
}

impl LayoutPositions {
    pub fn new(graph: &RenderedGraph, points: Vec<Point>) -> Self {
        let index_by_id = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id().to_owned(), index))
            .collect();
        Self {
            points,
            index_by_id,
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn get(&self, id: &str) -> Option<Point> {
        self.index_by_id
            .get(id)
            .and_then(|&index| self.points.get(index))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn entries<'a>(&'a self, graph: &'a RenderedGraph) -> Vec<PositionEntry<'a>> {
        graph
            .nodes
            .iter()
            .zip(&self.points)
            .map(|(node, position)| PositionEntry {
                id: node.id(),
                x: position.x,
                y: position.y,
            })
            .collect()
    }

    /// Positions for the nodes of `subset`, which must be drawn from the
    /// graph these positions were computed for.
    pub fn project(&self, subset: &RenderedGraph) -> Self {
        let points = subset
            .nodes
            .iter()
            .map(|node| self.get(node.id()).unwrap_or(point(f32::NAN, f32::NAN)))
            .collect();
        Self::new(subset, points)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutReport {
    pub simulation_iterations: usize,
    pub collisions: CollisionReport,
    pub center_pushed: usize,
    /// Nodes skipped because their position was not finite.
    pub skipped: usize,
}

pub struct LayoutOutput {
    pub positions: LayoutPositions,
    pub report: LayoutReport,
}

fn finite_event_indices(graph: &RenderedGraph, points: &[Point]) -> (Vec<usize>, usize) {
    let mut skipped = 0;
    let indices = graph
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.is_event())
        .filter_map(|(index, _)| {
            if points[index].is_finite() {
                Some(index)
            } else {
                skipped += 1;
                None
            }
        })
        .collect();
    (indices, skipped)
}

/// Places each cluster node on the centroid of its members' finite positions.
/// Returns how many clusters had no usable member position.
pub fn place_clusters(graph: &RenderedGraph, points: &mut [Point]) -> usize {
    let index_by_id = graph
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.is_event())
        .map(|(index, node)| (node.id(), index))
        .collect::<HashMap<_, _>>();

    let mut unplaced = 0;
    for (index, node) in graph.nodes.iter().enumerate() {
        let GraphNode::Cluster(cluster_node) = node else {
            continue;
        };

        let members = cluster_node
            .cluster
            .members
            .iter()
            .filter_map(|member| index_by_id.get(member.as_str()).copied())
            .filter(|&member| points[member].is_finite())
            .collect::<Vec<_>>();

        match centroid(points, &members) {
            Some(center) => points[index] = center,
            None => {
                points[index] = point(f32::NAN, f32::NAN);
                unplaced += 1;
            }
        }
    }
    unplaced
}

/// Force simulation, anti-overlap passes, center cleanup, then cluster
/// placement. Checks `token` before each phase.
pub fn run_layout(
    graph: &RenderedGraph,
    config: &LayoutConfig,
    token: &CancelToken,
) -> Result<LayoutOutput, BuildError> {
    token.check()?;

    let event_indices = graph
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.is_event())
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    let event_count = event_indices.len();

    let local_by_id = event_indices
        .iter()
        .enumerate()
        .map(|(local, &index)| (graph.nodes[index].id(), local))
        .collect::<HashMap<_, _>>();
    let springs = graph
        .edges
        .iter()
        .filter_map(|edge| {
            Some(Spring {
                from: *local_by_id.get(edge.source.as_str())?,
                to: *local_by_id.get(edge.target.as_str())?,
                weight: edge.similarity,
            })
        })
        .collect::<Vec<_>>();

    let ids = event_indices
        .iter()
        .map(|&index| graph.nodes[index].id())
        .collect::<Vec<_>>();
    let mut local_points = initial_positions(&ids, config.spread);
    let simulation_iterations = simulate(
        &mut local_points,
        &springs,
        &SimulationParams {
            iterations: config.iterations,
            spread: config.spread,
            min_distance: min_distance(event_count),
        },
        token,
    )?;

    let mut points = vec![Point::ZERO; graph.nodes.len()];
    for (local, &index) in event_indices.iter().enumerate() {
        points[index] = local_points[local];
    }

    layout_from_points(graph, points, config, token, simulation_iterations)
}

/// Runs the correction phases over positions produced elsewhere, such as a
/// previous layout the caller has been dragging around.
pub fn relayout(
    graph: &RenderedGraph,
    points: Vec<Point>,
    config: &LayoutConfig,
    token: &CancelToken,
) -> Result<LayoutOutput, BuildError> {
    layout_from_points(graph, points, config, token, 0)
}

fn layout_from_points(
    graph: &RenderedGraph,
    mut points: Vec<Point>,
    config: &LayoutConfig,
    token: &CancelToken,
    simulation_iterations: usize,
) -> Result<LayoutOutput, BuildError> {
    points.resize(graph.nodes.len(), point(f32::NAN, f32::NAN));
    token.check()?;

    let (valid, skipped) = finite_event_indices(graph, &points);
    if skipped > 0 {
        warn!(skipped, "skipping nodes with non-finite positions");
    }

    let collisions = resolve_collisions(&mut points, &valid);
    token.check()?;

    let center_pushed = if config.center_cleanup {
        center_cleanup(&mut points, &valid, collisions.min_distance)
    } else {
        0
    };

    let unplaced = place_clusters(graph, &mut points);
    if unplaced > 0 {
        debug!(unplaced, "clusters without positioned members");
    }

    let report = LayoutReport {
        simulation_iterations,
        collisions,
        center_pushed,
        skipped,
    };
    debug!(
        generation = token.generation(),
        iterations = report.simulation_iterations,
        collision_passes = report.collisions.passes,
        adjustments = report.collisions.adjustments,
        center_pushed,
        "layout finished"
    );

    Ok(LayoutOutput {
        positions: LayoutPositions::new(graph, points),
        report,
    })
}
