mod assemble;
mod cluster;
mod neighbors;
mod similarity;

use serde::Serialize;

use crate::event::Event;
use crate::util::Rgb;

pub use assemble::{assemble, build_rendered_graph, filter_graph};
pub use cluster::{ClusterConfig, extract_clusters};
pub use neighbors::{NeighborConfig, NeighborSelection, select_neighbors};
pub use similarity::{TagSet, jaccard};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimilarityEdge {
    pub source: String,
    pub target: String,
    pub similarity: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub label: String,
    pub members: Vec<String>,
    pub common_tags: Vec<String>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventNode {
    pub event: Event,
    pub category: String,
    pub label: String,
    pub color: Rgb,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterNode {
    pub cluster: Cluster,
    pub size: f32,
    pub color: Rgb,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphNode {
    Event(EventNode),
    Cluster(ClusterNode),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            Self::Event(node) => &node.event.id,
            Self::Cluster(node) => &node.cluster.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Event(node) => &node.label,
            Self::Cluster(node) => &node.cluster.label,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event(_))
    }

    pub fn as_event(&self) -> Option<&EventNode> {
        match self {
            Self::Event(node) => Some(node),
            Self::Cluster(_) => None,
        }
    }
}

/// The unit handed from the core to any renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RenderedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<SimilarityEdge>,
    pub clusters: Vec<Cluster>,
    /// Tagged events left out of similarity search by the size cap.
    pub excluded: Vec<String>,
}

impl RenderedGraph {
    pub fn event_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_event()).count()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub fn events(&self) -> impl Iterator<Item = &EventNode> {
        self.nodes.iter().filter_map(GraphNode::as_event)
    }
}
