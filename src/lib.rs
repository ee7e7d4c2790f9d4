//! Party Graph - event similarity graphs for vibe-based discovery.
//!
//! Events are linked to their nearest neighbors by Jaccard tag overlap,
//! grouped into non-overlapping tag clusters, laid out with a force
//! simulation followed by a bounded anti-overlap pass, and drawn with a
//! zoom-dependent level of detail.

pub mod build;
pub mod config;
pub mod event;
pub mod graph;
pub mod layout;
pub mod lod;
pub mod util;

pub use build::{BuildError, BuildOrchestrator, BuildOutput, BuildPoll, CancelToken, run_build};
pub use config::Settings;
pub use event::{Event, load_events, parse_events};
pub use graph::{RenderedGraph, filter_graph};
pub use lod::{VisibilityDecision, level_of_detail};
