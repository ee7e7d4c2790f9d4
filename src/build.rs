//! Build orchestration: generation ids, cooperative cancellation and the
//! background worker that turns an event list into a laid-out graph.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::event::Event;
use crate::graph::{RenderedGraph, build_rendered_graph};
use crate::layout::{LayoutPositions, LayoutReport, run_layout};

#[derive(Clone, Debug, PartialEq)]
pub enum BuildError {
    /// A single event was unusable; it is skipped, the build continues.
    InvalidInput { id: Option<String>, reason: String },
    /// A newer build started; results are discarded silently.
    Superseded { generation: u64 },
    /// The consumer of the build went away before the result was delivered.
    LayoutUnavailable,
    /// Terminal failure for one generation.
    Failed(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { id: Some(id), reason } => {
                write!(f, "invalid event {id}: {reason}")
            }
            Self::InvalidInput { id: None, reason } => write!(f, "invalid event: {reason}"),
            Self::Superseded { generation } => {
                write!(f, "build generation {generation} was superseded")
            }
            Self::LayoutUnavailable => write!(f, "graph consumer is no longer available"),
            Self::Failed(message) => write!(f, "graph build failed: {message}"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Ties a build to its generation. Stale once a newer generation starts.
#[derive(Clone, Debug)]
pub struct CancelToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl CancelToken {
    /// Token that stays current until [`CancelToken::supersede`] is called.
    pub fn detached() -> Self {
        Self {
            generation: 0,
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }

    pub fn check(&self) -> Result<(), BuildError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(BuildError::Superseded {
                generation: self.generation,
            })
        }
    }

    pub fn supersede(&self) {
        self.current.fetch_max(self.generation + 1, Ordering::AcqRel);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BuildStats {
    pub generation: u64,
    pub events: usize,
    pub edges: usize,
    pub clusters: usize,
    pub excluded: usize,
    pub graph_ms: u64,
    pub layout_ms: u64,
    pub skipped_positions: usize,
    pub over_budget: bool,
}

pub struct BuildOutput {
    pub graph: RenderedGraph,
    pub positions: LayoutPositions,
    pub layout: LayoutReport,
    pub stats: BuildStats,
}

/// Synchronous build of one generation: graph assembly then layout.
pub fn run_build(
    events: &[Event],
    k: usize,
    settings: &Settings,
    token: &CancelToken,
) -> Result<BuildOutput, BuildError> {
    let mut settings = settings.clone();
    settings.neighbors.k = k.max(1);

    let started = Instant::now();
    let graph = build_rendered_graph(events, &settings, token)?;
    let graph_elapsed = started.elapsed();

    let layout_started = Instant::now();
    let layout = run_layout(&graph, &settings.layout, token)?;
    let layout_elapsed = layout_started.elapsed();

    let total = graph_elapsed + layout_elapsed;
    let budget = Duration::from_millis(settings.budget.warn_build_ms);
    let mut over_budget = false;
    if total > budget {
        warn!(
            generation = token.generation(),
            elapsed_ms = total.as_millis() as u64,
            budget_ms = settings.budget.warn_build_ms,
            "graph build exceeded time budget"
        );
        over_budget = true;
    }
    if graph.edges.len() > settings.budget.warn_edge_count {
        warn!(
            generation = token.generation(),
            edges = graph.edges.len(),
            budget = settings.budget.warn_edge_count,
            "graph build exceeded edge budget"
        );
        over_budget = true;
    }

    let stats = BuildStats {
        generation: token.generation(),
        events: graph.event_count(),
        edges: graph.edges.len(),
        clusters: graph.clusters.len(),
        excluded: graph.excluded.len(),
        graph_ms: graph_elapsed.as_millis() as u64,
        layout_ms: layout_elapsed.as_millis() as u64,
        skipped_positions: layout.report.skipped,
        over_budget,
    };
    info!(
        generation = stats.generation,
        events = stats.events,
        edges = stats.edges,
        clusters = stats.clusters,
        graph_ms = stats.graph_ms,
        layout_ms = stats.layout_ms,
        "graph build finished"
    );

    Ok(BuildOutput {
        graph,
        positions: layout.positions,
        layout: layout.report,
        stats,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_owned()
    }
}

fn spawn_worker<F>(token: CancelToken, build: F) -> Receiver<Result<BuildOutput, BuildError>>
where
    F: FnOnce(&CancelToken) -> Result<BuildOutput, BuildError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| build(&token)))
            .unwrap_or_else(|payload| Err(BuildError::Failed(panic_message(payload.as_ref()))));

        if let Err(BuildError::Superseded { generation }) = &result {
            debug!(generation, "dropping superseded build");
            return;
        }

        if tx.send(result).is_err() {
            debug!(
                generation = token.generation(),
                error = %BuildError::LayoutUnavailable,
                "dropping build result"
            );
        }
    });
    rx
}

struct PendingBuild {
    generation: u64,
    rx: Receiver<Result<BuildOutput, BuildError>>,
}

pub enum BuildPoll {
    Idle,
    Pending { generation: u64 },
    Ready(Box<BuildOutput>),
    Failed { generation: u64, message: String },
}

/// Owns the generation counter and at most one in-flight build. Starting a
/// new build supersedes the previous one; its result is never delivered.
pub struct BuildOrchestrator {
    settings: Settings,
    current: Arc<AtomicU64>,
    pending: Option<PendingBuild>,
}

impl BuildOrchestrator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            current: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_generation(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    pub fn is_building(&self) -> bool {
        self.pending.is_some()
    }

    fn next_token(&self) -> CancelToken {
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        CancelToken {
            generation,
            current: Arc::clone(&self.current),
        }
    }

    pub fn start(&mut self, events: Arc<Vec<Event>>, k: usize) -> u64 {
        let settings = self.settings.clone();
        self.start_job(move |token| run_build(&events, k, &settings, token))
    }

    /// Runs `build` on a worker thread as the newest generation.
    fn start_job<F>(&mut self, build: F) -> u64
    where
        F: FnOnce(&CancelToken) -> Result<BuildOutput, BuildError> + Send + 'static,
    {
        let token = self.next_token();
        let generation = token.generation();
        if let Some(previous) = self.pending.take() {
            debug!(
                superseded = previous.generation,
                generation, "superseding in-flight build"
            );
        }

        let rx = spawn_worker(token, build);
        self.pending = Some(PendingBuild { generation, rx });
        generation
    }

    pub fn poll(&mut self) -> BuildPoll {
        let Some(pending) = self.pending.take() else {
            return BuildPoll::Idle;
        };
        let generation = pending.generation;

        match pending.rx.try_recv() {
            Ok(result) => self.resolve(generation, Some(result)),
            Err(TryRecvError::Empty) => {
                self.pending = Some(pending);
                BuildPoll::Pending { generation }
            }
            Err(TryRecvError::Disconnected) => self.resolve(generation, None),
        }
    }

    /// Blocks until the current build finishes. Used by headless callers.
    pub fn wait(&mut self) -> BuildPoll {
        let Some(pending) = self.pending.take() else {
            return BuildPoll::Idle;
        };
        let received = pending.rx.recv().ok();
        self.resolve(pending.generation, received)
    }

    /// `None` means the worker went away without sending a result.
    fn resolve(
        &self,
        generation: u64,
        received: Option<Result<BuildOutput, BuildError>>,
    ) -> BuildPoll {
        let is_current = generation == self.current_generation();
        match received {
            Some(Ok(output)) if is_current => BuildPoll::Ready(Box::new(output)),
            Some(Ok(_)) => {
                debug!(generation, "discarding stale build");
                BuildPoll::Idle
            }
            Some(Err(BuildError::Superseded { .. })) => BuildPoll::Idle,
            Some(Err(error)) => {
                warn!(generation, %error, "graph build failed");
                BuildPoll::Failed {
                    generation,
                    message: error.to_string(),
                }
            }
            None if is_current => BuildPoll::Failed {
                generation,
                message: "background build worker disconnected".to_owned(),
            },
            None => BuildPoll::Idle,
        }
    }

    /// Cancels any in-flight build.
    pub fn dispose(&mut self) {
        self.current.fetch_add(1, Ordering::AcqRel);
        self.pending = None;
    }
}

impl Drop for BuildOrchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(count: usize) -> Arc<Vec<Event>> {
        Arc::new(
            (0..count)
                .map(|index| {
                    let tags = [["jazz", "techno", "folk"][index % 3], ["free", "paid"][index % 2]];
                    Event::new(format!("e{index}"), format!("Event {index}"), &tags)
                })
                .collect(),
        )
    }

    #[test]
    fn token_goes_stale_after_supersede() {
        let token = CancelToken::detached();
        assert!(token.is_current());
        token.supersede();
        assert!(!token.is_current());
        assert_eq!(token.check(), Err(BuildError::Superseded { generation: 0 }));
    }

    #[test]
    fn run_build_reports_stats() {
        let events = events(12);
        let output =
            run_build(&events, 3, &Settings::default(), &CancelToken::detached()).unwrap();

        assert_eq!(output.stats.events, 12);
        assert_eq!(output.stats.edges, output.graph.edges.len());
        assert_eq!(output.positions.len(), output.graph.nodes.len());
        assert!(!output.stats.over_budget);
    }

    #[test]
    fn edge_budget_is_a_warning_only() {
        let mut settings = Settings::default();
        settings.budget.warn_edge_count = 1;
        let output = run_build(&events(12), 3, &settings, &CancelToken::detached()).unwrap();
        assert!(output.stats.over_budget);
    }

    #[test]
    fn orchestrator_delivers_latest_generation_only() {
        let mut orchestrator = BuildOrchestrator::new(Settings::default());
        let first = orchestrator.start(events(30), 2);
        let second = orchestrator.start(events(30), 5);
        assert!(second > first);

        match orchestrator.wait() {
            BuildPoll::Ready(output) => {
                assert_eq!(output.stats.generation, second);
                assert!(
                    output
                        .graph
                        .edges
                        .iter()
                        .filter(|edge| edge.source == "e0")
                        .count()
                        <= 5
                );
            }
            BuildPoll::Failed { message, .. } => panic!("build failed: {message}"),
            _ => panic!("expected a finished build"),
        }
        assert!(matches!(orchestrator.poll(), BuildPoll::Idle));
    }

    #[test]
    fn worker_panic_fails_current_generation() {
        let mut orchestrator = BuildOrchestrator::new(Settings::default());
        let generation = orchestrator.start_job(|_| panic!("layout exploded"));

        match orchestrator.wait() {
            BuildPoll::Failed {
                generation: failed,
                message,
            } => {
                assert_eq!(failed, generation);
                assert_eq!(failed, orchestrator.current_generation());
                assert!(message.contains("layout exploded"), "{message}");
            }
            _ => panic!("expected a failed build"),
        }
        assert!(!orchestrator.is_building());
    }

    #[test]
    fn worker_exiting_without_result_fails_current_generation() {
        let mut orchestrator = BuildOrchestrator::new(Settings::default());
        let generation = orchestrator.start_job(|token| {
            Err(BuildError::Superseded {
                generation: token.generation(),
            })
        });

        match orchestrator.wait() {
            BuildPoll::Failed {
                generation: failed,
                message,
            } => {
                assert_eq!(failed, generation);
                assert!(message.contains("disconnected"));
            }
            _ => panic!("expected a failed build"),
        }
    }

    #[test]
    fn failure_of_superseded_generation_is_not_reported() {
        let mut orchestrator = BuildOrchestrator::new(Settings::default());
        orchestrator.start_job(|_| Err(BuildError::Failed("stale".to_owned())));
        let latest = orchestrator.start(events(8), 2);

        match orchestrator.wait() {
            BuildPoll::Ready(output) => assert_eq!(output.stats.generation, latest),
            _ => panic!("expected the latest build"),
        }
    }

    #[test]
    fn dispose_discards_pending_build() {
        let mut orchestrator = BuildOrchestrator::new(Settings::default());
        orchestrator.start(events(10), 3);
        orchestrator.dispose();
        assert!(!orchestrator.is_building());
        assert!(matches!(orchestrator.poll(), BuildPoll::Idle));
    }

    #[test]
    fn error_messages_are_readable() {
        let error = BuildError::InvalidInput {
            id: Some("e1".to_owned()),
            reason: "missing title".to_owned(),
        };
        assert_eq!(error.to_string(), "invalid event e1: missing title");
        assert!(
            anyhow::Error::from(BuildError::LayoutUnavailable)
                .to_string()
                .contains("no longer available")
        );
    }
}
