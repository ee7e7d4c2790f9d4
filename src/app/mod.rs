use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Context, Vec2};
use party_graph::build::{BuildOrchestrator, BuildOutput, BuildPoll, BuildStats};
use party_graph::graph::RenderedGraph;
use party_graph::layout::LayoutPositions;
use party_graph::{Event, Settings};
use tracing::info;

mod adapter;
mod interaction;
mod panels;
mod render_utils;
mod view;

pub struct PartyGraphApp {
    events: Arc<Vec<Event>>,
    orchestrator: BuildOrchestrator,
    k: usize,
    state: AppState,
}

enum AppState {
    Loading,
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    graph: RenderedGraph,
    positions: LayoutPositions,
    stats: BuildStats,
    visible: VisibleGraph,
    search: String,
    jump_query: String,
    k_draft: Option<usize>,
    selected: Option<String>,
    pan: Vec2,
    zoom: f32,
    fit_pending: bool,
}

/// The subset currently on screen after applying the search query.
struct VisibleGraph {
    query: String,
    graph: RenderedGraph,
    positions: LayoutPositions,
}

impl PartyGraphApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        events: Vec<Event>,
        settings: Settings,
    ) -> Self {
        let k = settings.neighbors.k;
        let mut app = Self {
            events: Arc::new(events),
            orchestrator: BuildOrchestrator::new(settings),
            k,
            state: AppState::Loading,
        };
        app.start_build();
        app
    }

    fn start_build(&mut self) {
        let generation = self.orchestrator.start(Arc::clone(&self.events), self.k);
        info!(generation, k = self.k, "started graph build");
    }
}

impl eframe::App for PartyGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match self.orchestrator.poll() {
            BuildPoll::Ready(output) => {
                let previous = match &mut self.state {
                    AppState::Ready(model) => Some(model.as_mut()),
                    _ => None,
                };
                transition = Some(AppState::Ready(Box::new(ViewModel::from_build(
                    *output, previous,
                ))));
            }
            BuildPoll::Failed { message, .. } => {
                transition = Some(AppState::Error(message));
            }
            BuildPoll::Pending { .. } => {
                ctx.request_repaint_after(Duration::from_millis(30));
            }
            BuildPoll::Idle => {}
        }

        if let Some(next_state) = transition.take() {
            self.state = next_state;
        }

        let is_building = self.orchestrator.is_building();
        let max_k = self.orchestrator.settings().viewer.max_k.max(1);
        match &mut self.state {
            AppState::Loading => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Building event graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                let mut retry = false;
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Graph failed to build, please retry");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
                if retry {
                    transition = Some(AppState::Loading);
                }
            }
            AppState::Ready(model) => {
                let mut requested_k = self.k;
                model.show(ctx, &mut requested_k, max_k, is_building);
                if requested_k != self.k {
                    self.k = requested_k;
                    self.start_build();
                }
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
            self.start_build();
        }
    }
}

impl ViewModel {
    fn from_build(output: BuildOutput, previous: Option<&mut ViewModel>) -> Self {
        let BuildOutput {
            graph,
            positions,
            stats,
            ..
        } = output;

        let mut model = Self {
            visible: VisibleGraph {
                query: String::new(),
                graph: graph.clone(),
                positions: positions.clone(),
            },
            graph,
            positions,
            stats,
            search: String::new(),
            jump_query: String::new(),
            k_draft: None,
            selected: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            fit_pending: true,
        };

        if let Some(previous) = previous {
            model.search = std::mem::take(&mut previous.search);
            model.jump_query = std::mem::take(&mut previous.jump_query);
            model.selected = previous
                .selected
                .take()
                .filter(|id| model.graph.node(id).is_some());
        }
        model.refresh_visible(true);
        model
    }

    fn refresh_visible(&mut self, force: bool) {
        let query = self.search.trim();
        if !force && self.visible.query == query {
            return;
        }

        let graph = party_graph::filter_graph(&self.graph, query);
        let positions = self.positions.project(&graph);
        self.visible = VisibleGraph {
            query: query.to_owned(),
            graph,
            positions,
        };
    }
}
