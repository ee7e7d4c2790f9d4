use eframe::egui::{self, Align, Context, Layout, RichText, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use party_graph::graph::{GraphNode, RenderedGraph};
use party_graph::level_of_detail;
use party_graph::util::truncate_label;

use super::ViewModel;

const JUMP_RESULTS: usize = 8;
const DETAIL_NEIGHBORS: usize = 24;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

/// Best fuzzy matches over every node label, highest score first.
fn jump_candidates(model: &ViewModel, query: &str) -> Vec<(String, String)> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored = model
        .graph
        .nodes
        .iter()
        .filter_map(|node| {
            let text = match node {
                GraphNode::Event(event) => event.event.title.as_str(),
                GraphNode::Cluster(cluster) => cluster.cluster.label.as_str(),
            };
            fuzzy_match_score(&matcher, text, query)
                .map(|score| (score, node.id().to_owned(), text.to_owned()))
        })
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(JUMP_RESULTS)
        .map(|(_, id, text)| (id, text))
        .collect()
}

/// Neighbors of `id` in either edge direction, most similar first, each
/// listed once.
fn similar_events<'a>(graph: &'a RenderedGraph, id: &str) -> Vec<(&'a str, f32)> {
    let mut neighbors = graph
        .edges
        .iter()
        .filter_map(|edge| {
            if edge.source == id {
                Some((edge.target.as_str(), edge.similarity))
            } else if edge.target == id {
                Some((edge.source.as_str(), edge.similarity))
            } else {
                None
            }
        })
        .collect::<Vec<_>>();
    neighbors.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    neighbors.dedup_by(|a, b| a.0 == b.0);
    neighbors
}

impl ViewModel {
    pub(super) fn show(
        &mut self,
        ctx: &Context,
        k: &mut usize,
        max_k: usize,
        is_building: bool,
    ) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_top_bar(ui, is_building));

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui, k, max_k));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));
    }

    fn draw_top_bar(&self, ui: &mut Ui, is_building: bool) {
        let decision = level_of_detail(self.zoom, self.visible.graph.event_count());
        let detail = if decision.in_transition {
            "transition"
        } else if decision.show_individuals {
            "events"
        } else {
            "clusters"
        };

        ui.horizontal(|ui| {
            ui.heading("Party Graph");
            ui.separator();
            ui.label(format!("events: {}", self.stats.events));
            ui.label(format!("edges: {}", self.stats.edges));
            ui.label(format!("clusters: {}", self.stats.clusters));
            if self.stats.excluded > 0 {
                ui.label(format!("excluded: {}", self.stats.excluded))
                    .on_hover_text("Tagged events left out of similarity search by the size cap.");
            }
            ui.label(format!(
                "build: {} + {} ms",
                self.stats.graph_ms, self.stats.layout_ms
            ));
            if self.stats.over_budget {
                ui.colored_label(egui::Color32::from_rgb(235, 170, 80), "over budget");
            }
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if is_building {
                    ui.spinner();
                    ui.label("rebuilding");
                }
                ui.label(format!("zoom {:.2} ({detail})", self.zoom));
            });
        });
    }

    fn draw_controls(&mut self, ui: &mut Ui, k: &mut usize, max_k: usize) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        let mut draft = self.k_draft.unwrap_or(*k).clamp(1, max_k);
        let k_slider = ui
            .add(egui::Slider::new(&mut draft, 1..=max_k).text("Neighbors per event"))
            .on_hover_text("Number of most similar events linked to each event.");
        if k_slider.changed() {
            self.k_draft = Some(draft);
        }
        if k_slider.drag_stopped() || (k_slider.changed() && !k_slider.dragged()) {
            *k = draft;
            self.k_draft = None;
        }

        ui.separator();

        ui.label("Search")
            .on_hover_text("Show only events whose title, description, category or tags match.");
        if ui.text_edit_singleline(&mut self.search).changed() {
            self.refresh_visible(false);
            self.fit_pending = true;
        }
        if !self.visible.query.is_empty() {
            ui.small(format!(
                "{} of {} events shown",
                self.visible.graph.event_count(),
                self.graph.event_count()
            ));
        }

        ui.separator();

        ui.label("Jump to").on_hover_text("Fuzzy search over event and cluster names.");
        ui.text_edit_singleline(&mut self.jump_query);

        let mut jump_target = None;
        for (id, text) in jump_candidates(self, &self.jump_query) {
            let is_selected = self.selected.as_deref() == Some(id.as_str());
            if ui
                .selectable_label(is_selected, truncate_label(&text, 40))
                .on_hover_text(id.as_str())
                .clicked()
            {
                jump_target = Some(id);
            }
        }
        if let Some(id) = jump_target {
            self.jump_to(id);
        }

        ui.separator();
        if ui.button("Fit to view").clicked() {
            self.fit_pending = true;
        }
    }

    fn jump_to(&mut self, id: String) {
        if self.visible.graph.node(&id).is_none() {
            self.search.clear();
            self.refresh_visible(false);
        }
        self.center_on(&id);
        self.set_selected(Some(id));
    }

    fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let Some(selected_id) = self.selected.clone() else {
            ui.label("Select an event or cluster from the graph.");
            return;
        };

        let Some(node) = self.graph.node(&selected_id) else {
            ui.label("Selected node no longer exists in the graph.");
            return;
        };

        let mut clicked = None;
        match node {
            GraphNode::Event(event) => {
                ui.label(RichText::new(&event.event.title).strong());
                ui.small(selected_id.as_str());
                ui.add_space(6.0);
                ui.label(format!("Category: {}", event.category));
                ui.label(format!("Tags: {}", event.event.tags.join(", ")));
                if !event.event.description.is_empty() {
                    ui.add_space(4.0);
                    ui.label(event.event.description.as_str());
                }

                let neighbors = similar_events(&self.graph, &selected_id);

                ui.separator();
                ui.label(RichText::new("Similar events").strong());
                if neighbors.is_empty() {
                    ui.label("No events share enough tags with this one.");
                }
                for (id, similarity) in neighbors.into_iter().take(DETAIL_NEIGHBORS) {
                    let label = self.graph.node(id).map_or(id, GraphNode::label);
                    let text = format!(
                        "{}  ({:.0}%)",
                        truncate_label(label, 36),
                        similarity * 100.0
                    );
                    if ui.link(text).on_hover_text(id).clicked() {
                        clicked = Some(id.to_owned());
                    }
                }

                ui.separator();
                ui.label(RichText::new("Cluster").strong());
                match self
                    .graph
                    .clusters
                    .iter()
                    .find(|cluster| cluster.members.contains(&selected_id))
                {
                    Some(cluster) => {
                        if ui.link(cluster.label.as_str()).clicked() {
                            clicked = Some(cluster.id.clone());
                        }
                    }
                    None => {
                        ui.label("Not part of any cluster.");
                    }
                }
            }
            GraphNode::Cluster(cluster) => {
                ui.label(RichText::new(&cluster.cluster.label).strong());
                ui.small(selected_id.as_str());
                ui.add_space(6.0);
                ui.label(format!("Events: {}", cluster.cluster.size()));
                ui.label(format!("Common tags: {}", cluster.cluster.common_tags.join(", ")));

                ui.separator();
                ui.label(RichText::new("Members").strong());
                egui::ScrollArea::vertical()
                    .id_salt("cluster_members_scroll")
                    .max_height(360.0)
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for member in &cluster.cluster.members {
                            let label = self
                                .graph
                                .node(member)
                                .map_or(member.as_str(), GraphNode::label);
                            if ui
                                .link(truncate_label(label, 40))
                                .on_hover_text(member.as_str())
                                .clicked()
                            {
                                clicked = Some(member.clone());
                            }
                        }
                    });
            }
        }

        if let Some(id) = clicked {
            self.jump_to(id);
        }
    }
}
