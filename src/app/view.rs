use eframe::egui::{self, Align2, Color32, CursorIcon, FontId, Sense, Stroke, Ui, vec2};
use party_graph::level_of_detail;

use super::ViewModel;
use super::adapter::{Highlight, SceneNode, SceneNodeKind, Viewport, build_scene, hit_test};
use super::render_utils::draw_background;

fn paint_node(painter: &egui::Painter, node: &SceneNode) {
    match node.kind {
        SceneNodeKind::Cluster => {
            painter.circle_filled(node.center, node.radius, node.fill);
            painter.circle_stroke(node.center, node.radius, Stroke::new(1.5, node.outline));
        }
        SceneNodeKind::Event => {
            painter.circle_filled(node.center, node.radius, node.fill);
            painter.circle_stroke(node.center, node.radius, Stroke::new(1.0, node.outline));
        }
    }
}

fn paint_label(painter: &egui::Painter, node: &SceneNode) {
    let Some((text, opacity)) = &node.label else {
        return;
    };
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0) as u8;

    let (anchor, offset, size) = match node.kind {
        SceneNodeKind::Cluster => (Align2::CENTER_CENTER, vec2(0.0, 0.0), 13.0),
        SceneNodeKind::Event => (Align2::LEFT_CENTER, vec2(node.radius + 4.0, 0.0), 11.5),
    };
    painter.text(
        node.center + offset,
        anchor,
        text,
        FontId::proportional(size),
        Color32::from_rgba_unmultiplied(232, 236, 241, alpha),
    );
}

impl ViewModel {
    pub(super) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.apply_pending_fit(rect);
        draw_background(&painter, rect, self.pan, self.zoom);

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);

        if self.visible.graph.nodes.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No events match the current search.",
                FontId::proportional(15.0),
                Color32::from_gray(170),
            );
            return;
        }

        let graph = &self.visible.graph;
        let decision = level_of_detail(self.zoom, graph.event_count());
        let viewport = Viewport {
            rect,
            pan: self.pan,
            zoom: self.zoom,
        };

        // Hit-test without hover emphasis, then rebuild with the hovered node focused.
        let unfocused = build_scene(
            graph,
            &self.visible.positions,
            &decision,
            &viewport,
            &Highlight::new(graph, self.selected.as_deref(), None),
        );
        let hovered = ui
            .input(|input| input.pointer.hover_pos())
            .filter(|pointer| rect.contains(*pointer))
            .and_then(|pointer| hit_test(&unfocused, pointer))
            .map(|index| graph.nodes[index].id().to_owned());

        let scene = if hovered.is_some() {
            build_scene(
                graph,
                &self.visible.positions,
                &decision,
                &viewport,
                &Highlight::new(graph, self.selected.as_deref(), hovered.as_deref()),
            )
        } else {
            unfocused
        };

        for node in &scene.clusters {
            paint_node(&painter, node);
        }
        for edge in &scene.edges {
            painter.line_segment([edge.start, edge.end], Stroke::new(edge.width, edge.color));
        }
        for node in &scene.events {
            paint_node(&painter, node);
        }
        for node in scene.clusters.iter().chain(&scene.events) {
            paint_label(&painter, node);
        }

        if hovered.is_some() {
            ui.ctx().set_cursor_icon(CursorIcon::PointingHand);
        }

        if response.clicked() {
            self.set_selected(hovered);
        }
        if response.dragged() {
            ui.ctx().request_repaint();
        }
    }
}
