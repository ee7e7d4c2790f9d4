use eframe::egui::{self, Rect, Ui};
use party_graph::layout::Point;

use super::ViewModel;
use super::render_utils::{fit_view, screen_to_world};

const MIN_ZOOM: f32 = 0.05;
const MAX_ZOOM: f32 = 6.0;

impl ViewModel {
    pub(super) fn handle_graph_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, self.pan, self.zoom, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = pointer - rect.center() - (world_before * self.zoom);
    }

    pub(super) fn handle_graph_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Primary)
            || response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }
    }

    /// Fits the visible subset into `rect` once after a build or a filter
    /// change.
    pub(super) fn apply_pending_fit(&mut self, rect: Rect) {
        if !self.fit_pending {
            return;
        }
        self.fit_pending = false;

        if let Some((pan, zoom)) = fit_view(rect, self.visible.positions.points()) {
            self.pan = pan;
            self.zoom = zoom;
        }
    }

    /// Pans so the node lands in the middle of the canvas, zooming in far
    /// enough for individual events to show.
    pub(super) fn center_on(&mut self, id: &str) {
        let Some(Point { x, y }) = self.positions.get(id).filter(|point| point.is_finite()) else {
            return;
        };
        self.zoom = self.zoom.max(1.0);
        self.pan = -egui::vec2(x, y) * self.zoom;
    }

    pub(super) fn set_selected(&mut self, selected: Option<String>) {
        if self.selected == selected {
            return;
        }
        self.selected = selected;
    }
}
