//! Display window: egui/eframe application.
//!
//! # Architecture
//!
//! [`EmotionApp`] is the top-level [`eframe::App`].  It owns the
//! [`FrameCycle`] (camera, FPS counter, queue endpoints) and the running
//! [`Pipeline`], and drives one cycle per repaint:
//!
//! ```text
//! update()
//!   ├─ quit key or window close?  ── yes ─▶ teardown, close viewport
//!   ├─ shutdown requested by voice?  ── yes ─▶ teardown, close viewport
//!   ├─ FrameCycle::step
//!   │     └─ capture error  ─▶ log, teardown, close viewport
//!   ├─ upload frame texture
//!   └─ paint frame + boxes + labels + FPS + "You said"
//! ```
//!
//! # Overlay
//!
//! | Element | Position | Colour |
//! |---------|----------|--------|
//! | Face box | face region, 2 px | green |
//! | Emotion label | just above the box, capitalized | green |
//! | `FPS: 24.3` | top-left | green |
//! | `You said: …` | bottom-left | white |

use std::time::Instant;

use eframe::egui;

use crate::config::UiConfig;
use crate::pipeline::{CycleOutput, FrameCycle, Pipeline};

const OVERLAY_GREEN: egui::Color32 = egui::Color32::from_rgb(0, 255, 0);
const BOX_STROKE: f32 = 2.0;
const LABEL_SIZE: f32 = 18.0;
const MARGIN: f32 = 10.0;

/// Resolve a configured key name, falling back to `Q`.
pub fn quit_key(name: &str) -> egui::Key {
    egui::Key::from_name(name).unwrap_or_else(|| {
        log::warn!("display: unknown quit key {name:?}; using Q");
        egui::Key::Q
    })
}

// ---------------------------------------------------------------------------
// EmotionApp
// ---------------------------------------------------------------------------

pub struct EmotionApp {
    cycle: FrameCycle,
    pipeline: Pipeline,
    quit_key: egui::Key,
    texture: Option<egui::TextureHandle>,
    last: Option<CycleOutput>,
    closing: bool,
}

impl EmotionApp {
    pub fn new(cycle: FrameCycle, pipeline: Pipeline, ui: &UiConfig) -> Self {
        Self {
            cycle,
            pipeline,
            quit_key: quit_key(&ui.quit_key),
            texture: None,
            last: None,
            closing: false,
        }
    }

    /// Stop every worker, then release the camera.  Idempotent.
    fn teardown(&mut self) {
        if self.pipeline.is_shut_down() && self.cycle.is_released() {
            return;
        }
        self.pipeline.shutdown();
        self.cycle.release();
        log::info!("display: torn down");
    }

    fn close(&mut self, ctx: &egui::Context) {
        self.teardown();
        if !self.closing {
            self.closing = true;
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn upload(&mut self, ctx: &egui::Context, output: &CycleOutput) {
        let image = &output.frame.image;
        let size = [image.width() as usize, image.height() as usize];
        let color = egui::ColorImage::from_rgb(size, image.as_raw());

        match &mut self.texture {
            Some(texture) => texture.set(color, egui::TextureOptions::LINEAR),
            None => {
                let texture = ctx.load_texture("camera", color, egui::TextureOptions::LINEAR);
                self.texture = Some(texture);
            }
        }
    }

    fn draw(&self, ui: &mut egui::Ui) {
        let (Some(texture), Some(output)) = (&self.texture, &self.last) else {
            ui.centered_and_justified(|ui| ui.label("Waiting for camera…"));
            return;
        };

        let natural = texture.size_vec2();
        let available = ui.available_size();
        let scale = (available.x / natural.x).min(available.y / natural.y).max(0.01);
        let (rect, _) = ui.allocate_exact_size(natural * scale, egui::Sense::hover());

        let painter = ui.painter_at(rect);
        painter.image(
            texture.id(),
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        let font = egui::FontId::proportional(LABEL_SIZE);

        for annotation in &output.annotations {
            let r = annotation.region;
            let min = rect.min + egui::vec2(r.x as f32, r.y as f32) * scale;
            let size = egui::vec2(r.width as f32, r.height as f32) * scale;
            let face = egui::Rect::from_min_size(min, size);

            painter.rect_stroke(
                face,
                0.0,
                egui::Stroke::new(BOX_STROKE, OVERLAY_GREEN),
                egui::StrokeKind::Outside,
            );
            painter.text(
                face.left_top() - egui::vec2(0.0, 4.0),
                egui::Align2::LEFT_BOTTOM,
                &annotation.label,
                font.clone(),
                OVERLAY_GREEN,
            );
        }

        painter.text(
            rect.left_top() + egui::vec2(MARGIN, MARGIN),
            egui::Align2::LEFT_TOP,
            format!("FPS: {:.1}", output.fps),
            font.clone(),
            OVERLAY_GREEN,
        );

        if let Some(heard) = &output.heard {
            painter.text(
                rect.left_bottom() + egui::vec2(MARGIN, -2.0 * MARGIN),
                egui::Align2::LEFT_BOTTOM,
                format!("You said: {heard}"),
                font,
                egui::Color32::WHITE,
            );
        }
    }
}

impl eframe::App for EmotionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.closing {
            return;
        }

        let quit_pressed =
            ctx.input(|i| i.key_pressed(self.quit_key) || i.viewport().close_requested());
        if self.cycle.should_exit(quit_pressed) {
            log::info!("display: exit requested");
            self.close(ctx);
            return;
        }

        match self.cycle.step(Instant::now()) {
            Ok(output) => {
                self.upload(ctx, &output);
                self.last = Some(output);
            }
            Err(e) => {
                log::error!("display: frame capture failed: {e}");
                self.close(ctx);
                return;
            }
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(egui::Color32::BLACK))
            .show(ctx, |ui| self.draw(ui));

        ctx.request_repaint();
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.teardown();
        log::info!("display: window closed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_key_names_resolve() {
        assert_eq!(quit_key("Q"), egui::Key::Q);
        assert_eq!(quit_key("Escape"), egui::Key::Escape);
    }

    #[test]
    fn unknown_quit_key_falls_back_to_q() {
        assert_eq!(quit_key("not-a-key"), egui::Key::Q);
    }
}
