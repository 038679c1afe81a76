//! Terminal presentation for the binaries.
//!
//! `TerminalSurface` keeps an `Overlay` for the drawing pass and mirrors the
//! widget state to the terminal: debug text when it changes, banner edges, and a
//! spinner while the model loads. `TerminalBell` rings the terminal bell.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

use crate::alert::{AlertSound, Surface};
use crate::detect::BoundingBox;
use crate::overlay::Overlay;
use crate::TARGET_CLASS;

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(name.to_string());
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct TerminalSurface {
    ui: Ui,
    overlay: Overlay,
    loading: Option<StageGuard>,
    last_printed: String,
}

impl TerminalSurface {
    pub fn new(ui: Ui) -> Self {
        Self {
            ui,
            overlay: Overlay::new(),
            loading: None,
            last_printed: String::new(),
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }
}

impl Surface for TerminalSurface {
    fn clear(&mut self, width: u32, height: u32) {
        self.overlay.clear(width, height);
    }

    fn draw_box(&mut self, bbox: &BoundingBox, label: &str, label_origin: (f32, f32)) {
        self.overlay.draw_box(bbox, label, label_origin);
    }

    fn set_debug_text(&mut self, text: &str) {
        self.overlay.set_debug_text(text);
        if text != self.last_printed {
            if !text.is_empty() {
                eprintln!("[detect] {}", text.replace('\n', ", "));
            }
            self.last_printed = text.to_string();
        }
    }

    fn set_banner_visible(&mut self, visible: bool) {
        self.overlay.set_banner_visible(visible);
        if visible {
            eprintln!("!!! WARNING: {} detected !!!", TARGET_CLASS.to_uppercase());
        } else {
            eprintln!("--- warning cleared ---");
        }
    }

    fn set_loading(&mut self, message: Option<&str>) {
        self.overlay.set_loading(message);
        // Dropping the guard finishes the spinner.
        self.loading = message.map(|m| self.ui.stage(m));
    }
}

/// Rings the terminal bell (BEL) on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalBell;

impl AlertSound for TerminalBell {
    fn play(&mut self) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_spins() {
        assert!(!Ui::from_args(Some("plain"), true).use_pretty());
        assert!(!Ui::from_args(Some("pretty"), false).use_pretty());
        assert!(Ui::from_args(None, true).use_pretty());
    }

    #[test]
    fn terminal_surface_tracks_overlay_state() {
        let mut surface = TerminalSurface::new(Ui::new(UiMode::Plain, false));
        surface.set_loading(Some("loading detection model..."));
        assert_eq!(surface.overlay().loading(), Some("loading detection model..."));
        surface.set_loading(None);
        assert!(surface.loading.is_none());

        surface.clear(64, 48);
        surface.draw_box(&BoundingBox::new(1.0, 1.0, 10.0, 10.0), "bear (70%)", (1.0, 20.0));
        surface.set_banner_visible(true);
        surface.set_debug_text("bear (70%)");
        assert!(surface.overlay().banner_visible());
        assert_eq!(surface.overlay().labels().len(), 1);
        assert_eq!(surface.overlay().debug_text(), "bear (70%)");
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
