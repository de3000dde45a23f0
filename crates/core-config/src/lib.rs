//! Configuration loading and parsing.
//!
//! `prism.toml` supplies scroll margins, cell sizing for controls and
//! tabs, the syntax profile directory, and the session snapshot location.
//! Unknown fields are tolerated so the format can evolve without breaking
//! older files, and parse failures fall back to defaults rather than
//! aborting startup: a misconfigured editor must still open.
//!
//! Margins are clamped against the live viewport in `apply_context`; the
//! raw parsed values are retained so resizes can re-clamp.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigContext {
    pub viewport_span: usize,
    pub viewport_lines: usize,
    /// Rows reserved for headers, footers, and borders per pane.
    pub reserved_rows: usize,
}

impl ConfigContext {
    pub fn new(viewport_span: usize, viewport_lines: usize, reserved_rows: usize) -> Self {
        Self {
            viewport_span,
            viewport_lines,
            reserved_rows,
        }
    }

    pub fn text_rows(&self) -> usize {
        self.viewport_lines.saturating_sub(self.reserved_rows)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarginConfig {
    pub vertical: usize,
    pub horizontal: usize,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            vertical: 2,
            horizontal: 2,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ScrollConfig {
    pub margin: MarginConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CellsConfig {
    /// Cells rendered per low-ASCII control character.
    pub ctlsize: usize,
    /// Cells rendered per tab and per indentation level.
    pub tabsize: usize,
}

impl Default for CellsConfig {
    fn default() -> Self {
        Self {
            ctlsize: 4,
            tabsize: 4,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SyntaxConfig {
    /// Directory holding keyword profile JSON files.
    pub profiles: Option<PathBuf>,
    /// Type selected when a path's extension has no profile.
    pub default_type: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Snapshot file restored at startup and written at exit.
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ConfigFile {
    pub scroll: ScrollConfig,
    pub cells: CellsConfig,
    pub syntax: SyntaxConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file text, when one was read.
    pub raw: Option<String>,
    pub file: ConfigFile,
    /// Margin clamped to viewport semantics.
    pub effective_vertical_margin: usize,
}

/// Best-effort config path: the working directory first, then the user's
/// configuration directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("prism.toml");
    if local.exists() {
        return local;
    }
    if let Ok(home) = std::env::var("HOME") {
        let candidate = PathBuf::from(home).join(".config").join("prism").join("prism.toml");
        if candidate.exists() {
            return candidate;
        }
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
                effective_vertical_margin: 0,
            }),
            Err(e) => {
                // Malformed configuration falls back to defaults.
                info!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Apply viewport context to compute the clamped vertical margin.
    pub fn apply_context(&mut self, ctx: ConfigContext) -> usize {
        let raw = self.file.scroll.margin.vertical;
        let text_rows = ctx.text_rows();
        let clamped = if text_rows <= 3 {
            0
        } else {
            let max = text_rows.saturating_sub(2) / 2;
            raw.min(max)
        };

        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                text_rows,
                "scroll_margin_vertical_clamped"
            );
        }
        self.effective_vertical_margin = clamped;
        clamped
    }

    /// Recompute the effective margin after a viewport change. Returns the
    /// new value when it changed.
    pub fn recompute_with_context(&mut self, ctx: ConfigContext) -> Option<usize> {
        let prev = self.effective_vertical_margin;
        let current = self.apply_context(ctx);
        if current != prev { Some(current) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(rows: usize) -> ConfigContext {
        ConfigContext::new(80, rows, 0)
    }

    #[test]
    fn defaults_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file.scroll.margin.vertical, 2);
        assert_eq!(cfg.file.cells.tabsize, 4);
    }

    #[test]
    fn parses_known_fields() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[scroll.margin]\nvertical = 3\nhorizontal = 5\n[cells]\ntabsize = 8\n",
        )
        .unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.scroll.margin.vertical, 3);
        assert_eq!(cfg.file.scroll.margin.horizontal, 5);
        assert_eq!(cfg.file.cells.tabsize, 8);
        cfg.apply_context(ctx(40));
        assert_eq!(cfg.effective_vertical_margin, 3);
    }

    #[test]
    fn unknown_fields_tolerated() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[future]\nsetting = 1\n[cells]\nctlsize = 2\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.cells.ctlsize, 2);
    }

    #[test]
    fn malformed_file_falls_back() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "this is { not toml").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.scroll.margin.vertical, 2);
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn clamps_margin_to_half_viewport() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[scroll.margin]\nvertical = 50\n").unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        // Text rows 20: max = (20 - 2) / 2 = 9.
        let eff = cfg.apply_context(ctx(20));
        assert_eq!(eff, 9);
    }

    #[test]
    fn recompute_reports_changes_only() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[scroll.margin]\nvertical = 10\n").unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        cfg.apply_context(ctx(50));
        assert_eq!(cfg.effective_vertical_margin, 10);
        assert_eq!(cfg.recompute_with_context(ctx(10)), Some(4));
        assert_eq!(cfg.recompute_with_context(ctx(11)), None);
    }

    #[test]
    fn tiny_viewports_disable_margins() {
        let mut cfg = Config::default();
        cfg.file.scroll.margin.vertical = 5;
        assert_eq!(cfg.apply_context(ctx(3)), 0);
    }
}
