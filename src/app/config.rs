//! Configuration for the terminal emulator
//!
//! Stored as JSON at `~/.config/glowterm/config.json`. Every section has
//! defaults, so a file only needs the fields it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{Colors, DEFAULT_BG, DEFAULT_FG};
use crate::pty::WindowSize;

/// Terminal configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell to run; `$SHELL` (else `/bin/sh`) when unset
    pub shell: Option<String>,
    /// Window settings
    pub window: WindowConfig,
    /// Emulation settings
    pub terminal: TerminalConfig,
    /// Color palette used by the renderer
    pub colors: ColorPalette,
    /// Post-processing values used by the renderer
    pub render: RenderTuning,
}

/// Window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Grid width in columns
    pub columns: u16,
    /// Grid height in rows
    pub rows: u16,
    /// Width of one character cell in pixels
    pub char_width: u16,
    /// Height of one character cell in pixels
    pub char_height: u16,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            columns: 80,
            rows: 24,
            char_width: 7,
            char_height: 13,
        }
    }
}

/// Emulation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Palette index for text
    pub default_fg: u8,
    /// Palette index for the background
    pub default_bg: u8,
    /// Make `CSI K` erase to the end of the display instead of the line
    pub legacy_erase_in_line: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            default_fg: DEFAULT_FG,
            default_bg: DEFAULT_BG,
            legacy_erase_in_line: false,
        }
    }
}

impl TerminalConfig {
    pub fn colors(&self) -> Colors {
        Colors::new(self.default_fg, self.default_bg)
    }
}

/// Values handed to the renderer's post-processing passes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderTuning {
    pub text_brightness: f32,
    pub scanline_strength: f32,
    pub noise_strength: f32,
    pub ambient: f32,
    pub bloom_strength: f32,
    pub bloom_brightness: f32,
}

impl Default for RenderTuning {
    fn default() -> Self {
        Self {
            text_brightness: 0.5,
            scanline_strength: 0.13,
            noise_strength: 0.03,
            ambient: 0.12,
            bloom_strength: 1.2,
            bloom_brightness: 1.4,
        }
    }
}

impl RenderTuning {
    fn fields(&self) -> [(&'static str, f32); 6] {
        [
            ("text_brightness", self.text_brightness),
            ("scanline_strength", self.scanline_strength),
            ("noise_strength", self.noise_strength),
            ("ambient", self.ambient),
            ("bloom_strength", self.bloom_strength),
            ("bloom_brightness", self.bloom_brightness),
        ]
    }
}

/// Color palette configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorPalette {
    /// Color of cells using the default foreground index
    pub foreground: (u8, u8, u8),
    /// Color of cells using the default background index
    pub background: (u8, u8, u8),
    /// The 16 ANSI colors (0-15)
    pub ansi: [(u8, u8, u8); 16],
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            // Wheat on black
            foreground: (245, 222, 179),
            background: (0, 0, 0),
            // Default ANSI colors (similar to xterm)
            ansi: [
                (0, 0, 0),       // 0: Black
                (205, 0, 0),     // 1: Red
                (0, 205, 0),     // 2: Green
                (205, 205, 0),   // 3: Yellow
                (0, 0, 238),     // 4: Blue
                (205, 0, 205),   // 5: Magenta
                (0, 205, 205),   // 6: Cyan
                (229, 229, 229), // 7: White
                (127, 127, 127), // 8: Bright Black
                (255, 0, 0),     // 9: Bright Red
                (0, 255, 0),     // 10: Bright Green
                (255, 255, 0),   // 11: Bright Yellow
                (92, 92, 255),   // 12: Bright Blue
                (255, 0, 255),   // 13: Bright Magenta
                (0, 255, 255),   // 14: Bright Cyan
                (255, 255, 255), // 15: Bright White
            ],
        }
    }
}

impl ColorPalette {
    /// Get the RGB color for an indexed color (0-255)
    pub fn get_indexed(&self, index: u8) -> (u8, u8, u8) {
        match index {
            0..=15 => self.ansi[index as usize],
            // 216 color cube (16-231)
            16..=231 => {
                let n = index - 16;
                let to_component = |c: u8| if c == 0 { 0 } else { 55 + c * 40 };
                (to_component(n / 36), to_component((n / 6) % 6), to_component(n % 6))
            }
            // Grayscale (232-255)
            232..=255 => {
                let gray = 8 + (index - 232) * 10;
                (gray, gray, gray)
            }
        }
    }

    /// RGB for a cell color. The configured default indices map to the
    /// palette's foreground and background rather than the indexed table.
    pub fn resolve(&self, index: u8, defaults: Colors, is_foreground: bool) -> (u8, u8, u8) {
        match (is_foreground, index) {
            (true, i) if i == defaults.fg => self.foreground,
            (false, i) if i == defaults.bg => self.background,
            _ => self.get_indexed(index),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from default location or return default config
    pub fn load_or_default() -> Self {
        let Some(path) = default_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring config file");
                Self::default()
            }
        }
    }

    /// Check values the rest of the program relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.columns == 0 || self.window.rows == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be at least 1x1, got {}x{}",
                self.window.columns, self.window.rows
            )));
        }
        if self.window.char_width == 0 || self.window.char_height == 0 {
            return Err(ConfigError::Invalid(
                "character cell size must be non-zero".to_string(),
            ));
        }
        if let Some(shell) = &self.shell {
            if shell.trim().is_empty() {
                return Err(ConfigError::Invalid("shell must not be empty".to_string()));
            }
        }
        for (name, value) in self.render.fields() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "render.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// PTY size for the configured grid, including pixel dimensions
    pub fn window_size(&self) -> WindowSize {
        let w = &self.window;
        WindowSize::with_pixels(
            w.columns,
            w.rows,
            w.columns.saturating_mul(w.char_width),
            w.rows.saturating_mul(w.char_height),
        )
    }
}

/// `~/.config/glowterm/config.json`
pub fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("glowterm")
            .join("config.json")
    })
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
