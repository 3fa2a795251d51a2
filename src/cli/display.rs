// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Terminal display utilities for the rtdbg CLI.
//!
//! OneDark for dark terminals, One Light for light ones. The detection tries
//! `RTDBG_THEME` first (for explicit control), then `COLORFGBG` (set by some
//! terminals), then defaults to dark.
//!
//! Box drawing, addresses padded to the target width, kind badges and bump
//! labels. Respects `NO_COLOR` and stays plain when stdout is not a TTY, so
//! `inspect` output can be piped and diffed.
//!
//! # Theme detection order
//!
//! 1. `RTDBG_THEME` env var ("dark" or "light")
//! 2. `COLORFGBG` env var (terminal background hint)
//! 3. Default to dark theme

use std::sync::OnceLock;

use rtdbg::{Bump, FieldKind};

// Box drawing constants - width between │ and │ (excluding border chars)
pub const BOX_WIDTH: usize = 80;

// ═══════════════════════════════════════════════════════════════════════════
// THEME DETECTION
// ═══════════════════════════════════════════════════════════════════════════

/// Terminal color theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

/// Cached theme detection result
static THEME: OnceLock<Theme> = OnceLock::new();

/// Detect terminal theme from environment
fn detect_theme() -> Theme {
    // 1. Explicit override via RTDBG_THEME
    if let Ok(theme) = std::env::var("RTDBG_THEME") {
        match theme.to_lowercase().as_str() {
            "light" | "l" => return Theme::Light,
            "dark" | "d" => return Theme::Dark,
            _ => {}
        }
    }

    // 2. COLORFGBG (format: "fg;bg" where bg > 6 typically means light)
    if let Ok(colorfgbg) = std::env::var("COLORFGBG") {
        if let Some(bg) = colorfgbg.split(';').next_back() {
            if let Ok(bg_num) = bg.parse::<u8>() {
                // 0-6 are dark, 8 is bright black
                if bg_num >= 7 && bg_num != 8 {
                    return Theme::Light;
                }
            }
        }
    }

    Theme::Dark
}

/// Get the current theme (cached)
pub fn theme() -> Theme {
    *THEME.get_or_init(detect_theme)
}

// ═══════════════════════════════════════════════════════════════════════════
// ONEDARK / ONE LIGHT COLOR PALETTES (True Color)
// ═══════════════════════════════════════════════════════════════════════════

/// True color escape sequence helper
fn rgb(r: u8, g: u8, b: u8) -> String {
    format!("\x1b[38;2;{};{};{}m", r, g, b)
}

pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
}

pub use colors::*;

/// OneDark palette
mod onedark {
    pub const RED: (u8, u8, u8) = (224, 108, 117);     // #e06c75
    pub const GREEN: (u8, u8, u8) = (152, 195, 121);   // #98c379
    pub const YELLOW: (u8, u8, u8) = (229, 192, 123);  // #e5c07b
    pub const BLUE: (u8, u8, u8) = (97, 175, 239);     // #61afef
    pub const MAGENTA: (u8, u8, u8) = (198, 120, 221); // #c678dd
    pub const CYAN: (u8, u8, u8) = (86, 182, 194);     // #56b6c2
    pub const GRAY: (u8, u8, u8) = (92, 99, 112);      // #5c6370
    pub const BRIGHT_CYAN: (u8, u8, u8) = (102, 217, 239);
}

/// One Light palette
mod onelight {
    pub const RED: (u8, u8, u8) = (228, 86, 73);       // #e45649
    pub const GREEN: (u8, u8, u8) = (80, 161, 79);     // #50a14f
    pub const YELLOW: (u8, u8, u8) = (193, 132, 1);    // #c18401
    pub const BLUE: (u8, u8, u8) = (64, 120, 242);     // #4078f2
    pub const MAGENTA: (u8, u8, u8) = (166, 38, 164);  // #a626a4
    pub const CYAN: (u8, u8, u8) = (1, 132, 188);      // #0184bc
    pub const GRAY: (u8, u8, u8) = (160, 161, 167);    // #a0a1a7
    pub const BRIGHT_CYAN: (u8, u8, u8) = (1, 112, 158);
}

// ═══════════════════════════════════════════════════════════════════════════
// THEME-AWARE COLOR ACCESSORS
// ═══════════════════════════════════════════════════════════════════════════

macro_rules! theme_color {
    ($name:ident) => {
        #[allow(non_snake_case)]
        pub fn $name() -> String {
            let (r, g, b) = match theme() {
                Theme::Dark => onedark::$name,
                Theme::Light => onelight::$name,
            };
            rgb(r, g, b)
        }
    };
}

theme_color!(RED);
theme_color!(GREEN);
theme_color!(YELLOW);
theme_color!(BLUE);
theme_color!(MAGENTA);
theme_color!(CYAN);
theme_color!(GRAY);
theme_color!(BRIGHT_CYAN);

// ═══════════════════════════════════════════════════════════════════════════
// CORE UTILITIES
// ═══════════════════════════════════════════════════════════════════════════

/// Check if colors should be used (TTY detection)
pub fn use_colors() -> bool {
    // Respect NO_COLOR standard
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    atty::is(atty::Stream::Stdout)
}

/// Apply theme color with optional modifiers
pub fn themed(color_fn: fn() -> String, modifiers: &[&str], text: &str) -> String {
    if use_colors() {
        format!("{}{}{}{}", modifiers.join(""), color_fn(), text, RESET)
    } else {
        text.to_string()
    }
}

/// Escape codes for a border, or nothing on a plain terminal
fn border(color_fn: fn() -> String) -> (String, &'static str) {
    if use_colors() {
        (color_fn(), RESET)
    } else {
        (String::new(), "")
    }
}

/// Calculate visible length (excluding ANSI codes)
pub fn visible_len(s: &str) -> usize {
    let mut in_escape = false;
    let mut len = 0;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape && c == 'm' {
            in_escape = false;
        } else if !in_escape {
            len += 1;
        }
    }
    len
}

/// Right-pad a styled string to a fixed visible width
pub fn pad_right(s: &str, width: usize) -> String {
    let visible = visible_len(s);
    if visible >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visible))
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BOX DRAWING
// ═══════════════════════════════════════════════════════════════════════════

/// Print a content line: │ content          │
pub fn row(content: &str) {
    let (b, reset) = border(GRAY);
    let pad = BOX_WIDTH.saturating_sub(visible_len(content));
    println!("{}│{}{}{}{}│{}", b, reset, content, " ".repeat(pad), b, reset);
}

/// Print section header: ┌─ LABEL ──────────┐
pub fn section_top(label: &str) {
    let (b, reset) = border(GRAY);
    let label_part = format!("─ {} ", themed(CYAN, &[BOLD], label));
    let remaining = BOX_WIDTH.saturating_sub(visible_len(&label_part));
    println!(
        "{}┌{}{}{}{}┐{}",
        b,
        reset,
        label_part,
        b,
        "─".repeat(remaining),
        reset
    );
}

/// Print section divider: ├─ LABEL ──────────┤
pub fn section_mid(label: &str) {
    let (b, reset) = border(GRAY);
    let label_part = format!("─ {} ", themed(CYAN, &[BOLD], label));
    let remaining = BOX_WIDTH.saturating_sub(visible_len(&label_part));
    println!(
        "{}├{}{}{}{}┤{}",
        b,
        reset,
        label_part,
        b,
        "─".repeat(remaining),
        reset
    );
}

/// Print section footer: └──────────────────┘
pub fn section_bot() {
    let (b, reset) = border(GRAY);
    println!("{}└{}┘{}", b, "─".repeat(BOX_WIDTH), reset);
}

/// Print double-line header: ╔══════════════════╗
pub fn double_header() {
    let (b, reset) = border(BLUE);
    println!("{}╔{}╗{}", b, "═".repeat(BOX_WIDTH), reset);
}

/// Print double-line footer: ╚══════════════════╝
pub fn double_footer() {
    let (b, reset) = border(BLUE);
    println!("{}╚{}╝{}", b, "═".repeat(BOX_WIDTH), reset);
}

/// Print centered title with bold
pub fn title(text: &str) {
    let (b, reset) = border(BLUE);
    let colored = themed(BRIGHT_CYAN, &[BOLD], text);
    let total_pad = BOX_WIDTH.saturating_sub(visible_len(&colored));
    let left_pad = total_pad / 2;
    let right_pad = total_pad - left_pad;
    println!(
        "{}║{}{}{}{}{}║{}",
        b,
        reset,
        " ".repeat(left_pad),
        colored,
        " ".repeat(right_pad),
        b,
        reset
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// SEMANTIC FORMATTERS
// ═══════════════════════════════════════════════════════════════════════════

/// Target address, zero-padded to the target's pointer width
pub fn address(value: u64, pointer_size: usize) -> String {
    let text = format!("{:#0width$x}", value, width = pointer_size * 2 + 2);
    if value == 0 {
        themed(GRAY, &[], &text)
    } else {
        themed(BLUE, &[], &text)
    }
}

/// Color-coded field kind badge
pub fn kind_badge(kind: Option<FieldKind>) -> String {
    let (label, color): (&str, fn() -> String) = match kind {
        Some(FieldKind::Size) => ("SIZE", MAGENTA),
        Some(FieldKind::Pointer) => ("PTR", BLUE),
        Some(FieldKind::USize) => ("USIZE", GREEN),
        Some(FieldKind::U8) => ("U8", GREEN),
        Some(FieldKind::U16) => ("U16", GREEN),
        Some(FieldKind::U32) => ("U32", GREEN),
        Some(FieldKind::U64) => ("U64", GREEN),
        Some(FieldKind::Inline) => ("INLINE", CYAN),
        Some(FieldKind::Constant) => ("CONST", YELLOW),
        None => ("?", GRAY),
    };
    themed(color, &[], &format!("[{}]", label))
}

/// Color-coded version bump label
pub fn bump_label(bump: Bump) -> String {
    match bump {
        Bump::None => themed(GRAY, &[], "none"),
        Bump::Minor => themed(GREEN, &[BOLD], "minor"),
        Bump::Major => themed(RED, &[BOLD], "major"),
    }
}

/// Pass/fail mark
pub fn status(ok: bool) -> String {
    if ok {
        themed(GREEN, &[BOLD], "✓")
    } else {
        themed(RED, &[BOLD], "✗")
    }
}

/// Dimmed secondary text
pub fn dim(text: &str) -> String {
    themed(GRAY, &[DIM], text)
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_len_no_escapes() {
        assert_eq!(visible_len("hello"), 5);
        assert_eq!(visible_len(""), 0);
    }

    #[test]
    fn test_visible_len_with_escapes() {
        let colored = "\x1b[32mhello\x1b[0m".to_string();
        assert_eq!(visible_len(&colored), 5);
    }

    #[test]
    fn test_rgb_format() {
        let code = rgb(255, 128, 64);
        assert_eq!(code, "\x1b[38;2;255;128;64m");
    }

    #[test]
    fn test_theme_colors_are_different() {
        assert_ne!(onedark::RED, onelight::RED);
        assert_ne!(onedark::GREEN, onelight::GREEN);
        assert_ne!(onedark::BLUE, onelight::BLUE);
    }

    #[test]
    fn test_address_padding() {
        assert_eq!(visible_len(&address(0x10, 4)), 10);
        assert_eq!(visible_len(&address(0x10, 8)), 18);
    }

    #[test]
    fn test_pad_right() {
        assert_eq!(pad_right("ab", 4), "ab  ");
        assert_eq!(pad_right("abcdef", 4), "abcdef");
    }
}
