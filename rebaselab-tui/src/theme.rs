//! Neon-on-charcoal palette and the style helpers the panels draw with.
//!
//! # Color Palette
//! - **Accent**: Electric cyan (focus, titles, entry line)
//! - **Positive**: Neon green (gains, cached symbols)
//! - **Negative**: Hot pink (losses, errors)
//! - **Warning**: Neon orange (warnings, the benchmark line)
//! - **Neutral**: Cool purple (secondary info)
//! - **Muted**: Steel blue (hints, axis labels)

use ratatui::style::{Color, Modifier, Style};

pub const ACCENT: Color = Color::Rgb(0, 255, 255);
pub const POSITIVE: Color = Color::Rgb(0, 255, 128);
pub const NEGATIVE: Color = Color::Rgb(255, 20, 147);
pub const WARNING: Color = Color::Rgb(255, 140, 0);
pub const NEUTRAL: Color = Color::Rgb(147, 112, 219);
pub const MUTED: Color = Color::Rgb(100, 149, 237);

/// Line colors for ticker series, cycled in column order.
/// The benchmark is always drawn in [`WARNING`] so it stands apart.
pub const SERIES: [Color; 6] = [
    ACCENT,
    POSITIVE,
    NEGATIVE,
    NEUTRAL,
    Color::Rgb(255, 255, 0),
    Color::Rgb(255, 255, 255),
];

pub fn accent() -> Style {
    Style::default().fg(ACCENT)
}

pub fn accent_bold() -> Style {
    accent().add_modifier(Modifier::BOLD)
}

pub fn positive() -> Style {
    Style::default().fg(POSITIVE)
}

pub fn negative() -> Style {
    Style::default().fg(NEGATIVE)
}

pub fn warning() -> Style {
    Style::default().fg(WARNING)
}

pub fn neutral() -> Style {
    Style::default().fg(NEUTRAL)
}

pub fn muted() -> Style {
    Style::default().fg(MUTED)
}

pub fn panel_border(active: bool) -> Style {
    if active {
        accent()
    } else {
        muted()
    }
}

pub fn panel_title(active: bool) -> Style {
    if active {
        accent_bold()
    } else {
        muted()
    }
}

/// Style for a percent change (gains green, losses pink).
pub fn change(value: f64) -> Style {
    if value >= 0.0 {
        positive()
    } else {
        negative()
    }
}

/// Line color for the `index`-th ticker column.
pub fn series_color(index: usize) -> Color {
    SERIES[index % SERIES.len()]
}
