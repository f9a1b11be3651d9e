//! Panel 3, Help: keyboard shortcuts.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::theme;

pub fn render(f: &mut Frame, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    section(&mut lines, "Global");
    key(&mut lines, "Tab / Shift+Tab", "Cycle panels forward / back");
    key(&mut lines, "Ctrl+L / F5", "Load tracked tickers plus the benchmark");
    key(&mut lines, "Ctrl+X", "Clear the tracked list");
    key(&mut lines, "Ctrl+E", "Export the percent-change table as CSV");
    key(&mut lines, "Ctrl+R", "Open error history");
    key(&mut lines, "Esc / Ctrl+C", "Quit");
    lines.push(Line::from(""));

    section(&mut lines, "Panel 1: Tickers");
    key(&mut lines, "type", "Edit the entry line (comma-separated symbols)");
    key(&mut lines, "Enter", "Add the entry to the tracked list");
    key(&mut lines, "Ctrl+D", "Edit the cache and export directory (again to cancel)");
    key(&mut lines, "Backspace", "Delete the last character");
    lines.push(Line::from(""));

    section(&mut lines, "Panel 2: Chart");
    key(&mut lines, "", "Percent change since the first common day");
    lines.push(Line::from(""));

    section(&mut lines, "Error history");
    key(&mut lines, "j / k", "Scroll");
    key(&mut lines, "Esc / Ctrl+R", "Close");

    f.render_widget(Paragraph::new(lines), area);
}

fn section(lines: &mut Vec<Line<'_>>, title: &str) {
    lines.push(Line::from(Span::styled(title.to_string(), theme::accent_bold())));
}

fn key(lines: &mut Vec<Line<'_>>, keys: &str, desc: &str) {
    lines.push(Line::from(vec![
        Span::styled(format!("  {:>16}  ", keys), theme::accent()),
        Span::styled(desc.to_string(), theme::muted()),
    ]));
}
