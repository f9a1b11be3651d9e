//! Panel 1, Tickers: entry line, tracked list with cache indicators, last load summary.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use rebaselab_runner::{Dashboard, NO_TICKERS_MESSAGE};

use crate::app::{AppState, EntryMode};
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let mut lines: Vec<Line> = Vec::new();

    // Entry line
    let hints = match app.entry_mode {
        EntryMode::Ticker => "  [Enter]add [^D]directory [^L]load [^X]clear [^E]export",
        EntryMode::Directory => "  [Enter]set cache and export directory [^D]cancel",
    };
    lines.push(Line::from(vec![
        Span::styled(format!("{}: ", app.entry_mode.label()), theme::muted()),
        Span::styled("> ", theme::accent()),
        Span::styled(app.input.as_str(), theme::accent_bold()),
        Span::styled("_", theme::accent()),
        Span::styled(hints, theme::muted()),
    ]));
    lines.push(Line::from(""));

    // Window and cache
    let (start, end) = app.window();
    lines.push(Line::from(vec![
        Span::styled("Window: ", theme::muted()),
        Span::styled(format!("{start} to {end}"), theme::neutral()),
        Span::styled("  Cache: ", theme::muted()),
        Span::styled(app.cache.cache_dir().display().to_string(), theme::neutral()),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Benchmark: ", theme::muted()),
        Span::styled(
            format!("{} ({})", app.config.benchmark.label, app.config.benchmark.symbol),
            theme::warning(),
        ),
        Span::styled("  Align: ", theme::muted()),
        Span::styled(app.config.align.label(), theme::neutral()),
    ]));
    lines.push(Line::from(""));

    // Tracked list
    let tickers = app.session.tickers();
    if tickers.is_empty() {
        lines.push(Line::from(Span::styled(NO_TICKERS_MESSAGE, theme::muted())));
    } else {
        lines.push(Line::from(Span::styled(
            format!("Tracked ({})", tickers.len()),
            theme::accent_bold(),
        )));
        for ticker in tickers {
            let cached = app.cache_status.get(ticker).copied().unwrap_or(false);
            let (dot, dot_style) = if cached {
                ("●", theme::positive())
            } else {
                ("○", theme::muted())
            };
            let mut spans = vec![
                Span::raw("  "),
                Span::styled(dot, dot_style),
                Span::raw(" "),
                Span::styled(format!("{ticker:<10}"), theme::accent()),
            ];
            if let Some(dashboard) = &app.dashboard {
                // A ticker equal to the benchmark symbol lives in the benchmark column.
                let label = if *ticker == app.config.benchmark.symbol {
                    app.config.benchmark.label.as_str()
                } else {
                    ticker.as_str()
                };
                spans.extend(result_spans(dashboard, label));
            }
            lines.push(Line::from(spans));
        }
    }

    if let Some(dashboard) = &app.dashboard {
        lines.push(Line::from(""));
        summary_lines(&mut lines, dashboard, &app.config.benchmark.label);
    }

    f.render_widget(Paragraph::new(lines), area);
}

/// Total change and source for a ticker, or why it was excluded.
fn result_spans<'a>(dashboard: &Dashboard, label: &str) -> Vec<Span<'a>> {
    if let Some(col) = dashboard.table.column(label) {
        let total = col.values.last().copied().unwrap_or(0.0);
        let source = dashboard
            .source_of(label)
            .map(|s| s.label())
            .unwrap_or("-");
        return vec![
            Span::styled(format!("{total:>+10.2}%"), theme::change(total)),
            Span::styled(format!("  {source}"), theme::muted()),
        ];
    }
    match dashboard.excluded.iter().find(|e| e.symbol == label) {
        Some(exclusion) => vec![Span::styled(
            format!("  excluded: {}", exclusion.error),
            theme::negative(),
        )],
        None => Vec::new(),
    }
}

fn summary_lines(lines: &mut Vec<Line<'_>>, dashboard: &Dashboard, benchmark: &str) {
    let table = &dashboard.table;
    lines.push(Line::from(Span::styled("Last load", theme::accent_bold())));
    lines.push(Line::from(vec![
        Span::styled("  Trading days: ", theme::muted()),
        Span::styled(table.row_count().to_string(), theme::accent()),
        Span::styled("  Range: ", theme::muted()),
        Span::styled(
            format!("{} to {}", table.first_date(), table.last_date()),
            theme::accent(),
        ),
    ]));

    if let Some(bench) = table.column(benchmark) {
        let total = bench.values.last().copied().unwrap_or(0.0);
        lines.push(Line::from(vec![
            Span::styled(format!("  {}: ", bench.label), theme::warning()),
            Span::styled(format!("{total:+.2}%"), theme::change(total)),
        ]));
    }

    if !dashboard.excluded.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("  Excluded: ", theme::muted()),
            Span::styled(dashboard.excluded_symbols().join(", "), theme::negative()),
        ]));
    }
}
