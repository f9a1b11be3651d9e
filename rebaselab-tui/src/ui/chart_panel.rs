//! Panel 2, Chart: percent change vs. date for every column, benchmark included.

use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Chart, Dataset, GraphType, LegendPosition, Paragraph};
use ratatui::Frame;

use rebaselab_core::CombinedTable;

use crate::app::AppState;
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    match &app.dashboard {
        Some(dashboard) if dashboard.table.row_count() > 0 => {
            render_chart(f, area, &dashboard.table, &app.config.benchmark.label)
        }
        _ => render_empty(f, area),
    }
}

fn render_empty(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled("Nothing loaded yet.", theme::muted())),
        Line::from(""),
        Line::from(Span::styled(
            "Add tickers in the Tickers panel and press Ctrl+L to load.",
            theme::muted(),
        )),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

/// `(x, y)` points per column, where x counts calendar days from the first row.
pub fn series_points(table: &CombinedTable) -> Vec<Vec<(f64, f64)>> {
    let first = table.first_date();
    let xs: Vec<f64> = table
        .dates()
        .iter()
        .map(|d| (*d - first).num_days() as f64)
        .collect();
    table
        .columns()
        .iter()
        .map(|col| xs.iter().copied().zip(col.values.iter().copied()).collect())
        .collect()
}

/// Y bounds with 5% padding; never a zero-height range.
pub fn y_bounds(table: &CombinedTable) -> [f64; 2] {
    let (min_y, max_y) = table.value_bounds();
    let padding = ((max_y - min_y).abs() * 0.05).max(1.0);
    [min_y - padding, max_y + padding]
}

/// Line color per column; only the column labeled `benchmark` gets the benchmark color.
pub fn column_colors(table: &CombinedTable, benchmark: &str) -> Vec<Color> {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            if col.label == benchmark {
                theme::WARNING
            } else {
                theme::series_color(i)
            }
        })
        .collect()
}

fn render_chart(f: &mut Frame, area: Rect, table: &CombinedTable, benchmark: &str) {
    let points = series_points(table);
    let colors = column_colors(table, benchmark);

    let datasets: Vec<Dataset> = table
        .columns()
        .iter()
        .zip(points.iter())
        .zip(colors)
        .map(|((col, data), color)| {
            Dataset::default()
                .name(col.label.clone())
                .marker(symbols::Marker::Braille)
                .style(Style::default().fg(color))
                .graph_type(GraphType::Line)
                .data(data)
        })
        .collect();

    let first = table.first_date();
    let last = table.last_date();
    let x_max = ((last - first).num_days() as f64).max(1.0);
    let mid = first + (last - first) / 2;
    let [y_min, y_max] = y_bounds(table);

    let chart = Chart::new(datasets)
        .legend_position(Some(LegendPosition::TopLeft))
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)))
        .x_axis(
            Axis::default()
                .title(Span::styled("Date", theme::muted()))
                .style(theme::muted())
                .bounds([0.0, x_max])
                .labels(vec![
                    Span::styled(first.to_string(), theme::muted()),
                    Span::styled(mid.to_string(), theme::muted()),
                    Span::styled(last.to_string(), theme::muted()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("% change", theme::muted()))
                .style(theme::muted())
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::styled(format!("{y_min:.0}%"), theme::muted()),
                    Span::styled(format!("{:.0}%", (y_min + y_max) / 2.0), theme::muted()),
                    Span::styled(format!("{y_max:.0}%"), theme::muted()),
                ]),
        );

    f.render_widget(chart, area);
}
