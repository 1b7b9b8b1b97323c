use crate::app::{App, LEGEND_WIDTH};
use crate::braille::BrailleCanvas;
use crate::classify::group_thousands;
use crate::map::MapLayers;
use crate::style::parse_hex;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

const YEAR_BAR_PREFIX: &str = " Fiscal year: ";

/// Terminal color for a CSS hex color; unparseable colors render gray
fn terminal_color(hex: &str) -> Color {
    parse_hex(hex).map_or(Color::Gray, |(r, g, b)| Color::Rgb(r, g, b))
}

/// Column ranges `[start, end)` of each year button in the year bar
pub fn year_button_ranges(years: &[i32]) -> Vec<(u16, u16, i32)> {
    let mut col = YEAR_BAR_PREFIX.chars().count() as u16;
    years
        .iter()
        .map(|&year| {
            let width = format!(" {year} ").chars().count() as u16;
            let range = (col, col + width, year);
            col += width + 1;
            range
        })
        .collect()
}

/// Year whose button covers column `col`
pub fn year_at(years: &[i32], col: u16) -> Option<i32> {
    year_button_ranges(years)
        .into_iter()
        .find(|&(start, end, _)| col >= start && col < end)
        .map(|(_, _, year)| year)
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Year controls
            Constraint::Min(3),    // Map and legend
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(LEGEND_WIDTH)])
        .split(rows[1]);

    render_year_controls(frame, app, rows[0]);
    render_map(frame, app, body[0]);
    render_legend(frame, app, body[1]);
    render_status_bar(frame, app, rows[2]);
}

fn render_year_controls(frame: &mut Frame, app: &App, area: Rect) {
    let active = app.active_year();
    let mut spans = vec![Span::styled(YEAR_BAR_PREFIX, Style::default().fg(Color::DarkGray))];

    for (i, &year) in app.years.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        let style = if Some(year) == active {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray).bg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {year} "), style));
    }

    if app.years.is_empty() {
        spans.push(Span::styled("no years in lookup table", Style::default().fg(Color::Red)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.active_year() {
        Some(year) => format!(" SNAP households by county, FY{year} "),
        None => " SNAP households by county ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    if !app.renderer.has_data() {
        let notice = Paragraph::new("No county geometry loaded (see counties_path in config)")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(notice, inner);
        return;
    }

    let mut viewport = app.viewport.clone();
    // Braille gives 2x4 resolution per character
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    let layers = app
        .renderer
        .render(inner.width as usize, inner.height as usize, &viewport);
    frame.render_widget(MapWidget { layers }, inner);
}

/// Stacks the color layers; later layers win a shared cell
struct MapWidget {
    layers: MapLayers,
}

impl MapWidget {
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (row_idx, row_str) in canvas.rows().enumerate() {
            if row_idx >= area.height as usize {
                break;
            }
            let y = area.y + row_idx as u16;

            for (col_idx, ch) in row_str.chars().enumerate() {
                if col_idx >= area.width as usize {
                    break;
                }
                if ch == '\u{2800}' {
                    continue;
                }
                let x = area.x + col_idx as u16;
                buf[(x, y)].set_char(ch).set_fg(color);
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for (color, canvas) in &self.layers.fills {
            Self::render_layer(canvas, terminal_color(color), area, buf);
        }
        Self::render_layer(&self.layers.outlines, Color::DarkGray, area, buf);
    }
}

fn render_legend(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(" Households ", Style::default().fg(Color::Cyan)));

    let lines: Vec<Line> = match app.style.as_ref().and_then(|s| s.classification.as_ref()) {
        Some(classification) => classification
            .legend()
            .into_iter()
            .zip(classification.bucket_counts())
            .map(|(entry, count)| {
                Line::from(vec![
                    Span::styled("██ ", Style::default().fg(terminal_color(&entry.color))),
                    Span::raw(entry.label),
                    Span::styled(format!(" ({count})"), Style::default().fg(Color::DarkGray)),
                ])
            })
            .collect(),
        None => vec![Line::from(Span::styled(
            "No data for this year",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);
    let counties = app.style.as_ref().map_or(0, |s| s.county_count());

    let mut spans = vec![
        Span::styled(" Counties: ", dim),
        Span::styled(group_thousands(counties as u64), Style::default().fg(Color::Yellow)),
        Span::styled(" Zoom: ", dim),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", dim),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
    ];

    if let Some((key, value)) = app.hovered() {
        spans.push(Span::styled(" | ", dim));
        spans.push(Span::styled(
            format!("{key}: {}", group_thousands(value.round() as u64)),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
    }

    let settings = &app.renderer.settings;
    spans.push(Span::styled(
        if settings.show_outlines { " [B]orders" } else { " [b]orders" },
        Style::default().fg(if settings.show_outlines { Color::Green } else { Color::DarkGray }),
    ));
    spans.push(Span::styled(
        " | ←/→:year hjkl:pan +/-:zoom r:reset q:quit",
        dim,
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_button_hit_testing() {
        let years = [2020, 2021, 2022];
        let ranges = year_button_ranges(&years);
        let prefix = YEAR_BAR_PREFIX.chars().count() as u16;
        assert_eq!(ranges[0], (prefix, prefix + 6, 2020));
        assert_eq!(ranges[1], (prefix + 7, prefix + 13, 2021));

        assert_eq!(year_at(&years, prefix), Some(2020));
        assert_eq!(year_at(&years, prefix + 6), None);
        assert_eq!(year_at(&years, prefix + 8), Some(2021));
        assert_eq!(year_at(&years, 0), None);
        assert_eq!(year_at(&years, 200), None);
    }

    #[test]
    fn test_terminal_color() {
        assert_eq!(terminal_color("#8e342e"), Color::Rgb(0x8e, 0x34, 0x2e));
        assert_eq!(terminal_color("nope"), Color::Gray);
    }
}
