use anyhow::Result;
use charges_dashboard::{Bin, Dashboard, DashboardView, FileSource, Record};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph,
        Row, Table, TableState,
    },
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Records,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Records,
            Page::Records => Page::Overview,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Records => "Records",
        }
    }
}

pub struct App {
    pub dashboard: Dashboard,
    pub source: FileSource,
    pub state: TableState,
    pub current_page: Page,
    pub status: String,
    pub status_is_error: bool,
}

impl App {
    pub fn new(dashboard: Dashboard, source: FileSource) -> Self {
        let mut state = TableState::default();
        if dashboard.view().map(|v| !v.records().is_empty()).unwrap_or(false) {
            state.select(Some(0));
        }

        Self {
            dashboard,
            source,
            state,
            current_page: Page::Overview,
            status: String::from("Ready"),
            status_is_error: false,
        }
    }

    pub fn view(&self) -> Option<&Arc<DashboardView>> {
        self.dashboard.view()
    }

    fn record_count(&self) -> usize {
        self.view().map(|v| v.records().len()).unwrap_or(0)
    }

    /// Re-run the pipeline; stale charts stay up if it fails
    pub fn refresh(&mut self) {
        match self.dashboard.refresh(&self.source) {
            Ok(view) => {
                self.status = format!(
                    "Refreshed: {} records ({} warnings)",
                    view.metrics.total_count,
                    view.snapshot.warnings.len()
                );
                self.status_is_error = false;

                let len = view.records().len();
                match self.state.selected() {
                    Some(i) if i < len => {}
                    _ if len > 0 => self.state.select(Some(0)),
                    _ => self.state.select(None),
                }
            }
            Err(e) => {
                self.status = format!("Refresh failed: {}", e);
                self.status_is_error = true;
            }
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn next(&mut self) {
        let len = self.record_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.record_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.record_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 20).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = match self.state.selected() {
            Some(i) => i.saturating_sub(20),
            None => 0,
        };
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        // Redrawn on every event, resize included
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(())
                }
                KeyCode::Char('r') => app.refresh(),
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    let len = app.record_count();
                    if len > 0 {
                        app.state.select(Some(len - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with metrics
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let view = app.view().cloned();
    match view {
        None => render_no_data(f, chunks[1]),
        Some(view) => match app.current_page {
            Page::Overview => render_overview(f, chunks[1], &view),
            Page::Records => render_table(f, chunks[1], &view, &mut app.state),
        },
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];
    for (i, page) in [Page::Overview, Page::Records].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    if let Some(view) = app.view() {
        let m = &view.metrics;
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Records: {}", m.total_count),
            Style::default().fg(Color::White),
        ));
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Mean charge: ${:.2}", m.mean_charge),
            Style::default().fg(Color::Green),
        ));
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Mean BMI: {:.2}", m.mean_bmi),
            Style::default().fg(Color::Cyan),
        ));
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Smokers: {:.1}%", m.smoker_percent),
            Style::default().fg(Color::Red),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_no_data(f: &mut Frame, area: Rect) {
    let message = Paragraph::new("No data loaded. Press r to retry.").block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Dashboard "),
    );
    f.render_widget(message, area);
}

fn render_overview(f: &mut Frame, area: Rect, view: &DashboardView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    render_scatter(f, rows[0], view.records());
    render_region_bars(f, bottom[0], view);
    render_age_area(f, bottom[1], &view.age_bins.bins);
}

/// (bmi, charges) points split into smokers and non-smokers; NaN points are skipped
pub fn scatter_points(records: &[Record]) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let mut smokers = Vec::new();
    let mut non_smokers = Vec::new();

    for r in records {
        if r.bmi.is_nan() || r.charges.is_nan() {
            continue;
        }
        if r.is_smoker {
            smokers.push((r.bmi, r.charges));
        } else {
            non_smokers.push((r.bmi, r.charges));
        }
    }

    (smokers, non_smokers)
}

/// Padded [min, max] over the finite values, [0, 1] when there are none
pub fn axis_bounds<I: IntoIterator<Item = f64>>(values: I) -> [f64; 2] {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if min > max {
        return [0.0, 1.0];
    }
    if min == max {
        return [min - 1.0, max + 1.0];
    }

    let pad = (max - min) * 0.05;
    [min - pad, max + pad]
}

/// One point per bin at its midpoint, for the area chart
pub fn area_points(bins: &[Bin]) -> Vec<(f64, f64)> {
    bins.iter()
        .map(|b| ((b.lower_bound + b.upper_bound) / 2.0, b.mean_value))
        .collect()
}

fn bound_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    vec![
        Span::raw(format!("{:.0}", bounds[0])),
        Span::raw(format!("{:.0}", mid)),
        Span::raw(format!("{:.0}", bounds[1])),
    ]
}

fn render_scatter(f: &mut Frame, area: Rect, records: &[Record]) {
    let (smokers, non_smokers) = scatter_points(records);

    let x_bounds = axis_bounds(smokers.iter().chain(&non_smokers).map(|p| p.0));
    let y_bounds = axis_bounds(smokers.iter().chain(&non_smokers).map(|p| p.1));

    let datasets = vec![
        Dataset::default()
            .name("Non-smoker")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Cyan))
            .data(&non_smokers),
        Dataset::default()
            .name("Smoker")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Red))
            .data(&smokers),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" BMI vs Charges "),
        )
        .x_axis(
            Axis::default()
                .title("BMI")
                .style(Style::default().fg(Color::DarkGray))
                .bounds(x_bounds)
                .labels(bound_labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title("Charges")
                .style(Style::default().fg(Color::DarkGray))
                .bounds(y_bounds)
                .labels(bound_labels(y_bounds)),
        );

    f.render_widget(chart, area);
}

fn render_region_bars(f: &mut Frame, area: Rect, view: &DashboardView) {
    let bars: Vec<Bar> = view
        .groups
        .iter()
        .map(|g| {
            let value = if g.mean_value.is_finite() { g.mean_value.max(0.0) } else { 0.0 };
            Bar::default()
                .value(value.round() as u64)
                .label(Line::from(g.key.clone()))
                .text_value(format!("{:.0}", g.mean_value))
                .style(Style::default().fg(Color::Yellow))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Mean Charges by Region "),
        )
        .bar_width(10)
        .bar_gap(2)
        .value_style(Style::default().fg(Color::Black).bg(Color::Yellow))
        .data(BarGroup::default().bars(&bars));

    f.render_widget(chart, area);
}

fn render_age_area(f: &mut Frame, area: Rect, bins: &[Bin]) {
    let points = area_points(bins);

    let x_bounds = match (bins.first(), bins.last()) {
        (Some(first), Some(last)) => [first.lower_bound, last.upper_bound],
        _ => [0.0, 1.0],
    };
    let top = axis_bounds(points.iter().map(|p| p.1))[1];
    let y_bounds = [0.0, top.max(1.0)];

    let datasets = vec![Dataset::default()
        .name("Mean charges")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&points)];

    let x_labels = bins
        .iter()
        .map(|b| Span::raw(format!("{:.0}", b.lower_bound)))
        .chain(bins.last().map(|b| Span::raw(format!("{:.0}", b.upper_bound))))
        .collect::<Vec<_>>();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Mean Charges by Age "),
        )
        .x_axis(
            Axis::default()
                .title("Age")
                .style(Style::default().fg(Color::DarkGray))
                .bounds(x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds(y_bounds)
                .labels(bound_labels(y_bounds)),
        );

    f.render_widget(chart, area);
}

fn format_number(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.*}", decimals, value)
    }
}

fn render_table(f: &mut Frame, area: Rect, view: &DashboardView, state: &mut TableState) {
    let header_cells = ["Age", "Sex", "BMI", "Children", "Smoker", "Region", "Charges"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = view.records().iter().map(|r| {
        let color = if r.is_smoker { Color::Red } else { Color::White };
        let charges_style = if r.charges.is_nan() {
            Style::default().fg(Color::Magenta)
        } else {
            Style::default().fg(color)
        };

        let cells = vec![
            Cell::from(format_number(r.age, 0)),
            Cell::from(r.sex.clone()),
            Cell::from(format_number(r.bmi, 2)),
            Cell::from(format_number(r.children, 0)),
            Cell::from(if r.is_smoker { "yes" } else { "no" }).style(Style::default().fg(color)),
            Cell::from(r.region.clone()),
            Cell::from(format_number(r.charges, 2)).style(charges_style),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(9),
            Constraint::Length(7),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Records "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.record_count();

    let status_color = if app.status_is_error { Color::Red } else { Color::Green };

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, total),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled(app.status.clone(), Style::default().fg(status_color)),
        Span::raw(" | "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" Refresh | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use charges_dashboard::{DashboardConfig, InMemorySource};

    #[test]
    fn test_scatter_points_split_by_smoker() {
        let records = vec![
            Record::new(20.0, 25.0, 1000.0, true, "a"),
            Record::new(30.0, 30.0, 2000.0, false, "a"),
            Record::new(40.0, f64::NAN, 3000.0, false, "a"),
        ];

        let (smokers, non_smokers) = scatter_points(&records);

        assert_eq!(smokers, vec![(25.0, 1000.0)]);
        assert_eq!(non_smokers, vec![(30.0, 2000.0)]);
    }

    #[test]
    fn test_axis_bounds() {
        assert_eq!(axis_bounds(Vec::<f64>::new()), [0.0, 1.0]);
        assert_eq!(axis_bounds(vec![5.0]), [4.0, 6.0]);
        assert_eq!(axis_bounds(vec![0.0, 100.0, f64::NAN]), [-5.0, 105.0]);
    }

    #[test]
    fn test_area_points_use_bin_midpoints() {
        let bins = vec![
            Bin { lower_bound: 18.0, upper_bound: 25.0, mean_value: 100.0, count: 1 },
            Bin { lower_bound: 25.0, upper_bound: 35.0, mean_value: 0.0, count: 0 },
        ];

        assert_eq!(area_points(&bins), vec![(21.5, 100.0), (30.0, 0.0)]);
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Overview.next(), Page::Records);
        assert_eq!(Page::Records.next(), Page::Overview);
    }

    #[test]
    fn test_failed_refresh_sets_error_status() {
        let mut dashboard = Dashboard::new(DashboardConfig::default());
        let data = InMemorySource::new(
            "memory",
            "age,sex,bmi,children,smoker,region,charges\n22,female,25,0,no,north,2000\n",
        );
        dashboard.refresh(&data).unwrap();

        let mut app = App::new(dashboard, FileSource::new("does/not/exist.csv"));
        assert_eq!(app.state.selected(), Some(0));

        app.refresh();

        assert!(app.status_is_error);
        assert!(app.status.starts_with("Refresh failed"));
        assert_eq!(app.record_count(), 1);
    }
}
