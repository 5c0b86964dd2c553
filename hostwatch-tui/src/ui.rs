use crate::app::{App, Tab};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    match app.current_tab {
        Tab::Monitoring => draw_monitoring(f, app, chunks[1]),
        Tab::Logs => draw_logs(f, app, chunks[1]),
    }
    draw_footer(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles = vec!["Monitoring (1)", "Logs (2)"];
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("System Health and SSH Monitoring"),
        )
        .select(app.get_tab_index())
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn breach_color(breached: bool) -> Color {
    if breached {
        Color::Red
    } else {
        Color::Green
    }
}

fn draw_monitoring(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    draw_health_indicators(f, app, chunks[0]);

    let security = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);

    draw_open_ports(f, app, security[0]);
    draw_insecure_files(f, app, security[1]);
}

fn draw_health_indicators(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(22),
            Constraint::Percentage(22),
            Constraint::Percentage(22),
            Constraint::Percentage(34),
        ])
        .split(area);

    let Some(snapshot) = &app.snapshot else {
        let waiting = Paragraph::new("Calculating...")
            .block(Block::default().borders(Borders::ALL).title("System Health"))
            .alignment(Alignment::Center);
        f.render_widget(waiting, area);
        return;
    };

    let thresholds = &app.config.thresholds;
    let gauges = [
        ("CPU", snapshot.cpu_pct, thresholds.cpu_pct, app.breaches.cpu),
        ("Memory", snapshot.memory_pct, thresholds.memory_pct, app.breaches.memory),
        ("Disk", snapshot.disk_pct, thresholds.disk_pct, app.breaches.disk),
    ];

    for (i, (title, value, limit, breached)) in gauges.into_iter().enumerate() {
        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} (>{}%)", title, limit)),
            )
            .gauge_style(Style::default().fg(breach_color(breached)))
            .percent(value.clamp(0.0, 100.0) as u16)
            .label(format!("{:.1}%", value));
        f.render_widget(gauge, chunks[i]);
    }

    let network = Paragraph::new(format!(
        "Sent: {:.2} MB/s  Recv: {:.2} MB/s",
        snapshot.sent_mbps, snapshot.recv_mbps
    ))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Network (>{:.1} MB/s)", thresholds.network_mbps)),
    )
    .style(Style::default().fg(breach_color(app.breaches.network)))
    .alignment(Alignment::Center);
    f.render_widget(network, chunks[3]);
}

fn draw_open_ports(f: &mut Frame, app: &App, area: Rect) {
    let text = app
        .scan
        .as_ref()
        .map_or("Scanning...".to_string(), |scan| scan.open_ports.clone());

    let para = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Open Ports"))
        .wrap(Wrap { trim: false });
    f.render_widget(para, area);
}

fn draw_insecure_files(f: &mut Frame, app: &App, area: Rect) {
    let (title, items): (String, Vec<ListItem>) = match &app.scan {
        Some(scan) => (
            format!(
                "Insecure Files ({}) - scanned {}",
                scan.insecure_files.len(),
                scan.scanned_at
                    .with_timezone(&chrono::Local)
                    .format("%H:%M:%S")
            ),
            scan.insecure_files
                .iter()
                .skip(app.scroll_offset)
                .map(|path| ListItem::new(path.display().to_string()))
                .collect(),
        ),
        None => ("Insecure Files".to_string(), Vec::new()),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(Color::Yellow));
    f.render_widget(list, area);
}

fn draw_logs(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    draw_log_tail(f, "Warnings Log", &app.warning_tail, Color::Red, chunks[0]);
    draw_log_tail(f, "Network Log", &app.network_tail, Color::Gray, chunks[1]);
}

fn draw_log_tail(f: &mut Frame, title: &str, lines: &[String], color: Color, area: Rect) {
    // Newest lines at the bottom, as many as fit
    let visible = area.height.saturating_sub(2) as usize;
    let skip = lines.len().saturating_sub(visible);

    let items: Vec<ListItem> = lines[skip..]
        .iter()
        .map(|line| ListItem::new(line.as_str()).style(Style::default().fg(color)))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({} lines)", title, lines.len())),
    );
    f.render_widget(list, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(": Quit  "),
        Span::styled("Tab/1/2", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(": Switch tab  "),
        Span::styled("↑↓/PgUp/PgDn", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(": Scroll insecure files  "),
    ];

    if app.monitor_stopped {
        spans.push(Span::styled(
            "monitor stopped",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    } else {
        spans.push(Span::raw(format!("logs: {}", app.config.log_dir.display())));
    }

    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}
