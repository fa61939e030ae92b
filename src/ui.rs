use crate::app::{PanelFocus, SearchPanel, ViewState};
use crate::audio::AudioEngine;
use crate::core::{PlayerCore, PlayerState};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::time::Duration;

const APP_TITLE: &str = "wavedeck v0.1.0  ";

#[derive(Clone, Copy)]
struct ThemePalette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    focus_border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    selected_bg: Color,
}

fn palette() -> ThemePalette {
    ThemePalette {
        bg: Color::Rgb(10, 15, 24),
        panel_bg: Color::Rgb(19, 29, 43),
        panel_alt_bg: Color::Rgb(24, 38, 58),
        border: Color::Rgb(69, 121, 176),
        focus_border: Color::Rgb(100, 203, 184),
        text: Color::Rgb(214, 228, 248),
        muted: Color::Rgb(149, 173, 204),
        accent: Color::Rgb(100, 203, 184),
        alert: Color::Rgb(249, 174, 88),
        selected_bg: Color::Rgb(34, 55, 82),
    }
}

pub fn playlist_rect(area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
        .split(vertical[1]);

    body[0]
}

pub fn draw(
    frame: &mut Frame,
    core: &PlayerCore,
    audio: &dyn AudioEngine,
    search: &SearchPanel,
    view: &ViewState,
) {
    let colors = palette();
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, core, &colors, vertical[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
        .split(vertical[1]);

    draw_playlist(frame, core, view, &colors, body[0]);
    draw_search(frame, search, view, &colors, body[1]);
    draw_timeline(frame, core, audio, &colors, vertical[2]);
    draw_footer(frame, core, view, &colors, vertical[3]);
}

fn draw_header(frame: &mut Frame, core: &PlayerCore, colors: &ThemePalette, area: Rect) {
    frame.render_widget(
        panel_block("Status", colors.panel_bg, colors.text, colors.border),
        area,
    );

    let inner = area.inner(Margin {
        vertical: 0,
        horizontal: 1,
    });

    let state_label = match core.state() {
        PlayerState::Empty => "Empty",
        PlayerState::Ready => "Ready",
        PlayerState::Playing => "Playing",
    };
    let shuffle_label = if core.shuffle { "Shuffle on" } else { "Shuffle off" };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Tracks {}", core.playlist.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(state_label, Style::default().fg(colors.alert)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(shuffle_label, Style::default().fg(colors.text)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(core.repeat.label(), Style::default().fg(colors.text)),
    ]));
    frame.render_widget(header, inner);
}

fn draw_playlist(
    frame: &mut Frame,
    core: &PlayerCore,
    view: &ViewState,
    colors: &ThemePalette,
    area: Rect,
) {
    let items: Vec<ListItem> = core
        .playlist
        .tracks()
        .iter()
        .enumerate()
        .map(|(position, track)| {
            let marker = if core.current == Some(position) {
                "  > "
            } else {
                "    "
            };
            let title_style = if core.current == Some(position) {
                Style::default().fg(colors.accent)
            } else {
                Style::default().fg(colors.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(track.title.as_str(), title_style),
                Span::styled(
                    format!("  {}", track.artist),
                    Style::default().fg(colors.muted),
                ),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!core.playlist.is_empty()).then_some(view.playlist_cursor));

    let border = if view.focus == PanelFocus::Playlist {
        colors.focus_border
    } else {
        colors.border
    };
    let list = List::new(items)
        .block(panel_block("Playlist", colors.panel_bg, colors.text, border))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_search(
    frame: &mut Frame,
    search: &SearchPanel,
    view: &ViewState,
    colors: &ThemePalette,
    area: Rect,
) {
    let items: Vec<ListItem> = search
        .results
        .iter()
        .map(|track| {
            ListItem::new(Line::from(vec![
                Span::styled(track.title.as_str(), Style::default().fg(colors.text)),
                Span::styled(
                    format!("  {}", track.artist),
                    Style::default().fg(colors.muted),
                ),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!search.results.is_empty()).then_some(search.cursor));

    let title = if search.is_pending() {
        String::from("Search (loading)")
    } else if search.last_query.is_empty() {
        String::from("Search")
    } else {
        format!("Search / {}", search.last_query)
    };

    let border = if view.focus == PanelFocus::Search {
        colors.focus_border
    } else {
        colors.border
    };
    let list = List::new(items)
        .block(panel_block(&title, colors.panel_alt_bg, colors.text, border))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_timeline(
    frame: &mut Frame,
    core: &PlayerCore,
    audio: &dyn AudioEngine,
    colors: &ThemePalette,
    area: Rect,
) {
    let now_playing = core
        .current_track()
        .map(|track| format!("{} - {}", track.artist, track.title))
        .unwrap_or_else(|| String::from("-"));

    let text = format!("{}  |  {}", now_playing, timeline_line(core, audio, 26, 14));
    let block = Paragraph::new(Span::styled(text, Style::default().fg(colors.text)))
        .block(panel_block(
            "Now Playing",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(block, area);
}

fn draw_footer(
    frame: &mut Frame,
    core: &PlayerCore,
    view: &ViewState,
    colors: &ThemePalette,
    area: Rect,
) {
    let line = if view.input_mode {
        Line::from(vec![
            Span::styled(
                "Search: ",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(view.input.as_str(), Style::default().fg(colors.text)),
            Span::styled("_", Style::default().fg(colors.muted)),
        ])
    } else {
        Line::from(vec![
            Span::styled(
                "Keys: Space play, n next, b previous, s shuffle, r repeat, / search, t trending, Enter pick, d remove, Tab panel, Ctrl+C quit",
                Style::default().fg(colors.muted),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(core.status.as_str(), Style::default().fg(colors.text)),
        ])
    };

    let footer = Paragraph::new(line).block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, area);
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn timeline_line(
    core: &PlayerCore,
    audio: &dyn AudioEngine,
    timeline_bar_width: usize,
    volume_bar_width: usize,
) -> String {
    let elapsed = audio.position().unwrap_or(Duration::ZERO);
    let total = audio.duration();
    let ratio = total.and_then(|duration| {
        let total_secs = duration.as_secs_f64();
        (total_secs > 0.0).then_some((elapsed.as_secs_f64() / total_secs).clamp(0.0, 1.0))
    });

    let volume_percent = (core.volume * 100.0).round() as u16;
    let volume_ratio = core.volume.clamp(0.0, 1.0) as f64;

    format!(
        "{} / {} {}  |  Vol {} {:>3}%",
        format_duration(elapsed),
        total
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, timeline_bar_width),
        progress_bar(Some(volume_ratio), volume_bar_width),
        volume_percent
    )
}
