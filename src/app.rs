use crate::audio::{AudioEngine, NullAudioEngine, RodioAudioEngine};
use crate::config;
use crate::core::{Directive, PlayerCore};
use crate::model::Track;
use crate::search::{SearchCommand, SearchEvent, SearchWorker};
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::time::{Duration, Instant};

const SEEK_STEP: Duration = Duration::from_secs(5);
const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Default)]
pub struct StartupOptions {
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    Playlist,
    Search,
}

/// Catalog results and the in-flight request marker. Only the newest
/// request's generation is accepted back; older responses are dropped.
pub struct SearchPanel {
    pub results: Vec<Track>,
    pub cursor: usize,
    pub last_query: String,
    next_generation: u64,
    pending: Option<u64>,
}

impl SearchPanel {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            cursor: 0,
            last_query: String::new(),
            next_generation: 0,
            pending: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn begin_query(&mut self, text: &str, limit: u8) -> SearchCommand {
        self.next_generation += 1;
        self.pending = Some(self.next_generation);
        self.last_query = text.to_string();
        SearchCommand::Query {
            generation: self.next_generation,
            text: text.to_string(),
            limit,
        }
    }

    fn begin_trending(&mut self, limit: u8) -> SearchCommand {
        self.next_generation += 1;
        self.pending = Some(self.next_generation);
        self.last_query = String::from("(trending)");
        SearchCommand::Trending {
            generation: self.next_generation,
            limit,
        }
    }
}

impl Default for SearchPanel {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ViewState {
    pub focus: PanelFocus,
    pub playlist_cursor: usize,
    pub input_mode: bool,
    pub input: String,
}

impl ViewState {
    fn new() -> Self {
        Self {
            focus: PanelFocus::Playlist,
            playlist_cursor: 0,
            input_mode: false,
            input: String::new(),
        }
    }
}

pub fn run(options: StartupOptions) -> Result<()> {
    let mut state = config::load_state()?;
    if options.endpoint.is_some() {
        state.search_endpoint = options.endpoint;
    }
    let mut core = PlayerCore::from_persisted(state);

    let mut audio: Box<dyn AudioEngine> = match RodioAudioEngine::new() {
        Ok(engine) => Box::new(engine),
        Err(_) => {
            core.set_status("No audio output device, running silent");
            Box::new(NullAudioEngine::new())
        }
    };
    audio.set_volume(core.volume);

    let worker = SearchWorker::spawn(core.search_endpoint.as_deref())?;
    let mut search = SearchPanel::new();
    let mut view = ViewState::new();

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_tick = Instant::now();
    let mut playlist_rect = ratatui::prelude::Rect::default();

    let result: Result<()> = loop {
        maybe_handle_track_end(&mut core, &mut *audio);
        while let Some(event) = worker.try_recv_event() {
            handle_search_event(&mut core, &mut search, event);
        }

        if core.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| {
                playlist_rect = crate::ui::playlist_rect(frame.area());
                crate::ui::draw(frame, &core, &*audio, &search, &view)
            })?;
            core.dirty = false;
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let event = event::read()?;
        if let Event::Mouse(mouse) = event {
            handle_mouse(&mut core, &mut view, mouse, playlist_rect);
            continue;
        }

        let Event::Key(key) = event else {
            continue;
        };

        if key.kind != KeyEventKind::Press {
            continue;
        }

        if view.input_mode {
            match key.code {
                KeyCode::Esc => {
                    view.input_mode = false;
                    view.input.clear();
                    core.dirty = true;
                }
                KeyCode::Enter => {
                    let query = view.input.trim().to_string();
                    view.input_mode = false;
                    view.input.clear();
                    if query.is_empty() {
                        core.set_status("Empty search");
                    } else {
                        worker.submit(search.begin_query(&query, core.search_limit));
                        view.focus = PanelFocus::Search;
                        core.set_status(&format!("Searching for \"{query}\""));
                    }
                }
                KeyCode::Backspace => {
                    view.input.pop();
                    core.dirty = true;
                }
                KeyCode::Char(ch) => {
                    view.input.push(ch);
                    core.dirty = true;
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break Ok(()),
            KeyCode::Tab => {
                view.focus = match view.focus {
                    PanelFocus::Playlist => PanelFocus::Search,
                    PanelFocus::Search => PanelFocus::Playlist,
                };
                core.dirty = true;
            }
            KeyCode::Down => {
                move_cursor(&mut core, &mut view, &mut search, 1);
            }
            KeyCode::Up => {
                move_cursor(&mut core, &mut view, &mut search, -1);
            }
            KeyCode::Enter => match view.focus {
                PanelFocus::Playlist => {
                    if let Some(id) = core
                        .playlist
                        .at(view.playlist_cursor)
                        .map(|track| track.id.clone())
                    {
                        let directive = core.select_track(&id);
                        apply_directive(&mut core, &mut *audio, directive);
                    }
                }
                PanelFocus::Search => {
                    if let Some(track) = search.results.get(search.cursor).cloned() {
                        core.append_track(track);
                    }
                }
            },
            KeyCode::Char('d') => {
                if view.focus == PanelFocus::Playlist
                    && let Some(id) = core
                        .playlist
                        .at(view.playlist_cursor)
                        .map(|track| track.id.clone())
                {
                    let directive = core.remove_track(&id);
                    apply_directive(&mut core, &mut *audio, directive);
                    clamp_playlist_cursor(&core, &mut view);
                }
            }
            KeyCode::Char(' ') => {
                let directive = core.toggle_play();
                apply_directive(&mut core, &mut *audio, directive);
            }
            KeyCode::Char('n') => {
                let directive = core.forward();
                apply_directive(&mut core, &mut *audio, directive);
            }
            KeyCode::Char('b') => {
                let elapsed = audio.position().unwrap_or(Duration::ZERO);
                let directive = core.backward(elapsed);
                apply_directive(&mut core, &mut *audio, directive);
            }
            KeyCode::Char('s') => {
                let directive = core.toggle_shuffle();
                apply_directive(&mut core, &mut *audio, directive);
                clamp_playlist_cursor(&core, &mut view);
            }
            KeyCode::Char('r') => core.cycle_repeat(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                core.set_volume(core.volume + VOLUME_STEP);
                audio.set_volume(core.volume);
            }
            KeyCode::Char('-') => {
                core.set_volume(core.volume - VOLUME_STEP);
                audio.set_volume(core.volume);
            }
            KeyCode::Left => seek_relative(&mut core, &mut *audio, false),
            KeyCode::Right => seek_relative(&mut core, &mut *audio, true),
            KeyCode::Char('/') => {
                view.input_mode = true;
                view.input.clear();
                core.dirty = true;
            }
            KeyCode::Char('t') => {
                worker.submit(search.begin_trending(core.search_limit));
                view.focus = PanelFocus::Search;
                core.set_status("Loading trending tracks");
            }
            _ => {}
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    worker.shutdown();
    let save_result = config::save_state(&core.persisted_state());
    result?;
    save_result?;
    Ok(())
}

/// Translate one playback decision into calls on the media handle.
fn apply_directive(core: &mut PlayerCore, audio: &mut dyn AudioEngine, directive: Directive) {
    match directive {
        Directive::None => {}
        Directive::Load { src, autoplay } => {
            if let Err(err) = audio.load(&src, autoplay) {
                core.playing = false;
                core.set_status(&format!("playback error: {err:#}"));
            } else {
                audio.set_volume(core.volume);
            }
        }
        Directive::Restart { autoplay } => {
            if let Err(err) = audio.restart(autoplay) {
                core.playing = false;
                core.set_status(&format!("playback error: {err:#}"));
            }
        }
        Directive::Resume => {
            // After a fresh start the persisted current track was never
            // handed to the engine; first resume loads it instead.
            let stale = match core.current_track() {
                Some(track) => audio.current_src() != Some(track.src.as_str()),
                None => false,
            };
            if stale {
                let src = core
                    .current_track()
                    .map(|track| track.src.clone())
                    .unwrap_or_default();
                if let Err(err) = audio.load(&src, true) {
                    core.playing = false;
                    core.set_status(&format!("playback error: {err:#}"));
                } else {
                    audio.set_volume(core.volume);
                }
            } else {
                audio.resume();
            }
        }
        Directive::Pause => audio.pause(),
        Directive::Stop => audio.stop(),
    }
}

fn maybe_handle_track_end(core: &mut PlayerCore, audio: &mut dyn AudioEngine) {
    if audio.current_src().is_none() || audio.is_paused() || !audio.is_finished() {
        return;
    }

    let directive = core.handle_track_end();
    apply_directive(core, audio, directive);
}

fn handle_search_event(core: &mut PlayerCore, search: &mut SearchPanel, event: SearchEvent) {
    match event {
        SearchEvent::Results { generation, tracks } => {
            if search.pending != Some(generation) {
                return;
            }
            search.pending = None;
            search.cursor = 0;
            core.set_status(&format!("{} result(s)", tracks.len()));
            search.results = tracks;
        }
        SearchEvent::Failed {
            generation,
            message,
        } => {
            if search.pending != Some(generation) {
                return;
            }
            search.pending = None;
            core.set_status(&format!("search failed: {message}"));
        }
    }
}

fn seek_relative(core: &mut PlayerCore, audio: &mut dyn AudioEngine, forward: bool) {
    let Some(position) = audio.position() else {
        return;
    };

    let target = if forward {
        let stepped = position.saturating_add(SEEK_STEP);
        match audio.duration() {
            Some(duration) => stepped.min(duration),
            None => stepped,
        }
    } else {
        position.saturating_sub(SEEK_STEP)
    };

    if let Err(err) = audio.seek_to(target) {
        core.set_status(&format!("seek error: {err:#}"));
    } else {
        core.dirty = true;
    }
}

fn move_cursor(core: &mut PlayerCore, view: &mut ViewState, search: &mut SearchPanel, delta: i32) {
    match view.focus {
        PanelFocus::Playlist => {
            let len = core.playlist.len();
            if len == 0 {
                return;
            }
            view.playlist_cursor = step_index(view.playlist_cursor, len, delta);
        }
        PanelFocus::Search => {
            let len = search.results.len();
            if len == 0 {
                return;
            }
            search.cursor = step_index(search.cursor, len, delta);
        }
    }
    core.dirty = true;
}

fn step_index(index: usize, len: usize, delta: i32) -> usize {
    if delta > 0 {
        (index + 1).min(len - 1)
    } else {
        index.saturating_sub(1)
    }
}

fn clamp_playlist_cursor(core: &PlayerCore, view: &mut ViewState) {
    let len = core.playlist.len();
    if len == 0 {
        view.playlist_cursor = 0;
    } else if view.playlist_cursor >= len {
        view.playlist_cursor = len - 1;
    }
}

fn handle_mouse(
    core: &mut PlayerCore,
    view: &mut ViewState,
    mouse: MouseEvent,
    playlist_rect: ratatui::prelude::Rect,
) {
    if !point_in_rect(mouse.column, mouse.row, playlist_rect) {
        return;
    }
    let len = core.playlist.len();
    if len == 0 {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            view.playlist_cursor = step_index(view.playlist_cursor, len, 1);
            view.focus = PanelFocus::Playlist;
            core.dirty = true;
        }
        MouseEventKind::ScrollUp => {
            view.playlist_cursor = step_index(view.playlist_cursor, len, -1);
            view.focus = PanelFocus::Playlist;
            core.dirty = true;
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: ratatui::prelude::Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}
