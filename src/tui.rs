use std::{
    io::{Stdout, stdout},
    panic::{self, AssertUnwindSafe},
    time::{Duration, Instant},
};

use color_eyre::Result;
use crossbeam::channel::{Receiver, unbounded};
use eyre::WrapErr;
use log::{error, info, warn};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    crossterm::{
        event::{
            DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind, poll,
            read,
        },
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    layout::Flex,
    prelude::*,
    widgets::{Block, Clear, FrameExt, LineGauge, Paragraph, Wrap},
};
use ratatui_explorer::{FileExplorer, Theme as ExplorerTheme};
use tui_big_text::{BigText, PixelSize};

use crate::{
    app::{App, format_time},
    builtin_themes::Theme,
    config::Config,
    handles::MediaRegistry,
    intake::IntakeFile,
    media::{MediaSignal, PlayerRemote},
    position::KeyValueFile,
    store::{FsBlobStore, MemoryBlobStore, PersistenceWorker},
    visualizer::CanvasView,
};

type Tui = Terminal<CrosstermBackend<Stdout>>;
type LiveApp = App<PlayerRemote, MediaRegistry, KeyValueFile>;

const SEEK_STEP: f64 = 5.0;
const VOLUME_STEP: f32 = 0.05;
const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// What a file chosen in the explorer is for.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PickTarget {
    Audio,
    Background,
    Replace,
}

struct Ui {
    app: LiveApp,
    explorer: FileExplorer,
    picker: Option<PickTarget>,
    media_events: Receiver<MediaSignal>,
    frame_interval: Duration,
    ticks: usize,
    quit: bool,
}

impl Ui {
    fn new(app: LiveApp, explorer: FileExplorer, media_events: Receiver<MediaSignal>, fps: u32) -> Self {
        Self {
            app,
            explorer,
            picker: None,
            media_events,
            frame_interval: Duration::from_secs(1) / fps.max(1),
            ticks: 0,
            quit: false,
        }
    }

    fn run(mut self, terminal: &mut Tui) -> Result<()> {
        let mut next_frame = Instant::now();
        while !self.quit {
            while let Ok(signal) = self.media_events.try_recv() {
                self.app.handle_media_event(signal);
            }
            self.app.pump_store();

            let now = Instant::now();
            if now >= next_frame {
                self.app.tick_frames();
                self.ticks = self.ticks.wrapping_add(1);
                terminal.draw(|f| self.draw(f))?;
                next_frame += self.frame_interval;
                if next_frame < now {
                    next_frame = now + self.frame_interval;
                }
            }

            // event reader
            if poll(next_frame.saturating_duration_since(Instant::now()))? {
                let event = read()?;
                self.handle_event(&event)?;
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Paste(text) => {
                if let Some(file) = IntakeFile::from_paste(text) {
                    self.take(file);
                }
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if self.picker.is_some() {
                    return self.handle_picker_key(key, event);
                }
                if self.app.is_replace_open() {
                    self.handle_replace_key(key);
                } else {
                    self.handle_key(key);
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn handle_key(&mut self, key: &KeyEvent) {
        let loaded = self.app.is_loaded();
        match key.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Char(' ') => self.app.toggle_play(),
            KeyCode::Left => self.app.seek_by(-SEEK_STEP),
            KeyCode::Right => self.app.seek_by(SEEK_STEP),
            KeyCode::Up => self.app.nudge_volume(VOLUME_STEP),
            KeyCode::Down => self.app.nudge_volume(-VOLUME_STEP),
            KeyCode::Char('m') => self.app.toggle_mute(),
            KeyCode::Char('r') => self.app.toggle_repeat(),
            KeyCode::Char('o') => self.picker = Some(PickTarget::Audio),
            KeyCode::Char('b') if loaded => self.picker = Some(PickTarget::Background),
            KeyCode::Char('n') if loaded => self.app.open_replace(),
            KeyCode::Char('x') if loaded => self.app.reset(),
            _ => (),
        }
    }

    fn handle_replace_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Esc => self.app.cancel_replace(),
            KeyCode::Char('o') | KeyCode::Enter => self.picker = Some(PickTarget::Replace),
            KeyCode::Char('q') => self.quit = true,
            _ => (),
        }
    }

    fn handle_picker_key(&mut self, key: &KeyEvent, event: &Event) -> Result<()> {
        match key.code {
            KeyCode::Esc => self.picker = None,
            KeyCode::Enter if self.explorer.current().is_file() => {
                let file = IntakeFile::from_path(self.explorer.current().path().clone());
                self.take(file);
            }
            _ => self.explorer.handle(event)?,
        }
        Ok(())
    }

    /// Routes a chosen or dropped file to where it was asked for.
    fn take(&mut self, file: IntakeFile) {
        let taken = match self.picker.take() {
            Some(PickTarget::Background) => self.app.intake_image(&file),
            Some(PickTarget::Replace) => self.app.replace(&file),
            Some(PickTarget::Audio) | None => self.app.drop_file(&file),
        };
        if !taken {
            info!("{} was not used", file.name);
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        let theme = *self.app.theme();

        if self.app.loading() {
            self.render_loading(f, area, &theme);
            return;
        }

        self.app.background_mut().render(area, f.buffer_mut(), theme.background);

        let [top, stage, name, controls] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(6),
        ])
        .areas(area);

        self.render_top_bar(f, top, &theme);
        f.render_widget(CanvasView::new(self.app.visualizer().canvas(), theme.background), stage);
        self.render_name(f, name, &theme);
        self.render_controls(f, controls, &theme);

        if self.app.is_replace_open() {
            self.render_replace_modal(f, area, &theme);
        }
        // render explorer
        if let Some(target) = self.picker {
            let area = Self::popup_area(area, 50, 70);
            f.render_widget(Clear, area);
            f.render_widget_ref(self.explorer.widget(), area);
            let hint = match target {
                PickTarget::Audio | PickTarget::Replace => " pick a track · esc closes ",
                PickTarget::Background => " pick a background · esc closes ",
            };
            let [hint_area] = Layout::vertical([Constraint::Length(1)])
                .flex(Flex::End)
                .areas(area);
            f.render_widget(
                Line::from(hint).alignment(Alignment::Center).fg(theme.highlight),
                hint_area,
            );
        }
    }

    fn render_loading(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        f.render_widget(Block::new().bg(theme.background), area);
        let [center] = Layout::vertical([Constraint::Length(1)])
            .flex(Flex::Center)
            .areas(area);
        let spinner = SPINNER[(self.ticks / 4) % SPINNER.len()];
        f.render_widget(
            Line::from(spinner).alignment(Alignment::Center).fg(theme.foreground),
            center,
        );
    }

    fn render_top_bar(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let key = |k: &'static str| Span::styled(k, Style::default().fg(theme.highlight).bold());
        let label = |l: &'static str| Span::styled(l, Style::default().fg(theme.foreground));
        let mut spans = vec![key(" o"), label(" open  ")];
        if self.app.is_loaded() {
            spans.extend([
                key("n"),
                label(" new track  "),
                key("b"),
                label(" background  "),
                key("x"),
                label(" reset  "),
            ]);
        }
        spans.extend([key("q"), label(" quit")]);
        f.render_widget(Line::from(spans), area);
    }

    fn render_name(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let text = marquee(self.app.label(), usize::from(area.width), self.ticks / 8);
        f.render_widget(
            Line::from(text)
                .alignment(Alignment::Center)
                .style(Style::default().fg(theme.foreground).bold()),
            area,
        );
    }

    fn render_controls(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let state = self.app.state();
        let [time, gauge, buttons] = Layout::vertical([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        let elapsed = BigText::builder()
            .pixel_size(PixelSize::Quadrant)
            .style(Style::default().fg(theme.foreground))
            .alignment(Alignment::Center)
            .lines(vec![format_time(state.current_time).into()])
            .build();
        f.render_widget(elapsed, time);

        let gauge_label = format!(
            "{} / {}",
            format_time(state.current_time),
            format_time(state.duration)
        );
        f.render_widget(
            LineGauge::default()
                .filled_style(Style::default().fg(theme.highlight))
                .unfilled_style(Style::default().fg(theme.foreground).dim())
                .label(gauge_label)
                .ratio(state.progress()),
            gauge,
        );

        let on = Style::default().fg(theme.highlight).bold();
        let off = Style::default().fg(theme.foreground);
        let play = if state.is_playing { "⏸ pause" } else { "▶ play" };
        let volume = if state.is_muted || state.volume <= 0.0 {
            "🔇 muted".to_string()
        } else {
            format!("🔊 {:>3.0}%", state.volume * 100.0)
        };
        let repeat_style = if state.is_repeating { on } else { off };
        let line = Line::from(vec![
            Span::styled("⟳ repeat", repeat_style),
            Span::raw("   "),
            Span::styled(play, on),
            Span::raw("   "),
            Span::styled(volume, off),
        ])
        .alignment(Alignment::Center);
        f.render_widget(line, buttons);
    }

    fn render_replace_modal(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let area = Self::popup_area(area, 40, 30);
        f.render_widget(Clear, area);
        let block = Block::bordered()
            .title(" New track ")
            .style(Style::default().bg(theme.background).fg(theme.foreground));
        let text = vec![
            Line::from("Drop an audio file here,"),
            Line::from("or press o to browse."),
            Line::from(""),
            Line::from("esc cancels").dim(),
        ];
        f.render_widget(
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block),
            area,
        );
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
        let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
        let [area] = vertical.areas(area);
        let [area] = horizontal.areas(area);
        area
    }
}

/// Scrolls `text` through `width` columns when it does not fit.
fn marquee(text: &str, width: usize, step: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= width || width == 0 {
        return text.to_string();
    }
    let mut looped = chars.clone();
    looped.extend("   ".chars());
    let start = step % looped.len();
    looped.iter().cycle().skip(start).take(width).collect()
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().wrap_err("enabling raw mode")?;
    execute!(stdout(), EnterAlternateScreen, EnableBracketedPaste).wrap_err("entering alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn explorer_theme(theme: &Theme) -> ExplorerTheme {
    ExplorerTheme::default()
        .add_default_title()
        .with_block(Block::bordered())
        .with_style(Style::default().bg(theme.background).fg(theme.foreground))
        .with_item_style(Style::default().fg(theme.foreground))
        .with_dir_style(Style::default().fg(theme.highlight))
        .with_highlight_item_style(Style::default().fg(theme.background).bg(theme.highlight))
        .with_highlight_dir_style(Style::default().fg(theme.background).bg(theme.highlight))
}

/// Builds everything one UI session needs, restoring from storage.
fn run_session(terminal: &mut Tui, config: &Config) -> Result<()> {
    let data_dir = config.data_dir()?;
    let registry = MediaRegistry::new();
    let (events_tx, events_rx) = unbounded::<MediaSignal>();
    let player = PlayerRemote::spawn(registry.clone(), events_tx)?;

    let worker = match FsBlobStore::open(data_dir.join("blobs"), config.max_blob_bytes) {
        Ok(store) => PersistenceWorker::spawn(store)?,
        Err(err) => {
            warn!("{err}; nothing will be saved this session");
            PersistenceWorker::spawn(MemoryBlobStore::new(config.max_blob_bytes))?
        }
    };
    let positions = KeyValueFile::open(data_dir.join("local_storage.toml"));

    let mut app = App::new(player, registry, positions, worker, config);
    app.restore();
    let explorer = FileExplorer::with_theme(explorer_theme(app.theme()))?;
    Ui::new(app, explorer, events_rx, config.fps).run(terminal)
}

/// Shown after a session panicked. Returns whether to start a fresh one.
fn recovery_screen(terminal: &mut Tui) -> Result<bool> {
    terminal.clear()?;
    loop {
        terminal.draw(|f| {
            let area = f.area();
            let [center] = Layout::vertical([Constraint::Length(3)])
                .flex(Flex::Center)
                .areas(area);
            let text = vec![
                Line::from("Something went wrong.").bold(),
                Line::from(""),
                Line::from("r reload   q quit"),
            ];
            f.render_widget(Paragraph::new(text).alignment(Alignment::Center), center);
        })?;
        if let Event::Key(key) = read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('r') => return Ok(true),
                KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
                _ => (),
            }
        }
    }
}

fn supervise(terminal: &mut Tui, config: &Config) -> Result<()> {
    loop {
        match panic::catch_unwind(AssertUnwindSafe(|| run_session(terminal, config))) {
            Ok(result) => return result,
            Err(_) => {
                if !recovery_screen(terminal)? {
                    return Ok(());
                }
                info!("starting a fresh session");
            }
        }
    }
}

pub fn run(config: &Config) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(|info| error!("ui panicked: {info}")));
    let result = supervise(&mut terminal, config);
    panic::set_hook(previous_hook);
    restore_terminal(&mut terminal)?;
    result
}
