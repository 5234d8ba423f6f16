//! Ratatui-based review interface wired to the background resolve worker.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::model::types::{ConversationKey, TagPriority};
use crate::search::debounce::{ChangeKind, Debouncer};
use crate::search::filter::DateRange;
use crate::search::query::{FilterParams, Scope};
use crate::search::worker::{GenerationCounter, SearchWorker};
use crate::session::ReviewSession;
use crate::ui::colors::{KeywordList, RowColorPolicy};
use crate::ui::components::theme::{ConfiguredTheme, ThemePalette, ThemePreset, readable_fg};
use crate::ui::shortcuts;
use crate::ui::table::{CellRole, Column, DisplayModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputMode {
    Browse,
    Search,
    DateFrom,
    DateTo,
    Tag,
    Untag,
    Note,
}

impl InputMode {
    fn prompt(self) -> &'static str {
        match self {
            Self::Browse => "",
            Self::Search => "Search",
            Self::DateFrom => "From (YYYY-MM-DD)",
            Self::DateTo => "To (YYYY-MM-DD)",
            Self::Tag => "Add tag",
            Self::Untag => "Remove tag",
            Self::Note => "Conversation note",
        }
    }
}

fn help_lines(palette: ThemePalette) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    let add_section = |title: &str, items: &[String]| -> Vec<Line<'static>> {
        let mut v = Vec::new();
        v.push(Line::from(Span::styled(title.to_string(), palette.title())));
        for item in items {
            v.push(Line::from(format!("  {item}")));
        }
        v.push(Line::from(""));
        v
    };

    lines.extend(add_section(
        "Search",
        &[
            format!("{} focuses the search box; results update as you type", shortcuts::FOCUS_SEARCH),
            format!("{} toggles whole-word matching", shortcuts::WHOLE_WORD),
        ],
    ));
    lines.extend(add_section(
        "Filters",
        &[
            format!(
                "{} / {} cycle the conversation scope",
                shortcuts::SCOPE_NEXT,
                shortcuts::SCOPE_PREV
            ),
            format!(
                "{} from | {} to (inclusive, empty clears)",
                shortcuts::DATE_FROM,
                shortcuts::DATE_TO
            ),
            format!("{} search all conversations", shortcuts::SEARCH_ALL),
            format!("{} clear all filters", shortcuts::CLEAR_FILTERS),
        ],
    ));
    lines.extend(add_section(
        "Highlighting",
        &[
            format!("{} cycle keyword list", shortcuts::KEYWORD_LIST),
            format!("{} sender colors", shortcuts::SENDER_COLORS),
            format!("{} theme", shortcuts::THEME),
        ],
    ));
    lines.extend(add_section(
        "Review",
        &[
            format!(
                "{} add tag | {} remove tag | {} toggle CSAM/Evidence/Of Interest",
                shortcuts::TAG,
                shortcuts::UNTAG,
                shortcuts::QUICK_TAGS
            ),
            format!("{} edit the conversation note", shortcuts::NOTE),
            format!("{} reload the source files", shortcuts::RELOAD),
        ],
    ));
    lines.extend(add_section(
        "Navigation",
        &[
            format!(
                "Up/Down move | {} | {} / {}",
                shortcuts::PAGE,
                shortcuts::JUMP_TOP,
                shortcuts::JUMP_BOTTOM
            ),
            format!("{} quit", shortcuts::QUIT),
        ],
    ));

    lines
}

fn render_help_overlay(frame: &mut Frame, palette: ThemePalette, scroll: u16) {
    let popup_area = centered_rect(70, 70, frame.area());
    let block = Block::default()
        .title(Span::styled("Help / Shortcuts", palette.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));

    frame.render_widget(ratatui::widgets::Clear, popup_area);
    frame.render_widget(
        Paragraph::new(help_lines(palette))
            .block(block)
            .wrap(Wrap { trim: true })
            .scroll((scroll, 0)),
        popup_area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub fn footer_legend(show_help: bool) -> &'static str {
    if show_help {
        "Esc close help • Up/Down scroll"
    } else {
        "F1 help | / search | F3 scope | F4 word | F5/F6 dates | F7 all | F9 keywords | t tag | n note | Ctrl+L clear | Esc quit"
    }
}

fn column_widths() -> [Constraint; 10] {
    Column::ALL.map(|c| match c {
        Column::Time => Constraint::Length(19),
        Column::Sender | Column::Receiver | Column::Tags => Constraint::Length(14),
        Column::Message => Constraint::Min(24),
        Column::Content => Constraint::Length(12),
        Column::Source => Constraint::Length(8),
        Column::Ip => Constraint::Length(15),
        Column::Port | Column::Line => Constraint::Length(6),
    })
}

fn parse_date_input(raw: &str) -> Option<Option<NaiveDate>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(Some)
}

struct App<'a> {
    session: &'a ReviewSession,
    worker: SearchWorker,
    model: DisplayModel,
    debouncer: Debouncer<FilterParams>,
    params: FilterParams,
    scopes: Vec<Scope>,
    scope_idx: usize,
    keyword_idx: Option<usize>,
    preset: ThemePreset,
    theme: ConfiguredTheme,
    input_mode: InputMode,
    input_buffer: String,
    selected: usize,
    offset: usize,
    status: String,
    show_help: bool,
    help_scroll: u16,
}

impl<'a> App<'a> {
    fn new(session: &'a ReviewSession) -> Self {
        let config = &session.config;
        let generations = GenerationCounter::new();
        let worker = SearchWorker::new(
            Arc::clone(&session.store),
            Arc::clone(&session.engine),
            generations.clone(),
            config.worker_grace(),
        );
        let mut model = DisplayModel::new(generations, RowColorPolicy::from_config(config));
        model.replace(session.engine.clear_filters(&session.store.read()));

        let keyword_idx = config
            .active_keyword_list
            .as_deref()
            .and_then(|name| config.keyword_lists.iter().position(|l| l.name == name));
        let preset = ThemePreset::default();

        let mut app = Self {
            session,
            worker,
            model,
            debouncer: Debouncer::from_config(config),
            params: FilterParams::new().keyword_list(config.active_keyword_list.clone()),
            scopes: Vec::new(),
            scope_idx: 0,
            keyword_idx,
            preset,
            theme: ConfiguredTheme::new(preset.to_palette(), &config.colors),
            input_mode: InputMode::Browse,
            input_buffer: String::new(),
            selected: 0,
            offset: 0,
            status: String::new(),
            show_help: false,
            help_scroll: 0,
        };
        app.refresh_scopes();
        app.clamp_selection();
        app.status = format!(
            "{} messages in {} conversations - {} for help",
            app.model.message_count(),
            app.scopes.len().saturating_sub(1),
            shortcuts::HELP
        );
        app
    }

    fn refresh_scopes(&mut self) {
        let store = self.session.store.read();
        self.scopes = std::iter::once(Scope::All)
            .chain(store.keys().iter().cloned().map(Scope::Conversation))
            .collect();
        self.scope_idx = self
            .scopes
            .iter()
            .position(|s| s == &self.params.scope)
            .unwrap_or(0);
        self.params.scope = self.scopes[self.scope_idx].clone();
    }

    fn schedule(&mut self, kind: ChangeKind) {
        self.debouncer
            .schedule(self.params.clone(), kind, Instant::now());
    }

    fn clamp_selection(&mut self) {
        let rows = self.model.row_count();
        if rows == 0 {
            self.selected = 0;
            return;
        }
        self.selected = self.selected.min(rows - 1);
        self.selected = self
            .model
            .next_selectable(self.selected, true)
            .or_else(|| self.model.next_selectable(self.selected, false))
            .unwrap_or(0);
    }

    fn move_selection(&mut self, delta: isize) {
        let rows = self.model.row_count();
        if rows == 0 {
            return;
        }
        let target = (self.selected as isize + delta).clamp(0, rows as isize - 1) as usize;
        let forward = delta >= 0;
        self.selected = self
            .model
            .next_selectable(target, forward)
            .or_else(|| self.model.next_selectable(target, !forward))
            .unwrap_or(self.selected);
    }

    fn selected_message(&self) -> Option<(ConversationKey, String)> {
        let store = self.session.store.read();
        self.model
            .message_at(&store, self.selected)
            .map(|(key, m)| (key, m.msg_id.clone()))
    }

    fn apply_policy(&mut self) {
        let keywords = self.keyword_idx.and_then(|i| {
            self.session
                .config
                .keyword_lists
                .get(i)
                .map(KeywordList::from_config)
        });
        self.params.keyword_list = keywords.as_ref().map(|k| k.name.clone());
        let policy = self.model.policy().clone().with_keywords(keywords);
        self.model.set_policy(policy);
    }

    fn clear_filters(&mut self) {
        self.debouncer.cancel();
        let keyword_list = self.params.keyword_list.clone();
        self.params = FilterParams::new().keyword_list(keyword_list);
        self.scope_idx = 0;
        let snapshot = self.session.engine.clear_filters(&self.session.store.read());
        self.model.replace(snapshot);
        self.clamp_selection();
        self.status = format!("Filters cleared - {} messages", self.model.message_count());
    }

    fn reload(&mut self) {
        match self.session.reload() {
            Ok(()) => {
                self.refresh_scopes();
                self.schedule(ChangeKind::Scope);
                self.status = "Reloaded source files".into();
            }
            Err(err) => {
                tracing::warn!(error = %err, "reload failed");
                self.status = format!("Reload failed: {err}");
            }
        }
    }

    fn toggle_tag(&mut self, tag: &str) {
        let Some((_, msg_id)) = self.selected_message() else {
            return;
        };
        let tagged = self
            .session
            .store
            .read()
            .find(&msg_id)
            .is_some_and(|m| m.tags.contains(tag));
        let result = if tagged {
            self.session.untag(&msg_id, tag)
        } else {
            self.session.tag(&msg_id, tag)
        };
        self.status = match result {
            Ok(_) if tagged => format!("Removed '{tag}' from {msg_id}"),
            Ok(_) => format!("Tagged {msg_id} '{tag}'"),
            Err(err) => format!("Tag failed: {err}"),
        };
    }

    fn commit_input(&mut self) {
        let input = std::mem::take(&mut self.input_buffer);
        match self.input_mode {
            InputMode::Tag | InputMode::Untag => {
                if let Some((_, msg_id)) = self.selected_message()
                    && !input.trim().is_empty()
                {
                    let result = if self.input_mode == InputMode::Tag {
                        self.session.tag(&msg_id, &input)
                    } else {
                        self.session.untag(&msg_id, &input)
                    };
                    self.status = match result {
                        Ok(true) => format!("Updated tags on {msg_id}"),
                        Ok(false) => format!("No change to tags on {msg_id}"),
                        Err(err) => format!("Tag failed: {err}"),
                    };
                }
            }
            InputMode::Note => {
                if let Some((key, _)) = self.selected_message() {
                    self.status = match self.session.note(&key, &input) {
                        Ok(()) => format!("Saved note for {key}"),
                        Err(err) => format!("Note failed: {err}"),
                    };
                }
            }
            InputMode::DateFrom | InputMode::DateTo => {
                if parse_date_input(&input).is_none() {
                    self.status = format!("Invalid date '{input}', expected YYYY-MM-DD");
                }
            }
            InputMode::Search | InputMode::Browse => {}
        }
        self.input_mode = InputMode::Browse;
    }

    /// Live updates for inputs that drive the search.
    fn input_changed(&mut self) {
        match self.input_mode {
            InputMode::Search => {
                self.params.set_text(&self.input_buffer);
                self.schedule(ChangeKind::Text);
            }
            InputMode::DateFrom | InputMode::DateTo => {
                if let Some(date) = parse_date_input(&self.input_buffer) {
                    let DateRange { from, to } = self.params.dates;
                    self.params.dates = if self.input_mode == InputMode::DateFrom {
                        DateRange::new(date, to)
                    } else {
                        DateRange::new(from, date)
                    };
                    self.schedule(ChangeKind::Date);
                }
            }
            _ => {}
        }
    }

    fn start_input(&mut self, mode: InputMode) {
        self.input_buffer = match mode {
            InputMode::Search => self.params.text().to_string(),
            InputMode::DateFrom => self
                .params
                .dates
                .from
                .map(|d| d.to_string())
                .unwrap_or_default(),
            InputMode::DateTo => self
                .params
                .dates
                .to
                .map(|d| d.to_string())
                .unwrap_or_default(),
            InputMode::Note => self
                .selected_message()
                .and_then(|(key, _)| {
                    self.session
                        .store
                        .read()
                        .note(&key)
                        .map(str::to_string)
                })
                .unwrap_or_default(),
            _ => String::new(),
        };
        self.input_mode = mode;
    }

    /// Returns `false` when the user asked to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return false;
        }

        if self.show_help {
            match key.code {
                KeyCode::Esc | KeyCode::F(1) => {
                    self.show_help = false;
                    self.help_scroll = 0;
                }
                KeyCode::Up => self.help_scroll = self.help_scroll.saturating_sub(1),
                KeyCode::Down => self.help_scroll = self.help_scroll.saturating_add(1),
                _ => {}
            }
            return true;
        }

        if self.input_mode != InputMode::Browse {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.commit_input(),
                KeyCode::Backspace => {
                    self.input_buffer.pop();
                    self.input_changed();
                }
                KeyCode::Char(c) => {
                    self.input_buffer.push(c);
                    self.input_changed();
                }
                _ => {}
            }
            return true;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc | KeyCode::F(10) | KeyCode::Char('q') => return false,
            KeyCode::Char('l') if ctrl => self.clear_filters(),
            KeyCode::Char('r') if ctrl => self.reload(),
            KeyCode::F(1) => self.show_help = true,
            KeyCode::F(2) => {
                self.preset = self.preset.next();
                self.theme = self.theme.with_palette(self.preset.to_palette());
                self.status = format!("Theme: {}", self.preset.name());
            }
            KeyCode::F(3) => {
                let len = self.scopes.len().max(1);
                self.scope_idx = if key.modifiers.contains(KeyModifiers::SHIFT) {
                    (self.scope_idx + len - 1) % len
                } else {
                    (self.scope_idx + 1) % len
                };
                self.params.scope = self.scopes.get(self.scope_idx).cloned().unwrap_or_default();
                self.schedule(ChangeKind::Scope);
            }
            KeyCode::F(4) => {
                self.params.whole_word = !self.params.whole_word;
                self.schedule(ChangeKind::Text);
            }
            KeyCode::F(5) => self.start_input(InputMode::DateFrom),
            KeyCode::F(6) => self.start_input(InputMode::DateTo),
            KeyCode::F(7) => {
                self.params.search_all = !self.params.search_all;
                self.schedule(ChangeKind::Scope);
            }
            KeyCode::F(8) => {
                let mut policy = self.model.policy().clone();
                policy.sender_colors = !policy.sender_colors;
                self.model.set_policy(policy);
            }
            KeyCode::F(9) => {
                let lists = self.session.config.keyword_lists.len();
                self.keyword_idx = match self.keyword_idx {
                    None if lists > 0 => Some(0),
                    Some(i) if i + 1 < lists => Some(i + 1),
                    _ => None,
                };
                self.apply_policy();
            }
            KeyCode::Char('/') => self.start_input(InputMode::Search),
            KeyCode::Char('t') => self.start_input(InputMode::Tag),
            KeyCode::Char('u') => self.start_input(InputMode::Untag),
            KeyCode::Char('n') => self.start_input(InputMode::Note),
            KeyCode::Char('1') => self.toggle_tag(TagPriority::CSAM),
            KeyCode::Char('2') => self.toggle_tag(TagPriority::EVIDENCE),
            KeyCode::Char('3') => self.toggle_tag(TagPriority::OF_INTEREST),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-20),
            KeyCode::PageDown => self.move_selection(20),
            KeyCode::Home => {
                self.selected = 0;
                self.clamp_selection();
            }
            KeyCode::End => {
                self.selected = self.model.row_count().saturating_sub(1);
                self.move_selection(0);
            }
            _ => {}
        }
        true
    }

    /// Fire due requests and accept finished results. Returns `true` if anything
    /// visible changed.
    fn tick(&mut self) -> bool {
        let mut changed = false;
        if let Some(params) = self.debouncer.poll(Instant::now()) {
            let generation = self.worker.submit(params);
            tracing::debug!(generation, "resolve_submitted");
            self.status = "Searching...".into();
            changed = true;
        }
        if let Some(outcome) = self.worker.try_recv() {
            if self.model.apply(outcome.generation, outcome.list) {
                self.clamp_selection();
                self.status = match outcome.source {
                    Some(source) => format!(
                        "{} messages ({}, {} ms)",
                        self.model.message_count(),
                        source.as_str().replace('_', " "),
                        outcome.elapsed.as_millis()
                    ),
                    None => "Search failed; see log for details".into(),
                };
            }
            changed = true;
        }
        changed
    }

    fn filter_line(&self) -> Line<'static> {
        let palette = self.theme.palette;
        let mut spans = vec![
            Span::styled("Search: ", palette.hint_style()),
            Span::raw(self.params.text().to_string()),
        ];
        if self.params.whole_word {
            spans.push(Span::styled(" [word]", palette.title()));
        }
        spans.push(Span::styled("  Scope: ", palette.hint_style()));
        spans.push(Span::raw(self.params.scope.label()));
        if self.params.search_all {
            spans.push(Span::styled(" [all]", palette.title()));
        }
        let DateRange { from, to } = self.params.dates;
        if from.is_some() || to.is_some() {
            spans.push(Span::styled("  Dates: ", palette.hint_style()));
            spans.push(Span::raw(format!(
                "{} .. {}",
                from.map(|d| d.to_string()).unwrap_or_default(),
                to.map(|d| d.to_string()).unwrap_or_default()
            )));
        }
        if let Some(list) = &self.params.keyword_list {
            spans.push(Span::styled("  Keywords: ", palette.hint_style()));
            spans.push(Span::raw(list.clone()));
        }
        Line::from(spans)
    }

    fn draw(&mut self, frame: &mut Frame) {
        let palette = self.theme.palette;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let top = if self.input_mode == InputMode::Browse {
            Paragraph::new(self.filter_line())
        } else {
            Paragraph::new(Line::from(vec![
                Span::styled(format!("{}: ", self.input_mode.prompt()), palette.title()),
                Span::raw(self.input_buffer.clone()),
            ]))
        };
        frame.render_widget(
            top.block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(if self.input_mode == InputMode::Browse {
                        palette.border_style()
                    } else {
                        palette.border_focus_style()
                    })
                    .title(Span::styled("chatfx", palette.title())),
            ),
            chunks[0],
        );

        let visible = chunks[1].height.saturating_sub(3) as usize;
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if visible > 0 && self.selected >= self.offset + visible {
            self.offset = self.selected + 1 - visible;
        }

        let store = self.session.store.read();
        let end = (self.offset + visible).min(self.model.row_count());
        let rows: Vec<Row> = (self.offset..end)
            .map(|row| {
                let style = if self.model.is_selectable(row) {
                    let bg = self
                        .model
                        .cell(&store, &self.theme, row, 0, CellRole::Background)
                        .and_then(|v| v.as_color())
                        .unwrap_or(palette.bg);
                    Style::default().bg(bg).fg(readable_fg(bg))
                } else {
                    palette.header_row_style()
                };
                let style = if row == self.selected {
                    style.patch(palette.selected_style())
                } else {
                    style
                };
                Row::new(
                    self.model
                        .row_text(&store, &self.theme, row)
                        .into_iter()
                        .map(Cell::from),
                )
                .style(style)
            })
            .collect();
        drop(store);

        let header = Row::new(Column::ALL.map(|c| Cell::from(c.title()))).style(palette.title());
        let title = format!(
            " {} messages / {} rows ",
            self.model.message_count(),
            self.model.row_count()
        );
        frame.render_widget(
            Table::new(rows, column_widths()).header(header).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(palette.border_style())
                    .title(title),
            ),
            chunks[1],
        );

        frame.render_widget(Paragraph::new(self.status.clone()), chunks[2]);
        frame.render_widget(
            Paragraph::new(footer_legend(self.show_help)).style(palette.hint_style()),
            chunks[3],
        );

        if self.show_help {
            render_help_overlay(frame, palette, self.help_scroll);
        }
    }
}

pub fn run_tui(session: &ReviewSession, once: bool) -> Result<()> {
    if once
        && dotenvy::var("CHATFX_TUI_HEADLESS")
            .map(|v| v == "1")
            .unwrap_or(false)
    {
        return run_tui_headless(session);
    }

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session);
    let tick_rate = Duration::from_millis(30);
    let mut last_tick = Instant::now();
    let mut needs_draw = true;

    let result = (|| -> Result<()> {
        loop {
            if needs_draw {
                terminal.draw(|f| app.draw(f))?;
                needs_draw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);
            if event::poll(timeout)?
                && let Event::Key(key) = event::read()?
            {
                needs_draw = true;
                if !app.handle_key(key) {
                    break;
                }
                if once {
                    break;
                }
            }

            if last_tick.elapsed() >= tick_rate {
                needs_draw |= app.tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    })();

    app.worker.shutdown();
    teardown_terminal()?;
    result
}

/// Exercise the resolve pipeline without a terminal.
fn run_tui_headless(session: &ReviewSession) -> Result<()> {
    let mut app = App::new(session);
    app.schedule(ChangeKind::Scope);
    app.tick();
    let outcome = app
        .worker
        .wait(Duration::from_secs(10))
        .context("headless resolve produced no result")?;
    app.model.apply(outcome.generation, outcome.list);
    tracing::info!(
        messages = app.model.message_count(),
        rows = app.model.row_count(),
        "tui_headless_done"
    );
    Ok(())
}

fn teardown_terminal() -> Result<()> {
    let mut stdout = io::stdout();
    disable_raw_mode()?;
    execute!(stdout, LeaveAlternateScreen)?;
    Ok(())
}
