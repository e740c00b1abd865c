mod help;

use std::sync::Arc;
use std::{io, time::Duration, time::Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Terminal,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::api::JobApi;
use crate::model::{
    AnalyzerOption, DispatchOutcome, FieldsetOption, Notice, NoticeLevel, Target, UiEvent,
};
use crate::orchestrator::{self, UiCommand};
use crate::picker::{ActiveTab, SelectionState};

struct UiState {
    target: Target,
    selection: SelectionState,
    analyzers: Vec<AnalyzerOption>,
    fieldsets: Vec<FieldsetOption>,
    // Highlight cursor per tab so switching back does not lose the position.
    analyzer_cursor: usize,
    fieldset_cursor: usize,
    loading_lists: bool,
    run_in_flight: bool,
    editing_name: bool,
    show_help: bool,
    status: Option<Notice>,
    // Set when a run completed; the loop exits and these are printed after
    // the terminal is restored.
    closing_notices: Option<Vec<Notice>>,
}

impl UiState {
    fn new(target: Target) -> Self {
        Self {
            target,
            selection: SelectionState::default(),
            analyzers: Vec::new(),
            fieldsets: Vec::new(),
            analyzer_cursor: 0,
            fieldset_cursor: 0,
            loading_lists: true,
            run_in_flight: false,
            editing_name: false,
            show_help: false,
            status: None,
            closing_notices: None,
        }
    }

    fn busy(&self) -> bool {
        self.loading_lists || self.run_in_flight
    }

    fn cursor(&self) -> usize {
        match self.selection.active_tab {
            ActiveTab::Analyzer => self.analyzer_cursor,
            ActiveTab::Fieldset => self.fieldset_cursor,
        }
    }

    fn visible_len(&self) -> usize {
        match self.selection.active_tab {
            ActiveTab::Analyzer => self.analyzers.len(),
            ActiveTab::Fieldset => self.fieldsets.len(),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        let cur = self.cursor() as isize;
        let next = (cur + delta).clamp(0, len as isize - 1) as usize;
        match self.selection.active_tab {
            ActiveTab::Analyzer => self.analyzer_cursor = next,
            ActiveTab::Fieldset => self.fieldset_cursor = next,
        }
    }

    fn pick_highlighted(&mut self) {
        let id = match self.selection.active_tab {
            ActiveTab::Analyzer => self.analyzers.get(self.analyzer_cursor).map(|a| a.id.clone()),
            ActiveTab::Fieldset => self.fieldsets.get(self.fieldset_cursor).map(|f| f.id.clone()),
        };
        if let Some(id) = id {
            self.selection.pick(id);
        }
    }

    /// Label of the currently selected item, for the confirmation banner.
    fn selected_label(&self) -> Option<&str> {
        let id = self.selection.selected.as_deref()?;
        match self.selection.active_tab {
            ActiveTab::Analyzer => self
                .analyzers
                .iter()
                .find(|a| a.id == id)
                .map(|a| a.description.as_str()),
            ActiveTab::Fieldset => self
                .fieldsets
                .iter()
                .find(|f| f.id == id)
                .map(|f| f.name.as_str()),
        }
    }

    fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::ListsLoaded {
                analyzers,
                fieldsets,
            } => {
                self.analyzers = analyzers;
                self.fieldsets = fieldsets;
                self.analyzer_cursor = 0;
                self.fieldset_cursor = 0;
                self.loading_lists = false;
                // A reload can drop the picked item from the list; a vanished
                // id must not stay runnable.
                if let Some(id) = self.selection.selected.clone() {
                    let still_listed = match self.selection.active_tab {
                        ActiveTab::Analyzer => self.analyzers.iter().any(|a| a.id == id),
                        ActiveTab::Fieldset => self.fieldsets.iter().any(|f| f.id == id),
                    };
                    if !still_listed {
                        self.selection.selected = None;
                    }
                }
            }
            UiEvent::ListLoadFailed { error } => {
                self.loading_lists = false;
                self.status = Some(Notice::error(format!(
                    "Loading options failed: {error} (press 'l' to retry)"
                )));
            }
            UiEvent::RunFinished { outcome, notices } => {
                self.run_in_flight = false;
                match outcome {
                    DispatchOutcome::Completed => {
                        self.closing_notices = Some(notices);
                    }
                    DispatchOutcome::Failed => {
                        // Selection stays intact for a manual retry.
                        self.status = notices.into_iter().next();
                    }
                }
            }
            UiEvent::Info(text) => {
                self.status = Some(Notice::info(text));
            }
        }
    }
}

/// Run the picker: controller on the tokio runtime, UI on a dedicated thread.
pub async fn run(api: Arc<dyn JobApi>, target: Target) -> Result<()> {
    // Unbounded channels; the message volume here is tiny.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let ui_target = target.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_target, event_rx, cmd_tx));

    let res = orchestrator::run_controller(api, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    let notices = match join_res {
        Ok(Ok(r)) => r?,
        Ok(Err(_)) | Err(_) => return Err(anyhow::anyhow!("UI thread panicked")),
    };
    res?;

    // Closing notices are printed after the alternate screen is gone so they
    // survive in the scrollback.
    for n in notices {
        match n.level {
            NoticeLevel::Success | NoticeLevel::Info => println!("{}", n.text),
            NoticeLevel::Error => eprintln!("{}", n.text),
        }
    }
    Ok(())
}

/// UI loop on its own thread; returns the notices of a completed run.
fn run_threaded(
    target: Target,
    mut event_rx: UnboundedReceiver<UiEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<Vec<Notice>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::new(target);
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain controller events without blocking the render loop.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }
        if let Some(notices) = state.closing_notices.take() {
            let _ = cmd_tx.send(UiCommand::Quit);
            break Ok(notices);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, &cmd_tx, k.modifiers, k.code) {
                    break Ok(Vec::new());
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// Apply one key press. Returns true when the picker should close (cancel).
fn handle_key(
    state: &mut UiState,
    cmd_tx: &UnboundedSender<UiCommand>,
    modifiers: KeyModifiers,
    code: KeyCode,
) -> bool {
    // Quit always works, including while a call is in flight.
    if matches!(
        (modifiers, code),
        (_, KeyCode::Char('q')) | (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c'))
    ) && !state.editing_name
    {
        let _ = cmd_tx.send(UiCommand::Quit);
        return true;
    }

    // The overlay blocks everything else while a call is pending.
    if state.busy() {
        return false;
    }

    if state.editing_name {
        if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            let _ = cmd_tx.send(UiCommand::Quit);
            return true;
        }
        match code {
            KeyCode::Enter | KeyCode::Esc => state.editing_name = false,
            KeyCode::Backspace => {
                let mut name = state.selection.extract_name.clone();
                name.pop();
                state.selection.edit_name(name);
            }
            KeyCode::Char(c) => {
                let mut name = state.selection.extract_name.clone();
                name.push(c);
                state.selection.edit_name(name);
            }
            _ => {}
        }
        return false;
    }

    match (modifiers, code) {
        (_, KeyCode::Tab) => {
            let next = match state.selection.active_tab {
                ActiveTab::Analyzer => ActiveTab::Fieldset,
                ActiveTab::Fieldset => ActiveTab::Analyzer,
            };
            state.selection.switch_tab(next);
        }
        (_, KeyCode::Left) => state.selection.switch_tab(ActiveTab::Analyzer),
        (_, KeyCode::Right) => state.selection.switch_tab(ActiveTab::Fieldset),
        (_, KeyCode::Up) | (_, KeyCode::Char('k')) => state.move_cursor(-1),
        (_, KeyCode::Down) | (_, KeyCode::Char('j')) => state.move_cursor(1),
        (_, KeyCode::Enter) => state.pick_highlighted(),
        (_, KeyCode::Char('n')) => {
            if state.selection.name_field_active(&state.target) {
                state.editing_name = true;
            }
        }
        (_, KeyCode::Char('l')) => {
            state.loading_lists = true;
            let _ = cmd_tx.send(UiCommand::ReloadLists);
        }
        (_, KeyCode::Char('r')) => match state.selection.plan_run(&state.target) {
            Ok(plan) => {
                state.run_in_flight = true;
                state.status = None;
                let _ = cmd_tx.send(UiCommand::Run(plan));
            }
            Err(e) => {
                state.status = Some(Notice::error(format!("Cannot run: {e}")));
            }
        },
        (_, KeyCode::Char('?')) => state.show_help = !state.show_help,
        _ => {}
    }
    false
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let name_field = state.selection.name_field_active(&state.target);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // tabs
            Constraint::Min(5),    // option list
            Constraint::Length(if name_field { 3 } else { 0 }),
            Constraint::Length(3), // banner
            Constraint::Length(1), // status / keybind hint
        ])
        .split(area);

    let tab_idx = match state.selection.active_tab {
        ActiveTab::Analyzer => 0,
        ActiveTab::Fieldset => 1,
    };
    let tabs = Tabs::new(vec!["Analyzer", "Fieldset"])
        .select(tab_idx)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Run against {}", state.target.describe())),
        );
    f.render_widget(tabs, chunks[0]);

    draw_options(chunks[1], f, state);

    if name_field {
        let editing = state.editing_name;
        let name = Paragraph::new(Line::from(vec![
            Span::raw(state.selection.extract_name.clone()),
            Span::styled(
                if editing { "▏" } else { "" },
                Style::default().fg(Color::Yellow),
            ),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if editing {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                })
                .title(if editing {
                    "Extract name (enter to finish)"
                } else {
                    "Extract name (press 'n' to edit)"
                }),
        );
        f.render_widget(name, chunks[2]);
    }

    draw_banner(chunks[3], f, state);
    draw_status(chunks[4], f, state);

    if state.show_help {
        help::draw_help(centered(area, 64, 14), f);
    }
    if state.busy() {
        draw_overlay(area, f, state);
    }
}

fn draw_options(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cursor = state.cursor();
    let selected_id = state.selection.selected.as_deref();
    let rows: Vec<Line> = match state.selection.active_tab {
        ActiveTab::Analyzer => state
            .analyzers
            .iter()
            .enumerate()
            .map(|(i, a)| option_line(i == cursor, selected_id == Some(a.id.as_str()), &a.id, &a.description))
            .collect(),
        ActiveTab::Fieldset => state
            .fieldsets
            .iter()
            .enumerate()
            .map(|(i, fs)| option_line(i == cursor, selected_id == Some(fs.id.as_str()), &fs.id, &fs.name))
            .collect(),
    };
    let rows = if rows.is_empty() && !state.loading_lists {
        vec![Line::from(Span::styled(
            "  (no options available)",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        rows
    };
    let title = format!("Select {}", state.selection.active_tab.title());
    let list = Paragraph::new(rows).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn option_line(highlighted: bool, picked: bool, id: &str, label: &str) -> Line<'static> {
    let marker = if picked { "●" } else { " " };
    let style = if highlighted {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        Style::default()
    };
    Line::from(Span::styled(format!(" {marker} {label}  [{id}]"), style))
}

fn draw_banner(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (text, style) = match state.selected_label() {
        Some(label) => (
            format!(
                "{} selected: {}",
                state.selection.active_tab.title(),
                label
            ),
            Style::default().fg(Color::Green),
        ),
        None => (
            "Nothing selected yet".to_string(),
            Style::default().fg(Color::DarkGray),
        ),
    };
    let banner = Paragraph::new(Line::from(Span::styled(text, style)))
        .block(Block::default().borders(Borders::ALL).title("Selection"));
    f.render_widget(banner, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let line = match &state.status {
        Some(n) => {
            let color = match n.level {
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
                NoticeLevel::Info => Color::Cyan,
            };
            Line::from(Span::styled(n.text.clone(), Style::default().fg(color)))
        }
        None => {
            let run_hint = if state.selection.run_ready(&state.target) {
                Span::styled("r: run", Style::default().fg(Color::Green))
            } else {
                Span::styled("r: run (disabled)", Style::default().fg(Color::DarkGray))
            };
            Line::from(vec![
                run_hint,
                Span::raw("  tab: switch  enter: select  q: cancel  ?: help"),
            ])
        }
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_overlay(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let text = if state.loading_lists {
        "Loading options…"
    } else {
        "Working…"
    };
    let overlay = centered(area, 30, 3);
    f.render_widget(Clear, overlay);
    let p = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::Yellow),
    )))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, overlay);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}
