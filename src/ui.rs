use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use crate::llm::client::{ProposalClient, ProposalError};
use crate::models::{InputField, PopupMode, ProposedTask};
use crate::state::AppState;
use crate::store::Store;

type ProposalResult = Result<Vec<ProposedTask>, ProposalError>;

pub struct App {
    store: Store,
    pub state: AppState,
    pub list_state: ListState,
    pub popup_mode: PopupMode,
    pub field: InputField,
    pub time_buffer: String,
    pub desc_buffer: String,
    pub generate_buffer: String,
    pub error: Option<String>,
    pub should_quit: bool,
    client: ProposalClient,
    rt: tokio::runtime::Runtime,
    proposal_rx: Option<Receiver<ProposalResult>>,
}

impl App {
    pub fn new(store: Store) -> Result<Self> {
        let state = AppState::new(store.load_tasks()?);
        let mut list_state = ListState::default();
        if !state.tasks.is_empty() {
            list_state.select(Some(0));
        }
        Ok(App {
            store,
            state,
            list_state,
            popup_mode: PopupMode::None,
            field: InputField::Time,
            time_buffer: String::new(),
            desc_buffer: String::new(),
            generate_buffer: String::new(),
            error: None,
            should_quit: false,
            client: ProposalClient::from_env(),
            rt: tokio::runtime::Runtime::new()?,
            proposal_rx: None,
        })
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save_tasks(&self.state.tasks) {
            self.error = Some(format!("failed to save tasks: {e}"));
        }
    }

    fn clamp_selection(&mut self) {
        if self.state.tasks.is_empty() {
            self.list_state.select(None);
        } else {
            let max = self.state.tasks.len() - 1;
            match self.list_state.selected() {
                Some(i) if i > max => self.list_state.select(Some(max)),
                None => self.list_state.select(Some(0)),
                _ => {}
            }
        }
    }

    pub fn next_item(&mut self) {
        if self.state.tasks.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                if i >= self.state.tasks.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous_item(&mut self) {
        if self.state.tasks.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => {
                if i == 0 {
                    self.state.tasks.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    /// Selection indexes into the sorted display order.
    fn selected_task_id(&self) -> Option<String> {
        let sorted = self.state.sorted_tasks();
        self.list_state
            .selected()
            .and_then(|i| sorted.get(i))
            .map(|t| t.id.clone())
    }

    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_task_id() {
            if self.state.toggle_complete(&id) {
                self.persist();
            }
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(id) = self.selected_task_id() {
            if self.state.delete_task(&id) {
                self.persist();
                self.clamp_selection();
            }
        }
    }

    pub fn open_add_popup(&mut self) {
        self.popup_mode = PopupMode::AddTask;
        self.field = InputField::Time;
        self.time_buffer.clear();
        self.desc_buffer.clear();
    }

    /// Edit opens only for incomplete tasks; completed rows carry no edit
    /// affordance.
    pub fn open_edit_popup(&mut self) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        let Some(task) = self.state.tasks.iter().find(|t| t.id == id) else {
            return;
        };
        if task.is_completed {
            return;
        }
        self.time_buffer = task.time.clone();
        self.desc_buffer = task.task.clone();
        self.state.start_edit(&id);
        self.field = InputField::Time;
        self.popup_mode = PopupMode::EditTask;
    }

    pub fn open_generate_popup(&mut self) {
        if self.state.loading {
            return;
        }
        self.popup_mode = PopupMode::Generate;
    }

    pub fn open_clear_popup(&mut self) {
        if !self.state.tasks.is_empty() {
            self.popup_mode = PopupMode::ConfirmClear;
        }
    }

    pub fn close_popup(&mut self) {
        if self.popup_mode == PopupMode::EditTask {
            self.state.cancel_edit();
        }
        self.popup_mode = PopupMode::None;
        self.time_buffer.clear();
        self.desc_buffer.clear();
    }

    pub fn commit_add(&mut self) {
        // Empty description keeps the popup open; nothing to add yet.
        let time = self.time_buffer.clone();
        let desc = self.desc_buffer.clone();
        if self.state.add_task(&time, &desc) {
            self.persist();
            self.clamp_selection();
            self.close_popup();
        }
    }

    pub fn commit_edit(&mut self) {
        if let Some(id) = self.state.editing_id.clone() {
            let time = self.time_buffer.clone();
            let desc = self.desc_buffer.clone();
            if self.state.save_edit(&id, &time, &desc) {
                self.persist();
            }
        }
        self.popup_mode = PopupMode::None;
        self.time_buffer.clear();
        self.desc_buffer.clear();
    }

    pub fn confirm_clear(&mut self) {
        self.state.clear_all();
        self.persist();
        self.clamp_selection();
        self.popup_mode = PopupMode::None;
    }

    /// Idle -> Requesting. Empty trimmed input is a local validation error
    /// and never issues a network call; a request already in flight means
    /// the action is ignored.
    pub fn submit_generate(&mut self) {
        if self.state.loading {
            return;
        }
        if self.generate_buffer.trim().is_empty() {
            self.error = Some("Please enter your schedule text first.".to_string());
            return;
        }

        self.error = None;
        self.state.proposed = None;
        self.state.loading = true;
        self.popup_mode = PopupMode::None;

        let (tx, rx) = mpsc::channel();
        let client = self.client.clone();
        let text = self.generate_buffer.clone();
        self.rt.spawn(async move {
            let result = client.generate(&text).await;
            let _ = tx.send(result);
        });
        self.proposal_rx = Some(rx);
    }

    /// Requesting -> (ProposalReady | Failed). Called every loop tick; a
    /// pending channel just means the request is still in flight.
    pub fn poll_proposal(&mut self) {
        let Some(rx) = &self.proposal_rx else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(tasks)) => {
                self.state.loading = false;
                self.proposal_rx = None;
                self.state.proposed = Some(tasks);
            }
            Ok(Err(e)) => {
                self.state.loading = false;
                self.proposal_rx = None;
                self.error = Some(e.to_string());
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.state.loading = false;
                self.proposal_rx = None;
                self.error = Some("schedule request was dropped before completing".to_string());
            }
        }
    }

    /// ProposalReady -> Idle, confirm path: the proposal replaces the task
    /// list wholesale and the input text is cleared.
    pub fn confirm_proposal(&mut self) {
        if let Some(proposal) = self.state.proposed.take() {
            self.state.commit_proposal(proposal);
            self.persist();
            self.generate_buffer.clear();
            self.clamp_selection();
        }
    }

    /// ProposalReady -> Idle, reject path: the proposal is discarded and the
    /// typed text kept so the user can retry.
    pub fn reject_proposal(&mut self) {
        self.state.discard_proposal();
        self.popup_mode = PopupMode::Generate;
    }

    fn focused_buffer(&mut self) -> &mut String {
        match self.field {
            InputField::Time => &mut self.time_buffer,
            InputField::Description => &mut self.desc_buffer,
        }
    }

    pub fn handle_popup_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        match self.popup_mode {
            PopupMode::AddTask | PopupMode::EditTask => match key {
                KeyCode::Esc => self.close_popup(),
                KeyCode::Tab => {
                    self.field = match self.field {
                        InputField::Time => InputField::Description,
                        InputField::Description => InputField::Time,
                    };
                }
                KeyCode::Enter => {
                    if self.popup_mode == PopupMode::AddTask {
                        self.commit_add();
                    } else {
                        self.commit_edit();
                    }
                }
                KeyCode::Backspace => {
                    self.focused_buffer().pop();
                }
                KeyCode::Char(c) => {
                    self.focused_buffer().push(c);
                }
                _ => {}
            },
            PopupMode::Generate => match key {
                KeyCode::Esc => self.close_popup(),
                KeyCode::Enter => self.generate_buffer.push('\n'),
                KeyCode::Backspace => {
                    self.generate_buffer.pop();
                }
                KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => {
                    self.submit_generate();
                }
                KeyCode::Char(c) => self.generate_buffer.push(c),
                _ => {}
            },
            PopupMode::ConfirmClear => match key {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_clear(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.popup_mode = PopupMode::None;
                }
                _ => {}
            },
            PopupMode::None => {}
        }
    }
}

pub fn run_tui(store: Store) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store)?;
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        app.poll_proposal();

        // Poll with a timeout so in-flight proposal results keep being
        // drained while the user types nothing.
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, key.modifiers);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
    if app.popup_mode != PopupMode::None {
        app.handle_popup_key(key, modifiers);
        return;
    }

    // The proposal panel captures input until accepted or rejected.
    if app.state.proposed.is_some() {
        match key {
            KeyCode::Char('y') | KeyCode::Enter => app.confirm_proposal(),
            KeyCode::Char('r') | KeyCode::Esc => app.reject_proposal(),
            _ => {}
        }
        return;
    }

    match key {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Down => app.next_item(),
        KeyCode::Up => app.previous_item(),
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_selected(),
        KeyCode::Char('a') => app.open_add_popup(),
        KeyCode::Char('e') => app.open_edit_popup(),
        KeyCode::Char('d') => app.delete_selected(),
        KeyCode::Char('c') => app.open_clear_popup(),
        KeyCode::Char('g') => app.open_generate_popup(),
        KeyCode::Esc => app.error = None,
        _ => {}
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);

    if app.state.proposed.is_some() {
        render_proposal(f, app, chunks[1]);
    } else {
        render_tasks(f, app, chunks[1]);
    }

    render_footer(f, app, chunks[2]);

    match app.popup_mode {
        PopupMode::AddTask => render_task_form(f, app, "Add Task"),
        PopupMode::EditTask => render_task_form(f, app, "Edit Task"),
        PopupMode::Generate => render_generate_popup(f, app),
        PopupMode::ConfirmClear => render_clear_popup(f, app),
        PopupMode::None => {}
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.state.loading {
        Line::from(vec![
            Span::styled("Dayplan", Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(
                "Generating schedule...",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::SLOW_BLINK),
            ),
        ])
    } else {
        Line::from(Span::styled("Dayplan", Style::default().fg(Color::Cyan)))
    };

    let header = Paragraph::new(title)
        .block(Block::default().borders(Borders::ALL).title("Today's Schedule"));
    f.render_widget(header, area);
}

fn render_tasks(f: &mut Frame, app: &mut App, area: Rect) {
    let sorted = app.state.sorted_tasks();

    if sorted.is_empty() {
        let empty = Paragraph::new(
            "No tasks yet.\n\nPress 'a' to add a task, or 'g' to generate a schedule from free-form text.",
        )
        .block(Block::default().borders(Borders::ALL).title("Tasks"))
        .style(Style::default().fg(Color::DarkGray))
        .alignment(ratatui::layout::Alignment::Center);
        f.render_widget(empty, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(area);

    let editing_id = app.state.editing_id.clone();
    let rows: Vec<ListItem> = sorted
        .iter()
        .map(|task| {
            let mark = if task.is_completed { "[x]" } else { "[ ]" };
            let mut spans = vec![
                Span::styled(format!("{mark} "), Style::default().fg(Color::Gray)),
                Span::styled(
                    format!("{} ", task.time),
                    Style::default().fg(Color::Cyan),
                ),
            ];

            let desc_style = if task.is_completed {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(Color::White)
            };
            spans.push(Span::styled(task.task.clone(), desc_style));

            if let Some(at) = &task.completed_at {
                spans.push(Span::styled(
                    format!("  (done {at})"),
                    Style::default().fg(Color::Green),
                ));
            }
            if editing_id.as_deref() == Some(task.id.as_str()) {
                spans.push(Span::styled(
                    "  (editing)",
                    Style::default().fg(Color::Yellow),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(rows)
        .block(Block::default().borders(Borders::ALL).title("Tasks"))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, chunks[0], &mut app.list_state);

    let selected = app
        .list_state
        .selected()
        .and_then(|i| app.state.sorted_tasks().get(i).map(|t| (*t).clone()));
    let info_text = if let Some(task) = selected {
        let completed = match (&task.is_completed, &task.completed_at) {
            (true, Some(at)) => format!("yes, at {at}"),
            (true, None) => "yes".to_string(),
            _ => "no".to_string(),
        };
        let edit_hint = if task.is_completed {
            ""
        } else {
            "\n• e: Edit"
        };
        format!(
            "Time: {}\nTask: {}\nCompleted: {}\n\nControls:\n• Space/Enter: Toggle done{}\n• d: Delete\n• a: Add\n• g: Generate from text\n• c: Clear all\n• q: Quit",
            task.time, task.task, completed, edit_hint
        )
    } else {
        "No task selected\n\nControls:\n• ↑/↓: Navigate\n• a: Add\n• g: Generate from text\n• q: Quit"
            .to_string()
    };

    let info = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::White));
    f.render_widget(info, chunks[1]);
}

fn render_proposal(f: &mut Frame, app: &App, area: Rect) {
    let Some(proposed) = &app.state.proposed else {
        return;
    };

    let rows: Vec<ListItem> = proposed
        .iter()
        .map(|entry| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", entry.time), Style::default().fg(Color::Cyan)),
                Span::styled(entry.task.clone(), Style::default().fg(Color::White)),
            ]))
        })
        .collect();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let list = List::new(rows).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Proposed Schedule (replaces your current tasks)"),
    );
    f.render_widget(list, chunks[0]);

    let hint = Paragraph::new("y / Enter: accept proposal    r / Esc: reject and retry")
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Yellow))
        .alignment(ratatui::layout::Alignment::Center);
    f.render_widget(hint, chunks[1]);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let footer = match &app.error {
        Some(message) => Paragraph::new(message.as_str())
            .block(Block::default().borders(Borders::ALL).title("Error"))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true }),
        None => Paragraph::new("a: add  e: edit  d: delete  g: generate  c: clear all  q: quit")
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray)),
    };
    f.render_widget(footer, area);
}

fn render_task_form(f: &mut Frame, app: &App, title: &str) {
    let popup_area = centered_rect(60, 30, f.area());
    let focus = |field: InputField| {
        if app.field == field {
            "> "
        } else {
            "  "
        }
    };
    let content = Paragraph::new(format!(
        "{}Time: {}\n{}Task: {}\n\nTab: switch field\nEnter: save    Esc: cancel",
        focus(InputField::Time),
        app.time_buffer,
        focus(InputField::Description),
        app.desc_buffer,
    ))
    .block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::DarkGray)),
    )
    .style(Style::default().fg(Color::White));
    f.render_widget(content, popup_area);
}

fn render_generate_popup(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(70, 50, f.area());
    let content = Paragraph::new(format!(
        "Paste or type your raw schedule text:\n\n{}\n\nEnter: new line    Ctrl+S: generate    Esc: cancel",
        app.generate_buffer
    ))
    .block(
        Block::default()
            .title("Generate Schedule")
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::DarkGray)),
    )
    .wrap(Wrap { trim: false })
    .style(Style::default().fg(Color::White));
    f.render_widget(content, popup_area);
}

fn render_clear_popup(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(50, 20, f.area());
    let content = Paragraph::new(format!(
        "Delete all {} tasks?\n\ny: yes    n / Esc: no",
        app.state.tasks.len()
    ))
    .block(
        Block::default()
            .title("Clear All Tasks")
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::DarkGray)),
    )
    .alignment(ratatui::layout::Alignment::Center)
    .style(Style::default().fg(Color::White));
    f.render_widget(content, popup_area);
}

// Helper function to create centered rectangles for popups
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_app() -> (tempfile::TempDir, App) {
        let dir = tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("ui-test.db")).expect("open store");
        let app = App::new(store).expect("app");
        (dir, app)
    }

    #[test]
    fn empty_generate_input_is_a_local_error_with_no_request() {
        let (_dir, mut app) = test_app();
        app.generate_buffer = "   \n ".to_string();

        app.submit_generate();

        assert!(app.error.is_some());
        assert!(!app.state.loading);
        assert!(app.proposal_rx.is_none());
    }

    #[test]
    fn confirm_proposal_commits_and_clears_the_input_text() {
        let (_dir, mut app) = test_app();
        app.state.add_task("08:00", "old entry");
        app.generate_buffer = "9am standup".to_string();
        app.state.proposed = Some(vec![
            ProposedTask {
                time: "09:00".to_string(),
                task: "standup".to_string(),
            },
            ProposedTask {
                time: "10:00".to_string(),
                task: "deep work".to_string(),
            },
        ]);

        app.confirm_proposal();

        assert!(app.state.proposed.is_none());
        assert!(app.generate_buffer.is_empty());
        assert_eq!(app.state.tasks.len(), 2);
        assert!(app.state.tasks.iter().all(|t| !t.is_completed));
        // The replacement was persisted.
        let reloaded = app.store.load_tasks().expect("reload");
        assert_eq!(reloaded, app.state.tasks);
    }

    #[test]
    fn reject_proposal_keeps_tasks_and_reopens_the_input() {
        let (_dir, mut app) = test_app();
        app.state.add_task("08:00", "kept entry");
        app.persist();
        app.generate_buffer = "some text".to_string();
        app.state.proposed = Some(vec![ProposedTask {
            time: "09:00".to_string(),
            task: "standup".to_string(),
        }]);

        app.reject_proposal();

        assert!(app.state.proposed.is_none());
        assert_eq!(app.state.tasks.len(), 1);
        assert_eq!(app.state.tasks[0].task, "kept entry");
        assert_eq!(app.popup_mode, PopupMode::Generate);
        assert_eq!(app.generate_buffer, "some text");
    }

    #[test]
    fn mutations_round_trip_through_the_store() {
        let (_dir, mut app) = test_app();
        app.state.add_task("09:00", "standup");
        app.persist();
        assert_eq!(app.store.load_tasks().expect("load"), app.state.tasks);

        let id = app.state.tasks[0].id.clone();
        app.state.toggle_complete(&id);
        app.persist();
        assert_eq!(app.store.load_tasks().expect("load"), app.state.tasks);

        app.state.delete_task(&id);
        app.persist();
        assert!(app.store.load_tasks().expect("load").is_empty());
    }

    #[test]
    fn edit_popup_does_not_open_for_completed_tasks() {
        let (_dir, mut app) = test_app();
        app.state.add_task("09:00", "standup");
        let id = app.state.tasks[0].id.clone();
        app.state.toggle_complete(&id);
        app.list_state.select(Some(0));

        app.open_edit_popup();

        assert_eq!(app.popup_mode, PopupMode::None);
        assert!(app.state.editing_id.is_none());
    }
}
