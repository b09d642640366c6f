use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame, Terminal,
};
use crate::app::AppEvent;
use crate::types::Message;
use tokio::sync::mpsc;

pub mod plain;

// Catppuccin Mocha color palette
pub mod colors {
    use ratatui::style::Color;

    pub const BASE: Color = Color::Rgb(30, 30, 46);       // #1e1e2e
    pub const MANTLE: Color = Color::Rgb(24, 24, 37);     // #181825
    pub const CRUST: Color = Color::Rgb(17, 17, 27);      // #11111b
    pub const TEXT: Color = Color::Rgb(205, 214, 244);    // #cdd6f4
    pub const SUBTEXT0: Color = Color::Rgb(166, 173, 200); // #a6adc8
    pub const OVERLAY1: Color = Color::Rgb(127, 132, 156); // #7f849c
    pub const OVERLAY0: Color = Color::Rgb(108, 112, 134); // #6c7086
    pub const SURFACE2: Color = Color::Rgb(88, 91, 112);   // #585b70
    pub const SURFACE1: Color = Color::Rgb(69, 71, 90);    // #45475a
    pub const SURFACE0: Color = Color::Rgb(49, 50, 68);    // #313244

    pub const LAVENDER: Color = Color::Rgb(180, 190, 254); // #b4befe
    pub const BLUE: Color = Color::Rgb(137, 180, 250);     // #89b4fa
    pub const GREEN: Color = Color::Rgb(166, 227, 161);    // #a6e3a1
    pub const YELLOW: Color = Color::Rgb(249, 226, 175);   // #f9e2af
    pub const PEACH: Color = Color::Rgb(250, 179, 135);    // #fab387
    pub const RED: Color = Color::Rgb(243, 139, 168);      // #f38ba8
    pub const MAUVE: Color = Color::Rgb(203, 166, 247);    // #cba6f7
}

const READY_STATUS: &str = "Ready | 'i' type, 's' save, 'n' new, 'l'/'d' load/delete selected, '?' help, 'q' quit";

#[derive(Debug, Clone)]
pub enum UiEvent {
    App(AppEvent),
    Complete,
}

pub struct TuiApp {
    pub running: bool,
    pub input_mode: InputMode,
    pub messages: Vec<DisplayMessage>,
    pub input: String,
    pub status_line: String,
    pub scroll_offset: usize,
    pub show_help: bool,
    pub busy: bool,
    pub topic: String,
    pub topics: Vec<String>,
    pub selected_topic: usize,
    model_label: String,
    rx: mpsc::UnboundedReceiver<UiEvent>,
}

#[derive(Debug, Clone)]
pub struct DisplayMessage {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

impl DisplayMessage {
    fn now(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

impl From<&Message> for DisplayMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
            timestamp: String::new(),
        }
    }
}

#[derive(PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

impl TuiApp {
    pub fn new(topic: &str, topics: Vec<String>, model_label: &str) -> (Self, mpsc::UnboundedSender<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Self {
            running: true,
            input_mode: InputMode::Normal,
            messages: Vec::new(),
            input: String::new(),
            status_line: READY_STATUS.to_string(),
            scroll_offset: 0,
            show_help: false,
            busy: false,
            topic: topic.to_string(),
            topics,
            selected_topic: 0,
            model_label: model_label.to_string(),
            rx,
        };
        (app, tx)
    }

    pub async fn run_with_input_callback(&mut self, input_tx: mpsc::UnboundedSender<String>) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        terminal.clear()?;

        let result = self.run_loop_with_callback(&mut terminal, input_tx).await;

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop_with_callback(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, input_tx: mpsc::UnboundedSender<String>) -> Result<()> {
        loop {
            terminal.draw(|f| self.ui(f))?;

            // Non-blocking event handling
            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_keypress_with_callback(key, &input_tx)?;
                    }
                }
            }

            // Process UI events
            while let Ok(event) = self.rx.try_recv() {
                self.handle_ui_event(event);
            }

            if !self.running {
                break;
            }
        }
        Ok(())
    }

    pub fn handle_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::App(app_event) => self.handle_app_event(app_event),
            UiEvent::Complete => {
                self.busy = false;
                if self.status_line.starts_with("Thinking") || self.status_line.starts_with("Working") {
                    self.status_line = READY_STATUS.to_string();
                }
            }
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Reply(message) => {
                self.messages.push(DisplayMessage::now("assistant", message.content));
                self.auto_scroll();
            }
            AppEvent::Notice(text) => {
                self.status_line = text.lines().next().unwrap_or_default().to_string();
                if text.contains('\n') {
                    self.messages.push(DisplayMessage::now("system", text));
                    self.auto_scroll();
                }
            }
            AppEvent::Failure(error) => {
                self.messages.push(DisplayMessage::now("error", format!("❌ {}", error)));
                self.status_line = format!("Error: {}", error);
                self.auto_scroll();
            }
            AppEvent::Reset { topic, messages } => {
                self.topic = topic;
                self.messages = messages.iter().map(DisplayMessage::from).collect();
                self.scroll_offset = 0;
                self.auto_scroll();
            }
            AppEvent::Topics(topics) => {
                self.topics = topics;
                if self.selected_topic >= self.topics.len() {
                    self.selected_topic = self.topics.len().saturating_sub(1);
                }
            }
            AppEvent::ModelChanged(model) => {
                self.model_label = model.to_string();
            }
            AppEvent::Quit => {
                self.running = false;
            }
        }
    }

    fn auto_scroll(&mut self) {
        if self.messages.len() > 10 {
            self.scroll_offset = self.messages.len().saturating_sub(10);
        }
    }

    fn selected_topic_name(&self) -> Option<&str> {
        self.topics.get(self.selected_topic).map(|s| s.as_str())
    }

    fn submit(&mut self, line: String, input_tx: &mpsc::UnboundedSender<String>) {
        // One turn at a time: the worker drains the channel sequentially.
        if self.busy {
            self.status_line = "Still thinking... wait for the current reply".to_string();
            return;
        }
        self.busy = true;
        self.status_line = if line.starts_with('/') {
            "Working...".to_string()
        } else {
            "Thinking...".to_string()
        };
        let _ = input_tx.send(line);
    }

    fn handle_keypress_with_callback(&mut self, key: KeyEvent, input_tx: &mpsc::UnboundedSender<String>) -> Result<()> {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('i') => {
                    self.input_mode = InputMode::Editing;
                    self.status_line = "Insert mode | Enter to send, Esc to cancel".to_string();
                }
                KeyCode::Char('?') => {
                    self.show_help = !self.show_help;
                }
                KeyCode::Char('q') => {
                    self.running = false;
                }
                KeyCode::Char('s') => {
                    self.submit("/save".to_string(), input_tx);
                }
                KeyCode::Char('n') => {
                    self.submit("/new".to_string(), input_tx);
                }
                KeyCode::Char('l') => {
                    if let Some(topic) = self.selected_topic_name().map(str::to_string) {
                        self.submit(format!("/load {}", topic), input_tx);
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(topic) = self.selected_topic_name().map(str::to_string) {
                        self.submit(format!("/delete {}", topic), input_tx);
                    }
                }
                KeyCode::Char('j') | KeyCode::Tab => {
                    if self.selected_topic + 1 < self.topics.len() {
                        self.selected_topic += 1;
                    }
                }
                KeyCode::Char('k') | KeyCode::BackTab => {
                    self.selected_topic = self.selected_topic.saturating_sub(1);
                }
                KeyCode::Up => {
                    self.scroll_offset = self.scroll_offset.saturating_sub(1);
                }
                KeyCode::Down => {
                    if self.scroll_offset < self.messages.len().saturating_sub(1) {
                        self.scroll_offset += 1;
                    }
                }
                KeyCode::PageUp => {
                    self.scroll_offset = self.scroll_offset.saturating_sub(10);
                }
                KeyCode::PageDown => {
                    self.scroll_offset = (self.scroll_offset + 10).min(self.messages.len().saturating_sub(1));
                }
                _ => {}
            },
            InputMode::Editing => match key.code {
                KeyCode::Enter => {
                    if !self.input.trim().is_empty() && !self.busy {
                        let input = self.input.trim().to_string();

                        if !input.starts_with('/') {
                            self.messages.push(DisplayMessage::now("user", input.clone()));
                            self.auto_scroll();
                        }

                        self.submit(input, input_tx);

                        self.input.clear();
                        self.input_mode = InputMode::Normal;
                    } else if self.busy {
                        self.status_line = "Still thinking... wait for the current reply".to_string();
                    }
                }
                KeyCode::Char(c) => {
                    if key.modifiers.contains(KeyModifiers::CONTROL) {
                        if c == 'c' {
                            self.input.clear();
                            self.input_mode = InputMode::Normal;
                            self.status_line = "Cancelled".to_string();
                        }
                    } else {
                        self.input.push(c);
                    }
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Esc => {
                    self.input_mode = InputMode::Normal;
                    self.status_line = READY_STATUS.to_string();
                }
                _ => {}
            },
        }
        Ok(())
    }

    fn ui(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),  // Header
                Constraint::Min(0),      // Messages + sidebar
                Constraint::Length(3),   // Input
                Constraint::Length(3),   // Status
            ])
            .split(f.area());

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
            .split(chunks[1]);

        self.render_header(f, chunks[0]);
        self.render_messages(f, body[0]);
        self.render_sidebar(f, body[1]);
        self.render_input(f, chunks[2]);
        self.render_status(f, chunks[3]);

        if self.show_help {
            self.render_help_overlay(f, f.area());
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let title = vec![
            Span::styled("● ", Style::default().fg(colors::GREEN)),
            Span::styled("Captain Ticker", Style::default().fg(colors::LAVENDER).add_modifier(Modifier::BOLD)),
            Span::raw(" "),
            Span::styled("│", Style::default().fg(colors::SURFACE1)),
            Span::raw(" "),
            Span::styled(&self.topic, Style::default().fg(colors::PEACH)),
            Span::raw(" "),
            Span::styled("│", Style::default().fg(colors::SURFACE1)),
            Span::raw(" "),
            Span::styled(
                format!("fueled by Mistral AI ({}) • {}", self.model_label, chrono::Local::now().format("%Y-%m-%d")),
                Style::default().fg(colors::SUBTEXT0),
            ),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors::SURFACE1))
            .style(Style::default().bg(colors::MANTLE));

        let paragraph = Paragraph::new(Line::from(title))
            .block(block)
            .style(Style::default().fg(colors::TEXT));

        f.render_widget(paragraph, area);
    }

    fn render_messages(&self, f: &mut Frame, area: Rect) {
        let messages: Vec<ListItem> = self
            .messages
            .iter()
            .skip(self.scroll_offset)
            .map(|msg| {
                let (role_prefix, role_color, icon) = match msg.role.as_str() {
                    "user" => ("You", colors::BLUE, "❯"),
                    "assistant" => ("Ticker", colors::MAUVE, "●"),
                    "error" => ("Error", colors::RED, "✗"),
                    "system" => ("System", colors::OVERLAY0, "i"),
                    _ => ("Unknown", colors::TEXT, "?"),
                };

                let mut lines = vec![
                    Line::from(vec![
                        Span::styled(format!("{} ", icon), Style::default().fg(role_color)),
                        Span::styled(format!("{:8}", role_prefix), Style::default().fg(role_color).add_modifier(Modifier::BOLD)),
                        Span::styled(" │ ", Style::default().fg(colors::SURFACE1)),
                        Span::styled(&msg.timestamp, Style::default().fg(colors::OVERLAY0)),
                    ]),
                ];

                for line in msg.content.lines() {
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(line, Style::default().fg(colors::TEXT)),
                    ]));
                }

                // Add spacing between messages
                lines.push(Line::from(""));

                ListItem::new(Text::from(lines))
            })
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors::SURFACE1))
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled("Messages", Style::default().fg(colors::TEXT).add_modifier(Modifier::BOLD)),
                Span::raw(" "),
            ]))
            .style(Style::default().bg(colors::BASE));

        let list = List::new(messages)
            .block(block)
            .style(Style::default().fg(colors::TEXT));

        f.render_widget(list, area);

        // Render scrollbar
        let mut scrollbar_state = ScrollbarState::new(self.messages.len())
            .position(self.scroll_offset);

        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .style(Style::default().fg(colors::SURFACE2))
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));

        f.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin { vertical: 1, horizontal: 0 }),
            &mut scrollbar_state,
        );
    }

    fn render_sidebar(&self, f: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = if self.topics.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  nothing saved yet",
                Style::default().fg(colors::OVERLAY1).add_modifier(Modifier::ITALIC),
            )))]
        } else {
            self.topics
                .iter()
                .map(|t| {
                    let color = if *t == self.topic { colors::PEACH } else { colors::TEXT };
                    ListItem::new(Line::from(Span::styled(format!(" {}", t), Style::default().fg(color))))
                })
                .collect()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors::SURFACE1))
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled("Saved Conversations", Style::default().fg(colors::TEXT).add_modifier(Modifier::BOLD)),
                Span::raw(" "),
            ]))
            .style(Style::default().bg(colors::MANTLE));

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(colors::SURFACE0).add_modifier(Modifier::BOLD))
            .highlight_symbol("▌");

        let mut state = ListState::default();
        if !self.topics.is_empty() {
            state.select(Some(self.selected_topic));
        }
        f.render_stateful_widget(list, area, &mut state);
    }

    fn render_input(&self, f: &mut Frame, area: Rect) {
        let input_text = match self.input_mode {
            InputMode::Editing => {
                Line::from(vec![
                    Span::styled("❯ ", Style::default().fg(colors::BLUE).add_modifier(Modifier::BOLD)),
                    Span::styled(&self.input, Style::default().fg(colors::TEXT)),
                    Span::styled("█", Style::default().fg(colors::LAVENDER)),
                ])
            }
            InputMode::Normal => {
                Line::from(vec![
                    Span::styled("  ", Style::default().fg(colors::OVERLAY0)),
                    Span::styled(
                        "Press 'i' to type... Example: What are the top 5 GOOGL stock options calls?",
                        Style::default().fg(colors::OVERLAY1).add_modifier(Modifier::ITALIC),
                    ),
                ])
            }
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if self.input_mode == InputMode::Editing {
                colors::BLUE
            } else {
                colors::SURFACE1
            }))
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled(
                    if self.input_mode == InputMode::Editing { "Input" } else { "Ready" },
                    Style::default().fg(colors::TEXT).add_modifier(Modifier::BOLD)
                ),
                Span::raw(" "),
            ]))
            .style(Style::default().bg(colors::MANTLE));

        let paragraph = Paragraph::new(input_text)
            .block(block)
            .wrap(Wrap { trim: false });

        f.render_widget(paragraph, area);
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let color = if self.busy { colors::YELLOW } else { colors::TEXT };
        let status_spans = vec![
            Span::styled("  ", Style::default()),
            Span::styled(&self.status_line, Style::default().fg(color)),
            Span::raw(" "),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors::SURFACE1))
            .style(Style::default().bg(colors::CRUST));

        let paragraph = Paragraph::new(Line::from(status_spans))
            .block(block);

        f.render_widget(paragraph, area);
    }

    fn render_help_overlay(&self, f: &mut Frame, area: Rect) {
        let help_area = centered_rect(60, 60, area);

        let key = |k: &'static str, what: &'static str| {
            Line::from(vec![
                Span::raw("    "),
                Span::styled(format!("{:<11}", k), Style::default().fg(colors::MAUVE)),
                Span::raw(format!("- {}", what)),
            ])
        };

        let help_text = vec![
            Line::from(vec![
                Span::styled("  Help  ", Style::default().fg(colors::LAVENDER).add_modifier(Modifier::BOLD)),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled("  Keybindings:", Style::default().fg(colors::BLUE).add_modifier(Modifier::BOLD)),
            ]),
            key("i", "Enter insert mode"),
            key("Esc", "Return to normal mode"),
            key("Enter", "Send message (insert mode)"),
            key("s / n", "Save / start new conversation"),
            key("j / k", "Select saved conversation"),
            key("l / d", "Load / delete selected conversation"),
            key("↑/↓", "Scroll messages"),
            key("PgUp/PgDn", "Fast scroll"),
            key("?", "Toggle this help"),
            key("q", "Quit"),
            Line::from(""),
            Line::from(vec![
                Span::styled("  Commands:", Style::default().fg(colors::BLUE).add_modifier(Modifier::BOLD)),
            ]),
            key("/save [t]", "Save under topic t"),
            key("/model <m>", "Switch model"),
            key("/temp <v>", "Set temperature (0.0-1.0)"),
            Line::from(""),
            Line::from(vec![
                Span::styled("  Press '?' to close", Style::default().fg(colors::OVERLAY1).add_modifier(Modifier::ITALIC)),
            ]),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors::LAVENDER))
            .style(Style::default().bg(colors::BASE))
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled("❓ Help", Style::default().fg(colors::LAVENDER).add_modifier(Modifier::BOLD)),
                Span::raw(" "),
            ]));

        let paragraph = Paragraph::new(help_text)
            .block(block)
            .wrap(Wrap { trim: false });

        f.render_widget(paragraph, help_area);
    }
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
