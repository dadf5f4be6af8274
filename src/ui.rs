use crate::app::{persist, update, AppState, Effect, Entry, Mode, Prompt, TaskRef};
use crate::keys::Key;
use crate::model::{Task, COLUMN_COUNT};
use crate::storage::{save_board, BoardLocation};
use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{debug, info};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::Terminal;
use std::io::{stdout, Stdout};

/// Every task is drawn as a title row and a meta row.
const ROW_HEIGHT: usize = 2;
const SCROLL_MARGIN: usize = 1;
const HEADER_HEIGHT: u16 = 3;

const ACCENT: Color = Color::Rgb(125, 86, 244);
const SELECTED: Color = Color::Rgb(115, 245, 159);
const SUBTLE: Color = Color::Rgb(56, 56, 56);

pub fn run(state: AppState, location: &BoardLocation) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, state, location);
    teardown_terminal(&mut terminal)?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut state: AppState,
    location: &BoardLocation,
) -> Result<()> {
    let mut viewport = Viewport::default();
    loop {
        terminal.draw(|f| viewport.draw(f, &state, location))?;
        let key = match event::read()? {
            Event::Key(event) => match Key::from_event(event) {
                Some(key) => key,
                None => continue,
            },
            _ => continue,
        };
        let (next, effect) = update(state, key);
        state = next;
        match effect {
            Effect::None => {}
            Effect::Persist => persist(&mut state, location),
            Effect::Quit => return finish(&state, location),
        }
    }
}

/// Final save before exiting; a failure is returned so the process exits non-zero.
fn finish(state: &AppState, location: &BoardLocation) -> Result<()> {
    save_board(location, &state.board).context("saving board on quit")?;
    info!("saved {} tasks on quit", state.board.task_count());
    Ok(())
}

/// Projects an `AppState` onto a terminal frame.
///
/// The only state kept between frames is the scroll offset of each column,
/// recomputed on every draw so the selected task stays visible.
#[derive(Debug, Default)]
pub struct Viewport {
    scroll_offsets: [usize; COLUMN_COUNT],
}

impl Viewport {
    #[cfg(test)]
    pub fn scroll_offset(&self, column: usize) -> usize {
        self.scroll_offsets.get(column).copied().unwrap_or(0)
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>, state: &AppState, location: &BoardLocation) {
        let footer_height = if state.show_help { 4 } else { 3 };
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT),
                Constraint::Min(3),
                Constraint::Length(footer_height),
            ])
            .split(f.size());

        draw_header(f, layout[0], state, location);
        self.draw_board(f, layout[1], state);
        draw_footer(f, layout[2], state);

        match &state.mode {
            Mode::AddingNew(prompt) => {
                let column = &state.board.columns[state.cursor.column];
                draw_prompt(f, &format!("New task in {}", column.title), prompt);
            }
            Mode::Editing { target, prompt } => {
                draw_prompt(f, &format!("Edit task #{}", target.id), prompt)
            }
            Mode::ConfirmingDelete { target } => draw_confirm(f, state, *target),
            Mode::Browsing => {}
        }
    }

    fn draw_board(&mut self, f: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, COLUMN_COUNT as u32); COLUMN_COUNT])
            .split(area);

        for (idx, column) in state.board.columns.iter().enumerate() {
            let focused = idx == state.cursor.column;
            let accent = if focused { ACCENT } else { SUBTLE };
            let title_style = if focused {
                Style::default()
                    .fg(ACCENT)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)
            };
            let block = Block::default()
                .title(Span::styled(
                    format!(" {} ({}) ", column.title, column.tasks.len()),
                    title_style,
                ))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(accent));

            if column.tasks.is_empty() {
                self.scroll_offsets[idx] = 0;
                let placeholder = Paragraph::new(Line::from(Span::styled(
                    "No tasks",
                    Style::default().fg(Color::DarkGray),
                )))
                .alignment(Alignment::Center)
                .block(block);
                f.render_widget(placeholder, chunks[idx]);
                continue;
            }

            let visible_rows = chunks[idx].height.saturating_sub(2) as usize / ROW_HEIGHT;
            let len = column.tasks.len();
            let mut list_state = ListState::default();
            let offset = if focused {
                let offset = adjust_offset(
                    state.cursor.task,
                    self.scroll_offsets[idx],
                    visible_rows,
                    SCROLL_MARGIN,
                    len,
                );
                list_state.select(Some(state.cursor.task));
                offset
            } else {
                self.scroll_offsets[idx].min(len.saturating_sub(visible_rows.max(1)))
            };
            self.scroll_offsets[idx] = offset;
            *list_state.offset_mut() = offset;

            let item_width = chunks[idx].width.saturating_sub(2) as usize;
            let items = column
                .tasks
                .iter()
                .enumerate()
                .map(|(t_idx, task)| {
                    task_item(task, item_width, focused && t_idx == state.cursor.task)
                })
                .collect::<Vec<_>>();
            f.render_stateful_widget(List::new(items).block(block), chunks[idx], &mut list_state);
        }
    }
}

fn draw_header(f: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, location: &BoardLocation) {
    let title = Line::from(Span::styled(
        " KANBAN BOARD ",
        Style::default()
            .fg(Color::White)
            .bg(ACCENT)
            .add_modifier(Modifier::BOLD),
    ));
    let info = Line::from(vec![
        Span::styled(
            format!("{}", location.path.display()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  •  "),
        Span::styled(
            format!("{} tasks", state.board.task_count()),
            Style::default().fg(Color::Gray),
        ),
    ]);
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));
    let paragraph = Paragraph::new(vec![title, info])
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(paragraph, area);
}

fn draw_footer(f: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    let status = match &state.error {
        Some(err) => Line::from(Span::styled(
            format!("Error: {}", err),
            Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
        )),
        None => Line::from(Span::styled(
            state.status.clone(),
            Style::default().fg(Color::Gray),
        )),
    };
    let mut lines = vec![status, detail_line(state)];
    if state.show_help {
        lines.push(help_line(&state.mode));
    }
    let footer = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(footer, area);
}

fn detail_line(state: &AppState) -> Line<'static> {
    let Some(task) = state.board.task(state.cursor.column, state.cursor.task) else {
        return Line::from(Span::styled(
            "No task selected",
            Style::default().fg(Color::DarkGray),
        ));
    };
    let mut spans = vec![
        Span::styled(
            format!("#{}", task.id),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("created {}", task.created_at.format("%Y-%m-%d %H:%M")),
            Style::default().fg(Color::Gray),
        ),
    ];
    if !task.description.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            task.description.clone(),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        ));
    }
    Line::from(spans)
}

fn help_line(mode: &Mode) -> Line<'static> {
    let key = Style::default().fg(Color::LightCyan);
    let bindings: &[(&str, &str)] = match mode {
        Mode::Browsing => &[
            ("←↑↓→/hjkl", "navigate"),
            ("a", "add"),
            ("e", "edit"),
            ("d", "delete"),
            ("[/]", "move task"),
            ("?", "toggle help"),
            ("q", "quit"),
        ],
        Mode::ConfirmingDelete { .. } => &[("y", "confirm"), ("n/Esc", "cancel")],
        Mode::AddingNew(prompt) | Mode::Editing { prompt, .. } => match prompt.entry {
            Entry::Insert => &[("Enter", "save"), ("Esc", "normal mode")],
            Entry::Normal => &[
                ("i", "insert"),
                ("h/l", "move caret"),
                ("Enter", "save"),
                ("Esc", "cancel"),
            ],
        },
    };
    let mut spans = Vec::new();
    for (i, (keys, action)) in bindings.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" • ", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(*keys, key));
        spans.push(Span::styled(format!(" {}", action), Style::default().fg(Color::Gray)));
    }
    Line::from(spans)
}

fn draw_prompt(f: &mut ratatui::Frame<'_>, title: &str, prompt: &Prompt) {
    let area = centered_rect(60, 7, f.size());
    let (caret, mode_label) = match prompt.entry {
        Entry::Insert => ("▌", "-- INSERT --"),
        Entry::Normal => ("█", "-- NORMAL --"),
    };
    let body = vec![
        Line::from(""),
        Line::from(Span::styled(
            prompt.buffer.with_caret(caret),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(Span::styled(mode_label, Style::default().fg(Color::DarkGray))),
    ];
    let dialog = Paragraph::new(body).block(
        Block::default()
            .title(Span::styled(
                format!(" {} ", title),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(ACCENT)),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_confirm(f: &mut ratatui::Frame<'_>, state: &AppState, target: TaskRef) {
    let area = centered_rect(50, 7, f.size());
    let title = state
        .board
        .position_of(target.column, target.id)
        .and_then(|idx| state.board.task(target.column, idx))
        .map(|t| t.title.clone())
        .unwrap_or_else(|| format!("#{}", target.id));
    let width = area.width.saturating_sub(14) as usize;
    let body = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Delete \"{}\"?", truncate_text(&title, width)),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("y to confirm, n or Esc to cancel"),
    ];
    let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
        Block::default()
            .title(Span::styled(
                " Confirm Delete ",
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::LightRed)),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn task_item(task: &Task, width: usize, selected: bool) -> ListItem<'static> {
    let title = truncate_text(&task.title, width.saturating_sub(2));
    let first = if selected {
        Line::from(vec![
            Span::styled("❯ ", Style::default().fg(SELECTED)),
            Span::styled(
                title,
                Style::default().fg(SELECTED).add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        Line::from(vec![Span::raw("  "), Span::styled(title, Style::default().fg(Color::White))])
    };
    let meta = truncate_text(
        &format!("#{} · {}", task.id, task.created_at.format("%Y-%m-%d")),
        width.saturating_sub(2),
    );
    let second = Line::from(vec![
        Span::raw("  "),
        Span::styled(meta, Style::default().fg(Color::DarkGray)),
    ]);
    ListItem::new(vec![first, second])
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    debug!("terminal ready");
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    debug!("terminal restored");
    Ok(())
}

/// A box `percent_x` wide and `height` rows tall, centered in `r`.
fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let width = (u32::from(r.width) * u32::from(percent_x.min(100)) / 100) as u16;
    let height = height.min(r.height);
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}
