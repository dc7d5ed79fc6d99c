mod export;
mod help;
mod input;
mod state;

use crate::model::{ControllerEvent, PipelineConfig, PipelineEvent};
use crate::orchestrator;
use anyhow::{Context, Result};
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use export::{copy_and_report, pipeline_text};
use input::{handle_key, UiAction};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Terminal,
};
use state::{LineEditor, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const KEY_HELP: &str = "[Ctrl+C] Quit  [Enter] Copy output  [Ctrl+Y] Copy pipeline  [|] Add  [Tab] Next  [Shift+Tab] Prev  [Ctrl+D] Del  [F1] Help";
const CURSOR_COLOR: Color = Color::Indexed(63);
const TAB_WIDTH: usize = 8;

pub async fn run(cfg: PipelineConfig, input: Vec<u8>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ControllerEvent>();
    let (update_tx, update_rx) = mpsc::unbounded_channel::<PipelineEvent>();

    // TUI runs in a dedicated thread to keep all blocking terminal I/O out of the Tokio runtime.
    let ui_tx = event_tx.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(update_rx, ui_tx));

    let res = orchestrator::run_controller(&cfg, input, event_tx, event_rx, update_tx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI on a dedicated thread. Always tells the controller to quit on the way out.
pub fn run_threaded(
    mut update_rx: UnboundedReceiver<PipelineEvent>,
    event_tx: UnboundedSender<ControllerEvent>,
) -> Result<()> {
    let res = run_terminal(&mut update_rx, &event_tx);
    let _ = event_tx.send(ControllerEvent::Quit);
    res
}

fn run_terminal(
    update_rx: &mut UnboundedReceiver<PipelineEvent>,
    event_tx: &UnboundedSender<ControllerEvent>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let res = Terminal::new(CrosstermBackend::new(stdout))
        .context("create terminal")
        .and_then(|mut terminal| {
            terminal.clear().ok();
            ui_loop(&mut terminal, update_rx, event_tx)
        });

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen, Show).ok();
    res
}

fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    update_rx: &mut UnboundedReceiver<PipelineEvent>,
    event_tx: &UnboundedSender<ControllerEvent>,
) -> Result<()> {
    // UiState is owned by the UI thread only; pipeline state lives in the controller.
    let mut state = UiState::default();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    loop {
        // Drain updates without blocking to keep the UI responsive.
        loop {
            match update_rx.try_recv() {
                Ok(ev) => {
                    state.apply_update(ev);
                    dirty = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            if let Ok(size) = terminal.size() {
                state.page_height = size.height.saturating_sub(footer_height(&state));
                state.clamp_scroll();
            }
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if !event::poll(Duration::from_millis(10)).unwrap_or(false) {
            continue;
        }
        match event::read() {
            Ok(Event::Key(k)) if k.kind == KeyEventKind::Press => {
                dirty = true;
                match handle_key(&mut state, k) {
                    UiAction::None => {}
                    UiAction::Send(ev) => {
                        if event_tx.send(ev).is_err() {
                            return Ok(());
                        }
                    }
                    UiAction::CopyOutput => {
                        let text = state.output.clone();
                        copy_and_report(&mut state, "output", &text);
                    }
                    UiAction::CopyPipeline => {
                        let text = pipeline_text(&state);
                        copy_and_report(&mut state, "pipeline", &text);
                    }
                    UiAction::Quit => return Ok(()),
                }
            }
            Ok(Event::Resize(..)) => dirty = true,
            _ => {}
        }
    }
}

fn footer_height(state: &UiState) -> u16 {
    if state.modal.is_some() {
        5
    } else {
        2
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(footer_height(state))])
        .split(area);

    draw_output(chunks[0], f, state);
    draw_footer(chunks[1], f, state);
    if state.show_help {
        help::draw_help(chunks[0], f);
    }
}

/// Expand tabs and drop control characters so raw command output cannot move the cursor.
fn display_line(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut col = 0;
    for c in raw.chars() {
        if c == '\t' {
            let pad = TAB_WIDTH - col % TAB_WIDTH;
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else if !c.is_control() {
            out.push(c);
            col += 1;
        }
    }
    out
}

fn draw_output(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    // Only the visible window is materialized; outputs can be large.
    let lines: Vec<Line> = state
        .output
        .lines()
        .skip(state.scroll as usize)
        .take(area.height as usize)
        .map(|l| Line::from(display_line(l)))
        .collect();
    f.render_widget(Paragraph::new(lines), area);
}

fn editor_spans(editor: &LineEditor, show_cursor: bool) -> Vec<Span<'static>> {
    let (before, after) = editor.split_at_cursor();
    if !show_cursor {
        return vec![Span::raw(editor.value().to_string())];
    }
    let mut rest = after.chars();
    let under = rest.next().unwrap_or(' ');
    vec![
        Span::raw(before.to_string()),
        Span::styled(
            under.to_string(),
            Style::default()
                .bg(CURSOR_COLOR)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(rest.collect::<String>()),
    ]
}

fn prompt_line(state: &UiState) -> Line<'static> {
    let mut spans = vec![Span::styled("Command: ", Style::default().fg(Color::Cyan))];
    if state.stages.is_empty() {
        spans.push(Span::styled(
            "(press | to add a command)",
            Style::default().fg(Color::DarkGray),
        ));
        return Line::from(spans);
    }

    for (i, stage) in state.stages.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
        }
        if i == state.focus {
            spans.push(Span::styled(
                format!("{} ", stage.base_display()),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.extend(editor_spans(&state.editor, state.modal.is_none()));
        } else {
            spans.push(Span::raw(stage.display()));
        }
    }
    Line::from(spans)
}

fn draw_footer(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    let percent = format!("{:3.0}%", state.scroll_percent() * 100.0);
    let status = if state.running {
        format!(" running… {} ", state.info)
    } else if state.info.is_empty() {
        " ".to_string()
    } else {
        format!(" {} ", state.info)
    };
    let used = KEY_HELP.chars().count() + status.chars().count() + percent.chars().count();
    let fill = (area.width as usize).saturating_sub(used);
    let status_line = Line::from(vec![
        Span::styled(KEY_HELP, Style::default().fg(Color::Gray)),
        Span::styled("─".repeat(fill), Style::default().fg(Color::DarkGray)),
        Span::styled(status, Style::default().fg(Color::Yellow)),
        Span::styled(percent, Style::default().fg(Color::Gray)),
    ]);
    f.render_widget(Paragraph::new(status_line), rows[0]);
    f.render_widget(Paragraph::new(prompt_line(state)), rows[1]);

    if let Some(modal) = &state.modal {
        let mut spans = vec![Span::raw("New command: ")];
        spans.extend(editor_spans(modal, true));
        let p = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
        f.render_widget(p, rows[2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommandNode;

    #[test]
    fn display_line_expands_tabs_and_strips_escapes() {
        assert_eq!(display_line("a\tb"), "a       b");
        assert_eq!(display_line("\x1b[31mred\x1b[0m"), "[31mred[0m");
        assert_eq!(display_line("plain"), "plain");
    }

    #[test]
    fn prompt_shows_every_stage() {
        let mut state = UiState::default();
        state.apply_update(PipelineEvent::StagesChanged {
            stages: vec![
                CommandNode::new("cat", vec![]),
                CommandNode::new("grep", vec!["-i".into()]),
            ],
            focus: 0,
        });
        let text: String = prompt_line(&state)
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(text, "Command: cat   | grep -i");
    }

    #[test]
    fn empty_pipeline_prompts_for_a_command() {
        let text: String = prompt_line(&UiState::default())
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert!(text.contains("press | to add a command"));
    }
}
