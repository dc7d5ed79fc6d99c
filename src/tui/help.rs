use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const KEYBINDS: &[(&str, &str)] = &[
    ("Ctrl-C", "Quit"),
    ("Enter", "Copy output"),
    ("Ctrl-Y", "Copy pipeline"),
    ("|", "Add command"),
    ("Tab", "Next command"),
    ("Shift-Tab", "Previous command"),
    ("Ctrl-D", "Delete command"),
    ("↑/↓ PgUp/PgDn", "Scroll output"),
    ("F1", "Show this help"),
];

fn keybind_line(key: &str, what: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{key:<14}"), Style::default().fg(Color::Magenta)),
        Span::raw(what.to_string()),
    ])
}

/// Centered help popup drawn over the output pane.
pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(KEYBINDS.iter().map(|(k, w)| keybind_line(k, w)));
    lines.push(Line::from(""));
    lines.push(Line::from(
        "Typing edits the trailing argument of the focused command.",
    ));
    lines.push(Line::from("Press any key to close."));

    let width = area.width.min(64);
    let height = area.height.min(lines.len() as u16 + 2);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, popup);
    f.render_widget(p, popup);
}
