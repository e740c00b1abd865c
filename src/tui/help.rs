use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

fn key_line(key: &str, what: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key.to_string(), Style::default().fg(Color::Magenta)),
        Span::raw(format!("{:width$}{}", "", what, width = 12usize.saturating_sub(key.len()))),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line("q / Esc", "Cancel and close"),
        key_line("tab / ←/→", "Switch Analyzer/Fieldset tab (clears selection)"),
        key_line("↑/↓", "Move highlight"),
        key_line("enter", "Select highlighted item"),
        key_line("n", "Edit extract name (fieldset, corpus target)"),
        key_line("r", "Run the selection"),
        key_line("l", "Reload option lists"),
        key_line("?", "Toggle this help"),
        Line::from(""),
        Line::from("While editing the name, enter/esc finishes editing."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
