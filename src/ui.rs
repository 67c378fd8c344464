use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::{App, Sender};

pub fn render(app: &mut App, frame: &mut Frame) {
    let [chat_area, input_area, help_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    // Store chat inner dimensions for the app's scroll arithmetic
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);
    let chat_scroll = app.chat_scroll;

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Customer Care Bot ");

    let chat_text = if app.transcript.is_empty() && !app.busy {
        Text::from(Span::styled(
            "Type your message and press Enter...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.transcript {
            let (label, label_color) = match msg.sender {
                Sender::User => ("You:", Color::Cyan),
                Sender::Bot => ("Bot:", Color::Yellow),
            };
            lines.push(Line::from(vec![
                Span::styled(
                    label,
                    Style::default().fg(label_color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::styled(
                    msg.timestamp.format("%H:%M:%S").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));

            // Failure entries stand out from regular bot replies
            let content_style = if msg.is_error {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            for line in msg.content.lines() {
                lines.push(Line::from(Span::styled(line, content_style)));
            }
            lines.push(Line::default());
        }

        if app.busy {
            lines.push(Line::from(Span::styled(
                "Bot:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    // Input box. Stays editable while busy; only submission is gated.
    let input_border_color = if app.busy { Color::DarkGray } else { Color::Yellow };
    let input_title = if app.busy {
        " Message (waiting for reply) "
    } else {
        " Message (Enter to send) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(input_title);

    // Horizontal scroll keeps the cursor inside the inner width
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, input_area);

    frame.set_cursor_position((
        input_area.x + (cursor_pos - scroll_offset) as u16 + 1,
        input_area.y + 1,
    ));

    // Help line with endpoint and last known backend health
    let backend = match &app.backend_status {
        Some(status) => format!("{} ({})", app.client.base_url(), status),
        None => format!("{} (unreachable)", app.client.base_url()),
    };
    let help = Paragraph::new(Line::from(vec![
        Span::styled(
            " Enter send  ↑/↓ scroll  Ctrl+L clear  Esc quit ",
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled("│ ", Style::default().fg(Color::DarkGray)),
        Span::styled(backend, Style::default().fg(Color::DarkGray)),
    ]));

    frame.render_widget(help, help_area);
}
