use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::App;
use crate::markdown::render_message;
use crate::state::ChatRole;

const SIDEBAR_WIDTH: u16 = 34;
const MAX_INPUT_LINES: usize = 5;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [sidebar_area, main_area] = Layout::horizontal([
        Constraint::Length(SIDEBAR_WIDTH),
        Constraint::Min(0),
    ])
    .areas(body_area);

    render_sidebar(app, frame, sidebar_area);
    render_chat_screen(app, frame, main_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = if app.chat.is_pending() {
        " [waiting for reply]"
    } else {
        ""
    };

    let title = Line::from(vec![
        Span::styled(" Advocate ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(status, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Advocate ");

    let label = Style::default().fg(Color::DarkGray);
    let key = Style::default().fg(Color::Yellow).bold();

    let lines = vec![
        Line::from(Span::styled("Endpoint", label)),
        Line::from(app.endpoint().to_string()),
        Line::default(),
        Line::from(Span::styled("Stream mode", label)),
        Line::from(app.stream_mode()),
        Line::default(),
        Line::from(vec![Span::styled("Ctrl+L     ", key), Span::raw("Clear Chat")]),
        Line::from(vec![Span::styled("Enter      ", key), Span::raw("Send")]),
        Line::from(vec![Span::styled("Alt+Enter  ", key), Span::raw("New line")]),
        Line::from(vec![Span::styled("Esc        ", key), Span::raw("Quit")]),
    ];

    let sidebar = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(sidebar, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = if app.chat.is_pending() {
        (" THINKING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" Alt+Enter ", key_style),
        Span::styled(" newline ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Ctrl+L ", key_style),
        Span::styled(" clear ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ];

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Transcript rows before wrapping: label, message body, blank separator.
pub(crate) fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in app.chat.messages() {
        let label = match msg.role {
            ChatRole::User => Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            ChatRole::Assistant => Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        };
        lines.push(Line::from(label));
        lines.extend(render_message(&msg.content));
        lines.push(Line::default());
    }

    if app.chat.is_pending() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let error_text = app.chat.error().map(|e| e.to_string());
    let error_height = error_text
        .as_ref()
        .map(|text| (text.lines().count().clamp(1, 4) + 2) as u16)
        .unwrap_or(0);

    let input_lines = app.chat.input().split('\n').count().clamp(1, MAX_INPUT_LINES);
    let input_height = input_lines as u16 + 2;

    let [chat_area, error_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(error_height),
        Constraint::Length(input_height),
    ])
    .areas(area);

    // Store chat area for mouse hit-testing and dimensions for scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let chat_text = if app.chat.messages().is_empty() && !app.chat.is_pending() {
        Text::from(Span::styled(
            "Ask a legal question to get started...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(transcript_lines(app))
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, chat_area);

    let total_lines = app.transcript_height();
    if total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(total_lines as usize)
            .position(app.scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            chat_area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }

    if let Some(text) = error_text {
        let error_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Error ");
        let error = Paragraph::new(text)
            .style(Style::default().fg(Color::Red))
            .block(error_block)
            .wrap(Wrap { trim: true });
        frame.render_widget(error, error_area);
    }

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.chat.is_pending() {
        Color::DarkGray
    } else {
        Color::Yellow
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Ask (Enter to send) ");

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;

    // Cursor row and column within the multi-line input
    let before_cursor: String = app.chat.input().chars().take(app.cursor).collect();
    let cursor_row = before_cursor.matches('\n').count();
    let cursor_col = before_cursor
        .rsplit('\n')
        .next()
        .map(|line| line.chars().count())
        .unwrap_or(0);

    // Scroll offsets to keep cursor visible
    let col_offset = if inner_width == 0 {
        0
    } else if cursor_col >= inner_width {
        cursor_col - inner_width + 1
    } else {
        0
    };
    let row_offset = if inner_height == 0 {
        0
    } else {
        (cursor_row + 1).saturating_sub(inner_height)
    };

    // Use cyan text to match the "You:" style - visible in both light and dark terminals
    let input = Paragraph::new(app.chat.input().to_string())
        .style(Style::default().fg(Color::Cyan))
        .block(input_block)
        .scroll((row_offset as u16, col_offset as u16));

    frame.render_widget(input, area);

    frame.set_cursor_position((
        area.x + (cursor_col - col_offset) as u16 + 1,
        area.y + (cursor_row - row_offset) as u16 + 1,
    ));
}
