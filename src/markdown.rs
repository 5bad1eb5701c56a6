//! Markdown and math styling for chat messages.
//!
//! This is a small line-oriented renderer, not a full markdown parser. It
//! handles what model answers actually contain: `**bold**`, `` `code` ``,
//! headings, bullets, fenced code blocks and `$`/`$$` math.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::latex::normalize_delimiters;

fn bold_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn code_style() -> Style {
    Style::default().fg(Color::Green)
}

fn math_style() -> Style {
    Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC)
}

/// Render a full message body, normalizing math delimiters first.
pub fn render_message(content: &str) -> Vec<Line<'static>> {
    let text = normalize_delimiters(content);
    let mut lines = Vec::new();
    let mut in_code = false;
    let mut in_math = false;

    for raw in text.lines() {
        let trimmed = raw.trim();

        if trimmed.starts_with("```") {
            in_code = !in_code;
            lines.push(Line::from(Span::styled(
                raw.to_string(),
                Style::default().fg(Color::DarkGray),
            )));
            continue;
        }
        if in_code {
            lines.push(Line::from(Span::styled(raw.to_string(), code_style())));
            continue;
        }

        // A `$$` fence on its own line opens or closes a display block
        if trimmed == "$$" {
            in_math = !in_math;
            continue;
        }
        if in_math {
            lines.push(Line::from(Span::styled(format!("  {}", trimmed), math_style())));
            continue;
        }
        // `$$ x = 1` opening a block whose close is on a later line
        if let Some(rest) = trimmed.strip_prefix("$$") {
            if !rest.contains("$$") {
                in_math = true;
                lines.push(Line::from(Span::styled(format!("  {}", rest.trim()), math_style())));
                continue;
            }
        }

        lines.push(render_line(raw));
    }

    lines
}

fn render_line(line: &str) -> Line<'static> {
    let trimmed = line.trim_start();

    if let Some(heading) = heading_text(trimmed) {
        return Line::from(Span::styled(
            heading.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }

    if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        let indent = &line[..line.len() - trimmed.len()];
        let mut spans = vec![Span::raw(format!("{}• ", indent))];
        spans.extend(parse_inline(item).spans);
        return Line::from(spans);
    }

    parse_inline(line)
}

fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) {
        line[hashes..].strip_prefix(' ')
    } else {
        None
    }
}

fn opening_token(text: &str) -> Option<(&'static str, Style)> {
    if text.starts_with("**") {
        Some(("**", bold_style()))
    } else if text.starts_with("$$") {
        Some(("$$", math_style()))
    } else if text.starts_with('`') {
        Some(("`", code_style()))
    } else if text.starts_with('$') {
        Some(("$", math_style()))
    } else {
        None
    }
}

/// Parse one line of text into styled spans.
///
/// A token without a matching close is kept as literal text.
pub fn parse_inline(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current_text = String::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if let Some((token, style)) = opening_token(rest) {
            let after = &rest[token.len()..];
            match after.find(token) {
                Some(end) if end > 0 => {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(after[..end].to_string(), style));
                    rest = &after[end + token.len()..];
                }
                _ => {
                    current_text.push_str(token);
                    rest = after;
                }
            }
            continue;
        }

        current_text.push(c);
        rest = &rest[c.len_utf8()..];
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn test_plain_text() {
        let line = parse_inline("just words");
        assert_eq!(contents(&line), vec!["just words"]);
    }

    #[test]
    fn test_bold_and_code() {
        let line = parse_inline("a **strong** claim with `code`");
        assert_eq!(contents(&line), vec!["a ", "strong", " claim with ", "code"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[3].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_inline_math_after_normalization() {
        let lines = render_message(r"Energy \(E=mc^2\) holds.");
        assert_eq!(contents(&lines[0]), vec!["Energy ", "E=mc^2", " holds."]);
        assert_eq!(lines[0].spans[1].style.fg, Some(Color::Magenta));
    }

    #[test]
    fn test_unclosed_tokens_are_literal() {
        let line = parse_inline("costs $5 and **more");
        assert_eq!(contents(&line), vec!["costs $5 and **more"]);
    }

    #[test]
    fn test_display_block_across_lines() {
        let lines = render_message("Formula:\n\\[\nA = \\pi r^2\n\\]\nEnd");
        let text: Vec<Vec<String>> = lines.iter().map(contents).collect();
        assert_eq!(
            text,
            vec![
                vec!["Formula:".to_string()],
                vec!["  A = \\pi r^2".to_string()],
                vec!["End".to_string()],
            ]
        );
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::Magenta));
    }

    #[test]
    fn test_single_line_display_math() {
        let lines = render_message(r"\[x=1\]");
        assert_eq!(contents(&lines[0]), vec!["x=1"]);
    }

    #[test]
    fn test_code_fence_is_not_parsed() {
        let lines = render_message("```\nlet x = **y**;\n```");
        assert_eq!(lines.len(), 3);
        assert_eq!(contents(&lines[1]), vec!["let x = **y**;"]);
    }

    #[test]
    fn test_headings_and_bullets() {
        let lines = render_message("## Summary\n- first **point**\n  * nested");
        assert_eq!(contents(&lines[0]), vec!["Summary"]);
        assert_eq!(contents(&lines[1]), vec!["• ", "first ", "point"]);
        assert_eq!(contents(&lines[2]), vec!["  • ", "nested"]);
    }

    #[test]
    fn test_empty_line() {
        assert!(parse_inline("").spans.is_empty());
    }
}
