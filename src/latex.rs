//! Math delimiter normalization.
//!
//! Model output mixes `\[ \]` / `\( \)` delimiters (sometimes with doubled
//! backslashes after JSON escaping) with the dollar form. The renderer only
//! understands `$...$` and `$$...$$`, so everything is rewritten to that.

use regex::{Captures, Regex};
use std::sync::OnceLock;

struct Rules {
    escaped_display: Regex,
    display: Regex,
    escaped_inline: Regex,
    inline: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        escaped_display: Regex::new(r"(?s)\\\\\[(.*?)\\\\\]").expect("valid regex"),
        display: Regex::new(r"(?s)\\\[(.*?)\\\]").expect("valid regex"),
        escaped_inline: Regex::new(r"(?s)\\\\\((.*?)\\\\\)").expect("valid regex"),
        inline: Regex::new(r"(?s)\\\((.*?)\\\)").expect("valid regex"),
    })
}

/// Rewrite bracket/parenthesis math delimiters into dollar-delimited form.
///
/// Passes run in a fixed order: `\\[..\\]`, `\[..\]`, `\\(..\\)`, `\(..\)`.
/// Display forms become `$$..$$`, inline forms become `$..$`. Unbalanced
/// delimiters are left alone.
pub fn normalize_delimiters(text: &str) -> String {
    let rules = rules();
    let text = rules.escaped_display.replace_all(text, display_math);
    let text = rules.display.replace_all(&text, display_math);
    let text = rules.escaped_inline.replace_all(&text, inline_math);
    let text = rules.inline.replace_all(&text, inline_math);
    text.into_owned()
}

fn display_math(caps: &Captures) -> String {
    format!("$${}$$", &caps[1])
}

fn inline_math(caps: &Captures) -> String {
    format!("${}$", &caps[1])
}
