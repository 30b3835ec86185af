use std::borrow::Cow;

use htmlescape::encode_minimal;
use pulldown_cmark::{html, CowStr, Event, Options, Parser};

fn body_options() -> Options {
    Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_MATH
}

/// Render a post body to HTML. `$..$`, `$$..$$`, `\(..\)` and `\[..\]` are
/// typeset with KaTeX.
pub fn render_body(markdown: &str) -> String {
    let markdown = dollar_math(markdown);
    let events = Parser::new_ext(&markdown, body_options()).map(|event| match event {
        Event::InlineMath(tex) => math_event(&tex, false),
        Event::DisplayMath(tex) => math_event(&tex, true),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// Rewrites `\(..\)` to `$..$` and `\[..\]` to `$$..$$`. Inline math that
/// spans lines becomes display math.
fn dollar_math(markdown: &str) -> Cow<'_, str> {
    if !markdown.contains("\\(") && !markdown.contains("\\[") {
        return Cow::Borrowed(markdown);
    }

    let mut out = String::with_capacity(markdown.len());
    let mut rest = markdown;
    while let Some(at) = rest.find('\\') {
        let (before, from) = rest.split_at(at);
        out.push_str(before);

        let closing = if from.starts_with("\\(") {
            Some(("\\)", false))
        } else if from.starts_with("\\[") {
            Some(("\\]", true))
        } else {
            None
        };
        let span = closing.and_then(|(close, display)| {
            from[2..].find(close).map(|len| (close.len(), display, len))
        });

        match span {
            Some((close_len, display, len)) => {
                let tex = &from[2..2 + len];
                let fence = if display || tex.contains('\n') { "$$" } else { "$" };
                out.push_str(fence);
                out.push_str(tex);
                out.push_str(fence);
                rest = &from[2 + len + close_len..];
            }
            None => {
                out.push('\\');
                rest = &from[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn math_event(tex: &str, display_mode: bool) -> Event<'static> {
    Event::Html(CowStr::from(typeset(tex, display_mode)))
}

fn typeset(tex: &str, display_mode: bool) -> String {
    let rendered = katex::Opts::builder()
        .display_mode(display_mode)
        .build()
        .ok()
        .and_then(|opts| katex::render_with_opts(tex, opts).ok());

    rendered.unwrap_or_else(|| {
        let class = if display_mode { "math math-display" } else { "math math-inline" };
        format!("<span class=\"{class}\">{}</span>", encode_minimal(tex))
    })
}
