//! Expands the Hugo-style shortcodes found in post bodies into plain
//! markdown/HTML before the markdown pass:
//!
//! * `{{< highlight elixir "linenos=table" >}}…{{< /highlight >}}` becomes a
//!   fenced code block whose info string carries the language and the style
//!   options; [`crate::htmlrenderer`] turns those into
//!   `<pre><code class="language-elixir" data-highlight="linenos=table">`.
//! * `{{< figure src="…" alt="…" title="…" width="…" >}}` (also `image` and
//!   `img`) becomes a `<figure>` element.
//!
//! Anything that doesn't look like one of these is left untouched.

use std::borrow::Cow;
use std::collections::HashMap;

use lazy_static::lazy_static;
use pulldown_cmark::escape::{escape_href, escape_html};
use regex::{Captures, Regex};

lazy_static! {
    static ref HIGHLIGHT_OPEN: Regex = Regex::new(
        r#"\{\{([<%])\s*highlight\s+([^\s"%>]+)(?:\s+"([^"]*)"|\s+([^\s"%>]+))?\s*[%>]\}\}"#
    )
    .unwrap();
    static ref HIGHLIGHT_CLOSE: Regex =
        Regex::new(r"\{\{[<%]\s*/\s*highlight\s*[%>]\}\}").unwrap();
    static ref FIGURE: Regex =
        Regex::new(r"\{\{[<%]\s*(?:figure|image|img)\s+(.*?)\s*/?\s*[%>]\}\}").unwrap();
    static ref ATTRIBUTE: Regex = Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).unwrap();
}

/// Expands every recognized shortcode in `body`.
pub fn expand(body: &str) -> Cow<'_, str> {
    match expand_highlights(body) {
        Cow::Borrowed(body) => FIGURE.replace_all(body, figure),
        Cow::Owned(body) => Cow::Owned(FIGURE.replace_all(&body, figure).into_owned()),
    }
}

fn expand_highlights(body: &str) -> Cow<'_, str> {
    let mut out = String::new();
    let mut rest = body;
    while let Some(open) = HIGHLIGHT_OPEN.captures(rest) {
        let whole = match open.get(0) {
            Some(m) => m,
            None => break,
        };
        let close = match HIGHLIGHT_CLOSE.find(&rest[whole.end()..]) {
            Some(close) => close,
            // Unterminated; leave it as written.
            None => break,
        };

        let language = &open[2];
        let style = open.get(3).or_else(|| open.get(4)).map_or("", |m| m.as_str());
        let code = &rest[whole.end()..whole.end() + close.start()];
        out.push_str(&rest[..whole.start()]);
        push_fenced(&mut out, language, style, code);
        rest = &rest[whole.end() + close.end()..];
    }

    if out.is_empty() && rest.len() == body.len() {
        return Cow::Borrowed(body);
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Writes `code` as a fenced block. The fence is longer than any backtick run
/// inside the code so the code can never close it.
fn push_fenced(out: &mut String, language: &str, style: &str, code: &str) {
    let longest_run = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(std::cmp::max(3, longest_run + 1));
    let code = code.strip_prefix("\r\n").or_else(|| code.strip_prefix('\n')).unwrap_or(code);
    let code = code.trim_end_matches(|c| c == '\n' || c == '\r');

    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&fence);
    out.push_str(language);
    if !style.is_empty() {
        out.push(' ');
        out.push_str(style);
    }
    out.push('\n');
    out.push_str(code);
    out.push('\n');
    out.push_str(&fence);
    out.push('\n');
}

fn figure(caps: &Captures) -> String {
    let attributes: HashMap<&str, &str> = ATTRIBUTE
        .captures_iter(caps.get(1).map_or("", |m| m.as_str()))
        .filter_map(|a| Some((a.get(1)?.as_str(), a.get(2)?.as_str())))
        .collect();
    let attribute = |name: &str| attributes.get(name).copied().unwrap_or("");

    let mut out = String::from(r#"<figure><img src=""#);
    let _ = escape_href(&mut out, attribute("src"));
    out.push_str(r#"" alt=""#);
    let _ = escape_html(&mut out, attribute("alt"));
    out.push('"');
    for name in ["title", "width"] {
        if let Some(value) = attributes.get(name) {
            out.push(' ');
            out.push_str(name);
            out.push_str(r#"=""#);
            let _ = escape_html(&mut out, value);
            out.push('"');
        }
    }
    out.push('>');
    if let Some(caption) = attributes.get("caption").or_else(|| attributes.get("title")) {
        out.push_str("<figcaption>");
        let _ = escape_html(&mut out, caption);
        out.push_str("</figcaption>");
    }
    out.push_str("</figure>");
    out
}
