use crate::htmlrenderer;
use crate::shortcode;
use pulldown_cmark::{Event, Options, Parser, Tag};
use std::io;

/// Converts a post body to HTML, appending the result to `out`.
///
/// * `markdown` is the raw body; shortcodes are expanded first (see
///   [`shortcode::expand`]).
/// * `footnote_prefix` is prepended onto footnote links, normally the URL of
///   the post's own page.
pub fn to_html(out: &mut String, markdown: &str, footnote_prefix: &str) -> io::Result<()> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let expanded = shortcode::expand(markdown);
    htmlrenderer::push_html(
        out,
        Parser::new_ext(&expanded, options).map(demote_headings),
        footnote_prefix,
    )
}

/// Headings in a post sit below the site title (h1) and the post title (h2),
/// so `#` renders as h3.
fn demote_headings(ev: Event) -> Event {
    match ev {
        Event::Start(Tag::Heading(level)) => Event::Start(Tag::Heading(demote(level))),
        Event::End(Tag::Heading(level)) => Event::End(Tag::Heading(demote(level))),
        _ => ev,
    }
}

fn demote(level: u32) -> u32 {
    std::cmp::min(level + 2, 6)
}

#[cfg(test)]
mod test {
    use super::*;

    fn html(markdown: &str) -> String {
        let mut out = String::new();
        to_html(&mut out, markdown, "/posts/p.html").unwrap();
        out
    }

    #[test]
    fn test_headings_are_demoted() {
        assert_eq!(html("# Title"), "<h3>Title</h3>\n");
        assert_eq!(html("##### Deep"), "<h6>Deep</h6>\n");
    }

    #[test]
    fn test_shortcodes_are_expanded() {
        let out = html(
            "Some code:\n\n{{< highlight elixir >}}\nEnum.map(list, &(&1 * 2))\n{{< /highlight >}}\n\n\
             {{< figure src=\"/img/pipe.png\" alt=\"The pipe operator\" >}}\n",
        );
        assert!(out.contains(
            "<pre><code class=\"language-elixir\">Enum.map(list, &amp;(&amp;1 * 2))\n</code></pre>"
        ));
        assert!(out.contains(r#"<img src="/img/pipe.png" alt="The pipe operator">"#));
    }

    #[test]
    fn test_plain_text_round_trips() {
        let text = "Functional programming favors small composable functions";
        assert!(html(text).contains(text));
    }

    #[test]
    fn test_punctuation_is_not_rewritten() {
        let out = html("It's \"pure\" -- no side effects...");
        assert!(out.contains("It's &quot;pure&quot; -- no side effects..."));
    }
}
