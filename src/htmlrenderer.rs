//! Renders markdown [`Event`]s to HTML. This follows
//! `pulldown_cmark::html::push_html` closely, with three differences:
//!
//! * footnote references link through a prefix (the post's URL), so excerpts
//!   shown on index pages still point at the definitions on the post page;
//! * fenced code blocks keep the style options from a `highlight` shortcode as
//!   a `data-highlight` attribute next to the `language-*` class;
//! * image alt text is rendered from the image's inline content.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, LinkType, Tag};
use std::fmt::{self, Display};
use std::io;

/// Bridges [`fmt::Write`] to [`StrWrite`] so the escape functions can be used
/// from [`Display`] impls.
struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.result = self.formatter.write_str(s);
        self.result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        self.result = self.formatter.write_fmt(args);
        self.result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

#[derive(Clone, Copy)]
enum Escape {
    Href,
    Html,
}

/// Text escaped for use inside an attribute or element when formatted.
struct Escaped<'a>(Escape, &'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = match self.0 {
            Escape::Href => escape_href(&mut adaptor, self.1),
            Escape::Html => escape_html(&mut adaptor, self.1),
        };
        adaptor.result
    }
}

fn href(s: &str) -> Escaped<'_> {
    Escaped(Escape::Href, s)
}

fn html(s: &str) -> Escaped<'_> {
    Escaped(Escape::Html, s)
}

enum TableState {
    Head,
    Body,
}

struct HtmlRenderer<'p> {
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// Greater than zero while inside an image; text goes into `alt`.
    image_depth: usize,

    /// Prepended onto footnote reference links.
    footnote_prefix: &'p str,
}

impl<'p> HtmlRenderer<'p> {
    fn new(footnote_prefix: &'p str) -> Self {
        HtmlRenderer {
            table_alignments: Vec::new(),
            table_state: TableState::Head,
            table_cell_index: 0,
            image_depth: 0,
            footnote_prefix,
        }
    }

    fn on_event<W: StrWrite>(&mut self, w: &mut W, event: Event) -> io::Result<()> {
        if self.image_depth > 0 {
            return self.on_alt_event(w, event);
        }
        match event {
            Event::Start(tag) => self.on_start(w, tag),
            Event::End(tag) => self.on_end(w, tag),
            Event::Text(text) => escape_html(w, &text),
            Event::Code(code) => write!(w, "<code>{}</code>", html(&code)),
            Event::Html(raw) => w.write_str(&raw),
            Event::FootnoteReference(name) => write!(
                w,
                r##"<sup class="footnote-reference"><a href="{}#{}">{}</a></sup>"##,
                href(self.footnote_prefix),
                html(&name),
                html(&name),
            ),
            Event::SoftBreak => w.write_str("\n"),
            Event::HardBreak => w.write_str("<br />\n"),
            Event::Rule => w.write_str("<hr />\n"),
            Event::TaskListMarker(checked) => write!(
                w,
                r#"<input disabled="" type="checkbox"{}/>"#,
                if checked { r#" checked="""# } else { "" }
            ),
        }
    }

    /// Inside an image only the text matters; markup is dropped.
    fn on_alt_event<W: StrWrite>(&mut self, w: &mut W, event: Event) -> io::Result<()> {
        match event {
            Event::Start(Tag::Image(..)) => {
                self.image_depth += 1;
                Ok(())
            }
            Event::End(Tag::Image(_, _, title)) => {
                self.image_depth -= 1;
                match (self.image_depth, title.is_empty()) {
                    (0, true) => w.write_str("\">"),
                    (0, false) => write!(w, r#"" title="{}">"#, html(&title)),
                    _ => Ok(()),
                }
            }
            Event::Text(text) | Event::Code(text) => escape_html(w, &text),
            Event::SoftBreak | Event::HardBreak => w.write_str(" "),
            _ => Ok(()),
        }
    }

    fn on_start<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Heading(level) => write!(w, "<h{}>", level),
            Tag::BlockQuote => w.write_str("<blockquote>\n"),
            Tag::CodeBlock(CodeBlockKind::Indented) => w.write_str("<pre><code>"),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                let info = info.trim();
                let (language, style) = match info.split_once(char::is_whitespace) {
                    Some((language, style)) => (language, style.trim()),
                    None => (info, ""),
                };
                match (language.is_empty(), style.is_empty()) {
                    (true, _) => w.write_str("<pre><code>"),
                    (false, true) => {
                        write!(w, r#"<pre><code class="language-{}">"#, html(language))
                    }
                    (false, false) => write!(
                        w,
                        r#"<pre><code class="language-{}" data-highlight="{}">"#,
                        html(language),
                        html(style),
                    ),
                }
            }
            Tag::List(None) => w.write_str("<ul>\n"),
            Tag::List(Some(1)) => w.write_str("<ol>\n"),
            Tag::List(Some(start)) => write!(w, "<ol start=\"{}\">\n", start),
            Tag::Item => w.write_str("<li>"),
            Tag::FootnoteDefinition(name) => write!(
                w,
                r#"<div class="footnote-definition" id="{}"><sup class="footnote-definition-label">{}</sup>"#,
                html(&name),
                html(&name),
            ),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                w.write_str("<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                w.write_str("<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                w.write_str("<tr>")
            }
            Tag::TableCell => write!(
                w,
                "<{}{}>",
                self.cell_element(),
                match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => r#" style="text-align: left""#,
                    Some(Alignment::Right) => r#" style="text-align: right""#,
                    Some(Alignment::Center) => r#" style="text-align: center""#,
                    _ => "",
                }
            ),
            Tag::Emphasis => w.write_str("<em>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Link(LinkType::Email, dest, title) => {
                self.open_link(w, &format!("mailto:{}", dest), &title)
            }
            Tag::Link(_, dest, title) => self.open_link(w, &dest, &title),
            Tag::Image(_, dest, _) => {
                self.image_depth = 1;
                write!(w, r#"<img src="{}" alt=""#, href(&dest))
            }
        }
    }

    fn on_end<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::Paragraph => w.write_str("</p>\n"),
            Tag::Heading(level) => write!(w, "</h{}>\n", level),
            Tag::BlockQuote => w.write_str("</blockquote>\n"),
            Tag::CodeBlock(_) => w.write_str("</code></pre>\n"),
            Tag::List(Some(_)) => w.write_str("</ol>\n"),
            Tag::List(None) => w.write_str("</ul>\n"),
            Tag::Item => w.write_str("</li>\n"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>\n"),
            Tag::Table(_) => w.write_str("</tbody></table>\n"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                w.write_str("</tr></thead><tbody>\n")
            }
            Tag::TableRow => w.write_str("</tr>\n"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                write!(w, "</{}>", self.cell_element())
            }
            Tag::Emphasis => w.write_str("</em>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Link(..) => w.write_str("</a>"),
            // Closed in `on_alt_event`.
            Tag::Image(..) => Ok(()),
        }
    }

    fn open_link<W: StrWrite>(&mut self, w: &mut W, dest: &str, title: &str) -> io::Result<()> {
        match title.is_empty() {
            true => write!(w, r#"<a href="{}">"#, href(dest)),
            false => write!(w, r#"<a href="{}" title="{}">"#, href(dest), html(title)),
        }
    }

    fn cell_element(&self) -> &'static str {
        match self.table_state {
            TableState::Head => "th",
            TableState::Body => "td",
        }
    }
}

/// Appends the HTML for `events` onto `out`. Footnote references link to
/// `{footnote_prefix}#{name}`.
pub fn push_html<'a, I>(out: &mut String, events: I, footnote_prefix: &str) -> io::Result<()>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut renderer = HtmlRenderer::new(footnote_prefix);
    for event in events {
        renderer.on_event(out, event)?;
    }
    Ok(())
}
