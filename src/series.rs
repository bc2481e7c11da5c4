//! Extracts "Previous in series" / "Next in series" references from post
//! bodies. The references are free text written by the author, so they are
//! kept as weak [`SeriesRef`]s and only resolved against the store at query
//! time (see [`crate::query::Query::resolve`]).

use lazy_static::lazy_static;
use regex::Regex;

/// The series neighbours a post names in its body. Either side may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeriesLinks {
    pub previous: Option<SeriesRef>,
    pub next: Option<SeriesRef>,
}

/// A reference to another post by title and, when the author wrote a link,
/// by URL. It doesn't own or guarantee the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesRef {
    /// The visible text, usually the target's title (`Part Two`).
    pub label: String,

    /// The link target if the reference was a markdown link.
    pub href: Option<String>,
}

impl SeriesRef {
    /// The slug the link target points at, if there's a link. Handles plain
    /// paths (`/posts/part-two/`, `part-two.md`) and Hugo `ref`/`relref`
    /// shortcodes (`{{< ref "part-two" >}}`).
    pub fn href_slug(&self) -> Option<String> {
        lazy_static! {
            static ref REF: Regex =
                Regex::new(r#"\{\{[<%]\s*(?:rel)?ref\s+"([^"]+)"\s*[>%]\}\}"#)
                    .unwrap();
        }

        let href = self.href.as_deref()?;
        let target = match REF.captures(href) {
            Some(caps) => caps.get(1)?.as_str(),
            None => href,
        };
        let target = target.split(['#', '?']).next()?;
        target
            .rsplit('/')
            .map(|segment| {
                segment
                    .trim_end_matches(".md")
                    .trim_end_matches(".markdown")
                    .trim_end_matches(".html")
            })
            .find(|stem| !stem.is_empty() && *stem != "index")
            .map(slug::slugify)
    }
}

/// Scans `body` for the first "Previous in series" and the first "Next in
/// series" line.
pub fn extract(body: &str) -> SeriesLinks {
    lazy_static! {
        static ref LINE: Regex = Regex::new(
            r"(?mi)^[^\w\n]*(previous|prev|next)\s+in\s+(?:the\s+)?series[*_\s]*:[*_\s]*(.+?)[*_\s.]*$"
        )
        .unwrap();
    }

    let mut links = SeriesLinks::default();
    for caps in LINE.captures_iter(body) {
        let slot = match caps[1].to_ascii_lowercase().as_str() {
            "next" => &mut links.next,
            _ => &mut links.previous,
        };
        if slot.is_none() {
            *slot = parse_target(&caps[2]);
        }
    }
    links
}

fn parse_target(text: &str) -> Option<SeriesRef> {
    lazy_static! {
        static ref LINK: Regex = Regex::new(r"\[([^\]]+)\]\(([^)]*)\)").unwrap();
    }

    let reference = match LINK.captures(text) {
        Some(caps) => SeriesRef {
            label: clean_label(&caps[1]),
            href: Some(caps[2].trim().to_owned()).filter(|h| !h.is_empty()),
        },
        None => SeriesRef {
            label: clean_label(text),
            href: None,
        },
    };
    match reference.label.is_empty() && reference.href.is_none() {
        true => None,
        false => Some(reference),
    }
}

fn clean_label(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_' || c == '"')
        .to_owned()
}
