//! Turns posts and listings into HTML pages through gtmpl templates.
//!
//! A post page template sees:
//!
//! * `.item` with `title`, `date`, `date_rfc3339`, `author`, `description`,
//!   `url`, `body`, `excerpt`, `truncated`, `tags` and `categories` (each a
//!   list of `name`/`url`);
//! * `.series`, nil unless the post links to a resolvable previous or next
//!   post in its series, otherwise `prev`/`next` each with `title` and `url`;
//! * `.site` with `title`, `home_page`, `static_url` and `feed`.
//!
//! An index page template sees `.title`, `.posts` (a list of `.item`-shaped
//! objects), `.prev`/`.next` page URLs or nil, and `.site`.
//!
//! Plain string fields are HTML-escaped before they reach the template;
//! `body` and `excerpt` are already HTML.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use gtmpl::{Context, Template, Value};
use pulldown_cmark::escape::escape_html;
use thiserror::Error;
use url::Url;

use crate::links::SiteLinks;
use crate::markdown;
use crate::post::Post;
use crate::query::Query;
use crate::taxonomy::{Taxonomy, Term, TermSlugs};

const POST_TEMPLATE: &str = include_str!("theme/post.html");
const INDEX_TEMPLATE: &str = include_str!("theme/index.html");

/// The parsed post and index templates.
pub struct Templates {
    pub post: Template,
    pub index: Template,
}

impl Templates {
    /// The templates compiled into the binary.
    pub fn builtin() -> Result<Templates> {
        Ok(Templates {
            post: parse_template(POST_TEMPLATE)?,
            index: parse_template(INDEX_TEMPLATE)?,
        })
    }

    /// Loads a theme. Each template may be split over several files, which
    /// are concatenated in order before parsing (so one file can `define`
    /// blocks another uses).
    pub fn from_files(post: &[PathBuf], index: &[PathBuf]) -> Result<Templates> {
        Ok(Templates {
            post: parse_template(&read_template_files(post)?)?,
            index: parse_template(&read_template_files(index)?)?,
        })
    }
}

fn read_template_files<P: AsRef<Path>>(files: &[P]) -> Result<String> {
    let mut contents = String::new();
    for file in files {
        let file = file.as_ref();
        File::open(file)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|err| Error::OpenTemplateFile {
                path: file.to_owned(),
                err,
            })?;
        contents.push(' ');
    }
    Ok(contents)
}

fn parse_template(contents: &str) -> Result<Template> {
    let mut template = Template::default();
    template.parse(contents).map_err(Error::Template)?;
    Ok(template)
}

/// Site-wide values every page can use.
#[derive(Clone, Debug)]
pub struct SiteInfo {
    pub title: String,
}

/// One page of a listing: the main index, or a tag's or category's index.
pub struct Listing<'a> {
    pub title: String,
    pub posts: &'a [&'a Post],
    pub prev: Option<Url>,
    pub next: Option<Url>,
}

/// Renders post and index pages. Rendering only reads the store.
pub struct Renderer<'s> {
    query: Query<'s>,
    links: SiteLinks,
    templates: Templates,
    site: SiteInfo,
    terms: TermSlugs,
}

impl<'s> Renderer<'s> {
    pub fn new(query: Query<'s>, links: SiteLinks, templates: Templates, site: SiteInfo) -> Self {
        Renderer {
            terms: TermSlugs::new(query.tags().into_keys(), query.categories().into_keys()),
            query,
            links,
            templates,
            site,
        }
    }

    pub fn links(&self) -> &SiteLinks {
        &self.links
    }

    pub fn query(&self) -> &Query<'s> {
        &self.query
    }

    pub fn site(&self) -> &SiteInfo {
        &self.site
    }

    /// Path segments of the tags and categories of visible posts.
    pub fn term_slugs(&self) -> &TermSlugs {
        &self.terms
    }

    /// The post's body as HTML, without the page around it.
    pub fn body_html(&self, post: &Post) -> Result<String> {
        let url = self.links.post(post)?;
        let mut out = String::new();
        markdown::to_html(&mut out, &post.body, url.as_str())?;
        Ok(out)
    }

    /// The excerpt as HTML and whether the body continues past it.
    pub fn excerpt_html(&self, post: &Post) -> Result<(String, bool)> {
        let url = self.links.post(post)?;
        let (excerpt, truncated) = post.excerpt();
        let mut out = String::new();
        markdown::to_html(&mut out, excerpt, url.as_str())?;
        Ok((out, truncated))
    }

    /// Renders the full page for a visible post. Drafts, and posts held back
    /// by the publish policy, are refused.
    pub fn render(&self, post: &Post) -> Result<String> {
        if !self.query.is_visible(post) {
            return Err(Error::NotPublished(post.slug.clone()));
        }

        let mut item = self.summary(post)?;
        item.insert("body".to_owned(), Value::String(self.body_html(post)?));

        let (prev, next) = self.query.series_neighbours(post);
        let series = match (prev, next) {
            (None, None) => Value::Nil,
            (prev, next) => object([
                ("prev", self.series_link(prev)?),
                ("next", self.series_link(next)?),
            ]),
        };

        execute(
            &self.templates.post,
            object([
                ("item", Value::Object(item)),
                ("series", series),
                ("site", self.site_value()),
            ]),
        )
    }

    /// Renders a single listing page of `posts` titled with the site title.
    pub fn render_index(&self, posts: &[&Post]) -> Result<String> {
        self.render_listing(&Listing {
            title: self.site.title.clone(),
            posts,
            prev: None,
            next: None,
        })
    }

    /// Renders one page of a (possibly paginated) listing.
    pub fn render_listing(&self, listing: &Listing) -> Result<String> {
        let posts = listing
            .posts
            .iter()
            .map(|post| self.summary(post).map(Value::Object))
            .collect::<Result<Vec<Value>>>()?;
        let page_link = |url: &Option<Url>| match url {
            Some(url) => Value::String(url.to_string()),
            None => Value::Nil,
        };

        execute(
            &self.templates.index,
            object([
                ("title", escaped(&listing.title)),
                ("posts", Value::Array(posts)),
                ("prev", page_link(&listing.prev)),
                ("next", page_link(&listing.next)),
                ("site", self.site_value()),
            ]),
        )
    }

    /// The fields shared by post pages and index entries.
    fn summary(&self, post: &Post) -> Result<HashMap<String, Value>> {
        let (excerpt, truncated) = self.excerpt_html(post)?;
        let terms = |taxonomy: Taxonomy, names: &BTreeSet<String>| -> Result<Value> {
            Ok(Value::Array(
                Term::for_names(names, taxonomy, &self.links, &self.terms)?
                    .into_iter()
                    .map(|term| object([("name", escaped(&term.name)), ("url", url(&term.url))]))
                    .collect(),
            ))
        };

        Ok(fields([
            ("slug", Value::String(post.slug.clone())),
            ("title", escaped(&post.title)),
            ("date", Value::String(post.date.format("%Y-%m-%d").to_string())),
            ("date_rfc3339", Value::String(post.date.to_rfc3339())),
            ("author", escaped(&post.author)),
            ("description", escaped(&post.description)),
            ("url", url(&self.links.post(post)?)),
            ("excerpt", Value::String(excerpt)),
            ("truncated", Value::Bool(truncated)),
            ("tags", terms(Taxonomy::Tag, &post.tags)?),
            ("categories", terms(Taxonomy::Category, &post.categories)?),
        ]))
    }

    fn series_link(&self, post: Option<&Post>) -> Result<Value> {
        Ok(match post {
            Some(post) => object([
                ("title", escaped(&post.title)),
                ("url", url(&self.links.post(post)?)),
            ]),
            None => Value::Nil,
        })
    }

    fn site_value(&self) -> Value {
        object([
            ("title", escaped(&self.site.title)),
            ("home_page", url(&self.links.home_page)),
            ("static_url", url(&self.links.static_files)),
            ("feed", url(&self.links.feed)),
        ])
    }
}

fn execute(template: &Template, value: Value) -> Result<String> {
    let context = Context::from(value).map_err(Error::Template)?;
    let mut out: Vec<u8> = Vec::new();
    template.execute(&mut out, &context).map_err(Error::Template)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> HashMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
}

fn object<const N: usize>(pairs: [(&str, Value); N]) -> Value {
    Value::Object(fields(pairs))
}

fn escaped(s: &str) -> Value {
    let mut out = String::with_capacity(s.len());
    let _ = escape_html(&mut out, s);
    Value::String(out)
}

fn url(url: &Url) -> Value {
    Value::String(url.to_string())
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem rendering a page.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when asked to render a draft or a held-back post.
    #[error("post `{0}` is not published")]
    NotPublished(String),

    /// Returned for template parse and execution errors.
    #[error("template: {0}")]
    Template(String),

    /// Returned when a theme template file can't be read.
    #[error("opening template file `{}`: {err}", path.display())]
    OpenTemplateFile { path: PathBuf, err: io::Error },

    /// Returned when a page URL can't be built.
    #[error("building URL: {0}")]
    Url(#[from] url::ParseError),

    /// Returned when markdown rendering fails.
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::{LoadOptions, Store};
    use std::fs;
    use tempfile::TempDir;

    fn store(posts: &[(&str, &str)]) -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        for (name, contents) in posts {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        let store = Store::load(dir.path(), &LoadOptions::default()).unwrap();
        (dir, store)
    }

    fn renderer(store: &Store) -> Renderer<'_> {
        Renderer::new(
            Query::new(store),
            SiteLinks::new(&Url::parse("https://example.org/").unwrap(), "index.html").unwrap(),
            Templates::builtin().unwrap(),
            SiteInfo {
                title: "Functional Notes".to_owned(),
            },
        )
    }

    #[test]
    fn test_render_post_page() -> Result<()> {
        let (_dir, store) = store(&[
            (
                "one.md",
                "---\ntitle: Part One\ndate: 2026-02-02\nauthor: Sam\ntags: [elixir]\n---\n\
                 Plain words survive rendering.\n\nNext in series: Part Two\n",
            ),
            ("two.md", "---\ntitle: Part Two\ndate: 2026-02-09\n---\nSecond.\n"),
        ]);
        let renderer = renderer(&store);
        let page = renderer.render(store.post_by_slug("part-one").unwrap())?;

        assert!(page.contains("<title>Part One · Functional Notes</title>"));
        assert!(page.contains("Plain words survive rendering."));
        assert!(page.contains("2026-02-02"));
        assert!(page.contains(" · Sam"));
        assert!(page.contains(r#"<a href="https://example.org/tags/elixir/index.html">elixir</a>"#));
        assert!(page.contains(r#"<a rel="next" href="https://example.org/posts/part-two.html">"#));
        assert!(!page.contains(r#"rel="prev""#));
        Ok(())
    }

    #[test]
    fn test_dangling_series_link_renders_nothing() -> Result<()> {
        let (_dir, store) = store(&[(
            "one.md",
            "---\ntitle: Part One\ndate: 2026-02-02\n---\nNext in series: Part Nine\n",
        )]);
        let page = renderer(&store).render(store.post_by_slug("part-one").unwrap())?;
        assert!(!page.contains(r#"class="series""#));
        Ok(())
    }

    #[test]
    fn test_render_refuses_drafts() {
        let (_dir, store) = store(&[(
            "d.md",
            "---\ntitle: Draft\ndate: 2026-02-02\ndraft: true\n---\nsecret\n",
        )]);
        assert!(matches!(
            renderer(&store).render(store.post_by_slug("draft").unwrap()),
            Err(Error::NotPublished(_))
        ));
    }

    #[test]
    fn test_render_index_uses_excerpts() -> Result<()> {
        let (_dir, store) = store(&[
            (
                "a.md",
                "---\ntitle: \"Tips & Tricks\"\ndate: 2026-02-02\n---\nShown.\n<!--more-->\nHidden.\n",
            ),
            ("b.md", "---\ntitle: Short\ndate: 2026-02-03\n---\nAll shown.\n"),
        ]);
        let renderer = renderer(&store);
        let posts = renderer.query().published();
        let page = renderer.render_index(&posts)?;

        assert!(page.contains("Tips &amp; Tricks"));
        assert!(page.contains("Shown."));
        assert!(!page.contains("Hidden."));
        assert!(page.contains("All shown."));
        assert_eq!(page.matches("Read more").count(), 1);
        assert!(page.find("Short").unwrap() < page.find("Tips &amp; Tricks").unwrap());
        Ok(())
    }

    #[test]
    fn test_render_listing_pagination_links() -> Result<()> {
        let (_dir, store) = store(&[("a.md", "---\ntitle: A\ndate: 2026-02-02\n---\nA.\n")]);
        let renderer = renderer(&store);
        let posts = renderer.query().published();
        let page = renderer.render_listing(&Listing {
            title: "Tag: elixir".to_owned(),
            posts: &posts,
            prev: Some(Url::parse("https://example.org/index/index.html")?),
            next: None,
        })?;
        assert!(page.contains("<h2>Tag: elixir</h2>"));
        assert!(page.contains(r#"<a rel="prev" href="https://example.org/index/index.html">"#));
        assert!(!page.contains(r#"rel="next""#));
        Ok(())
    }
}
