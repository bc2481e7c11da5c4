//! URLs for every kind of output page, derived from the site root.
//!
//! ```text
//! {site_root}posts/{slug}.html
//! {site_root}index/index.html, {site_root}index/1.html, ...
//! {site_root}tags/{tag}/index.html, ...
//! {site_root}categories/{category}/index.html, ...
//! {site_root}static/
//! {site_root}feed.atom
//! ```

use url::{ParseError, Url};

use crate::post::Post;
use crate::taxonomy::Taxonomy;

/// Base URLs for each output section. Every base ends in a trailing slash;
/// [`Url::join`] treats the last path segment as a file name otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteLinks {
    pub root: Url,
    pub home_page: Url,
    pub posts: Url,
    pub index: Url,
    pub tags: Url,
    pub categories: Url,
    pub static_files: Url,
    pub feed: Url,
}

impl SiteLinks {
    /// `home_page` is resolved against the site root, e.g. `index.html`.
    pub fn new(site_root: &Url, home_page: &str) -> Result<SiteLinks, ParseError> {
        let root = with_trailing_slash(site_root.clone());
        Ok(SiteLinks {
            home_page: root.join(home_page)?,
            posts: root.join("posts/")?,
            index: root.join("index/")?,
            tags: root.join("tags/")?,
            categories: root.join("categories/")?,
            static_files: root.join("static/")?,
            feed: root.join("feed.atom")?,
            root,
        })
    }

    pub fn post(&self, post: &Post) -> Result<Url, ParseError> {
        self.posts.join(&format!("{}.html", post.slug))
    }

    /// The directory URL holding a term's index pages. `slug` is the term's
    /// path segment (see [`crate::taxonomy::TermSlugs`]).
    pub fn term_directory(&self, taxonomy: Taxonomy, slug: &str) -> Result<Url, ParseError> {
        let base = match taxonomy {
            Taxonomy::Tag => &self.tags,
            Taxonomy::Category => &self.categories,
        };
        base.join(&format!("{}/", slug))
    }

    /// The first index page of a term.
    pub fn term(&self, taxonomy: Taxonomy, slug: &str) -> Result<Url, ParseError> {
        self.term_directory(taxonomy, slug)?.join("index.html")
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
