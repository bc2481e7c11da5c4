//! Support for creating Atom feeds from a list of posts.

use crate::config::Author;
use crate::post::Post;
use crate::render::{self, Renderer};
use atom_syndication::{Category, Entry, Error as AtomError, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset};
use std::io::{self, Write};
use thiserror::Error;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub author: Option<Author>,
    pub home_page: Url,

    /// Used as the feed's `updated` time when there are no posts.
    pub now: DateTime<FixedOffset>,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and a list of
/// published [`Post`]s, newest first, and writes the result to a
/// [`std::io::Write`]. Entry summaries are the posts' excerpts rendered by
/// `renderer`.
pub fn write_feed<W: Write>(
    config: FeedConfig,
    renderer: &Renderer,
    posts: &[&Post],
    w: W,
) -> Result<()> {
    feed(config, renderer, posts)?.write_to(w)?;
    Ok(())
}

fn feed(config: FeedConfig, renderer: &Renderer, posts: &[&Post]) -> Result<Feed> {
    let mut feed = Feed::default();
    feed.set_entries(feed_entries(&config, renderer, posts)?);
    feed.set_title(config.title);
    feed.set_id(config.id);
    feed.set_updated(
        posts
            .iter()
            .map(|post| post.date)
            .max()
            .unwrap_or(config.now),
    );
    feed.set_authors(author_to_people(config.author.as_ref()));
    feed.set_links(vec![alternate(&config.home_page)]);
    Ok(feed)
}

fn feed_entries(config: &FeedConfig, renderer: &Renderer, posts: &[&Post]) -> Result<Vec<Entry>> {
    let mut entries: Vec<Entry> = Vec::with_capacity(posts.len());

    for post in posts {
        let url = renderer.links().post(post).map_err(render::Error::from)?;
        let (summary, _) = renderer.excerpt_html(post)?;

        // A post's own author wins over the site author.
        let authors = match post.author.as_str() {
            "" => author_to_people(config.author.as_ref()),
            name => {
                let mut person = Person::default();
                person.set_name(name);
                vec![person]
            }
        };

        let mut entry = Entry::default();
        entry.set_id(url.to_string());
        entry.set_title(post.title.as_str());
        entry.set_updated(post.date);
        entry.set_published(Some(post.date));
        entry.set_authors(authors);
        entry.set_links(vec![alternate(&url)]);
        entry.set_summary(Some(Text::html(summary)));
        entry.set_categories(
            post.tags
                .iter()
                .map(|tag| {
                    let mut category = Category::default();
                    category.set_term(tag.as_str());
                    category
                })
                .collect::<Vec<_>>(),
        );
        entries.push(entry);
    }
    Ok(entries)
}

fn alternate(url: &Url) -> Link {
    let mut link = Link::default();
    link.set_href(url.to_string());
    link.set_rel("alternate");
    link
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.as_str());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants include I/O, Atom, and
/// rendering issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Returned when there is an Atom-related error.
    #[error("writing feed: {0}")]
    Atom(#[from] AtomError),

    /// Returned when a post's excerpt or URL can't be rendered.
    #[error(transparent)]
    Render(#[from] render::Error),
}
