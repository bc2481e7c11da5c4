//! Read-only views over a [`Store`]: the published listing, tag and category
//! listings, and series navigation.
//!
//! Every listing uses the same order: newest first, ties broken by slug so the
//! output never depends on load order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::post::Post;
use crate::series::SeriesRef;
use crate::store::Store;

/// What to do with non-draft posts dated after the build time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuturePosts {
    /// List them like any other post.
    #[default]
    Include,

    /// Hold them back until their date has passed.
    Exclude,
}

/// Decides whether a post is publicly visible. Drafts never are.
#[derive(Clone, Copy, Debug)]
pub struct PublishPolicy {
    pub future: FuturePosts,

    /// The instant future-dated posts are measured against. Captured once so
    /// every view in a build agrees.
    pub now: DateTime<FixedOffset>,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        PublishPolicy::new(FuturePosts::default())
    }
}

impl PublishPolicy {
    pub fn new(future: FuturePosts) -> Self {
        PublishPolicy {
            future,
            now: Utc::now().fixed_offset(),
        }
    }

    pub fn admits(&self, post: &Post) -> bool {
        !post.draft
            && match self.future {
                FuturePosts::Include => true,
                FuturePosts::Exclude => post.date <= self.now,
            }
    }
}

/// Reported when following "next in series" links comes back to a post that
/// is already in the chain.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("series cycle: `{from}` links back to `{revisited}`")]
pub struct SeriesCycleDetected {
    /// The post whose next link closed the loop.
    pub from: String,

    /// The post the loop returned to.
    pub revisited: String,

    /// Slugs of the posts forming the loop, in traversal order, starting at
    /// `revisited`.
    pub members: Vec<String>,
}

/// The posts reachable by following next links from a start post.
#[derive(Debug)]
pub struct SeriesChain<'s> {
    pub posts: Vec<&'s Post>,
    pub cycle: Option<SeriesCycleDetected>,
}

/// A [`Store`] paired with the [`PublishPolicy`] that decides what's visible.
#[derive(Clone, Copy, Debug)]
pub struct Query<'s> {
    store: &'s Store,
    policy: PublishPolicy,
}

impl<'s> Query<'s> {
    pub fn new(store: &'s Store) -> Self {
        Query {
            store,
            policy: PublishPolicy::default(),
        }
    }

    pub fn with_policy(self, policy: PublishPolicy) -> Self {
        Query { policy, ..self }
    }

    pub fn store(&self) -> &'s Store {
        self.store
    }

    pub fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    pub fn is_visible(&self, post: &Post) -> bool {
        self.policy.admits(post)
    }

    /// Visible posts, newest first.
    pub fn published(&self) -> Vec<&'s Post> {
        self.listing(|_| true)
    }

    /// Visible posts carrying `tag` exactly (case-sensitive).
    pub fn by_tag(&self, tag: &str) -> Vec<&'s Post> {
        self.listing(|p| p.tags.contains(tag))
    }

    /// Visible posts in `category` exactly (case-sensitive).
    pub fn by_category(&self, category: &str) -> Vec<&'s Post> {
        self.listing(|p| p.categories.contains(category))
    }

    /// Every tag used by a visible post, with that tag's listing.
    pub fn tags(&self) -> BTreeMap<&'s str, Vec<&'s Post>> {
        self.group(|p| &p.tags)
    }

    /// Every category used by a visible post, with that category's listing.
    pub fn categories(&self) -> BTreeMap<&'s str, Vec<&'s Post>> {
        self.group(|p| &p.categories)
    }

    fn listing(&self, keep: impl Fn(&Post) -> bool) -> Vec<&'s Post> {
        let mut posts: Vec<&'s Post> = self
            .store
            .all_posts()
            .iter()
            .filter(|p| self.is_visible(p) && keep(*p))
            .collect();
        posts.sort_by(|a, b| listing_order(a, b));
        posts
    }

    fn group(
        &self,
        terms: impl Fn(&'s Post) -> &'s std::collections::BTreeSet<String>,
    ) -> BTreeMap<&'s str, Vec<&'s Post>> {
        let mut groups: BTreeMap<&'s str, Vec<&'s Post>> = BTreeMap::new();
        for post in self.published() {
            for term in terms(post) {
                groups.entry(term.as_str()).or_default().push(post);
            }
        }
        // `published` is already sorted, so every group is too.
        groups
    }

    /// Resolves a weak series reference to a visible post: first by the
    /// link's slug, then by the slugified label, then by exact title.
    /// Dangling references resolve to `None`.
    pub fn resolve(&self, reference: &SeriesRef) -> Option<&'s Post> {
        let visible = |p: &&'s Post| self.is_visible(p);
        reference
            .href_slug()
            .and_then(|slug| self.store.post_by_slug(&slug))
            .filter(visible)
            .or_else(|| {
                self.store
                    .post_by_slug(&slug::slugify(&reference.label))
                    .filter(visible)
            })
            .or_else(|| {
                self.store
                    .all_posts()
                    .iter()
                    .find(|p| p.title == reference.label && self.is_visible(p))
            })
    }

    /// The resolved `(previous, next)` neighbours of `post`, for page
    /// navigation.
    pub fn series_neighbours(&self, post: &Post) -> (Option<&'s Post>, Option<&'s Post>) {
        let resolve = |r: &Option<SeriesRef>| r.as_ref().and_then(|r| self.resolve(r));
        (resolve(&post.series.previous), resolve(&post.series.next))
    }

    /// Follows next links from `start` until a link is missing, dangling or
    /// points back into the chain. A missing or invisible start yields an
    /// empty chain.
    pub fn series_chain(&self, start: &str) -> SeriesChain<'s> {
        let mut chain = SeriesChain {
            posts: Vec::new(),
            cycle: None,
        };
        let mut current = match self.store.post_by_slug(start) {
            Some(post) if self.is_visible(post) => post,
            _ => return chain,
        };

        let mut seen: HashSet<&'s str> = HashSet::new();
        loop {
            seen.insert(current.slug.as_str());
            chain.posts.push(current);

            let next = match current.series.next.as_ref().and_then(|r| self.resolve(r)) {
                Some(next) => next,
                None => break,
            };
            if seen.contains(next.slug.as_str()) {
                let members = chain
                    .posts
                    .iter()
                    .skip_while(|p| p.slug != next.slug)
                    .map(|p| p.slug.clone())
                    .collect();
                let cycle = SeriesCycleDetected {
                    from: current.slug.clone(),
                    revisited: next.slug.clone(),
                    members,
                };
                debug!("{}", cycle);
                chain.cycle = Some(cycle);
                break;
            }
            current = next;
        }
        chain
    }
}

/// Newest first; equal dates fall back to slug order.
pub fn listing_order(a: &Post, b: &Post) -> Ordering {
    b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug))
}

/// Visible posts under the default policy, newest first.
pub fn published(store: &Store) -> Vec<&Post> {
    Query::new(store).published()
}

pub fn by_tag<'s>(store: &'s Store, tag: &str) -> Vec<&'s Post> {
    Query::new(store).by_tag(tag)
}

pub fn by_category<'s>(store: &'s Store, category: &str) -> Vec<&'s Post> {
    Query::new(store).by_category(category)
}

pub fn series_chain<'s>(store: &'s Store, start: &str) -> SeriesChain<'s> {
    Query::new(store).series_chain(start)
}
