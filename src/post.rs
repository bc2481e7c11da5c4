//! Defines the [`Post`] type and how a post's slug and excerpt are derived
//! from its source file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::frontmatter::{self, MalformedFrontMatter};
use crate::series::{self, SeriesLinks};

/// A single blog entry. Posts are built once by [`crate::store::Store::load`]
/// and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// Unique within a [`crate::store::Store`].
    pub slug: String,
    pub title: String,
    pub date: DateTime<FixedOffset>,

    /// Drafts are loaded but never listed or rendered.
    pub draft: bool,
    pub author: String,
    pub description: String,
    pub categories: BTreeSet<String>,
    pub tags: BTreeSet<String>,

    /// Front matter keys that aren't interpreted.
    pub extra: BTreeMap<String, serde_yaml::Value>,

    /// Raw markdown, including shortcode directives and the excerpt marker.
    pub body: String,

    /// The path of the source file relative to the content root.
    pub source: PathBuf,

    /// "Previous/Next in series" references found in the body.
    pub series: SeriesLinks,
}

/// Where a post's slug comes from when the front matter doesn't set one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlugSource {
    /// `slugify(title)`, e.g. `Part One` becomes `part-one`.
    #[default]
    Title,

    /// The source path less its extension, e.g. `elixir/part-one.md` becomes
    /// `elixir/part-one` and `about/index.md` becomes `about`.
    Path,
}

impl Post {
    /// Parses a post from the contents of the file at `source` (relative to
    /// the content root).
    pub fn parse(
        source: &Path,
        input: &str,
        slug_source: SlugSource,
    ) -> Result<Post, MalformedFrontMatter> {
        let (meta, body) = frontmatter::parse(input)?;
        let slug = match meta.slug {
            Some(explicit) => slug::slugify(explicit),
            None => derive_slug(source, &meta.title, slug_source),
        };

        Ok(Post {
            series: series::extract(body),
            slug,
            title: meta.title,
            date: meta.date,
            draft: meta.draft,
            author: meta.author,
            description: meta.description,
            categories: meta.categories,
            tags: meta.tags,
            extra: meta.extra,
            body: body.to_owned(),
            source: source.to_owned(),
        })
    }

    /// Returns the markdown above the excerpt marker (`<!--more-->`) and
    /// whether the body was actually cut. Without a marker the excerpt is the
    /// whole body.
    pub fn excerpt(&self) -> (&str, bool) {
        lazy_static! {
            static ref MORE: Regex = Regex::new(r"<!--\s*more\s*-->").unwrap();
        }

        match MORE.find(&self.body) {
            Some(m) => (&self.body[..m.start()], true),
            None => (&self.body, false),
        }
    }
}

fn derive_slug(source: &Path, title: &str, slug_source: SlugSource) -> String {
    match slug_source {
        SlugSource::Title => match slug::slugify(title) {
            // A title made only of punctuation has no usable slug.
            s if s.is_empty() => path_slug(source),
            s => s,
        },
        SlugSource::Path => path_slug(source),
    }
}

/// Derives a slug from a source path relative to the content root. Each path
/// component is slugified on its own so nesting survives as `/`.
pub fn path_slug(relative: &Path) -> String {
    let without_extension = relative.with_extension("");
    let base: &Path = &without_extension;
    let trimmed = match base.file_name() {
        Some(name) if name == "index" => base
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(base),
        _ => base,
    };

    trimmed
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(slug::slugify(part.to_string_lossy())),
            _ => None,
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
