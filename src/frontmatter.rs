//! Splits a post source file into its front matter and body, and validates the
//! front matter into [`Metadata`].
//!
//! Two header flavors are understood:
//!
//! ```md
//! ---
//! title: Hello, world!
//! date: 2026-02-02
//! tags: [elixir, otp]
//! ---
//! # Hello
//! ```
//!
//! and the TOML equivalent fenced with `+++`. Both are converted into the same
//! [`Metadata`] so the rest of the pipeline never cares which one was used.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

const YAML_FENCE: &str = "---";
const TOML_FENCE: &str = "+++";

/// Validated front matter for a single post.
#[derive(Clone, Debug, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub date: DateTime<FixedOffset>,
    pub draft: bool,

    /// An explicit slug override. When absent the slug is derived by the
    /// store.
    pub slug: Option<String>,
    pub author: String,
    pub description: String,
    pub categories: BTreeSet<String>,
    pub tags: BTreeSet<String>,

    /// Keys this crate doesn't interpret. They are kept so templates and
    /// later tooling can still see them.
    pub extra: BTreeMap<String, Value>,
}

/// Returned when a post source file's front matter can't be turned into
/// [`Metadata`].
#[derive(Debug, Error)]
pub enum MalformedFrontMatter {
    /// The file doesn't begin with `---` or `+++`.
    #[error("post must begin with `---` or `+++`")]
    MissingStartFence,

    /// The opening fence was found but the closing one wasn't.
    #[error("missing closing `{0}`")]
    MissingEndFence(&'static str),

    /// The YAML header isn't a well-formed mapping.
    #[error("parsing YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The TOML header isn't a well-formed table.
    #[error("parsing TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required key is absent or empty.
    #[error("missing required front matter field `{0}`")]
    MissingField(&'static str),

    /// The `date` value isn't a recognizable calendar date.
    #[error("unrecognized date `{0}`")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, MalformedFrontMatter>;

/// Parses `input` into its [`Metadata`] and the remaining body text.
pub fn parse(input: &str) -> Result<(Metadata, &str)> {
    let (fence, header, body) = split(input)?;
    let raw = match fence {
        YAML_FENCE if header.trim().is_empty() => Frontmatter::default(),
        YAML_FENCE => serde_yaml::from_str(header)?,
        _ => serde_yaml::from_value(toml_to_yaml(toml::from_str(header)?))?,
    };
    Ok((raw.validate()?, body))
}

/// Finds the fences and returns `(fence, header, body)`. The closing fence
/// must sit on a line of its own, so a `---` horizontal rule inside the
/// header text doesn't end it early.
fn split(input: &str) -> Result<(&'static str, &str, &str)> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let (first, rest) = match input.find('\n') {
        Some(i) => (&input[..i], &input[i + 1..]),
        None => (input, ""),
    };
    let fence = match first.trim_end() {
        YAML_FENCE => YAML_FENCE,
        TOML_FENCE => TOML_FENCE,
        _ => return Err(MalformedFrontMatter::MissingStartFence),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == fence {
            return Ok((fence, &rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err(MalformedFrontMatter::MissingEndFence(fence))
}

/// The front matter as written. Everything is optional here so that a missing
/// field surfaces as [`MalformedFrontMatter::MissingField`] instead of a
/// generic deserialization message.
#[derive(Deserialize, Default)]
struct Frontmatter {
    #[serde(default, alias = "Title")]
    title: Option<String>,

    #[serde(default, alias = "Date")]
    date: Option<String>,

    #[serde(default, alias = "Draft")]
    draft: bool,

    #[serde(default)]
    slug: Option<String>,

    #[serde(default, alias = "Author")]
    author: Option<String>,

    #[serde(default, alias = "Description")]
    description: Option<String>,

    #[serde(default, alias = "Categories", deserialize_with = "one_or_many")]
    categories: BTreeSet<String>,

    #[serde(default, alias = "Tags", deserialize_with = "one_or_many")]
    tags: BTreeSet<String>,

    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl Frontmatter {
    fn validate(self) -> Result<Metadata> {
        let title = self
            .title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(MalformedFrontMatter::MissingField("title"))?;
        let raw_date = self
            .date
            .filter(|d| !d.trim().is_empty())
            .ok_or(MalformedFrontMatter::MissingField("date"))?;
        let date = parse_date(&raw_date)
            .ok_or(MalformedFrontMatter::InvalidDate(raw_date))?;

        Ok(Metadata {
            title,
            date,
            draft: self.draft,
            slug: self.slug.filter(|s| !s.trim().is_empty()),
            author: self.author.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            categories: self.categories,
            tags: self.tags,
            extra: self.extra,
        })
    }
}

/// Accepts either `tags: foo` or `tags: [foo, bar]`.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => BTreeSet::new(),
        Some(OneOrMany::One(s)) => std::iter::once(s).collect(),
        Some(OneOrMany::Many(v)) => v.into_iter().collect(),
    })
}

/// Parses the date formats seen in blog front matter. Values without an
/// offset are taken to be UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];

    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}

/// TOML headers are re-expressed as YAML values so both flavors deserialize
/// through [`Frontmatter`]. TOML datetimes become their string form, which
/// [`parse_date`] understands.
fn toml_to_yaml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => Value::Number(f.into()),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => {
            Value::Sequence(items.into_iter().map(toml_to_yaml).collect())
        }
        toml::Value::Table(table) => {
            let mut mapping = Mapping::new();
            for (k, v) in table {
                mapping.insert(Value::String(k), toml_to_yaml(v));
            }
            Value::Mapping(mapping)
        }
    }
}
