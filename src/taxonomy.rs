//! Tags and categories. Both group posts the same way and differ only in
//! where their index pages live and how they're labelled.

use std::collections::{BTreeSet, HashMap, HashSet};

use url::{ParseError, Url};

use crate::links::SiteLinks;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Taxonomy {
    Tag,
    Category,
}

impl Taxonomy {
    /// The output subdirectory for this taxonomy's index pages.
    pub fn directory(self) -> &'static str {
        match self {
            Taxonomy::Tag => "tags",
            Taxonomy::Category => "categories",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Taxonomy::Tag => "Tag",
            Taxonomy::Category => "Category",
        }
    }
}

/// A tag or category as shown on a page: its name and its first index page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    pub name: String,
    pub url: Url,
}

impl Term {
    /// Builds the terms for a post's `tags` or `categories`.
    pub fn for_names(
        names: &BTreeSet<String>,
        taxonomy: Taxonomy,
        links: &SiteLinks,
        slugs: &TermSlugs,
    ) -> Result<Vec<Term>, ParseError> {
        names
            .iter()
            .map(|name| {
                Ok(Term {
                    name: name.clone(),
                    url: links.term(taxonomy, &slugs.get(taxonomy, name))?,
                })
            })
            .collect()
    }
}

/// The path segment of every term in use. Terms are matched
/// case-sensitively, so `Elixir` and `elixir` are distinct terms whose slugs
/// collide; one of them gets a numbered segment (`elixir-2`) so neither
/// index overwrites the other.
#[derive(Clone, Debug, Default)]
pub struct TermSlugs(HashMap<Taxonomy, HashMap<String, String>>);

impl TermSlugs {
    pub fn new<'n>(
        tags: impl IntoIterator<Item = &'n str>,
        categories: impl IntoIterator<Item = &'n str>,
    ) -> TermSlugs {
        let mut slugs = TermSlugs::default();
        slugs.assign(Taxonomy::Tag, tags);
        slugs.assign(Taxonomy::Category, categories);
        slugs
    }

    /// Names that already are their own slug keep it; the rest are assigned
    /// in name order, so the result doesn't depend on iteration order.
    fn assign<'n>(&mut self, taxonomy: Taxonomy, names: impl IntoIterator<Item = &'n str>) {
        let mut names: Vec<&str> = names.into_iter().collect();
        names.sort_unstable();
        names.dedup();
        names.sort_by_key(|name| term_slug(name) != *name);

        let mut taken: HashSet<String> = HashSet::new();
        let assigned = self.0.entry(taxonomy).or_default();
        for name in names {
            let base = term_slug(name);
            let mut slug = base.clone();
            let mut n = 2;
            while !taken.insert(slug.clone()) {
                slug = format!("{}-{}", base, n);
                n += 1;
            }
            assigned.insert(name.to_owned(), slug);
        }
    }

    /// The segment for `name`, or its plain slug if it isn't a known term.
    pub fn get(&self, taxonomy: Taxonomy, name: &str) -> String {
        self.0
            .get(&taxonomy)
            .and_then(|assigned| assigned.get(name))
            .cloned()
            .unwrap_or_else(|| term_slug(name))
    }
}

/// The path segment used for a term. Terms are matched case-sensitively, but
/// their pages live at slugified paths so they're safe in a URL.
pub fn term_slug(name: &str) -> String {
    match slug::slugify(name) {
        s if s.is_empty() => String::from("_"),
        s => s,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_term_slug() {
        assert_eq!(term_slug("AI Tools"), "ai-tools");
        assert_eq!(term_slug("elixir"), "elixir");
        assert_eq!(term_slug("++"), "_");
    }

    #[test]
    fn test_terms_for_names() -> Result<(), ParseError> {
        let links = SiteLinks::new(&Url::parse("https://example.org/")?, "index.html")?;
        let names: BTreeSet<String> = ["otp", "Elixir"].iter().map(|s| s.to_string()).collect();
        let slugs = TermSlugs::new(names.iter().map(String::as_str), []);
        let terms = Term::for_names(&names, Taxonomy::Tag, &links, &slugs)?;
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].name, "Elixir");
        assert_eq!(terms[0].url.as_str(), "https://example.org/tags/elixir/index.html");
        Ok(())
    }

    #[test]
    fn test_term_slugs_keep_case_distinct_terms_apart() {
        let slugs = TermSlugs::new(["Elixir", "elixir", "OTP"], ["Elixir"]);
        assert_eq!(slugs.get(Taxonomy::Tag, "elixir"), "elixir");
        assert_eq!(slugs.get(Taxonomy::Tag, "Elixir"), "elixir-2");
        assert_eq!(slugs.get(Taxonomy::Tag, "OTP"), "otp");
        // Taxonomies don't share segments.
        assert_eq!(slugs.get(Taxonomy::Category, "Elixir"), "elixir");
        // Unknown names fall back to their plain slug.
        assert_eq!(slugs.get(Taxonomy::Tag, "Phoenix"), "phoenix");
    }

    #[test]
    fn test_term_slugs_skip_taken_suffixes() {
        let slugs = TermSlugs::new(["elixir", "elixir-2", "Elixir"], []);
        assert_eq!(slugs.get(Taxonomy::Tag, "elixir-2"), "elixir-2");
        assert_eq!(slugs.get(Taxonomy::Tag, "Elixir"), "elixir-3");
    }
}
