//! Indexes the published posts and writes every page to disk: one page per
//! post, plus paginated index pages for the main listing, each tag and each
//! category.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::post::Post;
use crate::render::{self, Listing, Renderer};
use crate::taxonomy::Taxonomy;

/// Writes a site's pages below `output_directory`.
pub struct Writer<'a, 's> {
    pub renderer: &'a Renderer<'s>,

    /// Post pages go in `{output_directory}/posts`, the main index in
    /// `{output_directory}/index`, term indices in
    /// `{output_directory}/tags/{tag}` and `{output_directory}/categories/{category}`.
    pub output_directory: &'a Path,

    /// The number of posts per index page.
    pub index_page_size: usize,
}

/// Counts of what a [`Writer`] produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Written {
    pub post_pages: usize,
    pub index_pages: usize,
}

impl Writer<'_, '_> {
    /// Renders and writes the post pages and every index.
    pub fn write_site(&self) -> Result<Written> {
        let query = self.renderer.query();
        let published = query.published();
        let mut dirs = CreatedDirs::default();
        let mut written = Written::default();

        for post in &published {
            let path = self.post_path(post);
            dirs.ensure_parent(&path)?;
            write_file(&path, &self.renderer.render(post)?)?;
            written.post_pages += 1;
        }

        let tags = query.tags();
        let categories = query.categories();
        for index in self.indices(&published, &tags, &categories)? {
            for page in index.pages(self.index_page_size)? {
                dirs.ensure_parent(&page.file_path)?;
                let html = self.renderer.render_listing(&Listing {
                    title: index.title.clone(),
                    posts: page.posts,
                    prev: page.prev,
                    next: page.next,
                })?;
                write_file(&page.file_path, &html)?;
                written.index_pages += 1;
            }
        }

        Ok(written)
    }

    fn post_path(&self, post: &Post) -> PathBuf {
        self.output_directory.join("posts").join(format!("{}.html", post.slug))
    }

    /// The main index followed by one index per tag and per category.
    fn indices<'p>(
        &self,
        published: &'p [&'p Post],
        tags: &'p BTreeMap<&'p str, Vec<&'p Post>>,
        categories: &'p BTreeMap<&'p str, Vec<&'p Post>>,
    ) -> Result<Vec<Index<'p>>> {
        let links = self.renderer.links();
        let mut indices = vec![Index {
            title: self.renderer.site().title.clone(),
            url: links.index.clone(),
            output_directory: self.output_directory.join("index"),
            posts: published,
        }];

        for (taxonomy, terms) in [(Taxonomy::Tag, tags), (Taxonomy::Category, categories)] {
            for (name, posts) in terms {
                let slug = self.renderer.term_slugs().get(taxonomy, name);
                indices.push(Index {
                    title: format!("{}: {}", taxonomy.label(), name),
                    url: links.term_directory(taxonomy, &slug)?,
                    output_directory: self
                        .output_directory
                        .join(taxonomy.directory())
                        .join(&slug),
                    posts,
                });
            }
        }
        Ok(indices)
    }
}

/// A listing of posts that is split into pages: the main index, or the index
/// for one tag or category.
struct Index<'p> {
    title: String,

    /// The directory URL of the index; pages are `index.html`, `1.html`, ...
    url: Url,
    output_directory: PathBuf,
    posts: &'p [&'p Post],
}

/// One output page of an [`Index`].
struct IndexPage<'p> {
    file_path: PathBuf,
    posts: &'p [&'p Post],
    prev: Option<Url>,
    next: Option<Url>,
}

impl<'p> Index<'p> {
    /// Splits the index into pages of `page_size` posts. An empty index still
    /// gets one (empty) page so its first URL always exists.
    fn pages(&self, page_size: usize) -> Result<Vec<IndexPage<'p>>> {
        let posts = self.posts;
        let page_size = page_size.max(1);
        let total_pages = std::cmp::max(1, (posts.len() + page_size - 1) / page_size);
        let page_url = |i: usize| self.url.join(&page_file_name(i));

        (0..total_pages)
            .map(|i| -> Result<IndexPage<'p>> {
                let start = std::cmp::min(i * page_size, posts.len());
                let end = std::cmp::min(start + page_size, posts.len());
                Ok(IndexPage {
                    file_path: self.output_directory.join(page_file_name(i)),
                    posts: &posts[start..end],
                    prev: match i {
                        0 => None,
                        _ => Some(page_url(i - 1)?),
                    },
                    next: if i + 1 < total_pages {
                        Some(page_url(i + 1)?)
                    } else {
                        None
                    },
                })
            })
            .collect()
    }
}

fn page_file_name(i: usize) -> String {
    match i {
        0 => String::from("index.html"),
        _ => format!("{}.html", i),
    }
}

/// Remembers which directories were already created during a write.
#[derive(Default)]
struct CreatedDirs(HashSet<PathBuf>);

impl CreatedDirs {
    fn ensure_parent(&mut self, file_path: &Path) -> Result<()> {
        if let Some(dir) = file_path.parent() {
            if self.0.insert(dir.to_owned()) {
                fs::create_dir_all(dir).map_err(|err| Error::CreateDir {
                    path: dir.to_owned(),
                    err,
                })?;
            }
        }
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    debug!(path = %path.display(), "writing page");
    fs::write(path, contents).map_err(|err| Error::WriteFile {
        path: path.to_owned(),
        err,
    })
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug, Error)]
pub enum Error {
    /// An error rendering a page.
    #[error(transparent)]
    Render(#[from] render::Error),

    /// An error building a page URL.
    #[error("building URL: {0}")]
    Url(#[from] url::ParseError),

    /// An error creating an output directory.
    #[error("creating directory `{}`: {err}", path.display())]
    CreateDir { path: PathBuf, err: io::Error },

    /// An error writing an output file.
    #[error("writing `{}`: {err}", path.display())]
    WriteFile { path: PathBuf, err: io::Error },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::links::SiteLinks;
    use crate::query::Query;
    use crate::render::{SiteInfo, Templates};
    use crate::store::{LoadOptions, Store};
    use tempfile::TempDir;

    fn write(posts: &[(&str, &str)], page_size: usize) -> (TempDir, Written) {
        let source = TempDir::new().unwrap();
        for (name, contents) in posts {
            fs::write(source.path().join(name), contents).unwrap();
        }
        let store = Store::load(source.path(), &LoadOptions::default()).unwrap();
        let renderer = Renderer::new(
            Query::new(&store),
            SiteLinks::new(&Url::parse("https://example.org/").unwrap(), "index.html").unwrap(),
            Templates::builtin().unwrap(),
            SiteInfo {
                title: "Functional Notes".to_owned(),
            },
        );

        let output = TempDir::new().unwrap();
        let written = Writer {
            renderer: &renderer,
            output_directory: output.path(),
            index_page_size: page_size,
        }
        .write_site()
        .unwrap();
        (output, written)
    }

    #[test]
    fn test_write_site() {
        let (out, written) = write(
            &[
                (
                    "a.md",
                    "---\ntitle: Pattern Matching\ndate: 2026-01-01\ntags: [elixir]\ncategories: [Languages]\n---\nA\n",
                ),
                ("b.md", "---\ntitle: Pipes\ndate: 2026-01-02\ntags: [elixir]\n---\nB\n"),
                ("c.md", "---\ntitle: Unfinished\ndate: 2026-01-03\ndraft: true\n---\nC\n"),
            ],
            1,
        );
        let root = out.path();

        assert!(root.join("posts/pattern-matching.html").is_file());
        assert!(root.join("posts/pipes.html").is_file());
        assert!(!root.join("posts/unfinished.html").exists());

        // Two published posts, one per page.
        assert!(root.join("index/index.html").is_file());
        assert!(root.join("index/1.html").is_file());
        assert!(!root.join("index/2.html").exists());
        assert!(root.join("tags/elixir/index.html").is_file());
        assert!(root.join("tags/elixir/1.html").is_file());
        assert!(root.join("categories/languages/index.html").is_file());

        let first = fs::read_to_string(root.join("index/index.html")).unwrap();
        assert!(first.contains("Pipes"));
        assert!(!first.contains("Pattern Matching"));
        assert!(first.contains("https://example.org/index/1.html"));

        let tag = fs::read_to_string(root.join("tags/elixir/1.html")).unwrap();
        assert!(tag.contains("Tag: elixir"));
        assert!(tag.contains("https://example.org/tags/elixir/index.html"));

        assert_eq!(
            written,
            Written {
                post_pages: 2,
                index_pages: 5,
            }
        );
    }

    #[test]
    fn test_empty_site_still_has_an_index() {
        let (out, written) = write(&[], 10);
        assert!(out.path().join("index/index.html").is_file());
        assert_eq!(
            written,
            Written {
                post_pages: 0,
                index_pages: 1,
            }
        );
    }

    #[test]
    fn test_zero_page_size_is_treated_as_one() {
        let (out, _) = write(
            &[
                ("a.md", "---\ntitle: A\ndate: 2026-01-01\n---\nA\n"),
                ("b.md", "---\ntitle: B\ndate: 2026-01-02\n---\nB\n"),
            ],
            0,
        );
        assert!(out.path().join("index/1.html").is_file());
    }

    #[test]
    fn test_terms_differing_in_case_get_separate_indices() {
        let (out, written) = write(
            &[
                (
                    "a.md",
                    "---\ntitle: Upper Post\ndate: 2026-01-01\ntags: [Elixir]\n---\nA\n",
                ),
                (
                    "b.md",
                    "---\ntitle: Lower Post\ndate: 2026-01-02\ntags: [elixir]\n---\nB\n",
                ),
            ],
            10,
        );
        let root = out.path();
        assert_eq!(written.index_pages, 3);

        let lower = fs::read_to_string(root.join("tags/elixir/index.html")).unwrap();
        assert!(lower.contains("Lower Post"));
        assert!(!lower.contains("Upper Post"));

        let upper = fs::read_to_string(root.join("tags/elixir-2/index.html")).unwrap();
        assert!(upper.contains("Upper Post"));
        assert!(!upper.contains("Lower Post"));

        // Each post links to its own tag's index.
        let post = fs::read_to_string(root.join("posts/upper-post.html")).unwrap();
        assert!(post.contains("https://example.org/tags/elixir-2/index.html"));
    }
}
