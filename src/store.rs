//! The [`Store`]: every post found under a content directory, parsed once and
//! read-only afterwards. Loading is tolerant of bad files; each one is
//! recorded as a [`LoadFailure`] and the rest of the directory still loads.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::frontmatter::MalformedFrontMatter;
use crate::post::{Post, SlugSource};

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// Knobs for [`Store::load`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadOptions {
    pub slug_source: SlugSource,

    /// Worker threads for parsing. `None` uses rayon's global pool and
    /// `Some(1)` parses on the calling thread.
    pub threads: Option<usize>,
}

/// An immutable, deterministic collection of [`Post`]s.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,

    /// Accepted posts in traversal order.
    posts: Vec<Post>,
    by_slug: HashMap<String, usize>,
    failures: Vec<LoadFailure>,
}

/// A source file that didn't make it into the [`Store`].
#[derive(Debug)]
pub struct LoadFailure {
    /// Relative to the content root.
    pub path: PathBuf,
    pub error: LoadError,
}

/// The reason a single file was excluded. None of these abort a load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file's front matter is missing, malformed or incomplete.
    #[error(transparent)]
    MalformedFrontMatter(#[from] MalformedFrontMatter),

    /// Another file earlier in traversal order already claimed this slug.
    #[error("duplicate slug `{slug}` (already used by `{}`)", first.display())]
    DuplicateSlug { slug: String, first: PathBuf },

    /// The file couldn't be read.
    #[error("reading file: {0}")]
    Io(#[from] io::Error),

    /// An entry below the content root couldn't be enumerated.
    #[error("walking directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Returned when the content root itself can't be enumerated. This is the
/// only fatal load error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("reading content directory `{}`: {source}", path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Store {
    /// Recursively loads every markdown file under `root`.
    ///
    /// Files are visited in file-name order and parsed (possibly in parallel),
    /// then inserted in that same order, so two loads of an unchanged tree
    /// always agree, including on which of two colliding slugs wins.
    pub fn load(root: &Path, options: &LoadOptions) -> Result<Store> {
        let mut store = Store {
            root: root.to_owned(),
            posts: Vec::new(),
            by_slug: HashMap::new(),
            failures: Vec::new(),
        };

        let sources = store.discover()?;
        let parsed = parse_all(root, &sources, options);
        for (path, result) in sources.into_iter().zip(parsed) {
            match result {
                Ok(post) => store.insert(post),
                Err(error) => store.reject(path, error),
            }
        }
        store.failures.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            root = %root.display(),
            posts = store.posts.len(),
            failures = store.failures.len(),
            "loaded content"
        );
        Ok(store)
    }

    /// Lists markdown files below the root, relative to it. Errors on the
    /// root are fatal; errors further down are recorded and skipped.
    fn discover(&mut self) -> Result<Vec<PathBuf>> {
        let directory_read = |source: io::Error| Error::DirectoryRead {
            path: self.root.clone(),
            source,
        };
        let metadata = fs::metadata(&self.root).map_err(directory_read)?;
        if !metadata.is_dir() {
            return Err(directory_read(io::Error::new(
                io::ErrorKind::Other,
                "not a directory",
            )));
        }

        let mut sources = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));
        for result in walker {
            match result {
                Ok(entry) if entry.file_type().is_file() && is_markdown(entry.path()) => {
                    // strip_prefix can't fail: every entry is below the root
                    if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                        sources.push(relative.to_owned());
                    }
                }
                Ok(_) => {}
                Err(err) if err.depth() == 0 => {
                    let source = err.into_io_error().unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::Other, "walking content root")
                    });
                    return Err(Error::DirectoryRead {
                        path: self.root.clone(),
                        source,
                    });
                }
                Err(err) => {
                    let path = err
                        .path()
                        .and_then(|p| p.strip_prefix(&self.root).ok())
                        .map(Path::to_owned)
                        .unwrap_or_default();
                    self.reject(path, LoadError::Walk(err));
                }
            }
        }
        Ok(sources)
    }

    fn insert(&mut self, post: Post) {
        if let Some(&i) = self.by_slug.get(&post.slug) {
            let first = self.posts[i].source.clone();
            let slug = post.slug.clone();
            self.reject(post.source, LoadError::DuplicateSlug { slug, first });
            return;
        }
        self.by_slug.insert(post.slug.clone(), self.posts.len());
        self.posts.push(post);
    }

    fn reject(&mut self, path: PathBuf, error: LoadError) {
        debug!(path = %path.display(), "skipping post: {}", error);
        self.failures.push(LoadFailure { path, error });
    }

    /// The content root this store was loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every accepted post, drafts included, in traversal order.
    pub fn all_posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post_by_slug(&self, slug: &str) -> Option<&Post> {
        self.by_slug.get(slug).map(|&i| &self.posts[i])
    }

    /// Files that were skipped, sorted by path.
    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    /// Consumes the store, keeping only its failures.
    pub fn into_failures(self) -> Vec<LoadFailure> {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

fn parse_all(
    root: &Path,
    sources: &[PathBuf],
    options: &LoadOptions,
) -> Vec<std::result::Result<Post, LoadError>> {
    let slug_source = options.slug_source;
    let parse = |relative: &PathBuf| parse_file(root, relative, slug_source);

    match options.threads {
        Some(1) => sources.iter().map(parse).collect(),
        Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| sources.par_iter().map(parse).collect()),
            Err(err) => {
                warn!("building a {}-thread pool failed, parsing serially: {}", threads, err);
                sources.iter().map(parse).collect()
            }
        },
        None => sources.par_iter().map(parse).collect(),
    }
}

fn parse_file(
    root: &Path,
    relative: &Path,
    slug_source: SlugSource,
) -> std::result::Result<Post, LoadError> {
    let contents = fs::read_to_string(root.join(relative))?;
    Ok(Post::parse(relative, &contents, slug_source)?)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| MARKDOWN_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn post(title: &str, date: &str) -> String {
        format!("---\ntitle: \"{}\"\ndate: {}\n---\nBody of {}.\n", title, date, title)
    }

    #[test]
    fn test_load_recursively() -> Result<()> {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", &post("Alpha", "2026-02-02"));
        write(dir.path(), "nested/deeper/b.markdown", &post("Beta", "2026-02-03"));
        write(dir.path(), "nested/notes.txt", "not a post");
        write(dir.path(), ".drafts/c.md", &post("Hidden", "2026-02-04"));

        let store = Store::load(dir.path(), &LoadOptions::default())?;
        assert_eq!(store.len(), 2);
        assert!(store.failures().is_empty());
        assert_eq!(store.post_by_slug("alpha").unwrap().title, "Alpha");
        assert_eq!(
            store.post_by_slug("beta").unwrap().source,
            PathBuf::from("nested/deeper/b.markdown")
        );
        assert!(store.post_by_slug("hidden").is_none());
        Ok(())
    }

    #[test]
    fn test_duplicate_slug_keeps_first() -> Result<()> {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a-about.md", &post("About", "2026-01-01"));
        write(dir.path(), "b-about.md", &post("About", "2026-01-02"));

        let store = Store::load(dir.path(), &LoadOptions::default())?;
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.post_by_slug("about").unwrap().source,
            PathBuf::from("a-about.md")
        );

        let failures = store.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, PathBuf::from("b-about.md"));
        match &failures[0].error {
            LoadError::DuplicateSlug { slug, first } => {
                assert_eq!(slug, "about");
                assert_eq!(first, &PathBuf::from("a-about.md"));
            }
            other => panic!("unexpected error: {}", other),
        }
        Ok(())
    }

    #[test]
    fn test_malformed_file_does_not_abort() -> Result<()> {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.md", &post("Good", "2026-01-01"));
        write(dir.path(), "undated.md", "---\ntitle: Undated\n---\nbody");
        write(dir.path(), "fenceless.md", "just text");

        let store = Store::load(dir.path(), &LoadOptions::default())?;
        assert_eq!(store.len(), 1);
        let failed: Vec<_> = store.failures().iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            failed,
            vec![PathBuf::from("fenceless.md"), PathBuf::from("undated.md")]
        );
        assert!(store.failures().iter().all(|f| matches!(
            f.error,
            LoadError::MalformedFrontMatter(_)
        )));
        Ok(())
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            Store::load(&missing, &LoadOptions::default()),
            Err(Error::DirectoryRead { .. })
        ));

        write(dir.path(), "file.md", &post("File", "2026-01-01"));
        assert!(Store::load(&dir.path().join("file.md"), &LoadOptions::default()).is_err());
    }

    #[test]
    fn test_load_is_idempotent_across_thread_counts() -> Result<()> {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            write(
                dir.path(),
                &format!("p{:02}.md", i),
                &post(&format!("Post {}", i % 15), &format!("2026-01-{:02}", i + 1)),
            );
        }

        let serial = Store::load(
            dir.path(),
            &LoadOptions {
                threads: Some(1),
                ..LoadOptions::default()
            },
        )?;
        let parallel = Store::load(
            dir.path(),
            &LoadOptions {
                threads: Some(4),
                ..LoadOptions::default()
            },
        )?;
        let again = Store::load(dir.path(), &LoadOptions::default())?;

        assert_eq!(serial.len(), 15);
        assert_eq!(serial.failures().len(), 5);
        assert_eq!(serial.all_posts(), parallel.all_posts());
        assert_eq!(serial.all_posts(), again.all_posts());
        Ok(())
    }
}
