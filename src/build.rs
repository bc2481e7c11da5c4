//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading the posts
//! ([`crate::store`]), rendering index and post pages ([`crate::write`]),
//! copying the static source directory into the static output directory, and
//! generating the Atom feed.

use crate::config::Config;
use crate::feed::{self, write_feed, FeedConfig};
use crate::query::{PublishPolicy, Query, SeriesCycleDetected};
use crate::render::{self, Renderer, SiteInfo, Templates};
use crate::store::{self, LoadFailure, LoadOptions, Store};
use crate::write::{self, Writer, Written};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Output subdirectories owned by the build. They're deleted before each
/// build; anything else in the output directory is left alone.
const OUTPUT_DIRECTORIES: [&str; 5] = ["posts", "index", "tags", "categories", "static"];

/// What a build (or a check) found and produced. Problems listed here were
/// recovered from; every valid page was still written.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Posts accepted into the store, drafts included.
    pub posts: usize,

    /// Posts visible under the publish policy.
    pub published: usize,
    pub failures: Vec<LoadFailure>,

    /// Each distinct series loop, once.
    pub cycles: Vec<SeriesCycleDetected>,
    pub written: Written,
}

impl BuildReport {
    /// True when nothing was skipped and no series loops back on itself.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cycles.is_empty()
    }
}

/// Builds the site from a [`Config`] object. This calls into [`Store::load`],
/// [`Writer::write_site`], and [`feed::write_feed`] which do the
/// heavy-lifting. This function also copies the static assets from source
/// directory to the output directory.
pub fn build_site(config: &Config) -> Result<BuildReport> {
    let store = load(config)?;
    let policy = PublishPolicy::new(config.future_posts);

    let (published, cycles, written) = {
        let query = Query::new(&store).with_policy(policy);
        let cycles = series_cycles(&query);

        let templates = match &config.theme {
            Some(theme) => Templates::from_files(&theme.posts_template, &theme.index_template)?,
            None => Templates::builtin()?,
        };

        // Blow away the old output directories so we don't have any
        // collisions. The output root itself is never deleted in case it was
        // pointed somewhere by mistake.
        for dir in OUTPUT_DIRECTORIES {
            rmdir(&config.output_directory.join(dir))?;
        }
        fs::create_dir_all(&config.output_directory)?;

        let renderer = Renderer::new(
            query,
            config.links.clone(),
            templates,
            SiteInfo {
                title: config.title.clone(),
            },
        );
        info!(output = %config.output_directory.display(), "writing pages");
        let written = Writer {
            renderer: &renderer,
            output_directory: &config.output_directory,
            index_page_size: config.index_page_size,
        }
        .write_site()?;

        if config.static_source_directory.is_dir() {
            info!("copying static files");
            copy_dir(
                &config.static_source_directory,
                &config.output_directory.join("static"),
            )?;
        }

        // copy /index/index.html to /index.html
        fs::copy(
            config.output_directory.join("index").join("index.html"),
            config.output_directory.join("index.html"),
        )?;

        info!("writing feed");
        let published = query.published();
        write_feed(
            FeedConfig {
                title: config.title.clone(),
                id: config.links.home_page.to_string(),
                author: config.author.clone(),
                home_page: config.links.home_page.clone(),
                now: policy.now,
            },
            &renderer,
            &published,
            File::create(config.output_directory.join("feed.atom"))?,
        )?;

        (published.len(), cycles, written)
    };

    let report = BuildReport {
        posts: store.len(),
        published,
        failures: store.into_failures(),
        cycles,
        written,
    };
    info!(
        posts = report.posts,
        published = report.published,
        pages = report.written.post_pages + report.written.index_pages,
        failures = report.failures.len(),
        "build finished"
    );
    Ok(report)
}

/// Loads the posts and looks for series loops without writing anything.
pub fn check(config: &Config) -> Result<BuildReport> {
    let store = load(config)?;
    let query = Query::new(&store).with_policy(PublishPolicy::new(config.future_posts));
    let published = query.published().len();
    let cycles = series_cycles(&query);

    Ok(BuildReport {
        posts: store.len(),
        published,
        failures: store.into_failures(),
        cycles,
        written: Written::default(),
    })
}

fn load(config: &Config) -> Result<Store> {
    info!(source = %config.posts_source_directory.display(), "loading posts");
    let store = Store::load(
        &config.posts_source_directory,
        &LoadOptions {
            slug_source: config.slug_source,
            threads: config.threads,
        },
    )?;
    for failure in store.failures() {
        warn!(path = %failure.path.display(), "skipped: {}", failure.error);
    }
    Ok(store)
}

/// Walks the series chain from every visible post and keeps each distinct
/// loop once, keyed by its member set.
fn series_cycles(query: &Query) -> Vec<SeriesCycleDetected> {
    let mut seen: BTreeSet<BTreeSet<String>> = BTreeSet::new();
    let mut cycles = Vec::new();
    for post in query.published() {
        if let Some(cycle) = query.series_chain(&post.slug).cycle {
            if seen.insert(cycle.members.iter().cloned().collect()) {
                warn!("{}", cycle);
                cycles.push(cycle);
            }
        }
    }
    cycles
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(copy_error(dst))?;
    for entry in fs::read_dir(src).map_err(copy_error(src))? {
        let entry = entry.map_err(copy_error(src))?;
        let (from, to) = (entry.path(), dst.join(entry.file_name()));
        if entry.file_type().map_err(copy_error(&from))?.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(copy_error(&from))?;
        }
    }

    Ok(())
}

fn copy_error(path: &Path) -> impl FnOnce(io::Error) -> Error {
    let path = path.to_owned();
    move |err| Error::Copy { path, err }
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during loading,
/// rendering, writing, cleaning output directories, and other I/O.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the content directory can't be read at all.
    #[error(transparent)]
    Load(#[from] store::Error),

    /// Returned for errors loading templates.
    #[error(transparent)]
    Render(#[from] render::Error),

    /// Returned for errors writing pages to disk.
    #[error(transparent)]
    Write(#[from] write::Error),

    /// Returned for errors writing the feed.
    #[error(transparent)]
    Feed(#[from] feed::Error),

    /// Returned for I/O problems while cleaning output directories.
    #[error("cleaning directory `{}`: {err}", path.display())]
    Clean { path: PathBuf, err: io::Error },

    /// Returned for I/O problems while copying static files.
    #[error("copying `{}`: {err}", path.display())]
    Copy { path: PathBuf, err: io::Error },

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Overrides;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Collects formatted log output.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn project(posts: &[(&str, &str)]) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("scriptorium.yaml"),
            "title: Functional Notes\nsite_root: https://example.org/\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("posts")).unwrap();
        for (name, contents) in posts {
            fs::write(dir.path().join("posts").join(name), contents).unwrap();
        }
        let config = Config::from_directory(dir.path(), &Overrides::default()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_check_reports_each_cycle_once() -> Result<()> {
        let (_dir, config) = project(&[
            (
                "a.md",
                "---\ntitle: Part One\ndate: 2026-01-01\n---\nNext in series: Part Two\n",
            ),
            (
                "b.md",
                "---\ntitle: Part Two\ndate: 2026-01-02\n---\nNext in series: Part One\n",
            ),
            ("c.md", "---\ntitle: Broken\n---\nno date\n"),
        ]);
        let report = check(&config)?;
        assert_eq!(report.posts, 2);
        assert_eq!(report.published, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.cycles.len(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.written, Written::default());
        Ok(())
    }

    #[test]
    fn test_build_replaces_stale_output() -> Result<()> {
        let (_dir, config) = project(&[("a.md", "---\ntitle: Fresh\ndate: 2026-01-01\n---\nHi\n")]);
        let stale = config.output_directory.join("posts").join("stale.html");
        fs::create_dir_all(stale.parent().unwrap())?;
        fs::write(&stale, "old")?;

        let report = build_site(&config)?;
        assert!(report.is_clean());
        assert!(!stale.exists());
        assert!(config.output_directory.join("posts/fresh.html").is_file());
        assert!(config.output_directory.join("index.html").is_file());
        assert!(config.output_directory.join("feed.atom").is_file());
        Ok(())
    }

    #[test]
    fn test_copy_dir_recurses() -> Result<()> {
        let src = TempDir::new()?;
        let dst = TempDir::new()?;
        fs::create_dir_all(src.path().join("css/vendor"))?;
        fs::write(src.path().join("css/vendor/reset.css"), "*{}")?;
        fs::write(src.path().join("logo.svg"), "<svg/>")?;

        copy_dir(src.path(), &dst.path().join("static"))?;
        assert_eq!(
            fs::read_to_string(dst.path().join("static/css/vendor/reset.css"))?,
            "*{}"
        );
        assert!(dst.path().join("static/logo.svg").is_file());
        Ok(())
    }

    #[test]
    fn test_each_load_failure_is_warned_once() -> Result<()> {
        let (_dir, mut config) = project(&[
            ("good.md", "---\ntitle: Good\ndate: 2026-01-01\n---\nok\n"),
            ("undated.md", "---\ntitle: Undated\n---\nno date\n"),
        ]);
        config.threads = Some(1);

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let report = tracing::subscriber::with_default(subscriber, || check(&config))?;

        assert_eq!(report.failures.len(), 1);
        let logs = String::from_utf8_lossy(&captured.0.lock().unwrap()).into_owned();
        assert_eq!(logs.matches("undated.md").count(), 1, "{}", logs);
        Ok(())
    }
}
