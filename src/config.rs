//! Finds and loads the `scriptorium.yaml` project file.
//!
//! ```yaml
//! title: Functional Notes
//! author: { name: Sam, email: sam@example.org }
//! site_root: https://example.org/
//! home_page: index.html      # default
//! index_page_size: 10        # default
//! threads: 4                 # default: one per core
//! future_posts: include      # or `exclude`
//! slug_source: title         # or `path`
//! ```
//!
//! Posts live in `posts/` and static assets in `static/` next to the project
//! file. A `theme/theme.yaml` listing `index_template` and `posts_template`
//! files replaces the built-in templates.

use crate::links::SiteLinks;
use crate::post::SlugSource;
use crate::query::FuturePosts;
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "scriptorium.yaml";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

fn default_home_page() -> String {
    String::from("index.html")
}

#[derive(Deserialize)]
struct Project {
    #[serde(default)]
    title: String,

    #[serde(default)]
    author: Option<Author>,
    site_root: Url,

    #[serde(default = "default_home_page")]
    home_page: String,

    #[serde(default)]
    index_page_size: PageSize,

    #[serde(default)]
    threads: Option<usize>,

    #[serde(default)]
    future_posts: FuturePosts,

    #[serde(default)]
    slug_source: SlugSource,
}

#[derive(Deserialize)]
struct Theme {
    index_template: Vec<PathBuf>,
    posts_template: Vec<PathBuf>,
}

/// Template files of a theme, in the order they're concatenated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThemeFiles {
    pub index_template: Vec<PathBuf>,
    pub posts_template: Vec<PathBuf>,
}

/// Settings from the command line that take precedence over the project file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// Defaults to `_output` next to the project file.
    pub output_directory: Option<PathBuf>,
    pub threads: Option<usize>,
    pub exclude_future: bool,
}

/// Everything needed to build a site.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub author: Option<Author>,
    pub project_root: PathBuf,
    pub posts_source_directory: PathBuf,
    pub static_source_directory: PathBuf,
    pub output_directory: PathBuf,
    pub links: SiteLinks,

    /// `None` uses the built-in templates.
    pub theme: Option<ThemeFiles>,
    pub index_page_size: usize,
    pub threads: Option<usize>,
    pub future_posts: FuturePosts,
    pub slug_source: SlugSource,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a project file and
    /// loads the first one found.
    pub fn from_directory(dir: &Path, overrides: &Overrides) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path, overrides);
            }
            current = dir.parent();
        }
        Err(Error::NotFound(dir.to_owned()))
    }

    pub fn from_project_file(path: &Path, overrides: &Overrides) -> Result<Config> {
        let project: Project = read_yaml(path)?;
        let project_root = match path.parent() {
            Some(parent) => parent.to_owned(),
            None => return Err(Error::NoParent(path.to_owned())),
        };

        let theme_dir = project_root.join("theme");
        let theme_file = theme_dir.join("theme.yaml");
        let theme = match theme_file.is_file() {
            false => None,
            true => {
                let theme: Theme = read_yaml(&theme_file)?;
                let resolve = |files: Vec<PathBuf>| -> Vec<PathBuf> {
                    files.iter().map(|relpath| theme_dir.join(relpath)).collect()
                };
                Some(ThemeFiles {
                    index_template: resolve(theme.index_template),
                    posts_template: resolve(theme.posts_template),
                })
            }
        };

        Ok(Config {
            links: SiteLinks::new(&project.site_root, &project.home_page)?,
            title: project.title,
            author: project.author,
            posts_source_directory: project_root.join("posts"),
            static_source_directory: project_root.join("static"),
            output_directory: overrides
                .output_directory
                .clone()
                .unwrap_or_else(|| project_root.join("_output")),
            theme,
            index_page_size: project.index_page_size.0,
            threads: overrides.threads.or(project.threads),
            future_posts: match overrides.exclude_future {
                true => FuturePosts::Exclude,
                false => project.future_posts,
            },
            slug_source: project.slug_source,
            project_root,
        })
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })?;
    serde_yaml::from_reader(file).map_err(|err| Error::Yaml {
        path: path.to_owned(),
        err,
    })
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem finding or loading the project configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when no directory from the starting one up to the filesystem
    /// root holds a project file.
    #[error("could not find `scriptorium.yaml` in `{}` or any parent directory", .0.display())]
    NotFound(PathBuf),

    /// Returned when a project or theme file can't be opened.
    #[error("opening `{}`: {err}", path.display())]
    Open { path: PathBuf, err: io::Error },

    /// Returned when a project or theme file isn't valid.
    #[error("loading `{}`: {err}", path.display())]
    Yaml {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when the project file path has no parent directory.
    #[error("can't get parent directory for project file `{}`", .0.display())]
    NoParent(PathBuf),

    /// Returned when `site_root` and `home_page` don't form valid URLs.
    #[error("building site URLs: {0}")]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PROJECT: &str = "title: Functional Notes\n\
                           author: { name: Sam, email: sam@example.org }\n\
                           site_root: https://example.org/blog\n";

    #[test]
    fn test_defaults() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, PROJECT)?;

        let config = Config::from_project_file(&path, &Overrides::default())?;
        assert_eq!(config.title, "Functional Notes");
        assert_eq!(
            config.author,
            Some(Author {
                name: "Sam".to_owned(),
                email: Some("sam@example.org".to_owned()),
            })
        );
        assert_eq!(config.posts_source_directory, dir.path().join("posts"));
        assert_eq!(config.output_directory, dir.path().join("_output"));
        assert_eq!(config.links.home_page.as_str(), "https://example.org/blog/index.html");
        assert_eq!(config.index_page_size, 10);
        assert_eq!(config.threads, None);
        assert_eq!(config.future_posts, FuturePosts::Include);
        assert_eq!(config.slug_source, SlugSource::Title);
        assert_eq!(config.theme, None);
        Ok(())
    }

    #[test]
    fn test_from_directory_walks_up() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            format!("{}index_page_size: 3\nslug_source: path\nfuture_posts: exclude\n", PROJECT),
        )?;
        let nested = dir.path().join("posts").join("elixir");
        fs::create_dir_all(&nested)?;

        let config = Config::from_directory(
            &nested,
            &Overrides {
                output_directory: Some(PathBuf::from("/tmp/site")),
                threads: Some(2),
                exclude_future: false,
            },
        )?;
        assert_eq!(config.project_root, dir.path());
        assert_eq!(config.output_directory, PathBuf::from("/tmp/site"));
        assert_eq!(config.index_page_size, 3);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.future_posts, FuturePosts::Exclude);
        assert_eq!(config.slug_source, SlugSource::Path);
        Ok(())
    }

    #[test]
    fn test_theme_files() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join(PROJECT_FILE), PROJECT)?;
        fs::create_dir(dir.path().join("theme"))?;
        fs::write(
            dir.path().join("theme/theme.yaml"),
            "index_template: [base.html, index.html]\nposts_template: [base.html, post.html]\n",
        )?;

        let config = Config::from_directory(dir.path(), &Overrides::default())?;
        let theme = config.theme.ok_or("no theme")?;
        assert_eq!(
            theme.posts_template,
            vec![dir.path().join("theme/base.html"), dir.path().join("theme/post.html")]
        );
        Ok(())
    }

    #[test]
    fn test_missing_site_root() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, "title: No Root\n")?;
        assert!(matches!(
            Config::from_project_file(&path, &Overrides::default()),
            Err(Error::Yaml { .. })
        ));
        Ok(())
    }
}
