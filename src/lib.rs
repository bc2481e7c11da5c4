//! The library code for the `scriptorium` static site generator. The
//! architecture can be generally broken down into three distinct steps:
//!
//! 1. Loading posts from source files on disk into an immutable store
//!    ([`crate::frontmatter`], [`crate::post`], [`crate::store`])
//! 2. Selecting what is visible: published listings, tag and category
//!    listings, and series chains ([`crate::query`])
//! 3. Converting the visible posts into output files on disk
//!    ([`crate::render`], [`crate::write`], [`crate::feed`])
//!
//! Of the three, the last step is the most involved. Post bodies go through
//! shortcode expansion ([`crate::shortcode`]) and markdown rendering
//! ([`crate::markdown`]) before a gtmpl template wraps them in a page. Index
//! pages are built for all posts and for each tag and category; each index is
//! paginated into groups of pages based on a configurable number of posts per
//! index page.
//!
//! Problems with individual files (bad front matter, duplicate slugs) and
//! series links that loop back on themselves are collected into a
//! [`build::BuildReport`] instead of failing the build.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod frontmatter;
pub mod htmlrenderer;
pub mod links;
pub mod markdown;
pub mod post;
pub mod query;
pub mod render;
pub mod series;
pub mod shortcode;
pub mod store;
pub mod taxonomy;
pub mod write;
