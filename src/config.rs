//! Settings resolved from CLI flags / environment, an optional TOML file and
//! defaults, in that order of precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use thiserror::Error;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::renderer::{DEFAULT_MORE_POSTS_LIMIT, DEFAULT_REVALIDATE};

const DEFAULT_CONTENT_DIR: &str = "content";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Parser)]
#[command(name = "headless-blog", version, about = "Server-rendered blog post pages")]
pub struct Cli {
    /// TOML file with `[content]`, `[cms]`, `[cache]` and `[draft]` sections.
    #[arg(long = "config", env = "BLOG_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding templates, static files and local posts.
    #[arg(long, env = "CONTENT_DIR", value_name = "DIR")]
    pub content_dir: Option<PathBuf>,

    #[arg(long, env = "CONTENT_SOURCE", value_enum)]
    pub source: Option<SourceKind>,

    /// GraphQL endpoint of the CMS.
    #[arg(long, env = "CMS_ENDPOINT", value_name = "URL")]
    pub cms_endpoint: Option<String>,

    #[arg(long, env = "CMS_TOKEN", hide_env_values = true)]
    pub cms_token: Option<String>,

    /// Seconds a fetched post may be served before it is fetched again.
    #[arg(long, env = "REVALIDATE_SECS")]
    pub revalidate_secs: Option<u64>,

    /// Most cached answers kept per query shape.
    #[arg(long, env = "CACHE_CAPACITY")]
    pub cache_capacity: Option<u64>,

    #[arg(long, env = "MORE_POSTS_LIMIT")]
    pub more_posts_limit: Option<usize>,

    /// Secret that unlocks draft mode. Draft mode is off when unset.
    #[arg(long, env = "DRAFT_SECRET", hide_env_values = true)]
    pub draft_secret: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve post pages over HTTP (default).
    Serve {
        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Write every known post page to static HTML.
    Prerender {
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Cms,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    content: ContentSection,
    cms: CmsSection,
    cache: CacheSection,
    draft: DraftSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentSection {
    dir: Option<PathBuf>,
    source: Option<SourceKind>,
    more_posts_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CmsSection {
    endpoint: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheSection {
    revalidate_secs: Option<u64>,
    capacity: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DraftSection {
    secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("the cms content source needs an endpoint (--cms-endpoint or CMS_ENDPOINT)")]
    MissingCmsEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local,
    Cms {
        endpoint: String,
        token: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub content_dir: PathBuf,
    pub source: Source,
    pub revalidate: Duration,
    pub cache_capacity: u64,
    pub more_posts_limit: usize,
    pub draft_secret: Option<String>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Settings {
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    fn merge(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let kind = cli
            .source
            .or(file.content.source)
            .unwrap_or(SourceKind::Local);
        let source = match kind {
            SourceKind::Local => Source::Local,
            SourceKind::Cms => Source::Cms {
                endpoint: cli
                    .cms_endpoint
                    .clone()
                    .or(file.cms.endpoint)
                    .ok_or(ConfigError::MissingCmsEndpoint)?,
                token: cli.cms_token.clone().or(file.cms.token),
            },
        };

        Ok(Self {
            content_dir: cli
                .content_dir
                .clone()
                .or(file.content.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR)),
            source,
            revalidate: cli
                .revalidate_secs
                .or(file.cache.revalidate_secs)
                .map_or(DEFAULT_REVALIDATE, Duration::from_secs),
            cache_capacity: cli
                .cache_capacity
                .or(file.cache.capacity)
                .unwrap_or(DEFAULT_CACHE_CAPACITY),
            more_posts_limit: cli
                .more_posts_limit
                .or(file.content.more_posts_limit)
                .unwrap_or(DEFAULT_MORE_POSTS_LIMIT),
            draft_secret: cli
                .draft_secret
                .clone()
                .or(file.draft.secret)
                .filter(|secret| !secret.is_empty()),
        })
    }
}
