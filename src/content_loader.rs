use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gray_matter::{engine::YAML, Matter};
use serde::Deserialize;
use tokio::{fs, sync::RwLock};
use tracing::{info, warn};

use crate::content_source::{ContentSource, Lookup, QueryOptions};
use crate::error::ContentError;
use crate::models::{Author, CoverImage, Post};
use crate::state::Templates;

#[derive(Deserialize, Debug, Clone)]
struct FrontMatter {
    title: String,
    slug: Option<String>,
    date: Option<String>,
    #[serde(default)]
    excerpt: String,
    author: Option<String>,
    cover_image: Option<String>,
    cover_alt: Option<String>,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Clone)]
struct LocalEntry {
    post: Post,
    draft: bool,
}

/// Markdown posts read from `<content_dir>/posts`.
pub struct LocalContent {
    posts_dir: PathBuf,
    entries: RwLock<Vec<LocalEntry>>,
}

impl LocalContent {
    pub async fn open(content_dir: &Path) -> Result<Self, ContentError> {
        let posts_dir = content_dir.join("posts");
        let entries = load_posts(&posts_dir).await?;
        info!(count = entries.len(), dir = %posts_dir.display(), "loaded local posts");
        Ok(Self {
            posts_dir,
            entries: RwLock::new(entries),
        })
    }

    /// In-memory source; every post is published.
    pub fn from_posts(posts: Vec<Post>) -> Self {
        Self::with_drafts(posts, Vec::new())
    }

    pub fn with_drafts(published: Vec<Post>, drafts: Vec<Post>) -> Self {
        let entries = published
            .into_iter()
            .map(|post| LocalEntry { post, draft: false })
            .chain(drafts.into_iter().map(|post| LocalEntry { post, draft: true }))
            .collect();
        Self {
            posts_dir: PathBuf::new(),
            entries: RwLock::new(entries),
        }
    }

    /// Re-read the posts directory. The previous posts stay in place on failure.
    pub async fn reload(&self) -> Result<usize, ContentError> {
        let entries = load_posts(&self.posts_dir).await?;
        let count = entries.len();
        *self.entries.write().await = entries;
        Ok(count)
    }
}

#[async_trait]
impl ContentSource for LocalContent {
    /// Published slugs only; drafts are never prerendered.
    async fn post_slugs(&self) -> Result<Vec<String>, ContentError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| !e.draft)
            .map(|e| e.post.slug.clone())
            .collect())
    }

    async fn post_by_slug(
        &self,
        slug: &str,
        options: QueryOptions,
    ) -> Result<Lookup<Post>, ContentError> {
        let entries = self.entries.read().await;
        let found = entries
            .iter()
            .find(|e| e.post.slug == slug && (options.draft || !e.draft))
            .map(|e| e.post.clone());
        Ok(found.into())
    }

    async fn more_posts(
        &self,
        exclude_slug: &str,
        limit: usize,
        options: QueryOptions,
    ) -> Result<Vec<Post>, ContentError> {
        let entries = self.entries.read().await;
        let mut posts: Vec<Post> = entries
            .iter()
            .filter(|e| e.post.slug != exclude_slug && (options.draft || !e.draft))
            .map(|e| e.post.clone())
            .collect();
        // Newest first, undated posts last.
        posts.sort_by(|a, b| b.published_on().cmp(&a.published_on()));
        posts.truncate(limit);
        Ok(posts)
    }
}

async fn load_posts(posts_dir: &Path) -> Result<Vec<LocalEntry>, ContentError> {
    let mut paths = Vec::new();
    let mut dir = fs::read_dir(posts_dir)
        .await
        .map_err(|e| ContentError::io(posts_dir, e))?;

    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| ContentError::io(posts_dir, e))?
    {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "md") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let file_content = fs::read_to_string(&path)
            .await
            .map_err(|e| ContentError::io(&path, e))?;
        let entry = parse_post(&path, &file_content)?;
        if !seen.insert(entry.post.slug.clone()) {
            warn!(slug = %entry.post.slug, path = %path.display(), "duplicate slug, keeping the first post");
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn parse_post(path: &Path, file_content: &str) -> Result<LocalEntry, ContentError> {
    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<FrontMatter>(file_content)
        .map_err(|e| ContentError::FrontMatter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let front_matter = parsed.data.ok_or_else(|| ContentError::FrontMatter {
        path: path.to_path_buf(),
        message: "missing front matter".to_string(),
    })?;

    let slug = match front_matter.slug {
        Some(slug) => slug,
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| ContentError::FrontMatter {
                path: path.to_path_buf(),
                message: "no slug and no usable file name".to_string(),
            })?,
    };

    Ok(LocalEntry {
        post: Post {
            slug,
            title: front_matter.title,
            excerpt: front_matter.excerpt,
            date: front_matter.date,
            author: front_matter.author.map(|name| Author {
                name,
                avatar_url: None,
            }),
            cover_image: front_matter.cover_image.map(|url| CoverImage {
                url,
                alt: front_matter.cover_alt,
            }),
            body: parsed.content,
        },
        draft: front_matter.draft,
    })
}

pub async fn load_templates(content_dir: &Path) -> Result<Templates, ContentError> {
    let read = |name: &str| {
        let path = content_dir.join(name);
        async move {
            fs::read_to_string(&path)
                .await
                .map_err(|e| ContentError::io(&path, e))
        }
    };
    Ok(Templates {
        layout: read("layout.html").await?,
        not_found: read("not_found.html").await?,
        error: read("error.html").await?,
    })
}
