use chrono::{DateTime, NaiveDate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub url: String,
    pub alt: Option<String>,
}

/// A post as delivered by a content source. Display fields are passed
/// through to the view untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    /// Raw date string, either `YYYY-MM-DD` or RFC 3339.
    pub date: Option<String>,
    pub author: Option<Author>,
    pub cover_image: Option<CoverImage>,
    /// Markdown source of the post body.
    pub body: String,
}

impl Post {
    /// Calendar date of the post, if its raw date is parseable.
    pub fn published_on(&self) -> Option<NaiveDate> {
        let raw = self.date.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.date_naive())
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
            .ok()
    }
}

/// True when `slug` can stand alone as one URL path or file name segment.
pub fn is_path_segment(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && slug != ".."
        && !slug.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}

/// Head metadata for a post page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
}

pub const METADATA_TITLE_PREFIX: &str = "Post / ";

impl PageMetadata {
    pub fn for_post(post: &Post) -> Self {
        Self {
            title: format!("{METADATA_TITLE_PREFIX}{}", post.title),
            description: post.excerpt.clone(),
        }
    }
}

/// Everything the view needs to draw one post page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPage {
    pub post: Post,
    pub more_posts: Vec<Post>,
}
