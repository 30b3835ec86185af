//! GraphQL-over-HTTP client for the headless CMS holding the blog collection.

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::content_source::{ContentSource, Lookup, QueryOptions, Revalidate};
use crate::error::ContentError;
use crate::models::{Author, CoverImage, Post};

pub const DRAFT_HEADER: &str = "x-content-draft";

macro_rules! post_fields {
    () => {
        "_slug _title excerpt date author { _title avatar { url } } coverImage { url alt } body { markdown }"
    };
}

const POST_SLUGS_QUERY: &str = "query PostSlugs { blog { posts { items { _slug } } } }";

const POST_BY_SLUG_QUERY: &str = concat!(
    "query PostBySlug($slug: String!) { blog { posts(filter: { _sys_slug: { eq: $slug } }, first: 1) { items { ",
    post_fields!(),
    " } } } }"
);

const MORE_POSTS_QUERY: &str = concat!(
    "query MorePosts($slug: String!, $first: Int!) { blog { posts(filter: { _sys_slug: { notEq: $slug } }, orderBy: _sys_createdAt__DESC, first: $first) { items { ",
    post_fields!(),
    " } } } }"
);

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct BlogData<I> {
    blog: Blog<I>,
}

#[derive(Deserialize)]
struct Blog<I> {
    posts: Items<I>,
}

#[derive(Deserialize)]
struct Items<I> {
    items: Vec<I>,
}

#[derive(Deserialize)]
struct SlugNode {
    #[serde(rename = "_slug")]
    slug: String,
}

#[derive(Deserialize)]
struct PostNode {
    #[serde(rename = "_slug")]
    slug: String,
    #[serde(rename = "_title")]
    title: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    author: Option<AuthorNode>,
    #[serde(default, rename = "coverImage")]
    cover_image: Option<ImageNode>,
    #[serde(default)]
    body: Option<BodyNode>,
}

#[derive(Deserialize)]
struct AuthorNode {
    #[serde(rename = "_title")]
    name: String,
    #[serde(default)]
    avatar: Option<UrlNode>,
}

#[derive(Deserialize)]
struct UrlNode {
    url: String,
}

#[derive(Deserialize)]
struct ImageNode {
    url: String,
    #[serde(default)]
    alt: Option<String>,
}

#[derive(Deserialize)]
struct BodyNode {
    markdown: String,
}

impl From<PostNode> for Post {
    fn from(node: PostNode) -> Self {
        Post {
            slug: node.slug,
            title: node.title,
            excerpt: node.excerpt.unwrap_or_default(),
            date: node.date,
            author: node.author.map(|a| Author {
                name: a.name,
                avatar_url: a.avatar.map(|img| img.url),
            }),
            cover_image: node.cover_image.map(|img| CoverImage {
                url: img.url,
                alt: img.alt,
            }),
            body: node.body.map(|b| b.markdown).unwrap_or_default(),
        }
    }
}

fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, ContentError> {
    let response: GraphQlResponse<T> = serde_json::from_str(payload)?;
    if !response.errors.is_empty() {
        return Err(ContentError::Query(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    response
        .data
        .ok_or_else(|| ContentError::Query(vec!["response carried no data".to_string()]))
}

#[derive(Clone)]
pub struct CmsClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl CmsClient {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token,
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        options: QueryOptions,
    ) -> Result<T, ContentError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&GraphQlRequest { query, variables });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if options.draft {
            request = request.header(DRAFT_HEADER, "true");
        }
        if options.revalidate == Revalidate::NoStore {
            request = request.header(CACHE_CONTROL, "no-store");
        }

        let response = request.send().await?;
        let status = response.status();
        let payload = response.text().await?;
        debug!(%status, bytes = payload.len(), "cms query answered");
        if !status.is_success() {
            return Err(ContentError::Status {
                status,
                body: payload,
            });
        }
        decode(&payload)
    }
}

#[async_trait]
impl ContentSource for CmsClient {
    async fn post_slugs(&self) -> Result<Vec<String>, ContentError> {
        let options = QueryOptions::new(false, Revalidate::NoStore);
        let data: BlogData<SlugNode> = self.query(POST_SLUGS_QUERY, json!({}), options).await?;
        Ok(data.blog.posts.items.into_iter().map(|n| n.slug).collect())
    }

    async fn post_by_slug(
        &self,
        slug: &str,
        options: QueryOptions,
    ) -> Result<Lookup<Post>, ContentError> {
        let data: BlogData<PostNode> = self
            .query(POST_BY_SLUG_QUERY, json!({ "slug": slug }), options)
            .await?;
        Ok(data.blog.posts.items.into_iter().next().map(Post::from).into())
    }

    async fn more_posts(
        &self,
        exclude_slug: &str,
        limit: usize,
        options: QueryOptions,
    ) -> Result<Vec<Post>, ContentError> {
        let data: BlogData<PostNode> = self
            .query(
                MORE_POSTS_QUERY,
                json!({ "slug": exclude_slug, "first": limit }),
                options,
            )
            .await?;
        Ok(data.blog.posts.items.into_iter().map(Post::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{http::HeaderMap, routing::post, Json, Router};
    use tokio::net::TcpListener;

    use super::*;

    fn hello_world() -> Value {
        json!({
            "_slug": "hello-world",
            "_title": "Hello World",
            "excerpt": "intro",
            "date": "2024-01-02T00:00:00.000Z",
            "author": { "_title": "Ada", "avatar": { "url": "https://cdn.example/ada.png" } },
            "coverImage": { "url": "https://cdn.example/cover.png", "alt": null },
            "body": { "markdown": "# Hi" }
        })
    }

    fn second_post() -> Value {
        json!({ "_slug": "second-post", "_title": "Second Post", "excerpt": "more" })
    }

    fn items(items: Vec<Value>) -> Value {
        json!({ "data": { "blog": { "posts": { "items": items } } } })
    }

    async fn graphql(headers: HeaderMap, Json(request): Json<Value>) -> Json<Value> {
        let query = request["query"].as_str().unwrap_or_default();
        let slug = request["variables"]["slug"].as_str().unwrap_or_default();
        let draft = headers.get(DRAFT_HEADER).is_some();

        if query.starts_with("query PostSlugs") {
            return Json(json!({ "data": { "blog": { "posts": { "items": [
                { "_slug": "hello-world" }, { "_slug": "second-post" }
            ] } } } }));
        }
        if query.starts_with("query PostBySlug") {
            return match slug {
                "hello-world" => Json(items(vec![hello_world()])),
                "preview-only" if draft => Json(items(vec![json!({
                    "_slug": "preview-only", "_title": "Preview"
                })])),
                "broken" => Json(json!({ "errors": [{ "message": "field exploded" }] })),
                _ => Json(items(Vec::new())),
            };
        }
        Json(items(
            [hello_world(), second_post()]
                .into_iter()
                .filter(|p| p["_slug"] != slug)
                .collect(),
        ))
    }

    async fn spawn_cms() -> CmsClient {
        let app = Router::new().route("/graphql", post(graphql));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        CmsClient::new(format!("http://{addr}/graphql"), Some("token".into()))
    }

    fn options(draft: bool) -> QueryOptions {
        QueryOptions::new(draft, Revalidate::After(Duration::from_secs(60)))
    }

    #[test]
    fn decodes_full_post_nodes() {
        let data: BlogData<PostNode> = decode(&items(vec![hello_world()]).to_string()).unwrap();
        let post = Post::from(data.blog.posts.items.into_iter().next().unwrap());
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.title, "Hello World");
        assert_eq!(post.excerpt, "intro");
        assert_eq!(post.body, "# Hi");
        let author = post.author.unwrap();
        assert_eq!(author.name, "Ada");
        assert_eq!(author.avatar_url.as_deref(), Some("https://cdn.example/ada.png"));
        assert_eq!(post.cover_image.unwrap().alt, None);
    }

    #[test]
    fn graphql_errors_become_query_errors() {
        let payload = r#"{"data":null,"errors":[{"message":"bad filter"}]}"#;
        let err = decode::<BlogData<SlugNode>>(payload).err().unwrap();
        assert!(matches!(err, ContentError::Query(messages) if messages == ["bad filter"]));
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        let err = decode::<BlogData<SlugNode>>("<html>").err().unwrap();
        assert!(matches!(err, ContentError::Decode(_)));
    }

    #[tokio::test]
    async fn talks_to_a_graphql_endpoint() {
        let cms = spawn_cms().await;

        let slugs = cms.post_slugs().await.unwrap();
        assert_eq!(slugs, ["hello-world", "second-post"]);

        let post = cms.post_by_slug("hello-world", options(false)).await.unwrap();
        assert_eq!(post.found().unwrap().title, "Hello World");

        let missing = cms.post_by_slug("does-not-exist", options(false)).await.unwrap();
        assert_eq!(missing, Lookup::NotFound);

        let more = cms.more_posts("hello-world", 2, options(false)).await.unwrap();
        let slugs: Vec<_> = more.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, ["second-post"]);
    }

    #[tokio::test]
    async fn draft_flag_is_forwarded() {
        let cms = spawn_cms().await;
        let hidden = cms.post_by_slug("preview-only", options(false)).await.unwrap();
        assert_eq!(hidden, Lookup::NotFound);
        let shown = cms.post_by_slug("preview-only", options(true)).await.unwrap();
        assert!(shown.is_found());
    }

    #[tokio::test]
    async fn query_errors_and_bad_statuses_surface() {
        let cms = spawn_cms().await;
        let err = cms.post_by_slug("broken", options(false)).await.unwrap_err();
        assert!(matches!(err, ContentError::Query(_)));

        let wrong_path = CmsClient::new(cms.endpoint.replace("/graphql", "/nope"), None);
        let err = wrong_path.post_slugs().await.unwrap_err();
        assert!(matches!(err, ContentError::Status { status, .. } if status == 404));
    }
}
