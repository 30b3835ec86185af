use std::fmt::Write;

use htmlescape::{encode_attribute, encode_minimal};

use crate::markdown::render_body;
use crate::models::{PageMetadata, Post, PostPage};

const HOT_RELOAD_SCRIPT: &str = r#"
<script>
    const socket = new WebSocket("ws://" + window.location.host + "/ws");
    socket.onmessage = (event) => {
        if (event.data === "reload") {
            window.location.reload();
        }
    };
</script>
"#;

fn display_date(post: &Post) -> Option<String> {
    match post.published_on() {
        Some(date) => Some(date.format("%B %-d, %Y").to_string()),
        None => post.date.clone(),
    }
}

fn push_byline(out: &mut String, post: &Post) {
    let date = display_date(post);
    if date.is_none() && post.author.is_none() {
        return;
    }
    out.push_str("<p class=\"byline\">");
    if let Some(author) = &post.author {
        if let Some(avatar) = &author.avatar_url {
            let _ = write!(
                out,
                "<img class=\"avatar\" src=\"{}\" alt=\"\">",
                encode_attribute(avatar)
            );
        }
        let _ = write!(out, "<span class=\"author\">{}</span>", encode_minimal(&author.name));
    }
    if let Some(date) = date {
        let _ = write!(out, "<time>{}</time>", encode_minimal(&date));
    }
    out.push_str("</p>");
}

fn push_cover(out: &mut String, post: &Post) {
    if let Some(cover) = &post.cover_image {
        let alt = cover.alt.as_deref().unwrap_or(&post.title);
        let _ = write!(
            out,
            "<img class=\"cover\" src=\"{}\" alt=\"{}\">",
            encode_attribute(&cover.url),
            encode_attribute(alt)
        );
    }
}

fn push_more_stories(out: &mut String, more_posts: &[Post]) {
    if more_posts.is_empty() {
        return;
    }
    out.push_str("<section class=\"more-stories\"><h2>More Stories</h2><ul>");
    for post in more_posts {
        out.push_str("<li>");
        push_cover(out, post);
        let _ = write!(
            out,
            "<h3><a href=\"/posts/{}\">{}</a></h3>",
            encode_attribute(&post.slug),
            encode_minimal(&post.title)
        );
        push_byline(out, post);
        let _ = write!(out, "<p class=\"excerpt\">{}</p>", encode_minimal(&post.excerpt));
        out.push_str("</li>");
    }
    out.push_str("</ul></section>");
}

/// Body of a post page: header link, the post, a separator, more stories.
pub fn render_post_page(page: &PostPage) -> String {
    let post = &page.post;
    let mut out = String::new();
    out.push_str("<main class=\"container\">");
    out.push_str("<h2 class=\"site-header\"><a href=\"/\">Blog</a>.</h2>");

    out.push_str("<article class=\"post\">");
    let _ = write!(out, "<h1>{}</h1>", encode_minimal(&post.title));
    push_cover(&mut out, post);
    push_byline(&mut out, post);
    let _ = write!(out, "<div class=\"post-body\">{}</div>", render_body(&post.body));
    out.push_str("</article>");

    out.push_str("<hr class=\"separator\">");
    push_more_stories(&mut out, &page.more_posts);
    out.push_str("</main>");
    out
}

/// Fill the layout shell. In development the hot-reload script is injected.
pub fn render_document(
    layout: &str,
    metadata: &PageMetadata,
    content: &str,
    is_development: bool,
) -> String {
    let mut page = layout
        .replace("{{ title }}", &encode_minimal(&metadata.title))
        .replace("{{ description }}", &encode_attribute(&metadata.description))
        .replace("{{ content }}", content);

    if is_development {
        page = page.replace("</body>", &format!("{}</body>", HOT_RELOAD_SCRIPT));
    }

    page
}

pub fn render_not_found(layout: &str, not_found: &str, slug: &str, is_development: bool) -> String {
    let metadata = PageMetadata {
        title: "Not Found".to_string(),
        description: String::new(),
    };
    let body = not_found.replace("{{slug}}", &encode_minimal(slug));
    render_document(layout, &metadata, &body, is_development)
}

pub fn render_error(layout: &str, error: &str, is_development: bool) -> String {
    let metadata = PageMetadata {
        title: "Error".to_string(),
        description: String::new(),
    };
    render_document(layout, &metadata, error, is_development)
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::*;
    use crate::models::{Author, CoverImage};

    const LAYOUT: &str = "<html><head><title>{{ title }}</title><meta name=\"description\" content=\"{{ description }}\"></head><body>{{ content }}</body></html>";

    fn post(slug: &str, title: &str, excerpt: &str) -> Post {
        Post {
            slug: slug.into(),
            title: title.into(),
            excerpt: excerpt.into(),
            date: Some("2024-01-02".into()),
            author: None,
            cover_image: None,
            body: "Some **bold** words".into(),
        }
    }

    fn select(doc: &Html, css: &str) -> Vec<String> {
        let selector = Selector::parse(css).unwrap();
        doc.select(&selector)
            .map(|el| el.text().collect::<String>())
            .collect()
    }

    #[test]
    fn page_is_header_post_separator_then_more_stories() {
        let mut main_post = post("hello-world", "Hello World", "intro");
        main_post.author = Some(Author {
            name: "Ada".into(),
            avatar_url: None,
        });
        main_post.cover_image = Some(CoverImage {
            url: "/static/cover.png".into(),
            alt: None,
        });
        let page = PostPage {
            post: main_post,
            more_posts: vec![post("second-post", "Second Post", "more")],
        };

        let html = render_post_page(&page);
        let doc = Html::parse_fragment(&html);

        assert_eq!(select(&doc, "h2.site-header a"), ["Blog"]);
        assert_eq!(select(&doc, "article h1"), ["Hello World"]);
        assert_eq!(select(&doc, "article .author"), ["Ada"]);
        assert_eq!(select(&doc, "article time"), ["January 2, 2024"]);
        assert_eq!(select(&doc, "article .post-body strong"), ["bold"]);
        assert_eq!(select(&doc, ".more-stories h3 a"), ["Second Post"]);
        assert_eq!(select(&doc, ".more-stories .excerpt"), ["more"]);

        let header = html.find("site-header").unwrap();
        let article = html.find("<article").unwrap();
        let separator = html.find("<hr").unwrap();
        let more = html.find("more-stories").unwrap();
        assert!(header < article && article < separator && separator < more);
    }

    #[test]
    fn empty_more_posts_omits_the_section() {
        let page = PostPage {
            post: post("hello-world", "Hello World", "intro"),
            more_posts: Vec::new(),
        };
        let html = render_post_page(&page);
        assert!(html.contains("<hr"));
        assert!(!html.contains("more-stories"));
    }

    #[test]
    fn content_source_text_is_escaped() {
        let page = PostPage {
            post: post("x", "<script>alert(1)</script>", ""),
            more_posts: Vec::new(),
        };
        let html = render_post_page(&page);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn document_carries_metadata() {
        let metadata = PageMetadata {
            title: "Post / Hello World".into(),
            description: "intro \"quoted\"".into(),
        };
        let html = render_document(LAYOUT, &metadata, "<main></main>", false);
        let doc = Html::parse_document(&html);
        assert_eq!(select(&doc, "title"), ["Post / Hello World"]);
        let meta = Selector::parse("meta[name=description]").unwrap();
        let content = doc.select(&meta).next().unwrap().value().attr("content");
        assert_eq!(content, Some("intro \"quoted\""));
        assert!(!html.contains("WebSocket"));
    }

    #[test]
    fn development_documents_get_the_reload_script() {
        let metadata = PageMetadata {
            title: "t".into(),
            description: "d".into(),
        };
        let html = render_document(LAYOUT, &metadata, "", true);
        assert!(html.contains("new WebSocket"));
        assert!(html.ends_with("</body></html>"));
    }

    #[test]
    fn not_found_page_mentions_the_slug() {
        let html = render_not_found(LAYOUT, "<p>No post called {{slug}}</p>", "<nope>", false);
        assert!(html.contains("No post called &lt;nope&gt;"));
        assert!(html.contains("<title>Not Found</title>"));
    }
}
