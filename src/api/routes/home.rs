//! Landing page.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../../static/index.html");

/// GET / — static page with a small chat form. No side effects.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_serves_chat_form() {
        let Html(page) = index().await;
        assert!(page.contains("<form"));
        assert!(page.contains("/chat"));
    }
}
