// Question answering and passage search against the book's content.

use async_trait::async_trait;
use reqwest::Method;

use bookshelf_core::protocol::{ChatRequest, ChatResponse, SearchRequest, SearchResponse};

use crate::client::{ApiClient, CHAT_PATH, SEARCH_PATH};
use crate::error::ApiError;

/// Content endpoints. Neither needs a bearer token.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError>;
}

#[async_trait]
impl ContentApi for ApiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let req = self.request(Method::POST, CHAT_PATH, None).json(request);
        self.send_json(req, "Chat").await
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError> {
        request.validate()?;
        let req = self.request(Method::POST, SEARCH_PATH, None).json(request);
        self.send_json(req, "Search").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_server::respond_once;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[tokio::test]
    async fn chat_posts_query_with_selection() {
        let body = json!({
            "answer": "ROS 2 is middleware for robot control.",
            "citations": [
                { "doc_id": "Module 1", "chunk_id": "/module1-ros2-3", "url": "/docs/module1-ros2" }
            ]
        });
        let (base, rx) = respond_once(200, &body.to_string()).await;
        let client = ApiClient::new(base, Duration::from_secs(5)).unwrap();

        let response = client
            .chat(&ChatRequest {
                query: "Explain this".into(),
                user_id: Some("u-1".into()),
                selected_text: Some("ROS 2 Nodes".into()),
            })
            .await
            .unwrap();
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].url, "/docs/module1-ros2");

        let captured = rx.await.unwrap();
        assert_eq!(captured.request_line, "POST /api/v1/chat HTTP/1.1");
        assert_eq!(captured.header("authorization"), None);
        let sent: Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(
            sent,
            json!({ "query": "Explain this", "user_id": "u-1", "selected_text": "ROS 2 Nodes" })
        );
    }

    #[tokio::test]
    async fn chat_404_surfaces_detail() {
        let (base, _rx) = respond_once(
            404,
            r#"{"detail":"Qdrant collection 'book_content_chunks' not found. Please ingest documents first."}"#,
        )
        .await;
        let client = ApiClient::new(base, Duration::from_secs(5)).unwrap();

        let err = client
            .chat(&ChatRequest {
                query: "hi".into(),
                user_id: None,
                selected_text: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().starts_with("Qdrant collection"));
    }

    #[tokio::test]
    async fn search_returns_chunks() {
        let body = json!({
            "results": [{
                "page_content": "Gazebo simulates physics.",
                "chapter_title": "Digital Twins",
                "url_slug": "/module2-digital-twin",
                "embedding": [0.1, 0.2]
            }]
        });
        let (base, _rx) = respond_once(200, &body.to_string()).await;
        let client = ApiClient::new(base, Duration::from_secs(5)).unwrap();

        let response = client
            .search(&SearchRequest {
                query: "gazebo".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].chapter_title, "Digital Twins");
    }

    #[tokio::test]
    async fn blank_search_never_reaches_the_network() {
        // Nothing listens here; a request would fail with a network error.
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

        let err = client
            .search(&SearchRequest { query: "   ".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
