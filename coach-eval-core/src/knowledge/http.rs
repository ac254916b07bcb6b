//! Hybrid-search RPC client (`POST /rest/v1/rpc/<function>`)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{HybridQuery, KnowledgeChunk, KnowledgeStore};
use crate::error::{EvalError, Result};
use crate::llm::transport_error;

/// Knowledge store reached through a PostgREST-style RPC endpoint
pub struct HttpKnowledgeStore {
    client: reqwest::Client,
    base_url: String,
    function: String,
    api_key: String,
}

impl HttpKnowledgeStore {
    pub fn new(
        base_url: impl Into<String>,
        function: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            function: function.into(),
            api_key: api_key.into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, self.function)
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    query_text: &'a str,
    query_embedding: &'a [f32],
    match_count: usize,
    full_text_weight: f64,
    semantic_weight: f64,
    rrf_k: u32,
}

#[derive(Deserialize)]
struct RpcRow {
    id: serde_json::Value,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    section: Option<String>,
    content: String,
    #[serde(default, alias = "topic_tags")]
    topics: Option<Vec<String>>,
}

impl RpcRow {
    fn into_chunk(self) -> KnowledgeChunk {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        KnowledgeChunk {
            id,
            source: self.source.unwrap_or_default(),
            section: self.section.unwrap_or_default(),
            content: self.content,
            topics: self.topics.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl KnowledgeStore for HttpKnowledgeStore {
    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<KnowledgeChunk>> {
        let body = RpcRequest {
            query_text: &query.text,
            query_embedding: &query.embedding,
            match_count: query.top_k,
            full_text_weight: query.full_text_weight,
            semantic_weight: query.semantic_weight,
            rrf_k: query.rrf_k,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("knowledge store", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EvalError::Provider(format!(
                "Knowledge store error ({}): {}",
                status, text
            )));
        }

        let rows: Vec<RpcRow> = response.json().await.map_err(|e| {
            EvalError::Provider(format!("Failed to parse knowledge store response: {}", e))
        })?;

        let mut chunks: Vec<KnowledgeChunk> = rows.into_iter().map(RpcRow::into_chunk).collect();
        chunks.truncate(query.top_k);
        tracing::debug!(function = %self.function, returned = chunks.len(), "hybrid search");
        Ok(chunks)
    }

    fn describe(&self) -> String {
        format!("rpc:{}", self.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn query() -> HybridQuery {
        HybridQuery {
            text: "sled push distance".to_string(),
            embedding: vec![0.5, 0.5],
            top_k: 2,
            full_text_weight: 1.0,
            semantic_weight: 1.0,
            rrf_k: 50,
        }
    }

    #[tokio::test]
    async fn test_rpc_contract() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/hybrid_search")
            .match_header("apikey", "service-key")
            .match_header("authorization", "Bearer service-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "query_text": "sled push distance",
                "match_count": 2,
                "rrf_k": 50
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id": 17, "source": "Rulebook", "section": "Stations", "content": "Sled push 50m", "topic_tags": ["stations"]},
                    {"id": "c-3", "content": "Pacing notes"},
                    {"id": "c-9", "content": "extra row"}]"#,
            )
            .create_async()
            .await;

        let store = HttpKnowledgeStore::new(server.url(), "hybrid_search", "service-key");
        let chunks = store.hybrid_search(&query()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "17");
        assert_eq!(chunks[0].topics, vec!["stations"]);
        assert_eq!(chunks[1].id, "c-3");
        assert_eq!(chunks[1].section, "");
    }

    #[tokio::test]
    async fn test_rpc_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/v1/rpc/hybrid_search")
            .with_status(404)
            .with_body(r#"{"message":"function not found"}"#)
            .create_async()
            .await;

        let store = HttpKnowledgeStore::new(server.url(), "hybrid_search", "k");
        let err = store.hybrid_search(&query()).await.unwrap_err();
        assert!(err.to_string().contains("function not found"));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let store = HttpKnowledgeStore::new("http://db.local/", "match_chunks", "k");
        assert_eq!(store.endpoint(), "http://db.local/rest/v1/rpc/match_chunks");
        assert_eq!(store.describe(), "rpc:match_chunks");
    }
}
