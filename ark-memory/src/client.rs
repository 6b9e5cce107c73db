//! Thin HTTP client for the memory service wire API.

use crate::error::MemoryError;
use crate::types::{ListMessagesResponse, ListSessionsResponse, MessageFilter, MessageItem, PutMessage, PutMessagesRequest};

pub struct MemoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl MemoryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder().build().map_err(|e| MemoryError::Request(e.to_string()))?;
        Ok(MemoryClient { client, base_url: base_url.into() })
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>, MemoryError> {
        let url = format!("{}/v1/sessions", self.base_url);
        let response = self.client.get(url).send().await?;
        let response = check_status(response).await?;
        let body: ListSessionsResponse = response.json().await.map_err(|e| MemoryError::Request(e.to_string()))?;
        Ok(body.items)
    }

    pub async fn get_messages(&self, session_id: &str, filter: &MessageFilter) -> Result<Vec<MessageItem>, MemoryError> {
        let url = format!("{}/v1/sessions/{session_id}/messages", self.base_url);
        let response = self.client.get(url).query(&filter.query_pairs()).send().await?;
        let response = check_status(response).await?;
        let body: ListMessagesResponse = response.json().await.map_err(|e| MemoryError::Request(e.to_string()))?;
        Ok(body.items)
    }

    pub async fn put_messages(&self, session_id: &str, query_id: &str, messages: Vec<PutMessage>) -> Result<(), MemoryError> {
        let url = format!("{}/v1/sessions/{session_id}/messages", self.base_url);
        let request = PutMessagesRequest { query_id: query_id.to_string(), messages };
        let response = self.client.post(url).json(&request).send().await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), MemoryError> {
        let url = format!("{}/v1/sessions/{session_id}", self.base_url);
        let response = self.client.delete(url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn delete_query_messages(&self, session_id: &str, query_id: &str) -> Result<(), MemoryError> {
        let url = format!("{}/v1/sessions/{session_id}/queries/{query_id}/messages", self.base_url);
        let response = self.client.delete(url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn reset_all(&self) -> Result<(), MemoryError> {
        let url = format!("{}/v1/sessions", self.base_url);
        let response = self.client.delete(url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MemoryError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(MemoryError::Status(status.as_u16(), body))
    }
}
