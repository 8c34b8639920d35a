/// Notion record store
///
/// Reads the movie database through the database query endpoint and writes
/// the watched checkbox through the page update endpoint.
///
/// API Flow:
/// 1. Catalog: POST /v1/databases/{database_id}/query, filtered on the watched
///    checkbox, repeated with `start_cursor` while `has_more` is set
/// 2. Toggle: PATCH /v1/pages/{page_id} with the new checkbox value
use crate::{
    config::{Config, PropertyNames},
    error::{AppError, AppResult},
    models::{
        notion::{CheckboxCondition, CheckboxFilter, QueryRequest},
        MovieId, QueryResponse,
    },
    services::store::{RecordPage, RecordStore},
};
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde_json::json;

const PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct NotionStore {
    http_client: HttpClient,
    token: String,
    database_id: String,
    api_url: String,
    notion_version: String,
    props: PropertyNames,
}

impl NotionStore {
    pub fn new(config: &Config) -> Self {
        Self {
            http_client: HttpClient::new(),
            token: config.notion_token.clone(),
            database_id: config.notion_database_id.clone(),
            api_url: config.notion_api_url.trim_end_matches('/').to_string(),
            notion_version: config.notion_version.clone(),
            props: config.property_names(),
        }
    }

    fn query_url(&self) -> String {
        format!("{}/v1/databases/{}/query", self.api_url, self.database_id)
    }

    fn page_url(&self, id: &MovieId) -> String {
        format!("{}/v1/pages/{}", self.api_url, id)
    }

    fn query_body<'a>(&'a self, cursor: Option<&'a str>) -> QueryRequest<'a> {
        QueryRequest {
            filter: CheckboxFilter {
                property: &self.props.watched,
                checkbox: CheckboxCondition { equals: false },
            },
            start_cursor: cursor,
            page_size: PAGE_SIZE,
        }
    }

    fn update_body(&self, watched: bool) -> serde_json::Value {
        json!({
            "properties": {
                self.props.watched.as_str(): { "checkbox": watched }
            }
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.notion_version)
    }

    /// Turns a non-2xx response into a message carrying status and body
    async fn failure_message(response: Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("Notion API returned status {}: {}", status, body)
    }
}

#[async_trait::async_trait]
impl RecordStore for NotionStore {
    async fn query_unwatched(&self, cursor: Option<String>) -> AppResult<RecordPage> {
        let response = self
            .authorized(self.http_client.post(self.query_url()))
            .json(&self.query_body(cursor.as_deref()))
            .send()
            .await
            .map_err(|e| AppError::UpstreamFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamFetch(
                Self::failure_message(response).await,
            ));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| AppError::UpstreamFetch(e.to_string()))?;

        let page: QueryResponse = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                response = %response_text,
                "Failed to deserialize Notion query response"
            );
            AppError::UpstreamFetch(format!("Failed to parse Notion response: {}", e))
        })?;

        tracing::debug!(
            records = page.results.len(),
            has_more = page.has_more,
            store = self.name(),
            "Fetched record page"
        );

        Ok(page.into())
    }

    async fn set_watched(&self, id: &MovieId, watched: bool) -> AppResult<()> {
        let response = self
            .authorized(self.http_client.patch(self.page_url(id)))
            .json(&self.update_body(watched))
            .send()
            .await
            .map_err(|e| AppError::UpstreamUpdate(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamUpdate(
                Self::failure_message(response).await,
            ));
        }

        tracing::info!(
            movie_id = %id,
            watched = watched,
            store = self.name(),
            "Watched flag persisted"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "notion"
    }
}
