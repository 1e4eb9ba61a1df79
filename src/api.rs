use std::time::Duration;

use reqwest::{
    blocking::{Client, RequestBuilder},
    header::ACCEPT,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::Settings,
    domain::{Category, NotificationRecord},
};

const USER_AGENT_HEADER: &str = "relocate-egui/0.1";
const NOTIFICATIONS_PATH: &str = "notifications";

/// One page of one category, as asked of the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: usize,
    pub category: Category,
}

/// Records decoded from one page response.
///
/// `returned` counts every element the server sent, including ones that
/// could not be decoded, so a page with a bad record still reads as full.
#[derive(Debug, Default)]
pub struct NotificationPage {
    pub records: Vec<NotificationRecord>,
    pub returned: usize,
}

impl NotificationPage {
    fn decode(data: Option<serde_json::Value>) -> Self {
        let raw = match data {
            Some(serde_json::Value::Array(items)) => items,
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(other) => {
                warn!(kind = json_kind(&other), "page data is not a list; treating as empty");
                Vec::new()
            }
        };
        let returned = raw.len();
        let records = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(error = %err, "skipping undecodable notification");
                    None
                }
            })
            .collect();
        Self { records, returned }
    }
}

impl From<Vec<NotificationRecord>> for NotificationPage {
    fn from(records: Vec<NotificationRecord>) -> Self {
        Self {
            returned: records.len(),
            records,
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Backend operations the notification feed depends on.
///
/// Calls are made from worker threads, so implementations must be shareable.
pub trait NotificationSource: Send + Sync {
    fn fetch_page(&self, request: &PageRequest) -> Result<NotificationPage, ApiError>;
    fn mark_read(&self, id: &str) -> Result<(), ApiError>;
    fn delete(&self, id: &str) -> Result<(), ApiError>;
    fn demote(&self, id: &str) -> Result<(), ApiError>;
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT_HEADER)
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_owned(),
            token: settings.access_token.trim().to_owned(),
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/{NOTIFICATIONS_PATH}{suffix}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        if self.token.is_empty() {
            return Err(ApiError::MissingToken);
        }
        Ok(request
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.token))
    }

    fn confirm(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let envelope: ApiEnvelope<serde_json::Value> = self
            .authorized(request)?
            .send()?
            .error_for_status()?
            .json()?;
        envelope.into_data().map(|_| ())
    }
}

impl NotificationSource for ApiClient {
    fn fetch_page(&self, request: &PageRequest) -> Result<NotificationPage, ApiError> {
        let mut query = vec![
            ("page", request.page.to_string()),
            ("limit", request.page_size.to_string()),
        ];
        if let Some(kind) = request.category.filter() {
            query.push(("type", kind.to_owned()));
        }

        debug!(page = request.page, category = ?request.category, "requesting notifications");
        let envelope: ApiEnvelope<serde_json::Value> = self
            .authorized(self.client.get(self.endpoint("")).query(&query))?
            .send()?
            .error_for_status()?
            .json()?;
        Ok(NotificationPage::decode(envelope.into_data()?))
    }

    fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        self.confirm(self.client.patch(self.endpoint(&format!("/{id}/read"))))
    }

    fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.confirm(self.client.delete(self.endpoint(&format!("/{id}"))))
    }

    fn demote(&self, id: &str) -> Result<(), ApiError> {
        self.confirm(self.client.post(self.endpoint(&format!("/{id}/show-less"))))
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("You are not signed in; add an access token in Settings")]
    MissingToken,
    #[error("{0}")]
    Rejected(String),
    #[error("Background worker disconnected before returning a result")]
    BackgroundWorkerGone,
}

// Response payloads ---------------------------------------------------------

/// `{success, data, message}` wrapper every backend endpoint answers with.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    fn into_data(self) -> Result<Option<T>, ApiError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ApiError::Rejected(
                self.message
                    .unwrap_or_else(|| "The server rejected the request".to_owned()),
            ))
        }
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
