use crate::client::JiraServiceManagementClient;
use crate::config::{
    API_TOKEN_KEY, BASE_URL_KEY, DEFAULT_BATCH_SIZE, EMAIL_KEY, PROJECT_KEY_KEY,
};
use crate::document::{rich_text_to_plain, Document, DocumentSource, Section};
use crate::error::{ConnectorError, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::thread;
use std::time::Duration;

pub type SecondsSinceUnixEpoch = f64;

/// Pause between two full pages of search results
pub const PAGE_DELAY: Duration = Duration::from_millis(200);

const SEARCH_ENDPOINT: &str = "search";
const JQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turns Jira Service Management tickets into document batches, either all
/// of them or those updated within a time window.
pub struct JiraServiceManagementConnector {
    batch_size: usize,
    client: Option<JiraServiceManagementClient>,
}

impl Default for JiraServiceManagementConnector {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl JiraServiceManagementConnector {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            client: None,
        }
    }

    /// Use an already configured client instead of loading credentials
    pub fn with_client(mut self, client: JiraServiceManagementClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Build the API client from a credentials mapping
    pub fn load_credentials(&mut self, credentials: &HashMap<String, String>) -> Result<()> {
        let base_url = required_credential(credentials, BASE_URL_KEY)?;
        let api_token = required_credential(credentials, API_TOKEN_KEY)?;
        let email = required_credential(credentials, EMAIL_KEY)?;
        let project_key = credentials
            .get(PROJECT_KEY_KEY)
            .map(String::as_str)
            .unwrap_or_default();

        self.client = Some(JiraServiceManagementClient::new(
            base_url,
            api_token,
            project_key,
        )?);

        debug!("Loaded Jira credentials for {} at {}", email, base_url);
        Ok(())
    }

    /// Every ticket, regardless of update time
    pub fn load_from_state(&self) -> Result<DocumentBatches<'_>> {
        self.poll_source(None, None)
    }

    /// Tickets whose `updated` timestamp lies within `[start, end]`.
    /// A missing bound leaves that side of the window open.
    pub fn poll_source(
        &self,
        start: Option<SecondsSinceUnixEpoch>,
        end: Option<SecondsSinceUnixEpoch>,
    ) -> Result<DocumentBatches<'_>> {
        let client = self.client.as_ref().ok_or(ConnectorError::ClientNotSetUp)?;

        if self.batch_size == 0 {
            return Err(ConnectorError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }

        let jql = build_jql(start, end)?;
        debug!("Polling tickets with filter {:?}", jql);

        Ok(DocumentBatches {
            client,
            batch_size: self.batch_size,
            jql,
            offset: 0,
            pause_before_next: false,
            finished: false,
        })
    }
}

fn required_credential<'a>(credentials: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    credentials
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ConnectorError::Config(format!("Missing credential '{}'", key)))
}

/// Lazy walk over the search endpoint, one page per yielded batch.
///
/// The next page is only requested when `next` is called. After an error
/// the iterator is exhausted.
pub struct DocumentBatches<'a> {
    client: &'a JiraServiceManagementClient,
    batch_size: usize,
    jql: Option<String>,
    offset: usize,
    pause_before_next: bool,
    finished: bool,
}

impl DocumentBatches<'_> {
    /// Number of raw issues consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn jql(&self) -> Option<&str> {
        self.jql.as_deref()
    }

    fn fetch_page(&self) -> Result<(Vec<Document>, usize)> {
        let mut params = vec![
            ("startAt", self.offset.to_string()),
            ("maxResults", self.batch_size.to_string()),
        ];
        if let Some(jql) = &self.jql {
            params.push(("jql", jql.clone()));
        }

        let page = self.client.get(SEARCH_ENDPOINT, &params)?;
        let issues = page
            .get("issues")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let docs = issues
            .iter()
            .map(|ticket| ticket_to_document(self.client, ticket))
            .collect();

        Ok((docs, issues.len()))
    }
}

impl Iterator for DocumentBatches<'_> {
    type Item = Result<Vec<Document>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if self.pause_before_next {
                thread::sleep(PAGE_DELAY);
            }

            let (docs, num_results) = match self.fetch_page() {
                Ok(page) => page,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            self.offset += num_results;
            debug!(
                "Fetched {} tickets, offset now {}",
                num_results, self.offset
            );

            if num_results < self.batch_size {
                self.finished = true;
                info!("Ticket walk complete after {} tickets", self.offset);
            } else {
                self.pause_before_next = true;
            }

            if !docs.is_empty() {
                return Some(Ok(docs));
            }
        }

        None
    }
}

/// Build the `updated` range filter, `None` when neither bound is given
pub fn build_jql(
    start: Option<SecondsSinceUnixEpoch>,
    end: Option<SecondsSinceUnixEpoch>,
) -> Result<Option<String>> {
    let mut clauses = Vec::new();

    if let Some(start) = start {
        clauses.push(format!("updated >= '{}'", format_timestamp(start)?));
    }
    if let Some(end) = end {
        clauses.push(format!("updated <= '{}'", format_timestamp(end)?));
    }

    if clauses.is_empty() {
        Ok(None)
    } else {
        Ok(Some(clauses.join(" AND ")))
    }
}

fn format_timestamp(seconds: SecondsSinceUnixEpoch) -> Result<String> {
    if !seconds.is_finite() {
        return Err(ConnectorError::InvalidTimestamp(seconds));
    }

    let datetime: DateTime<Utc> = DateTime::from_timestamp(seconds.floor() as i64, 0)
        .ok_or(ConnectorError::InvalidTimestamp(seconds))?;

    Ok(datetime.format(JQL_TIME_FORMAT).to_string())
}

/// Convert one raw search result into a document
pub fn ticket_to_document(client: &JiraServiceManagementClient, ticket: &Value) -> Document {
    let issue_key = ticket.get("key").and_then(Value::as_str).unwrap_or_default();
    let null = Value::Null;
    let fields = ticket.get("fields").unwrap_or(&null);

    let summary = fields
        .get("summary")
        .map(rich_text_to_plain)
        .unwrap_or_default();
    let description = fields
        .get("description")
        .map(rich_text_to_plain)
        .unwrap_or_default();

    let url = client.build_app_url(&format!("/browse/{}", issue_key));
    let text = format!("{}\n{}", summary, description);

    let mut metadata = BTreeMap::new();
    metadata.insert("type".to_string(), "ticket".to_string());
    metadata.insert("updated_at".to_string(), string_field(fields, &["updated"]));
    metadata.insert("status".to_string(), string_field(fields, &["status", "name"]));
    metadata.insert(
        "priority".to_string(),
        string_field(fields, &["priority", "name"]),
    );

    Document {
        id: format!("ticket:{}", issue_key),
        sections: vec![Section { link: url, text }],
        source: DocumentSource::JiraServiceManagement,
        semantic_identifier: format!("Ticket: {}", summary),
        metadata,
    }
}

fn string_field(fields: &Value, path: &[&str]) -> String {
    path.iter()
        .try_fold(fields, |value, key| value.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
