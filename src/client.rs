use crate::error::{ConnectorError, Result};
use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Map, Value};

const SERVICE_NAME: &str = "Jira";
const API_PREFIX: &str = "rest/api/3";

pub const DEFAULT_ISSUE_TYPE: &str = "Task";
pub const DEFAULT_SEARCH_RESULTS: usize = 50;

/// Blocking client for the Jira Service Management REST API.
///
/// Endpoints passed to [`get`](Self::get) and [`post`](Self::post) are
/// relative to `<base_url>/rest/api/3/`.
pub struct JiraServiceManagementClient {
    client: Client,
    base_url: String,
    project_key: String,
}

impl JiraServiceManagementClient {
    pub fn new(base_url: &str, api_token: &str, project_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();

        // Authorization: Bearer {token}
        let auth_value = format!("Bearer {}", api_token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| {
                ConnectorError::Config(format!("Invalid Jira API token: {}", e))
            })?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_key: project_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of an API endpoint
    pub fn build_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            API_PREFIX,
            endpoint.trim_start_matches('/')
        )
    }

    /// Browsable URL within the Jira web UI, e.g. `/browse/HELP-1`
    pub fn build_app_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET an endpoint with query parameters
    pub fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.build_url(endpoint);
        debug!("GET {} {:?}", url, params);

        let response = self.client.get(&url).query(params).send()?;
        Self::handle_response(response, SERVICE_NAME)
    }

    /// POST a JSON payload to an endpoint
    pub fn post(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let url = self.build_url(endpoint);
        debug!("POST {}", url);
        debug!("Request body: {}", payload);

        let response = self.client.post(&url).json(payload).send()?;
        Self::handle_response(response, SERVICE_NAME)
    }

    /// Create an issue in the configured project
    pub fn create_issue(&self, summary: &str, description: &str, issue_type: &str) -> Result<Value> {
        let payload = json!({
            "fields": {
                "project": {"key": self.project_key},
                "summary": summary,
                "description": description,
                "issuetype": {"name": issue_type},
            }
        });

        self.post("issue", &payload)
    }

    pub fn get_issue(&self, issue_id: &str) -> Result<Value> {
        self.get(&format!("issue/{}", issue_id), &[])
    }

    /// Run a JQL search and return the raw page
    pub fn search_issues(&self, jql: &str, max_results: usize) -> Result<Value> {
        let params = [
            ("jql", jql.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        self.get("search", &params)
    }

    pub fn create_comment(&self, issue_id: &str, comment: &str) -> Result<Value> {
        let payload = json!({ "body": comment });
        self.post(&format!("issue/{}/comment", issue_id), &payload)
    }

    /// Decode a response body, turning statuses >= 300 into `ApiRequestFailed`.
    ///
    /// A body that is not JSON is treated as an empty object.
    fn handle_response(response: Response, service_name: &str) -> Result<Value> {
        let status = response.status();
        let body = response.text()?;

        let data: Value =
            serde_json::from_str(&body).unwrap_or_else(|_| Value::Object(Map::new()));

        if status.as_u16() >= 300 {
            let error_message = data
                .get("errorMessages")
                .and_then(Value::as_array)
                .and_then(|messages| messages.first())
                .map(|first| match first {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());

            debug!("{} responded {}: {}", service_name, status, error_message);

            return Err(ConnectorError::ApiRequestFailed {
                service_name: service_name.to_string(),
                status_code: status.as_u16(),
                error_message,
            });
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn client_for(server: &ServerGuard) -> JiraServiceManagementClient {
        JiraServiceManagementClient::new(&server.url(), "test-token", "HELP").unwrap()
    }

    #[test]
    fn test_urls_strip_slashes() {
        let client =
            JiraServiceManagementClient::new("https://acme.atlassian.net//", "t", "HELP").unwrap();
        assert_eq!(client.base_url(), "https://acme.atlassian.net");
        assert_eq!(
            client.build_url("/issue/HELP-1"),
            "https://acme.atlassian.net/rest/api/3/issue/HELP-1"
        );
        assert_eq!(
            client.build_app_url("/browse/HELP-1"),
            "https://acme.atlassian.net/browse/HELP-1"
        );
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let result = JiraServiceManagementClient::new("https://acme.atlassian.net", "bad\ntoken", "");
        assert!(matches!(result, Err(ConnectorError::Config(_))));
    }

    #[test]
    fn test_get_issue_sends_auth_headers() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/rest/api/3/issue/HELP-7")
            .match_header("authorization", "Bearer test-token")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(r#"{"key":"HELP-7","fields":{"summary":"Reset password"}}"#)
            .create();

        let issue = client_for(&server).get_issue("HELP-7").unwrap();
        assert_eq!(issue["key"], "HELP-7");
        assert_eq!(issue["fields"]["summary"], "Reset password");
        mock.assert();
    }

    #[test]
    fn test_error_message_taken_from_body() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/rest/api/3/issue/HELP-404")
            .with_status(404)
            .with_body(r#"{"errorMessages":["Issue Does Not Exist"],"errors":{}}"#)
            .create();

        match client_for(&server).get_issue("HELP-404") {
            Err(ConnectorError::ApiRequestFailed {
                service_name,
                status_code,
                error_message,
            }) => {
                assert_eq!(service_name, "Jira");
                assert_eq!(status_code, 404);
                assert_eq!(error_message, "Issue Does Not Exist");
            }
            other => panic!("expected ApiRequestFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_error_message_falls_back_to_reason() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/rest/api/3/issue/HELP-1")
            .with_status(500)
            .with_body("<html>upstream exploded</html>")
            .create();

        match client_for(&server).get_issue("HELP-1") {
            Err(ConnectorError::ApiRequestFailed {
                status_code,
                error_message,
                ..
            }) => {
                assert_eq!(status_code, 500);
                assert_eq!(error_message, "Internal Server Error");
            }
            other => panic!("expected ApiRequestFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_success_body_is_empty_object() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/rest/api/3/issue/HELP-1/comment")
            .with_status(201)
            .with_body("")
            .create();

        let body = client_for(&server)
            .create_comment("HELP-1", "Looking into it")
            .unwrap();
        assert_eq!(body, Value::Object(Map::new()));
    }

    #[test]
    fn test_create_issue_payload() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/rest/api/3/issue")
            .match_body(Matcher::Json(json!({
                "fields": {
                    "project": {"key": "HELP"},
                    "summary": "Laptop broken",
                    "description": "Screen flickers",
                    "issuetype": {"name": "Task"}
                }
            })))
            .with_status(201)
            .with_body(r#"{"id":"10001","key":"HELP-12"}"#)
            .create();

        let created = client_for(&server)
            .create_issue("Laptop broken", "Screen flickers", DEFAULT_ISSUE_TYPE)
            .unwrap();
        assert_eq!(created["key"], "HELP-12");
        mock.assert();
    }

    #[test]
    fn test_create_comment_payload() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/rest/api/3/issue/HELP-3/comment")
            .match_body(Matcher::Json(json!({"body": "Rebooted the router"})))
            .with_status(201)
            .with_body(r#"{"id":"200"}"#)
            .create();

        client_for(&server)
            .create_comment("HELP-3", "Rebooted the router")
            .unwrap();
        mock.assert();
    }

    #[test]
    fn test_search_issues_query() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/rest/api/3/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("jql".into(), "project = HELP".into()),
                Matcher::UrlEncoded("maxResults".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"startAt":0,"maxResults":50,"total":0,"issues":[]}"#)
            .create();

        let page = client_for(&server)
            .search_issues("project = HELP", DEFAULT_SEARCH_RESULTS)
            .unwrap();
        assert_eq!(page["total"], 0);
        mock.assert();
    }
}
