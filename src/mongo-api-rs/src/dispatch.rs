//! Request dispatch: compose, send and normalize one HTTP call

use mongo_api_core::{ClientConfig, QueryParams, QueryResult};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::{ClientError, Result};

pub const API_KEY_HEADER: &str = "api_key";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Name of the single form field that carries a request body
pub const PAYLOAD_FIELD: &str = "payload";

/// A composed request, ready to send
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub query: QueryParams,
    pub headers: HeaderMap,
    /// JSON text for the `payload` form field
    pub payload: Option<String>,
}

/// Headers write operations add on top of the defaults
pub fn form_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
    headers
}

pub struct Dispatcher {
    base_url: String,
    default_headers: HeaderMap,
    client: HttpClient,
}

impl Dispatcher {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(key) = config.api_key.as_deref().filter(|key| !key.is_empty()) {
            let value = HeaderValue::from_str(key)
                .map_err(|e| ClientError::Validation(format!("Invalid API key: {}", e)))?;
            default_headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        }

        // No request timeout: a call blocks until the server answers or the
        // connection fails.
        let client = HttpClient::builder()
            .timeout(None::<Duration>)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        Ok(Self {
            base_url: config.base_url(),
            default_headers,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Compose a request without sending it.
    ///
    /// Default headers take precedence over `headers` when both name the
    /// same header.
    pub fn prepare(
        &self,
        path: &str,
        method: Method,
        query: Option<QueryParams>,
        body: Option<&Value>,
        headers: HeaderMap,
    ) -> Result<PreparedRequest> {
        let mut merged = headers;
        for (name, value) in self.default_headers.iter() {
            merged.insert(name.clone(), value.clone());
        }

        let payload = body.map(serde_json::to_string).transpose()?;

        Ok(PreparedRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            query: query.unwrap_or_default(),
            headers: merged,
            payload,
        })
    }

    pub fn dispatch(
        &self,
        path: &str,
        method: Method,
        query: Option<QueryParams>,
        body: Option<&Value>,
        headers: HeaderMap,
    ) -> Result<QueryResult> {
        let request = self.prepare(path, method, query, body, headers)?;
        self.execute(request)
    }

    /// Send a prepared request and decode the server's answer
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub fn execute(&self, request: PreparedRequest) -> Result<QueryResult> {
        let PreparedRequest {
            method,
            url,
            query,
            headers,
            payload,
        } = request;

        let mut builder = self.client.request(method.clone(), &url).headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(payload) = payload {
            builder = builder.form(&[(PAYLOAD_FIELD, payload)]);
        }

        let response = match builder.send() {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                tracing::warn!("Server not responding: {}", e);
                return Err(ClientError::Connection(error_chain(&e)));
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        tracing::debug!("Server answered {}", status);

        let body = response.text()?;
        decode_response(status, &method, &url, &body)
    }
}

/// Map a status code and body onto the result record.
///
/// JSON bodies pass through untouched whatever the status; only bodies that
/// are not JSON turn into errors.
pub(crate) fn decode_response(
    status: StatusCode,
    method: &Method,
    url: &str,
    body: &str,
) -> Result<QueryResult> {
    let parsed = serde_json::from_str::<Value>(body);

    if status.is_success() {
        return parsed
            .map(QueryResult::new)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()));
    }

    match parsed {
        Ok(value) => {
            tracing::debug!("Passing through {} error body from server", status);
            Ok(QueryResult::new(value))
        }
        Err(_) if status.is_server_error() => {
            tracing::warn!("Server error {} without a JSON body", status);
            Err(ClientError::Server(format!(
                "`{} {}` resulted in a `{}` response: {}",
                method,
                url,
                status,
                body.trim()
            )))
        }
        Err(_) => Err(ClientError::UnexpectedStatus {
            status: status.as_u16(),
            body: body.trim().to_string(),
        }),
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
