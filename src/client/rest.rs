//! Client for the plain REST binding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::backend::ToolBackend;
use crate::client::error::ClientError;
use crate::config::ClientConfig;
use crate::mcp::registry::ToolListing;
use crate::mcp::rest::{AbsenceReply, MenuReply};
use crate::mcp::schema::{validate, DATE_FORMAT};
use crate::tools::{self, absence, menu};

/// Calls the `/tools/*` endpoints.
///
/// The REST binding has no listing method, so the built-in listing is used
/// for local validation.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    tools: Vec<ToolListing>,
}

impl RestClient {
    /// Creates a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            tools: tools::builtin_listing(),
        })
    }

    /// Creates a client from the `client` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }

    /// `POST /tools/report_absence`.
    ///
    /// # Errors
    ///
    /// Returns transport, timeout, remote, or protocol failures.
    pub async fn report_absence(&self, date: &str, reason: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(format!("{}/tools/report_absence", self.base_url))
            .json(&serde_json::json!({ "date": date, "reason": reason }))
            .send()
            .await
            .map_err(|e| ClientError::from_http(&e, self.timeout))?;

        let (status, reply): (u16, AbsenceReply) = self.read(response).await?;
        Self::unwrap_reply(status, reply.success, reply.message)
    }

    /// `GET /tools/get_lunch_menu`, for today when `date` is `None`.
    ///
    /// # Errors
    ///
    /// Returns transport, timeout, remote, or protocol failures.
    pub async fn lunch_menu(&self, date: Option<&str>) -> Result<String, ClientError> {
        let mut request = self
            .http
            .get(format!("{}/tools/get_lunch_menu", self.base_url));
        if let Some(date) = date {
            request = request.query(&[("date", date)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_http(&e, self.timeout))?;

        let (status, reply): (u16, MenuReply) = self.read(response).await?;
        Self::unwrap_reply(status, reply.success, reply.menu)
    }

    async fn read<T: DeserializeOwned>(&self, response: Response) -> Result<(u16, T), ClientError> {
        let status = response.status().as_u16();
        let reply = response
            .json()
            .await
            .map_err(|e| ClientError::from_http(&e, self.timeout))?;
        Ok((status, reply))
    }

    fn unwrap_reply(status: u16, success: bool, text: String) -> Result<String, ClientError> {
        if success {
            Ok(text)
        } else {
            Err(ClientError::Remote {
                code: i32::from(status),
                message: text,
                data: None,
            })
        }
    }
}

#[async_trait]
impl ToolBackend for RestClient {
    async fn call_tool(&mut self, name: &str, args: Value) -> Result<Value, ClientError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ClientError::UnknownTool(name.to_string()))?;
        let args = validate(&tool.schema, &args).map_err(ClientError::InvalidArguments)?;

        let date = args.date("date").map(|d| d.format(DATE_FORMAT).to_string());
        let text = match name {
            absence::NAME => {
                self.report_absence(
                    date.as_deref().unwrap_or_default(),
                    args.str("reason").unwrap_or_default(),
                )
                .await?
            }
            menu::NAME => self.lunch_menu(date.as_deref()).await?,
            _ => return Err(ClientError::UnknownTool(name.to_string())),
        };
        Ok(Value::from(text))
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolListing>, ClientError> {
        Ok(self.tools.clone())
    }
}
