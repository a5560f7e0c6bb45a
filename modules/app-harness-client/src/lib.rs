//! Client for a remote app harness: a test build of a web app that accepts
//! synthetic UI events and reports its resulting state as JSON.

pub mod error;

pub use error::{HarnessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Body of `POST /events`.
#[derive(Debug, Clone, Serialize)]
pub struct EventPayload<'a> {
    pub event_type: &'a str,
    pub element_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

pub struct AppHarnessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl AppHarnessClient {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request against `{base_url}/{path}` with the token as an encoded query
    /// parameter.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{path}", self.base_url));
        match self.token {
            Some(ref token) => builder.query(&[("token", token)]),
            None => builder,
        }
    }

    /// Deliver one event to the harness via the /events endpoint.
    pub async fn dispatch(&self, event: &EventPayload<'_>) -> Result<()> {
        let resp = self
            .request(reqwest::Method::POST, "events")
            .header("Content-Type", "application/json")
            .json(event)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HarnessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(
            event_type = event.event_type,
            element_id = event.element_id,
            "Harness accepted event"
        );
        Ok(())
    }

    /// Fetch the serialized app state via the /state endpoint.
    pub async fn state(&self) -> Result<String> {
        let resp = self.request(reqwest::Method::GET, "state").send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HarnessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed_and_token_appended() {
        let client =
            AppHarnessClient::new("http://localhost:4000/", Some("abc"), Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.base_url(), "http://localhost:4000");
        let request = client
            .request(reqwest::Method::POST, "events")
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:4000/events?token=abc");
    }

    #[test]
    fn token_with_reserved_characters_is_encoded() {
        let token = "a&b=c#d e";
        let client =
            AppHarnessClient::new("http://localhost:4000", Some(token), Duration::from_secs(1))
                .unwrap();
        let request = client.request(reqwest::Method::GET, "state").build().unwrap();

        assert_eq!(request.url().path(), "/state");
        assert_eq!(request.url().fragment(), None);
        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("token".to_string(), token.to_string())]);
    }

    #[test]
    fn no_query_without_token() {
        let client =
            AppHarnessClient::new("http://localhost:4000", None, Duration::from_secs(1)).unwrap();
        let request = client.request(reqwest::Method::GET, "state").build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:4000/state");
    }

    #[test]
    fn payload_omits_missing_value() {
        let payload = EventPayload {
            event_type: "click",
            element_id: "btn1",
            value: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"event_type":"click","element_id":"btn1"}"#);
    }
}
