//! Shared HTTP plumbing for every provider.

use std::{future::Future, time::Duration};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

use crate::error::ProviderError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("storm-surge/", env!("CARGO_PKG_VERSION"));

/// Client shared by all providers. Nominatim rejects requests without a
/// user agent.
pub fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|error| ProviderError::Transport(error.to_string()))
}

/// Runs `call` with a hard deadline on top of the client timeout.
pub async fn with_deadline<T, F>(timeout: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout),
    }
}

/// Sends the request and returns the body of a 2xx response.
/// A 404 is reported as [`ProviderError::NoResults`].
pub async fn fetch_text(request: RequestBuilder) -> Result<String, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(body);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NoResults);
    }

    Err(ProviderError::Http {
        status: status.as_u16(),
        message: truncate_body(&body),
    })
}

pub async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ProviderError> {
    let body = fetch_text(request).await?;
    serde_json::from_str(&body)
        .map_err(|error| ProviderError::InvalidResponse(format!("{error}: {}", truncate_body(&body))))
}

pub fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

fn value_to_f64(value: Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Numbers, numeric strings, and anything else as `None`. Never fails.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_f64))
}

/// Like [`lenient_f64`], element-wise over an array.
pub fn lenient_f64_vec<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(value_to_f64)
        .collect())
}
