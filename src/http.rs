//! HTTP producers built on reqwest.
//!
//! Collaborators talking to the media server, the recommendation service,
//! or the image CDN build their producers from these helpers so that
//! upstream failures arrive already classified:
//!
//! - connect/timeout/transport failures → [`HuginnError::Http`] (transient)
//! - 429 → [`HuginnError::RateLimited`], honouring a `Retry-After` in seconds
//! - any other non-2xx → [`HuginnError::Api`] (transient only for the
//!   statuses in [`RETRYABLE_STATUSES`](crate::error::RETRYABLE_STATUSES))
//! - undecodable bodies → [`HuginnError::Json`] (terminal)
//!
//! ```rust,no_run
//! # use huginn::{Engine, http};
//! # async fn example(engine: Engine<serde_json::Value>) -> huginn::Result<()> {
//! let client = reqwest::Client::new();
//! let url = "https://media.example/Items?GenreIds=42&StartIndex=0".to_string();
//! let items = engine
//!     .fetch("genre:42:page:1", Some("genre-view"), move || {
//!         http::get_json(client.clone(), url.clone())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::{HuginnError, Result};

/// Longest error body kept in an [`HuginnError::Api`] message.
const MAX_ERROR_BODY: usize = 512;

/// GET `url` and decode the JSON body.
pub async fn get_json<T: DeserializeOwned>(client: Client, url: String) -> Result<T> {
    let response = client.get(&url).send().await?;
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Send a prepared request and decode the JSON body.
///
/// The builder must be cloneable (no streaming body) so the producer can
/// be invoked again on retry.
pub async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Turn a non-success response into the matching error.
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(HuginnError::RateLimited { retry_after });
    }
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|&i| message.is_char_boundary(i))
            .unwrap_or(0);
        message.truncate(cut);
    }
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or("").to_string();
    }
    Err(HuginnError::Api {
        status: status.as_u16(),
        message,
    })
}

impl From<reqwest::Error> for HuginnError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            HuginnError::Json(err.to_string())
        } else if let Some(status) = err.status() {
            HuginnError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            HuginnError::Http(err.to_string())
        }
    }
}
