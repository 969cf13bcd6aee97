//! Stagehand HTTP Client
//!
//! A small, type-safe client for the status API. The runner uses it to
//! register stages and report transitions; the CLI uses it to inspect and
//! clean up the store.
//!
//! The API is normally served on a Unix domain socket:
//!
//! ```no_run
//! use stagehand_client::StatusClient;
//!
//! # async fn example() -> stagehand_client::Result<()> {
//! let client = StatusClient::unix("/run/guest/volumes-service.sock")?;
//! for stage in client.list_stages().await? {
//!     println!("{} {} {}", stage.pipeline_file, stage.name, stage.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
mod stages;
mod status;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use reqwest;

use std::path::Path;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

/// Host used in request URLs when talking over a Unix socket
const UNIX_BASE_URL: &str = "http://localhost";

/// HTTP client for the status API
#[derive(Debug, Clone)]
pub struct StatusClient {
    /// Base URL of the API (e.g., "http://localhost")
    base_url: Url,
    /// HTTP client instance
    client: Client,
}

impl StatusClient {
    /// Create a client that sends every request over the given Unix socket
    pub fn unix(socket_path: impl AsRef<Path>) -> Result<Self> {
        let client = Client::builder()
            .unix_socket(socket_path.as_ref())
            .build()?;

        Self::with_client(UNIX_BASE_URL, client)
    }

    /// Create a client with a custom HTTP client and base URL
    ///
    /// This allows you to configure timeouts or a TCP endpoint.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref().trim_end_matches('/'))
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL: {}", e)))?;

        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidRequest(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        Ok(Self { base_url, client })
    }

    /// Get the base URL of the API
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Build a request URL from path segments. Each segment is
    /// percent-encoded, so a pipeline file path stays a single segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidRequest("base URL has no path".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize a JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code of a response without a body
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = StatusClient::with_client("http://localhost:8080/", Client::new()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_unix_client_uses_localhost() {
        let client = StatusClient::unix("/tmp/stagehand-test.sock").unwrap();
        assert_eq!(client.base_url(), "http://localhost");
    }

    #[test]
    fn test_segments_are_percent_encoded() {
        let client = StatusClient::with_client("http://localhost", Client::new()).unwrap();
        let url = client
            .url(&["pipeline", "/home/me/project/.drone.yml"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost/pipeline/%2Fhome%2Fme%2Fproject%2F.drone.yml"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            StatusClient::with_client("not a url", Client::new()),
            Err(ClientError::InvalidRequest(_))
        ));
    }
}
