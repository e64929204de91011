//! Best-effort PDF download resolution.
//!
//! Given a record id, asks the backend resolution endpoint for the PDF's
//! real location and opens it. Resolution failure of any kind degrades to
//! the record's direct URL when one is known; a broken resolution must never
//! take down the surrounding view, so nothing here returns an error to the
//! caller.

use std::io;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, LOCATION};
use reqwest::Client;
use thiserror::Error;

use crate::config::Settings;

/// Capability to open a URL in a new browsing context.
///
/// Environment-provided side effect kept behind a trait so the resolver's
/// decision logic is testable without a real browser.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Opens URLs through the platform opener (`xdg-open` or `open`), detached.
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> io::Result<()> {
        let opener = ["xdg-open", "open"]
            .iter()
            .find_map(|candidate| which::which(candidate).ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no URL opener available"))?;
        Command::new(opener)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

#[derive(Debug, Error)]
enum ResolveError {
    #[error("resolution request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("resolution endpoint returned status {0}")]
    Status(u16),
    #[error("resolution endpoint reported: {0}")]
    Endpoint(String),
    #[error("no PDF URL in the resolution response")]
    NoUrl,
}

/// Resolves record ids to PDF locations and opens them.
pub struct DownloadResolver {
    client: Client,
    functions_url: String,
    anon_key: String,
    opener: Arc<dyn UrlOpener>,
}

impl DownloadResolver {
    pub fn new(
        functions_url: &str,
        anon_key: &str,
        user_agent: &str,
        timeout: Duration,
        opener: Arc<dyn UrlOpener>,
    ) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            functions_url: functions_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            opener,
        }
    }

    /// Create a resolver from settings. `None` when the backend is not
    /// configured.
    pub fn from_settings(settings: &Settings, opener: Arc<dyn UrlOpener>) -> Option<Self> {
        let functions_url = settings.functions_base()?;
        let anon_key = settings.anon_key.as_deref()?;
        Some(Self::new(
            &functions_url,
            anon_key,
            &settings.user_agent,
            Duration::from_secs(settings.request_timeout),
            opener,
        ))
    }

    /// Resolve and open the PDF for a record.
    ///
    /// Returns the URL that was actually opened, or `None` when nothing was.
    /// Repeated calls perform independent resolutions; nothing is cached.
    pub async fn resolve(&self, norma_id: Option<&str>, fallback: Option<&str>) -> Option<String> {
        let Some(id) = norma_id else {
            // Contexts that never had a backend id go straight to the link.
            return fallback.and_then(|url| self.open(url));
        };

        match self.fetch_location(id).await {
            Ok(url) => self.open(&url),
            Err(err) => {
                tracing::warn!(%err, id, "PDF resolution failed");
                fallback.and_then(|url| self.open(url))
            }
        }
    }

    /// Ask the resolution endpoint for the PDF location.
    ///
    /// The endpoint answers with both a `Location` header and a JSON `url`
    /// field carrying the same value; the header wins when present.
    async fn fetch_location(&self, id: &str) -> Result<String, ResolveError> {
        let endpoint = format!(
            "{}/get-pdf?id={}",
            self.functions_url,
            urlencoding::encode(id)
        );
        let response = self
            .client
            .get(&endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.anon_key))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        if let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
        {
            return Ok(location.to_string());
        }

        let body: serde_json::Value = response.json().await?;
        if let Some(error) = body.get("error").and_then(|value| value.as_str()) {
            return Err(ResolveError::Endpoint(error.to_string()));
        }
        body.get("url")
            .or_else(|| body.get("location"))
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .ok_or(ResolveError::NoUrl)
    }

    fn open(&self, url: &str) -> Option<String> {
        match self.opener.open(url) {
            Ok(()) => Some(url.to_string()),
            Err(err) => {
                tracing::warn!(%err, url, "failed to open URL");
                None
            }
        }
    }
}
