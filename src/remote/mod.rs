//! The remote-video metadata fetcher collaborator. Out of scope per the
//! specification ("referenced only by interface"); this module defines the
//! interface, a hostname allow-list for recognizing supported providers,
//! and a real YouTube implementation behind it.

mod youtube;

use async_trait::async_trait;
pub use youtube::YouTubeFetcher;

/// Metadata resolved for a remote video URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteVideoDetails {
    pub title: String,
    pub length_seconds: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("could not parse video metadata: {0}")]
    Parse(String),
}

/// Resolves a `video_url` to `{title, length_seconds}`. Only one provider
/// is recognized in v1 (§6); the registry in [`is_supported_host`] is where
/// a second provider would be added.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, video_url: &str) -> Result<RemoteVideoDetails, FetchError>;
}

/// True if `video_url`'s host is on the configured allow-list.
pub fn is_supported_host(video_url: &str, allowed_hosts: &[String]) -> bool {
    let Ok(parsed) = url::Url::parse(video_url) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => allowed_hosts.iter().any(|allowed| allowed == host),
        None => false,
    }
}
