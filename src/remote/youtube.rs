use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{FetchError, RemoteFetcher, RemoteVideoDetails};

/// Fetches title via YouTube's public oEmbed endpoint (no API key needed)
/// and, when an API key is configured, exact duration via the Data API v3
/// `videos.list` endpoint. Without a key, length falls back to 0 — still a
/// valid packet per the finish-time invariant (`finish_time >= arrival_time`
/// holds with equality), just one that plays instantaneously for scheduling
/// purposes.
pub struct YouTubeFetcher {
    client: Client,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct OEmbedResponse {
    title: String,
}

#[derive(Deserialize)]
struct VideosListResponse {
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Deserialize)]
struct ContentDetails {
    duration: String,
}

impl YouTubeFetcher {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("jukebox-scheduler/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    fn extract_video_id(video_url: &str) -> Option<String> {
        let parsed = url::Url::parse(video_url).ok()?;
        if parsed.host_str() == Some("youtu.be") {
            return parsed
                .path_segments()
                .and_then(|mut segments| segments.next())
                .map(|s| s.to_string());
        }
        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    }

    async fn fetch_title(&self, video_url: &str) -> Result<String, FetchError> {
        let oembed_url = format!(
            "https://www.youtube.com/oembed?url={}&format=json",
            urlencoding_encode(video_url)
        );

        let response = self
            .client
            .get(&oembed_url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Request(format!(
                "oEmbed lookup failed with status {}",
                response.status()
            )));
        }

        let body: OEmbedResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(body.title)
    }

    async fn fetch_length(&self, video_id: &str) -> Result<f64, FetchError> {
        let Some(api_key) = &self.api_key else {
            return Ok(0.0);
        };

        let endpoint = format!(
            "https://www.googleapis.com/youtube/v3/videos?part=contentDetails&id={video_id}&key={api_key}"
        );

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Request(format!(
                "videos.list lookup failed with status {}",
                response.status()
            )));
        }

        let body: VideosListResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let duration = body
            .items
            .first()
            .map(|item| item.content_details.duration.as_str())
            .ok_or_else(|| FetchError::Parse("no video found for id".to_string()))?;

        parse_iso8601_duration(duration)
            .ok_or_else(|| FetchError::Parse(format!("unparseable duration: {duration}")))
    }
}

#[async_trait]
impl RemoteFetcher for YouTubeFetcher {
    async fn fetch(&self, video_url: &str) -> Result<RemoteVideoDetails, FetchError> {
        let title = self.fetch_title(video_url).await?;

        let length_seconds = match Self::extract_video_id(video_url) {
            Some(video_id) => self.fetch_length(&video_id).await.unwrap_or(0.0),
            None => 0.0,
        };

        Ok(RemoteVideoDetails {
            title,
            length_seconds,
        })
    }
}

fn urlencoding_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Parses a subset of ISO 8601 durations as returned by the YouTube Data
/// API (`PT#H#M#S`, any component optional).
fn parse_iso8601_duration(input: &str) -> Option<f64> {
    let rest = input.strip_prefix("PT")?;
    let mut seconds = 0.0;
    let mut number = String::new();

    for ch in rest.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
            continue;
        }
        let value: f64 = number.parse().ok()?;
        number.clear();
        match ch {
            'H' => seconds += value * 3600.0,
            'M' => seconds += value * 60.0,
            'S' => seconds += value,
            _ => return None,
        }
    }

    Some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_video_id_from_watch_url() {
        assert_eq!(
            YouTubeFetcher::extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn extracts_video_id_from_short_url() {
        assert_eq!(
            YouTubeFetcher::extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn parses_minutes_and_seconds() {
        assert_eq!(parse_iso8601_duration("PT4M13S"), Some(253.0));
    }

    #[test]
    fn parses_hours_minutes_seconds() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723.0));
    }

    #[test]
    fn rejects_non_duration_strings() {
        assert_eq!(parse_iso8601_duration("garbage"), None);
    }
}
