//! Deezer search API provider (secondary).

use log::warn;
use serde_json::Value;

use super::http::{build_query_url, JsonFetcher};
use super::{first_non_empty_field, ArtworkKind, ArtworkProvider, ArtworkQuery, LookupOutcome};

pub const DEEZER_PROVIDER_NAME: &str = "Deezer";
const COVER_FIELDS: [&str; 4] = ["cover_xl", "cover_big", "cover_medium", "cover"];
const PICTURE_FIELDS: [&str; 4] = ["picture_xl", "picture_big", "picture_medium", "picture"];
// Deezer reports quota exhaustion in the body with HTTP 200.
const QUOTA_EXCEEDED_CODE: i64 = 4;

/// Album, track and artist images from Deezer's advanced search.
pub struct DeezerProvider {
    api_url: String,
}

impl DeezerProvider {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn quoted(value: &str) -> String {
        format!("\"{}\"", value.replace('"', ""))
    }

    /// Builds the `field:"value"` search expression for a query.
    pub fn structured_query(query: &ArtworkQuery) -> String {
        let artist = format!("artist:{}", Self::quoted(&query.artist));
        match query.kind {
            ArtworkKind::Album => format!("{artist} album:{}", Self::quoted(&query.title)),
            ArtworkKind::Track => format!("{artist} track:{}", Self::quoted(&query.title)),
            ArtworkKind::Artist => artist,
        }
    }

    fn request_url(&self, query: &ArtworkQuery) -> String {
        let endpoint = format!("{}/search/{}", self.api_url, query.kind.as_str());
        let structured = Self::structured_query(query);
        build_query_url(&endpoint, &[("q", structured.as_str()), ("limit", "1")])
    }

    fn api_error(payload: &Value) -> Option<String> {
        let error = payload.get("error")?;
        if !error.is_object() {
            return None;
        }
        let code = error.get("code").and_then(Value::as_i64);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        if code == Some(QUOTA_EXCEEDED_CODE) {
            Some(format!("rate limited: {message}"))
        } else {
            Some(format!("API error {}: {message}", code.unwrap_or_default()))
        }
    }

    fn extract_image(kind: ArtworkKind, payload: &Value) -> Option<String> {
        let first = payload.get("data")?.as_array()?.first()?;
        match kind {
            ArtworkKind::Album => first_non_empty_field(first, &COVER_FIELDS),
            ArtworkKind::Track => first_non_empty_field(first.get("album")?, &COVER_FIELDS),
            ArtworkKind::Artist => first_non_empty_field(first, &PICTURE_FIELDS),
        }
    }
}

impl ArtworkProvider for DeezerProvider {
    fn name(&self) -> &'static str {
        DEEZER_PROVIDER_NAME
    }

    fn supports(&self, _kind: ArtworkKind) -> bool {
        true
    }

    fn lookup(&self, query: &ArtworkQuery, fetcher: &dyn JsonFetcher) -> LookupOutcome {
        let url = self.request_url(query);
        let payload = match fetcher.get_json(&url) {
            Ok(payload) => payload,
            Err(error) => return LookupOutcome::Failed(error.to_string()),
        };
        if let Some(reason) = Self::api_error(&payload) {
            warn!("Deezer: {} lookup rejected: {}", query.kind, reason);
            return LookupOutcome::Failed(reason);
        }
        match Self::extract_image(query.kind, &payload) {
            Some(url) => LookupOutcome::Found(url),
            None => LookupOutcome::NotFound,
        }
    }
}
