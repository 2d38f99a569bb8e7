//! iTunes Search API provider (primary).

use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde_json::Value;

use super::http::{build_query_url, JsonFetcher};
use super::{first_non_empty_field, ArtworkKind, ArtworkProvider, ArtworkQuery, LookupOutcome};

pub const ITUNES_PROVIDER_NAME: &str = "iTunes";
const THUMBNAIL_FIELDS: [&str; 3] = ["artworkUrl100", "artworkUrl60", "artworkUrl30"];

fn size_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+x\d+bb").expect("size token pattern is valid"))
}

/// Rewrites the `NNNxNNNbb` size token of an iTunes thumbnail URL.
pub fn upscale_artwork_url(url: &str, size_px: u32) -> String {
    let replacement = format!("{size_px}x{size_px}bb");
    size_token_pattern()
        .replace(url, replacement.as_str())
        .into_owned()
}

/// Album and track artwork from the iTunes Search API.
///
/// Artist entities carry no usable artwork there, so artist lookups are
/// left to other providers.
pub struct ItunesProvider {
    search_url: String,
    artwork_size_px: u32,
}

impl ItunesProvider {
    pub fn new(search_url: impl Into<String>, artwork_size_px: u32) -> Self {
        Self {
            search_url: search_url.into(),
            artwork_size_px,
        }
    }

    fn entity_for(kind: ArtworkKind) -> Option<&'static str> {
        match kind {
            ArtworkKind::Album => Some("album"),
            ArtworkKind::Track => Some("song"),
            ArtworkKind::Artist => None,
        }
    }

    fn request_url(&self, query: &ArtworkQuery, entity: &str) -> String {
        let term = format!("{} {}", query.artist, query.title);
        build_query_url(
            &self.search_url,
            &[
                ("term", term.trim()),
                ("media", "music"),
                ("entity", entity),
                ("limit", "1"),
            ],
        )
    }

    fn extract_thumbnail(payload: &Value) -> Option<String> {
        let first = payload.get("results")?.as_array()?.first()?;
        first_non_empty_field(first, &THUMBNAIL_FIELDS)
    }
}

impl ArtworkProvider for ItunesProvider {
    fn name(&self) -> &'static str {
        ITUNES_PROVIDER_NAME
    }

    fn supports(&self, kind: ArtworkKind) -> bool {
        Self::entity_for(kind).is_some()
    }

    fn lookup(&self, query: &ArtworkQuery, fetcher: &dyn JsonFetcher) -> LookupOutcome {
        let Some(entity) = Self::entity_for(query.kind) else {
            return LookupOutcome::NotFound;
        };
        let url = self.request_url(query, entity);
        let payload = match fetcher.get_json(&url) {
            Ok(payload) => payload,
            Err(error) => return LookupOutcome::Failed(error.to_string()),
        };
        match Self::extract_thumbnail(&payload) {
            Some(thumbnail) => {
                let upscaled = upscale_artwork_url(&thumbnail, self.artwork_size_px);
                debug!("iTunes: {} -> {}", thumbnail, upscaled);
                LookupOutcome::Found(upscaled)
            }
            None => LookupOutcome::NotFound,
        }
    }
}
