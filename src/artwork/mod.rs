//! Artwork resolution across external search providers.
//!
//! Lookups for album, track and artist images try each provider in order,
//! stop at the first image URL found, and remember every answer (including
//! "nothing found") in an accretive key/value cache.

pub mod cache;
pub mod deezer;
pub mod http;
pub mod itunes;
pub mod resolver;

use std::fmt;

use self::http::JsonFetcher;

/// Entity an image is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtworkKind {
    Album,
    Track,
    Artist,
}

impl ArtworkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Track => "track",
            Self::Artist => "artist",
        }
    }
}

impl fmt::Display for ArtworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image request. `title` is empty for artist lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkQuery {
    pub kind: ArtworkKind,
    pub artist: String,
    pub title: String,
}

impl ArtworkQuery {
    pub fn album(artist: &str, album: &str) -> Self {
        Self::new(ArtworkKind::Album, artist, album)
    }

    pub fn track(artist: &str, track: &str) -> Self {
        Self::new(ArtworkKind::Track, artist, track)
    }

    pub fn artist(artist: &str) -> Self {
        Self::new(ArtworkKind::Artist, artist, "")
    }

    fn new(kind: ArtworkKind, artist: &str, title: &str) -> Self {
        Self {
            kind,
            artist: artist.trim().to_string(),
            title: title.trim().to_string(),
        }
    }

    /// `"{kind}:{artist}|{title}"`, lowercased.
    pub fn cache_key(&self) -> String {
        format!("{}:{}|{}", self.kind, self.artist, self.title).to_lowercase()
    }

    /// Artist is always required; album and track lookups also need a title.
    pub fn has_required_inputs(&self) -> bool {
        if self.artist.is_empty() {
            return false;
        }
        self.kind == ArtworkKind::Artist || !self.title.is_empty()
    }
}

/// Result of asking a single provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(String),
    NotFound,
    Failed(String),
}

/// A search API that can map a query to an image URL.
pub trait ArtworkProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, kind: ArtworkKind) -> bool;

    /// Runs one lookup. Implementations must not panic on malformed payloads;
    /// missing fields are `NotFound`, transport and API errors are `Failed`.
    fn lookup(&self, query: &ArtworkQuery, fetcher: &dyn JsonFetcher) -> LookupOutcome;
}

/// Returns the first non-blank string among `fields` of `value`.
pub(crate) fn first_non_empty_field(value: &serde_json::Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        value
            .get(*field)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(ToOwned::to_owned)
    })
}


#[cfg(test)]
mod tests {
    use super::{first_non_empty_field, ArtworkKind, ArtworkQuery};
    use serde_json::json;

    #[test]
    fn test_cache_key_is_lowercased_composite() {
        assert_eq!(
            ArtworkQuery::album("Daft Punk", "Discovery").cache_key(),
            "album:daft punk|discovery"
        );
        assert_eq!(
            ArtworkQuery::track("Daft Punk", "One More Time").cache_key(),
            "track:daft punk|one more time"
        );
        assert_eq!(ArtworkQuery::artist("Björk").cache_key(), "artist:björk|");
    }

    #[test]
    fn test_required_inputs() {
        assert!(ArtworkQuery::album("Daft Punk", "Discovery").has_required_inputs());
        assert!(!ArtworkQuery::album("Daft Punk", "  ").has_required_inputs());
        assert!(!ArtworkQuery::track("", "Aerodynamic").has_required_inputs());
        assert!(ArtworkQuery::artist("Daft Punk").has_required_inputs());
        assert!(!ArtworkQuery::artist(" ").has_required_inputs());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ArtworkKind::Album.to_string(), "album");
        assert_eq!(ArtworkKind::Track.as_str(), "track");
        assert_eq!(ArtworkKind::Artist.as_str(), "artist");
    }

    #[test]
    fn test_first_non_empty_field_respects_priority_order() {
        let value = json!({"cover_xl": "", "cover_big": "big.jpg", "cover": "small.jpg"});
        assert_eq!(
            first_non_empty_field(&value, &["cover_xl", "cover_big", "cover"]),
            Some("big.jpg".to_string())
        );
        assert_eq!(first_non_empty_field(&value, &["picture_xl"]), None);
    }
}
