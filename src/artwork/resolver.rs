//! Cache-first artwork resolution with ordered provider fallback.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use super::cache::ArtworkCache;
use super::deezer::DeezerProvider;
use super::http::{FetchError, JsonFetcher};
use super::itunes::ItunesProvider;
use super::{ArtworkProvider, ArtworkQuery, LookupOutcome};
use crate::config::ArtworkConfig;
use crate::rate_limit::RequestPacer;

/// Routes every provider request through the shared pacer.
struct PacedFetcher<'a> {
    inner: &'a dyn JsonFetcher,
    pacer: &'a RequestPacer,
}

impl JsonFetcher for PacedFetcher<'_> {
    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.pacer.wait_turn();
        self.inner.get_json(url)
    }
}

/// Resolves album, track and artist images. Lookups never fail: any
/// provider error falls through to the next provider and finally to `None`.
pub struct ArtworkResolver {
    providers: Vec<Box<dyn ArtworkProvider>>,
    fetcher: Arc<dyn JsonFetcher>,
    pacer: Arc<RequestPacer>,
    cache: ArtworkCache,
}

impl ArtworkResolver {
    /// Builds a resolver with providers tried in the given order.
    pub fn new(
        providers: Vec<Box<dyn ArtworkProvider>>,
        fetcher: Arc<dyn JsonFetcher>,
        pacer: Arc<RequestPacer>,
        cache: ArtworkCache,
    ) -> Self {
        Self {
            providers,
            fetcher,
            pacer,
            cache,
        }
    }

    /// iTunes first, Deezer as fallback.
    pub fn with_default_providers(
        config: &ArtworkConfig,
        fetcher: Arc<dyn JsonFetcher>,
        pacer: Arc<RequestPacer>,
        cache: ArtworkCache,
    ) -> Self {
        let providers: Vec<Box<dyn ArtworkProvider>> = vec![
            Box::new(ItunesProvider::new(
                config.itunes_search_url.clone(),
                config.itunes_artwork_size_px,
            )),
            Box::new(DeezerProvider::new(config.deezer_api_url.clone())),
        ];
        Self::new(providers, fetcher, pacer, cache)
    }

    pub fn cache(&self) -> &ArtworkCache {
        &self.cache
    }

    pub fn resolve_album_image(&self, artist: &str, album: &str) -> Option<String> {
        self.resolve(&ArtworkQuery::album(artist, album))
    }

    pub fn resolve_track_image(&self, artist: &str, track: &str) -> Option<String> {
        self.resolve(&ArtworkQuery::track(artist, track))
    }

    pub fn resolve_artist_image(&self, artist: &str) -> Option<String> {
        self.resolve(&ArtworkQuery::artist(artist))
    }

    /// Returns the image URL for `query`, or `None` when nothing is known.
    pub fn resolve(&self, query: &ArtworkQuery) -> Option<String> {
        let key = query.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            debug!("Artwork[{}]: cache hit", key);
            return non_empty(cached);
        }
        if !query.has_required_inputs() {
            debug!("Artwork[{}]: missing artist or title, skipping lookup", key);
            return None;
        }

        let paced = PacedFetcher {
            inner: self.fetcher.as_ref(),
            pacer: self.pacer.as_ref(),
        };
        for provider in &self.providers {
            if !provider.supports(query.kind) {
                continue;
            }
            match provider.lookup(query, &paced) {
                LookupOutcome::Found(url) if !url.trim().is_empty() => {
                    info!("Artwork[{}]: resolved via {}", key, provider.name());
                    self.cache.put(&key, &url);
                    return Some(url);
                }
                LookupOutcome::Found(_) | LookupOutcome::NotFound => {
                    debug!("Artwork[{}]: no match from {}", key, provider.name());
                }
                LookupOutcome::Failed(reason) => {
                    warn!(
                        "Artwork[{}]: {} lookup failed: {}",
                        key,
                        provider.name(),
                        reason
                    );
                }
            }
        }

        info!("Artwork[{}]: no provider had an image, caching miss", key);
        self.cache.put(&key, "");
        None
    }
}

fn non_empty(url: String) -> Option<String> {
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::ArtworkResolver;
    use crate::artwork::cache::ArtworkCache;
    use crate::artwork::http::{FetchError, JsonFetcher};
    use crate::artwork::test_support::RecordingFetcher;
    use crate::config::ArtworkConfig;
    use crate::kv_store::MemoryKeyValueStore;
    use crate::rate_limit::RequestPacer;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver_with(fetcher: &Arc<RecordingFetcher>, pacer: RequestPacer) -> ArtworkResolver {
        let cache = ArtworkCache::load(Box::new(MemoryKeyValueStore::new()), "artwork_cache");
        let shared: Arc<dyn JsonFetcher> = Arc::clone(fetcher) as Arc<dyn JsonFetcher>;
        ArtworkResolver::with_default_providers(
            &ArtworkConfig::default(),
            shared,
            Arc::new(pacer),
            cache,
        )
    }

    fn itunes_hit(url: &str) -> serde_json::Value {
        json!({"resultCount": 1, "results": [{"artworkUrl100": url}]})
    }

    fn itunes_miss() -> serde_json::Value {
        json!({"resultCount": 0, "results": []})
    }

    fn deezer_album_hit(url: &str) -> serde_json::Value {
        json!({"data": [{"cover_xl": url}], "total": 1})
    }

    fn deezer_miss() -> serde_json::Value {
        json!({"data": [], "total": 0})
    }

    #[test]
    fn test_primary_hit_is_upscaled_and_secondary_not_called() {
        let fetcher = Arc::new(RecordingFetcher::new());
        fetcher.push(Ok(itunes_hit(
            "https://is1-ssl.mzstatic.com/image/thumb/Music/ab/100x100bb.jpg",
        )));
        let resolver = resolver_with(&fetcher, RequestPacer::unpaced());

        let resolved = resolver.resolve_album_image("Daft Punk", "Discovery");

        assert_eq!(
            resolved.as_deref(),
            Some("https://is1-ssl.mzstatic.com/image/thumb/Music/ab/512x512bb.jpg")
        );
        let urls = fetcher.urls();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("https://itunes.apple.com/search?"));
    }

    #[test]
    fn test_second_call_is_served_from_cache() {
        let fetcher = Arc::new(RecordingFetcher::new());
        fetcher.push(Ok(itunes_hit("https://a.test/100x100bb.jpg")));
        let resolver = resolver_with(&fetcher, RequestPacer::unpaced());

        let first = resolver.resolve_album_image("Daft Punk", "Discovery");
        let second = resolver.resolve_album_image("daft punk", "DISCOVERY");

        assert_eq!(first, second);
        assert_eq!(fetcher.urls().len(), 1);
    }

    #[test]
    fn test_primary_failure_falls_back_to_secondary() {
        let fetcher = Arc::new(RecordingFetcher::new());
        fetcher.push(Err(FetchError::Transport("connection refused".to_string())));
        fetcher.push(Ok(deezer_album_hit("https://cdn.test/xl.jpg")));
        let resolver = resolver_with(&fetcher, RequestPacer::unpaced());

        let resolved = resolver.resolve_album_image("Daft Punk", "Discovery");

        assert_eq!(resolved.as_deref(), Some("https://cdn.test/xl.jpg"));
        let urls = fetcher.urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[1].starts_with("https://api.deezer.com/search/album?"));
    }

    #[test]
    fn test_primary_miss_falls_back_to_secondary() {
        let fetcher = Arc::new(RecordingFetcher::new());
        fetcher.push(Ok(itunes_miss()));
        fetcher.push(Ok(json!({
            "data": [{"album": {"cover_big": "https://cdn.test/big.jpg"}}]
        })));
        let resolver = resolver_with(&fetcher, RequestPacer::unpaced());

        assert_eq!(
            resolver
                .resolve_track_image("Daft Punk", "Aerodynamic")
                .as_deref(),
            Some("https://cdn.test/big.jpg")
        );
    }

    #[test]
    fn test_total_miss_is_negatively_cached() {
        let fetcher = Arc::new(RecordingFetcher::new());
        fetcher.push(Err(FetchError::Status { code: 500 }));
        fetcher.push(Ok(deezer_miss()));
        let resolver = resolver_with(&fetcher, RequestPacer::unpaced());

        assert_eq!(resolver.resolve_album_image("Nobody", "Nothing"), None);
        assert_eq!(fetcher.urls().len(), 2);
        assert_eq!(
            resolver.cache().get("album:nobody|nothing").as_deref(),
            Some("")
        );

        assert_eq!(resolver.resolve_album_image("Nobody", "Nothing"), None);
        assert_eq!(fetcher.urls().len(), 2);
    }

    #[test]
    fn test_malformed_payloads_count_as_misses() {
        let fetcher = Arc::new(RecordingFetcher::new());
        fetcher.push(Ok(json!({"unexpected": true})));
        fetcher.push(Ok(json!(["not", "an", "object"])));
        let resolver = resolver_with(&fetcher, RequestPacer::unpaced());

        assert_eq!(resolver.resolve_album_image("Daft Punk", "Homework"), None);
        assert_eq!(resolver.cache().negative_len(), 1);
    }

    #[test]
    fn test_artist_lookup_skips_primary_provider() {
        let fetcher = Arc::new(RecordingFetcher::new());
        fetcher.push(Ok(json!({
            "data": [{"picture_xl": "https://cdn.test/artist.jpg"}]
        })));
        let resolver = resolver_with(&fetcher, RequestPacer::unpaced());

        assert_eq!(
            resolver.resolve_artist_image("Daft Punk").as_deref(),
            Some("https://cdn.test/artist.jpg")
        );
        let urls = fetcher.urls();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("https://api.deezer.com/search/artist?"));
    }

    #[test]
    fn test_missing_inputs_return_none_without_caching() {
        let fetcher = Arc::new(RecordingFetcher::new());
        let resolver = resolver_with(&fetcher, RequestPacer::unpaced());

        assert_eq!(resolver.resolve_album_image("Daft Punk", ""), None);
        assert_eq!(resolver.resolve_track_image("  ", "Aerodynamic"), None);
        assert_eq!(resolver.resolve_artist_image(""), None);
        assert!(fetcher.urls().is_empty());
        assert!(resolver.cache().is_empty());
    }

    #[test]
    fn test_outbound_requests_respect_min_interval() {
        let interval = Duration::from_millis(30);
        let fetcher = Arc::new(RecordingFetcher::new());
        for _ in 0..3 {
            fetcher.push(Ok(itunes_miss()));
            fetcher.push(Ok(deezer_miss()));
        }
        let resolver = resolver_with(&fetcher, RequestPacer::new(interval));

        resolver.resolve_album_image("A", "One");
        resolver.resolve_album_image("B", "Two");
        resolver.resolve_album_image("C", "Three");

        let times = fetcher.request_times();
        assert_eq!(times.len(), 6);
        for pair in times.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            assert!(
                gap + Duration::from_millis(2) >= interval,
                "gap {gap:?} shorter than {interval:?}"
            );
        }
    }

    #[test]
    fn test_cache_hits_do_not_wait_for_pacer() {
        let fetcher = Arc::new(RecordingFetcher::new());
        fetcher.push(Ok(itunes_hit("https://a.test/100x100bb.jpg")));
        let resolver = resolver_with(&fetcher, RequestPacer::new(Duration::from_secs(5)));

        resolver.resolve_album_image("Daft Punk", "Discovery");
        let started = std::time::Instant::now();
        for _ in 0..10 {
            resolver.resolve_album_image("Daft Punk", "Discovery");
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(fetcher.urls().len(), 1);
    }
}
