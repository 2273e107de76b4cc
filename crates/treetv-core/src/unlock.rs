//! Stream unlocking for tree.tv
//!
//! Drives the guard exchange: submit a public key, derive the shared key from
//! the guard's answer, trade it for a playlist. Parameter changes announced
//! by the guard are adopted and retried; rejected playlists reset the
//! exchange until the attempt budget is spent.

use std::sync::Arc;

use regex::Regex;
use reqwest::header::{HOST, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use tracing::{debug, info, warn};

use crate::challenge::{ChallengeParams, GateResponse, SharedKey, js_number, random_exponent};
use crate::client::{ClientConfig, TreeTvClient};
use crate::error::{Result, TreeTvError};
use crate::fingerprint::{Fingerprint, SessionCookie};
use crate::interceptor::InterceptorRegistry;
use crate::metadata::StreamMetadata;
use crate::playlist::{HLS_PREFIX, PlaylistReply, ResolvedStream};
use crate::session::Session;
use crate::types::{PlayRequest, PlaybackItem};
use crate::url::{
    PlayLocator, guard_url, host_header, host_pattern, origin, parse_locator, parse_url,
    player_referer, playlist_url,
};

/// Scheme prefix of canonical playback URIs
const CANONICAL_PREFIX: &str = "treetv:play";

/// Main unlock API for tree.tv
///
/// Owns the HTTP client and the session, so every unlock performed through
/// one driver shares a single fingerprint cookie. The driver is `Sync`;
/// concurrent unlocks are fine.
pub struct UnlockDriver {
    client: TreeTvClient,
    session: Session,
    config: ClientConfig,
    cdn_pattern: Regex,
}

impl UnlockDriver {
    /// Create a new driver with default configuration
    ///
    /// # Errors
    /// Returns error if HTTP client initialization fails
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new driver with custom configuration
    ///
    /// # Errors
    /// - `HttpError` if HTTP client initialization fails
    /// - `InvalidConfig` if `requests_per_second` is not a positive number
    /// - `InvalidUrl` if `cdn_host_pattern` is not a valid regex
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let fingerprint = Fingerprint::browser(&config.user_agent, &config.platform);
        Self::with_fingerprint(config, fingerprint)
    }

    /// Create a driver that reports a custom fingerprint
    pub fn with_fingerprint(config: ClientConfig, fingerprint: Fingerprint) -> Result<Self> {
        let client = TreeTvClient::with_config(&config)?;
        let session = Session::new(fingerprint, &config.base_url, &config.user_agent);
        let cdn_pattern = Regex::new(&config.cdn_host_pattern).map_err(|e| {
            TreeTvError::InvalidUrl(format!("{}: {}", config.cdn_host_pattern, e))
        })?;

        Ok(Self {
            client,
            session,
            config,
            cdn_pattern,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Interceptors the host must apply to its own requests (segment fetches)
    pub fn interceptors(&self) -> &Arc<InterceptorRegistry> {
        self.client.interceptors()
    }

    /// Headers the player must send when fetching `stream_url`
    ///
    /// Accepts resolved stream URLs with or without the `hls:` prefix.
    pub fn stream_headers(&self, stream_url: &str) -> Result<HeaderMap> {
        let url = parse_url(stream_url.strip_prefix(HLS_PREFIX).unwrap_or(stream_url))?;
        Ok(self.interceptors().headers_for(&url))
    }

    /// Resolve a play request into a playable item
    ///
    /// # Errors
    /// - `InvalidLocator` if the locator has no file id and source id
    /// - `ProtocolDesync` if the guard answers a key with non-JSON
    /// - `GuardRejected` if the attempt budget runs out
    /// - `NotFound` if the accepted playlist has no sources
    /// - `HttpError` / `RateLimited` for network errors
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() -> treetv_core::Result<()> {
    /// use treetv_core::{PlayRequest, UnlockDriver};
    /// let driver = UnlockDriver::new()?;
    /// let item = driver
    ///     .resolve(&PlayRequest {
    ///         locator: "/player/1503/21".to_string(),
    ///         title: "Doctor Who S07E05".to_string(),
    ///         referer: "/film/1503-doctor-who".to_string(),
    ///         imdb_id: None,
    ///     })
    ///     .await?;
    /// println!("{} ({})", item.stream.url, item.stream.mimetype);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn resolve(&self, request: &PlayRequest) -> Result<PlaybackItem> {
        let locator = parse_locator(&request.locator)
            .ok_or_else(|| TreeTvError::InvalidLocator(request.locator.clone()))?;

        info!(
            title = %request.title,
            file = %locator.file_id,
            source = %locator.source_id,
            "Resolving stream"
        );

        let stream = self.unlock(&locator, &request.referer).await?;
        let metadata =
            StreamMetadata::from_title(&request.title).with_imdb_id(request.imdb_id.clone());

        Ok(PlaybackItem {
            stream,
            metadata,
            canonical_url: format!(
                "{}:{}:{}:{}",
                CANONICAL_PREFIX, request.locator, request.title, request.referer
            ),
        })
    }

    /// Unlock the stream for `locator`
    ///
    /// `referer` is the catalog page the request originates from.
    pub async fn unlock(&self, locator: &PlayLocator, referer: &str) -> Result<ResolvedStream> {
        let cookie = self.session.ensure(&self.client, referer).await?;

        let reply = self.negotiate(locator).await?;
        let link = reply.link_for(&locator.file_id).ok_or_else(|| {
            TreeTvError::NotFound(format!("No source for file {}", locator.file_id))
        })?;
        info!(link = %link, "Selected link");

        self.register_playback_interceptors(locator, cookie)?;

        Ok(ResolvedStream::classify(&link))
    }

    /// Runs key exchanges until the guard hands out a playlist
    async fn negotiate(&self, locator: &PlayLocator) -> Result<PlaylistReply> {
        let budget = &self.config.guard;

        for attempt in 1..=budget.max_attempts {
            let mut params = ChallengeParams::default();

            for round in 1..=budget.rounds_per_attempt {
                let exponent = random_exponent();
                let public_key = params.public_key(exponent);
                let reply = self.submit_key(locator, public_key).await?;

                let before = params;
                let Some(shared_key) = params.exchange(&reply, exponent) else {
                    if params != before {
                        info!(
                            attempt,
                            round,
                            generator = params.generator,
                            modulus = params.modulus,
                            "Guard changed the parameters, resynchronizing"
                        );
                    }
                    continue;
                };

                let body = self.request_playlist(locator, shared_key).await?;
                if let Some(playlist) = PlaylistReply::parse(&body) {
                    return Ok(playlist);
                }

                warn!(attempt, "Guard rejected the key, resetting the exchange");
                break;
            }
        }

        Err(TreeTvError::GuardRejected {
            attempts: budget.max_attempts,
        })
    }

    /// Submits the public key and parses the guard's parameters
    async fn submit_key(&self, locator: &PlayLocator, public_key: f64) -> Result<GateResponse> {
        let key = js_number(public_key);
        debug!(key = %key, "Sending the key");

        let form = vec![("key".to_string(), key)];
        let body = self
            .client
            .post_form(&guard_url(&self.config.player_url), &form, self.guard_headers(locator))
            .await?;
        debug!(body = %body, "Guard reply");

        GateResponse::parse(&body)
    }

    /// Trades the shared key for the playlist body
    async fn request_playlist(&self, locator: &PlayLocator, key: SharedKey) -> Result<String> {
        debug!(skc = %key.to_wire(), "Requesting the playlist");

        let form = vec![
            ("file".to_string(), locator.file_id.clone()),
            ("source".to_string(), locator.source_id.clone()),
            ("skc".to_string(), key.to_wire()),
        ];
        let body = self
            .client
            .post_form(
                &playlist_url(&self.config.player_url),
                &form,
                self.guard_headers(locator),
            )
            .await?;
        debug!(body = %body, "Playlist reply");

        Ok(body)
    }

    fn guard_headers(&self, locator: &PlayLocator) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        if let Ok(url) = parse_url(&self.config.player_url)
            && let Some(host) = host_header(&url)
            && let Ok(value) = HeaderValue::from_str(&host)
        {
            headers.insert(HOST, value);
        }
        if let Ok(value) = HeaderValue::from_str(&player_referer(&self.config.player_url, locator)) {
            headers.insert(REFERER, value);
        }
        headers
    }

    /// Scopes the session to the player host and the segment CDN
    ///
    /// Both validate the cookie and referer on every chunk the player fetches.
    fn register_playback_interceptors(
        &self,
        locator: &PlayLocator,
        cookie: &SessionCookie,
    ) -> Result<()> {
        let player = parse_url(&self.config.player_url)?;
        let player_host = host_header(&player)
            .ok_or_else(|| TreeTvError::InvalidUrl(self.config.player_url.clone()))?;
        let player_origin = origin(&player);
        let referer = player_referer(&self.config.player_url, locator);
        let user_agent = self.config.user_agent.clone();

        {
            let cookie = cookie.to_string();
            let referer = referer.clone();
            let user_agent = user_agent.clone();
            self.interceptors()
                .register(host_pattern(&self.config.player_url)?, move |req| {
                    req.set_cookie(SessionCookie::NAME, &cookie);
                    req.set_header(HOST, &player_host);
                    req.set_header(REFERER, &referer);
                    req.set_header(USER_AGENT, &user_agent);
                });
        }

        self.interceptors()
            .register(self.cdn_pattern.clone(), move |req| {
                let host = host_header(req.url());
                if let Some(host) = host {
                    req.set_header(HOST, &host);
                }
                req.set_header(ORIGIN, &player_origin);
                req.set_header(REFERER, &referer);
                req.set_header(USER_AGENT, &user_agent);
            });

        Ok(())
    }
}
