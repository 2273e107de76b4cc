//! One-time session setup
//!
//! The first unlock derives the fingerprint cookie, scopes it (with the user
//! agent) to the catalog host and registers the fingerprint through the
//! imprint endpoint. Later unlocks, including concurrent ones, reuse the
//! cookie; it is never recomputed.

use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::client::TreeTvClient;
use crate::error::Result;
use crate::fingerprint::{Fingerprint, SessionCookie};
use crate::url::{catalog_referer, host_header, host_pattern, imprint_url, origin, parse_url};

/// Session state shared by every unlock of one driver
pub struct Session {
    fingerprint: Fingerprint,
    base_url: String,
    user_agent: String,
    cookie: OnceCell<SessionCookie>,
}

impl Session {
    pub fn new(fingerprint: Fingerprint, base_url: &str, user_agent: &str) -> Self {
        Self {
            fingerprint,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            cookie: OnceCell::new(),
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Cookie of an initialized session
    pub fn cookie(&self) -> Option<&SessionCookie> {
        self.cookie.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cookie.initialized()
    }

    /// Returns the session cookie, initializing the session on first use
    ///
    /// `referer` is the catalog page the first play request came from; it is
    /// only used for the imprint request.
    ///
    /// # Errors
    /// Returns `InvalidUrl` if the configured catalog URL is unusable. The
    /// imprint request itself never fails the session.
    pub async fn ensure(&self, client: &TreeTvClient, referer: &str) -> Result<&SessionCookie> {
        self.cookie
            .get_or_try_init(|| self.initialize(client, referer))
            .await
    }

    async fn initialize(&self, client: &TreeTvClient, referer: &str) -> Result<SessionCookie> {
        let cookie = self.fingerprint.cookie();
        info!(cookie = %cookie, "Derived session cookie");

        let pattern = host_pattern(&self.base_url)?;
        let cookie_value = cookie.to_string();
        let user_agent = self.user_agent.clone();
        client.interceptors().register(pattern, move |req| {
            req.set_cookie(SessionCookie::NAME, &cookie_value);
            req.set_header(USER_AGENT, &user_agent);
        });

        self.send_imprint(client, &cookie, referer).await?;
        Ok(cookie)
    }

    /// Registers the fingerprint; failures are logged and ignored
    async fn send_imprint(
        &self,
        client: &TreeTvClient,
        cookie: &SessionCookie,
        referer: &str,
    ) -> Result<()> {
        let base = parse_url(&self.base_url)?;
        let mut headers = HeaderMap::new();
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        if let Some(host) = host_header(&base)
            && let Ok(value) = HeaderValue::from_str(&host)
        {
            headers.insert(reqwest::header::HOST, value);
        }
        if let Ok(value) = HeaderValue::from_str(&origin(&base)) {
            headers.insert(ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&catalog_referer(&self.base_url, referer)) {
            headers.insert(REFERER, value);
        }

        debug!("Sending the imprint data");
        let form = self.fingerprint.imprint_form(cookie);
        if let Err(e) = client
            .post_form(&imprint_url(&self.base_url), &form, headers)
            .await
        {
            warn!(error = %e, "Imprint registration failed, continuing");
        }
        Ok(())
    }
}
