use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    models::{preference::Preference, retry::RetryConfig},
    utils::retry_with_backoff,
};

/// Lazily fetched, memoized copy of the local user's server-side
/// preferences.
pub struct PreferenceResolver {
    http_client: Client,
    base_url: String,
    identity: Option<String>,
    retry_config: RetryConfig,
    preferences: Option<Vec<Preference>>,
}

impl PreferenceResolver {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let identity = config
            .fmn_openid
            .clone()
            .filter(|openid| !openid.is_empty())
            .or_else(derive_identity);

        Self::with_identity(&config.fmn_url, identity, config.retry_config())
    }

    pub fn with_identity(
        base_url: &str,
        identity: Option<String>,
        retry_config: RetryConfig,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url, identity = ?identity, "Preference resolver initialized");

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            identity,
            retry_config,
            preferences: None,
        })
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn is_cached(&self) -> bool {
        self.preferences.is_some()
    }

    /// Drops the cached preferences so the next `resolve` refetches them.
    pub fn invalidate(&mut self) {
        debug!("Invalidating cached preferences");
        self.preferences = None;
    }

    /// Returns the cached preferences, fetching them first if needed.
    ///
    /// Network and decoding failures yield an empty set and are retried on
    /// the next call. A rule that cannot be resolved is returned as an error.
    pub async fn resolve(&mut self) -> Result<&[Preference], Error> {
        if self.preferences.is_none() {
            let Some(identity) = self.identity.as_deref() else {
                warn!("No identity available for preference lookup");
                return Ok(&[]);
            };

            let url = format!("{}{}/desktop/", self.base_url, identity);
            info!(url = %url, "Getting preferences");

            let preference = match Self::fetch_with_retry(
                self.http_client.clone(),
                self.retry_config.clone(),
                url,
            )
            .await
            {
                Ok(preference) => preference,
                Err(e) => {
                    warn!(error = %e, "Failed to fetch preferences");
                    return Ok(&[]);
                }
            };

            self.preferences = Some(vec![preference.load_rules()?]);
        }

        Ok(self.preferences.as_deref().unwrap_or_default())
    }

    async fn fetch_with_retry(
        http_client: Client,
        retry_config: RetryConfig,
        url: String,
    ) -> Result<Preference, Error> {
        retry_with_backoff(&retry_config, || {
            let url_clone = url.clone();
            let client = http_client.clone();

            async move {
                let response = client
                    .get(&url_clone)
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;

                let status = response.status();

                if status.is_success() {
                    let preference: Preference = response
                        .json()
                        .await
                        .map_err(|e| format!("Failed to parse preference JSON: {}", e))?;
                    Ok(preference)
                } else {
                    Err(format!("Preference service returned status {}", status))
                }
            }
        })
        .await
        .map_err(|e| anyhow!("Failed to fetch preferences: {}", e))
    }
}

/// `<user>.id.fedoraproject.org`, with the user read from `~/.fedora.upn`
/// or `$USER`.
pub fn derive_identity() -> Option<String> {
    let from_upn = dirs::home_dir()
        .map(|home| home.join(".fedora.upn"))
        .and_then(|path| std::fs::read_to_string(path).ok())
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty());

    let user = from_upn.or_else(|| std::env::var("USER").ok().filter(|user| !user.is_empty()))?;

    Some(format!("{}.id.fedoraproject.org", user))
}
