//! HTTP/JSON source adapter.
//!
//! Talks to one upstream REST surface: namespaces and types are fetched in
//! parallel, then the object listing, then per-instance relationships for
//! records that did not carry them inline (bounded concurrency). Every failure
//! is turned into a [`SourceError`]; `fetch` itself never fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use mfgraph_shared::{MfGraphError, Result, SourceConfig};

use crate::dialects::{
    PayloadDialect, dialect_for, list_items, normalize_object, parse_namespaces,
    parse_relationships, parse_types,
};
use crate::qualify::IdQualifier;
use crate::{FetchOutcome, SourceAdapter, SourceError};

/// Default timeout in seconds for a single upstream request.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// User-Agent string for upstream requests.
const USER_AGENT: &str = concat!("mfgraph/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// HttpSource
// ---------------------------------------------------------------------------

/// Source adapter for one HTTP/JSON upstream service.
pub struct HttpSource {
    config: SourceConfig,
    base_url: Url,
    client: Client,
    dialect: Box<dyn PayloadDialect>,
    qualifier: IdQualifier,
}

impl HttpSource {
    /// Create an adapter for `config`; `known_prefixes` are all configured source prefixes.
    pub fn new(config: SourceConfig, known_prefixes: &[String]) -> Result<Self> {
        let base_url = config.base_url()?;
        let client = build_client(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))?;
        let dialect = dialect_for(config.dialect);
        let qualifier = IdQualifier::new(config.prefix(), known_prefixes);

        Ok(Self {
            config,
            base_url,
            client,
            dialect,
            qualifier,
        })
    }

    /// Override the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Resolve an endpoint path against the base URL.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let base_path = self.base_url.path().trim_end_matches('/');
        url.set_path(&format!("{base_path}{path}"));
        url
    }

    /// Relationships endpoint for one instance. The id is pushed as a single
    /// path segment, so `/` and other reserved characters are percent-encoded.
    fn relationships_url(&self, local_id: &str) -> Url {
        let mut url = self.base_url.clone();
        let pushed = if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for segment in self.config.relationships_path.split('/').filter(|s| !s.is_empty()) {
                segments.push(&segment.replace("{id}", local_id));
            }
            true
        } else {
            false
        };
        if pushed {
            return url;
        }
        self.endpoint(&self.config.relationships_path.replace("{id}", local_id))
    }

    async fn fetch_relationships(&self, outcome: &mut FetchOutcome, pending: Vec<(usize, String)>) {
        if pending.is_empty() {
            return;
        }

        let total = pending.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1) as usize));
        let mut handles = Vec::with_capacity(total);

        for (index, local_id) in pending {
            let client = self.client.clone();
            let url = self.relationships_url(&local_id);
            let sem = semaphore.clone();

            handles.push((
                index,
                tokio::spawn(async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return Err(MfGraphError::Network("request limiter closed".into()));
                    };
                    get_json(&client, &url).await
                }),
            ));
        }

        let mut failed = 0usize;
        let mut skipped = 0usize;
        for (index, handle) in handles {
            let payload = match handle.await {
                Ok(Ok(payload)) => payload,
                Ok(Err(e)) => {
                    debug!(source = %self.config.name, error = %e, "relationship fetch failed");
                    failed += 1;
                    continue;
                }
                Err(e) => {
                    warn!(source = %self.config.name, error = %e, "relationship task failed");
                    failed += 1;
                    continue;
                }
            };

            match parse_relationships(&payload, &self.qualifier) {
                Ok((entries, bad)) => {
                    skipped += bad;
                    let instance = &mut outcome.instances[index];
                    for (relationship_type, direction, target) in entries {
                        instance.add_relationship(relationship_type, direction, target);
                    }
                }
                Err(e) => {
                    debug!(source = %self.config.name, error = %e, "malformed relationship payload");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            outcome.errors.push(SourceError::partial(
                &self.config.name,
                format!("relationships unavailable for {failed} of {total} instances"),
            ));
        }
        if skipped > 0 {
            outcome.errors.push(SourceError::partial(
                &self.config.name,
                format!("skipped {skipped} malformed relationship entries"),
            ));
        }
    }
}

#[async_trait]
impl SourceAdapter for HttpSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    #[instrument(skip_all, fields(source = %self.config.name, dialect = %self.dialect.name()))]
    async fn fetch(&self) -> FetchOutcome {
        let name = self.config.name.clone();
        let mut outcome = FetchOutcome::new(&name);

        let namespaces_url = self.endpoint(&self.config.namespaces_path);
        let types_url = self.endpoint(&self.config.types_path);

        // Namespaces and types are independent; fetch concurrently
        let (namespaces, types) = tokio::join!(
            get_json(&self.client, &namespaces_url),
            get_json(&self.client, &types_url),
        );

        match namespaces {
            Ok(payload) => outcome.namespaces = parse_namespaces(&payload, &name),
            Err(e) => outcome
                .errors
                .push(SourceError::partial(&name, format!("namespaces: {e}"))),
        }
        match types {
            Ok(payload) => outcome.types = parse_types(&payload, &name),
            Err(e) => outcome
                .errors
                .push(SourceError::partial(&name, format!("object types: {e}"))),
        }

        let mut objects_url = self.endpoint(&self.config.objects_path);
        objects_url
            .query_pairs_mut()
            .append_pair("includeMetadata", "true");

        let payload = match get_json(&self.client, &objects_url).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "source unreachable");
                outcome
                    .errors
                    .push(SourceError::unreachable(&name, format!("objects: {e}")));
                return outcome;
            }
        };

        let Some(items) = list_items(&payload) else {
            warn!("object listing is not a list");
            outcome.errors.push(SourceError::unreachable(
                &name,
                "objects: response is not a JSON list",
            ));
            return outcome;
        };

        let mut pending = Vec::new();
        let mut malformed = 0usize;
        let mut skipped_relationships = 0usize;

        for raw in items {
            match normalize_object(self.dialect.as_ref(), &self.qualifier, raw) {
                Ok(obj) => {
                    skipped_relationships += obj.skipped_relationships;
                    if !obj.has_inline_relationships {
                        pending.push((outcome.instances.len(), obj.local_id));
                    }
                    outcome.instances.push(obj.instance);
                }
                Err(e) => {
                    debug!(error = %e, "skipping malformed record");
                    malformed += 1;
                }
            }
        }

        if malformed > 0 {
            outcome.errors.push(SourceError::partial(
                &name,
                format!("skipped {malformed} malformed records"),
            ));
        }
        if skipped_relationships > 0 {
            outcome.errors.push(SourceError::partial(
                &name,
                format!("skipped {skipped_relationships} malformed inline relationship entries"),
            ));
        }

        self.fetch_relationships(&mut outcome, pending).await;

        info!(
            instances = outcome.instances.len(),
            namespaces = outcome.namespaces.len(),
            types = outcome.types.len(),
            errors = outcome.errors.len(),
            "source fetched"
        );

        outcome
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| MfGraphError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET a URL and decode the body as JSON.
async fn get_json(client: &Client, url: &Url) -> Result<Value> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| MfGraphError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MfGraphError::Network(format!("{url}: HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| MfGraphError::Network(format!("{url}: failed to read body: {e}")))?;

    serde_json::from_str(&body).map_err(|e| MfGraphError::parse(format!("{url}: {e}")))
}
