#![allow(dead_code)]

pub mod socket_guard;

use std::sync::Arc;
use std::time::Duration;

use catalog_fetch_core::{
    AbortSignal, CatalogClient, ConfigRepository, FetchConfig, FixedLocale, MemoryRepository,
};
use wiremock::{Request, Respond, ResponseTemplate};

/// Client over `repository` with a short timeout so failing tests fail fast.
pub fn client_over(repository: &Arc<MemoryRepository>) -> CatalogClient {
    CatalogClient::new(
        Arc::clone(repository) as Arc<dyn ConfigRepository>,
        FetchConfig::default().with_default_timeout(Duration::from_secs(5)),
        Arc::new(FixedLocale::new("en-US")),
    )
}

/// Client over a fresh in-memory repository.
pub fn client() -> (Arc<MemoryRepository>, CatalogClient) {
    let repository = Arc::new(MemoryRepository::new());
    let client = client_over(&repository);
    (repository, client)
}

/// Hostname of a mock server URI.
pub fn host_of(uri: &str) -> String {
    url::Url::parse(uri)
        .ok()
        .and_then(|url| url.host_str().map(ToString::to_string))
        .unwrap_or_default()
}

/// Responds with `template` after aborting `signal`, so the client observes
/// the cancellation while the exchange is still in progress.
pub struct AbortingResponder {
    pub signal: AbortSignal,
    pub template: ResponseTemplate,
}

impl Respond for AbortingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.signal.dispatch();
        self.template.clone()
    }
}
