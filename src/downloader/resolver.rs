// Page resolver - turns a shared page link into the URL handed to the engine
//
// HTTP redirects are followed, but the final URL replaces the input only for
// short-link hosts or when the redirect stays on the same host. Consent and
// login interstitials on other hosts, and any failure, keep the input URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use tracing::{debug, warn};

use super::errors::DownloadError;

const MAX_REDIRECTS: usize = 10;

/// Hosts whose only job is to redirect to the real page
const SHORT_LINK_HOSTS: &[&str] = &[
    "youtu.be",
    "bit.ly",
    "t.co",
    "tinyurl.com",
    "goo.gl",
    "vm.tiktok.com",
    "vt.tiktok.com",
    "fb.watch",
    "redd.it",
];

#[async_trait]
pub trait PageResolver: Send + Sync {
    /// Best-effort final URL; never fails
    async fn resolve(&self, url: &str) -> String;
}

/// Returns the input unchanged
pub struct PassthroughResolver;

#[async_trait]
impl PageResolver for PassthroughResolver {
    async fn resolve(&self, url: &str) -> String {
        url.to_string()
    }
}

pub struct RedirectResolver {
    client: reqwest::Client,
}

impl RedirectResolver {
    pub fn new(
        user_agent: &str,
        proxy: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout);

        builder = match proxy {
            Some(p) => builder.proxy(
                reqwest::Proxy::all(p)
                    .map_err(|e| DownloadError::InvalidInput(format!("Invalid proxy {}: {}", p, e)))?,
            ),
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| DownloadError::ExecutionError(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageResolver for RedirectResolver {
    async fn resolve(&self, url: &str) -> String {
        match self.client.get(url).send().await {
            Ok(response) => {
                let final_url = response.url().as_str();
                if final_url == url {
                    return url.to_string();
                }
                if adopt_redirect(url, final_url) {
                    debug!(from = url, to = final_url, "followed redirects");
                    final_url.to_string()
                } else {
                    debug!(from = url, to = final_url, "redirect left the page host, keeping input");
                    url.to_string()
                }
            }
            Err(e) => {
                warn!(url, error = %e, "redirect resolution failed, using original URL");
                url.to_string()
            }
        }
    }
}

/// Whether a redirect target may stand in for the requested page
fn adopt_redirect(from: &str, to: &str) -> bool {
    let host = |u: &str| {
        url::Url::parse(u)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase()))
    };
    match (host(from), host(to)) {
        (Some(from), Some(to)) => from == to || SHORT_LINK_HOSTS.contains(&from.as_str()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Redirect;
    use axum::routing::get;
    use axum::Router;

    fn resolver() -> RedirectResolver {
        RedirectResolver::new("test-agent", None, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_passthrough() {
        assert_eq!(PassthroughResolver.resolve("https://a/b").await, "https://a/b");
    }

    #[tokio::test]
    async fn test_unparseable_url_falls_back() {
        assert_eq!(resolver().resolve("not a url").await, "not a url");
    }

    #[tokio::test]
    async fn test_follows_redirect_chain() {
        let app = Router::new()
            .route("/short", get(|| async { Redirect::temporary("/middle") }))
            .route("/middle", get(|| async { Redirect::permanent("/watch") }))
            .route("/watch", get(|| async { "page" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let resolved = resolver().resolve(&format!("http://{}/short", addr)).await;

        assert_eq!(resolved, format!("http://{}/watch", addr));
    }

    #[tokio::test]
    async fn test_redirect_to_other_host_keeps_input() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let consent = format!("http://localhost:{}/consent", addr.port());
        let app = Router::new()
            .route(
                "/watch",
                get(move || async move { Redirect::temporary(&consent) }),
            )
            .route("/consent", get(|| async { "consent page" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let input = format!("http://{}/watch", addr);
        assert_eq!(resolver().resolve(&input).await, input);
    }

    #[test]
    fn test_adopt_redirect_rules() {
        assert!(adopt_redirect(
            "https://youtu.be/abc",
            "https://www.youtube.com/watch?v=abc"
        ));
        assert!(adopt_redirect(
            "https://youtube.com/watch?v=abc",
            "https://www.youtube.com/watch?v=abc"
        ));
        assert!(!adopt_redirect(
            "https://www.youtube.com/watch?v=abc",
            "https://consent.youtube.com/m?continue=x"
        ));
        assert!(!adopt_redirect("not a url", "https://example.com/"));
    }
}
