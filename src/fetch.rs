//! Build-time `fetch` for render bundles, behind an origin allowlist.
//!
//! Bundles may load data while a page renders (an empty allowlist disables
//! the API entirely). Redirects are followed manually and only within the
//! origin of the original request, with a fixed hop ceiling.

use anyhow::anyhow;
use deno_core::{op2, OpState};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

const MAX_REDIRECT_HOPS: usize = 5;

/// Origins (scheme + host + port) the sandboxed fetch may reach.
#[derive(Debug, Clone, Default)]
pub struct FetchAllowlist {
    pub origins: Vec<String>,
}

impl FetchAllowlist {
    pub fn new(origins: Vec<String>) -> Self {
        Self { origins }
    }

    pub fn permits(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        self.origins.iter().any(|allowed| origin == *allowed)
    }
}

/// Request shape handed over from the bundle's `fetch` wrapper.
#[derive(Debug, Deserialize)]
pub struct SandboxFetchArgs {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SandboxFetchReply {
    pub ok: bool,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub url: String,
    pub body: String,
}

#[op2(async)]
#[serde]
pub async fn op_ssg_fetch(
    state: Rc<RefCell<OpState>>,
    #[serde] args: SandboxFetchArgs,
) -> Result<SandboxFetchReply, deno_core::error::AnyError> {
    let (allowlist, client) = {
        let state = state.borrow();
        (
            state.borrow::<FetchAllowlist>().clone(),
            state.borrow::<Client>().clone(),
        )
    };
    fetch_allowlisted(&client, &allowlist, args).await
}

async fn fetch_allowlisted(
    client: &Client,
    allowlist: &FetchAllowlist,
    args: SandboxFetchArgs,
) -> Result<SandboxFetchReply, deno_core::error::AnyError> {
    let mut url = Url::parse(&args.url).map_err(|e| anyhow!("invalid URL '{}': {e}", args.url))?;
    if !allowlist.permits(&url) {
        return Err(anyhow!(
            "fetch blocked: origin '{}' is not allowlisted for this batch",
            url.origin().ascii_serialization()
        )
        .into());
    }
    let origin = url.origin();

    let mut method = Method::from_bytes(args.method.as_deref().unwrap_or("GET").as_bytes())
        .map_err(|_| anyhow!("unsupported HTTP method '{}'", args.method.unwrap_or_default()))?;
    let mut body = args.body;

    for _hop in 0..=MAX_REDIRECT_HOPS {
        let mut request = client.request(method.clone(), url.clone());
        if let Some(headers) = &args.headers {
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }
        if let Some(body) = &body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("fetch of '{url}' failed: {e}"))?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| anyhow!("redirect from '{url}' carries no location"))?;
            let next = url
                .join(location)
                .map_err(|e| anyhow!("invalid redirect target '{location}': {e}"))?;
            if next.origin() != origin {
                return Err(anyhow!(
                    "fetch blocked: redirect would leave origin '{}' for '{}'",
                    origin.ascii_serialization(),
                    next.origin().ascii_serialization()
                )
                .into());
            }
            url = next;
            // Redirected requests are retried as body-less GETs.
            if status != StatusCode::TEMPORARY_REDIRECT && status != StatusCode::PERMANENT_REDIRECT {
                method = Method::GET;
                body = None;
            }
            continue;
        }

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.to_string(), value.to_string());
            }
        }
        let final_url = response.url().to_string();
        let text = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read response body from '{url}': {e}"))?;

        return Ok(SandboxFetchReply {
            ok: status.is_success(),
            status: status.as_u16(),
            headers,
            url: final_url,
            body: text,
        });
    }

    Err(anyhow!("fetch of '{}' exceeded {MAX_REDIRECT_HOPS} redirects", args.url).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_matches_exact_origins_only() {
        let allowlist = FetchAllowlist::new(vec![
            "https://api.example.com".to_string(),
            "http://localhost:4000".to_string(),
        ]);

        assert!(allowlist.permits(&Url::parse("https://api.example.com/data.json").unwrap()));
        assert!(allowlist.permits(&Url::parse("http://localhost:4000/feed").unwrap()));

        // Scheme, host, and port all participate in the origin.
        assert!(!allowlist.permits(&Url::parse("http://api.example.com/data.json").unwrap()));
        assert!(!allowlist.permits(&Url::parse("https://api.example.com:8443/").unwrap()));
        assert!(!allowlist.permits(&Url::parse("https://evil.example.net/").unwrap()));
    }

    #[test]
    fn empty_allowlist_disables_fetch() {
        let allowlist = FetchAllowlist::default();
        assert!(!allowlist.permits(&Url::parse("https://anything.example.com/").unwrap()));
    }
}
