use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::HarvestConfig;
use crate::util::{ensure_directory, now_utc_string, sha256_hex, write_json_pretty};

const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Bytes searched for a `<meta charset>` declaration.
const CHARSET_SNIFF_BYTES: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub body: String,
    pub sha256: String,
    pub fetched_at: String,
}

impl FetchedPage {
    /// URL against which relative links of the page resolve.
    pub fn base_url(&self) -> &str {
        &self.final_url
    }
}

pub struct Fetcher {
    client: Client,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = Url::parse(url).with_context(|| format!("invalid url: {url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("unsupported url scheme for fetch: {url}");
        }

        debug!(url = %url, "fetching page");
        let response = self
            .client
            .get(parsed)
            .send()
            .with_context(|| format!("request failed: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("request for {url} returned status {}", status.as_u16());
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if !is_html_content_type(content_type.as_deref()) {
            bail!(
                "not an html document: {url} ({})",
                content_type.as_deref().unwrap_or_default()
            );
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_body_bytes {
                bail!("response body of {url} exceeds {} bytes", self.max_body_bytes);
            }
        }

        let mut bytes = Vec::new();
        response
            .take(self.max_body_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read response body: {url}"))?;
        if bytes.len() > self.max_body_bytes {
            bail!("response body of {url} exceeds {} bytes", self.max_body_bytes);
        }

        let body = decode_html(&bytes, content_type.as_deref());
        info!(url = %url, status = status.as_u16(), bytes = bytes.len(), "fetched page");

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            sha256: sha256_hex(body.as_bytes()),
            body,
            fetched_at: now_utc_string(),
        })
    }
}

pub fn load_file(path: &Path, base_url: Option<&str>) -> Result<FetchedPage> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let body = decode_html(&raw, None);

    let absolute = fs::canonicalize(path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let file_url = Url::from_file_path(&absolute)
        .map(|value| value.to_string())
        .unwrap_or_else(|_| format!("file://{}", absolute.display()));
    let final_url = base_url
        .map(|value| value.to_string())
        .unwrap_or_else(|| file_url.clone());

    Ok(FetchedPage {
        url: file_url,
        final_url,
        status: 200,
        content_type: Some("text/html".to_string()),
        sha256: sha256_hex(body.as_bytes()),
        body,
        fetched_at: now_utc_string(),
    })
}

/// Decodes an html body. A byte order mark wins, then the `charset` of the
/// content type, then a `<meta charset>` near the top of the document.
/// Anything else is read as UTF-8 with replacement characters.
pub fn decode_html(raw: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(content_type_charset)
        .or_else(|| meta_charset(raw))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(raw);
    if had_errors {
        debug!(encoding = used.name(), "html body had malformed byte sequences");
    }
    text.into_owned()
}

fn content_type_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|parameter| {
        let (name, value) = parameter.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches(['"', '\'']).as_bytes())
    })
}

fn meta_charset(raw: &[u8]) -> Option<&'static Encoding> {
    let head = &raw[..raw.len().min(CHARSET_SNIFF_BYTES)];
    let pattern = Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#).ok()?;
    let label = pattern.captures(head)?.get(1)?;
    // A document that declares UTF-16 in ASCII markup is not UTF-16.
    Encoding::for_label(label.as_bytes()).map(Encoding::output_encoding)
}

fn is_html_content_type(content_type: Option<&str>) -> bool {
    let Some(value) = content_type else {
        return true;
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || HTML_CONTENT_TYPES.contains(&mime.as_str())
}

/// Raw page bodies keyed by the sha256 of their request URL.
pub struct PageCache {
    root: PathBuf,
}

impl PageCache {
    pub fn new(cache_root: &Path) -> Self {
        Self {
            root: cache_root.join("pages"),
        }
    }

    fn paths_for(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = sha256_hex(url.as_bytes());
        (
            self.root.join(format!("{key}.html")),
            self.root.join(format!("{key}.json")),
        )
    }

    pub fn store(&self, page: &FetchedPage) -> Result<()> {
        ensure_directory(&self.root)?;
        let (body_path, meta_path) = self.paths_for(&page.url);
        fs::write(&body_path, page.body.as_bytes())
            .with_context(|| format!("failed to write {}", body_path.display()))?;
        write_json_pretty(&meta_path, page)?;
        Ok(())
    }

    pub fn load(&self, url: &str) -> Result<Option<FetchedPage>> {
        let (body_path, meta_path) = self.paths_for(url);
        if !body_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let raw_meta = fs::read(&meta_path)
            .with_context(|| format!("failed to read {}", meta_path.display()))?;
        let mut page: FetchedPage = serde_json::from_slice(&raw_meta)
            .with_context(|| format!("failed to parse {}", meta_path.display()))?;
        page.body = fs::read_to_string(&body_path)
            .with_context(|| format!("failed to read {}", body_path.display()))?;

        debug!(url = %url, "page cache hit");
        Ok(Some(page))
    }
}

/// Fetches through the cache unless `bypass_cache` is set; fresh fetches are written back.
pub fn fetch_cached(
    fetcher: &Fetcher,
    cache: &PageCache,
    url: &str,
    bypass_cache: bool,
) -> Result<FetchedPage> {
    if !bypass_cache {
        if let Some(page) = cache.load(url)? {
            return Ok(page);
        }
    }

    let page = fetcher.fetch(url)?;
    cache.store(&page)?;
    Ok(page)
}

/// Absolute form of `href` relative to `base`; drops fragments and non-navigable schemes.
pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") {
        return None;
    }

    let mut resolved = match Url::parse(base) {
        Ok(base_url) => base_url.join(trimmed).ok()?,
        Err(_) => Url::parse(trimmed).ok()?,
    };
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

pub fn same_host(first: &str, second: &str) -> bool {
    match (Url::parse(first), Url::parse(second)) {
        (Ok(left), Ok(right)) => left.host_str() == right.host_str(),
        _ => false,
    }
}

/// Lower-case document extension of `href` when it is one of `extensions`.
pub fn document_extension(href: &str, extensions: &[String]) -> Option<String> {
    let without_fragment = href.split('#').next().unwrap_or_default();
    let path = without_fragment.split('?').next().unwrap_or_default();
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    if extensions.iter().any(|value| value.eq_ignore_ascii_case(&extension)) {
        Some(extension)
    } else {
        None
    }
}

pub fn is_document_link(href: &str, extensions: &[String]) -> bool {
    document_extension(href, extensions).is_some()
}
