use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use shared::types::{AppManifest, ServiceInfo};
use crate::config::ResolverConfig;

/// Why a net app could not be (fully) resolved. None of these are fatal:
/// the entry stays listed with whatever was resolved before the failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("service does not advertise a usable net_app_info_path")]
    NotNetApp,

    #[error("invalid URL {0}: {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    #[error("request to {url} failed: {source}")]
    Http {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status { url: Url, status: StatusCode },

    #[error("manifest at {url} is not valid: {source}")]
    Manifest {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest has no icon of size {0}")]
    NoIcon(String),

    #[error("{0} did not return a recognizable image")]
    NotAnImage(Url),
}

impl ResolveError {
    /// Failures on the network path, as opposed to bad content.
    pub fn is_transport(&self) -> bool {
        matches!(self, ResolveError::Http { .. } | ResolveError::Status { .. })
    }
}

/// Raw icon bytes with the content type they were recognized as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// A fetched manifest, the URL it came from, and the service-rooted
/// directory its icon files live under.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub url: Url,
    pub icon_base: String,
    pub manifest: AppManifest,
}

/// Fetches net app manifests and icons over HTTP.
#[derive(Debug, Clone)]
pub struct Resolver {
    client: Client,
    icon_size: String,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, reqwest::Error> {
        // LAN addresses only; bypass any system proxy
        let mut builder = Client::builder().no_proxy();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            icon_size: config.icon_size.clone(),
        })
    }

    /// Manifest URL for a service: `http://{address}:{port}{info_path}`
    pub fn manifest_url(info: &ServiceInfo) -> Result<Url, ResolveError> {
        let info_path = info.info_path().ok_or(ResolveError::NotNetApp)?;
        let base = info.base_url();
        let joined = format!("{}{}", base.trim_end_matches('/'), info_path);
        Url::parse(&joined).map_err(|e| ResolveError::InvalidUrl(joined, e))
    }

    /// `http://{address}:{port}{info_directory}`, where the directory is the
    /// info path up to its last '/' (empty for a manifest at the root).
    pub fn icon_base(info: &ServiceInfo) -> Result<String, ResolveError> {
        let info_path = info.info_path().ok_or(ResolveError::NotNetApp)?;
        let dir = info_path.rfind('/').map_or("", |idx| &info_path[..idx]);
        Ok(format!("{}{}", info.base_url().trim_end_matches('/'), dir))
    }

    /// Icon URL: `{icon_base}/{icon_file}`. The manifest value is appended
    /// as a path, never joined as a URL, so it cannot leave the service host.
    pub fn icon_url(&self, resolved: &ResolvedManifest) -> Result<Url, ResolveError> {
        let icon_path = resolved
            .manifest
            .icon_path(&self.icon_size)
            .ok_or_else(|| ResolveError::NoIcon(self.icon_size.clone()))?;
        let joined = format!("{}/{}", resolved.icon_base, icon_path);
        Url::parse(&joined).map_err(|e| ResolveError::InvalidUrl(joined, e))
    }

    pub async fn fetch_manifest(&self, info: &ServiceInfo) -> Result<ResolvedManifest, ResolveError> {
        let url = Self::manifest_url(info)?;
        let icon_base = Self::icon_base(info)?;
        let body = self.get_bytes(&url).await?;
        let manifest = serde_json::from_slice(&body).map_err(|source| {
            tracing::debug!("Undecodable manifest body: {}", String::from_utf8_lossy(&body));
            ResolveError::Manifest { url: url.clone(), source }
        })?;
        Ok(ResolvedManifest { url, icon_base, manifest })
    }

    pub async fn fetch_icon(&self, resolved: &ResolvedManifest) -> Result<Icon, ResolveError> {
        let url = self.icon_url(resolved)?;
        let bytes = self.get_bytes(&url).await?;
        let content_type = sniff_image(&bytes).ok_or_else(|| ResolveError::NotAnImage(url))?;
        Ok(Icon {
            bytes,
            content_type: content_type.to_string(),
        })
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, ResolveError> {
        let http_err = |source| ResolveError::Http { url: url.clone(), source };

        let response = self.client.get(url.clone()).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status { url: url.clone(), status });
        }
        let body = response.bytes().await.map_err(http_err)?;
        Ok(body.to_vec())
    }
}

/// Content type for the image formats a front-end can be expected to draw.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"\x00\x00\x01\x00", "image/x-icon"),
        (b"BM", "image/bmp"),
    ];

    if let Some((_, content_type)) = SIGNATURES.iter().find(|(magic, _)| bytes.starts_with(magic)) {
        return Some(*content_type);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let head = head.trim_start();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return Some("image/svg+xml");
    }
    None
}
