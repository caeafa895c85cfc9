use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::protocol::{TXT_NET_APP_INFO_PATH, TXT_NET_APP_VENDOR_UUID};

/// A service announced on the network, as resolved by the discovery client.
/// Read-only once constructed; the launcher never edits discovery data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Full DNS-SD instance name, e.g. "Printer UI._http._tcp.local."
    pub name: String,

    /// Service type, e.g. "_http._tcp.local."
    pub service_type: String,

    /// Hostname, e.g. "printer.local."
    pub hostname: String,

    /// Address used to reach the service
    pub address: IpAddr,

    /// Service port
    pub port: u16,

    /// Raw TXT record properties
    pub properties: HashMap<String, Vec<u8>>,
}

impl ServiceInfo {
    /// TXT property decoded as UTF-8. Missing keys, valueless keys and
    /// non UTF-8 values all read as `None`.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    /// Manifest path advertised by a net app, always starting with '/'.
    /// `None` means the service is not a net app.
    pub fn info_path(&self) -> Option<String> {
        let path = self.property_str(TXT_NET_APP_INFO_PATH)?;
        if path.is_empty() {
            return None;
        }
        if path.starts_with('/') {
            Some(path.to_string())
        } else {
            Some(format!("/{}", path))
        }
    }

    pub fn vendor_uuid(&self) -> Option<&str> {
        self.property_str(TXT_NET_APP_VENDOR_UUID)
    }

    /// Base URL opened in the browser, e.g. "http://10.0.0.5:8080/"
    pub fn base_url(&self) -> String {
        format!("http://{}/", SocketAddr::new(self.address, self.port))
    }

    /// Label shown before the manifest is known: the instance name
    /// without its ".<service type>" suffix.
    pub fn display_name(&self) -> &str {
        let suffix_len = self.service_type.len() + 1;
        if self.name.len() > suffix_len
            && self.name.ends_with(self.service_type.as_str())
            && self.name.as_bytes()[self.name.len() - suffix_len] == b'.'
        {
            &self.name[..self.name.len() - suffix_len]
        } else {
            &self.name
        }
    }
}

/// Application manifest served by a net app at its `net_app_info_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    pub info: AppInfo,

    /// Icon size (e.g. "64") to a path relative to the manifest
    #[serde(default)]
    pub icon: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_name: String,
}

impl AppManifest {
    pub fn app_name(&self) -> &str {
        &self.info.app_name
    }

    pub fn icon_path(&self, size: &str) -> Option<&str> {
        self.icon.get(size).map(String::as_str)
    }
}

/// Where a registry entry stands in manifest resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// No `net_app_info_path` advertised; never resolved
    NotNetApp,
    Pending,
    Resolved,
    Failed,
}

/// One row of the launcher list, as served to front-ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRow {
    /// Service instance name
    pub key: String,
    pub label: String,
    pub has_icon: bool,
    pub url: String,
}

/// Everything known about one discovered service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDetail {
    pub service: ServiceInfo,
    pub manifest: Option<AppManifest>,
    pub status: ResolutionStatus,
    pub has_icon: bool,
    pub first_seen: DateTime<Utc>,
}
