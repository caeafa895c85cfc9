/// mDNS service type browsed for net apps
pub const NET_APP_SERVICE_TYPE: &str = "_http._tcp.local.";

/// TXT record keys advertised by net apps
pub const TXT_NET_APP_INFO_PATH: &str = "net_app_info_path";
pub const TXT_NET_APP_VENDOR_UUID: &str = "net_app_vendor_uuid";

/// Icon size requested from the manifest unless configured otherwise
pub const DEFAULT_ICON_SIZE: &str = "64";
