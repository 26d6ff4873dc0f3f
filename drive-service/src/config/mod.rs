use secrecy::Secret;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub google: GoogleSettings,
    pub drive: DriveSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`; enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

fn default_session_ttl_hours() -> i64 {
    24
}

#[derive(Deserialize, Clone)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Browser key handed to the Picker on the index page.
    pub api_key: Secret<String>,
    /// Absolute URL of `/oauth2callback` as registered with the provider.
    pub redirect_uri: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint; [`DEFAULT_TOKEN_URI`] when not configured.
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![DRIVE_READONLY_SCOPE.to_string()]
}

impl GoogleSettings {
    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Deserialize, Clone)]
pub struct DriveSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Mime types downloaded byte-for-byte.
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,
    /// Google-native mime types exported to PDF.
    #[serde(default = "default_export_mime_types")]
    pub export_mime_types: Vec<String>,
    #[serde(default = "default_search_page_size")]
    pub search_page_size: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_DRIVE_API_BASE.to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_export_mime_types() -> Vec<String> {
    [
        "application/vnd.google-apps.document",
        "application/vnd.google-apps.spreadsheet",
        "application/vnd.google-apps.presentation",
        "application/vnd.google-apps.drawing",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_search_page_size() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP gRPC collector, e.g. `http://tempo:4317`. Spans are not exported when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    // Check if we're already in drive-service directory or need to navigate to it
    let configuration_directory = if base_path.ends_with("drive-service") {
        base_path.join("config")
    } else {
        base_path.join("drive-service").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("drive.allowed_mime_types")
                .with_list_parse_key("drive.export_mime_types")
                .with_list_parse_key("google.scopes")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
