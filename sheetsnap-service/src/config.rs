use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};
use crate::selection::{DEFAULT_STYLE_CODE_PREFIXES, ScoringPolicy, WorksheetSelector};

const ENV_PREFIX: &str = "SHEETSNAP";

/// Service configuration, read once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,

    #[serde(default = "default_render")]
    pub render: RenderConfig,

    #[serde(default = "default_selection")]
    pub selection: SelectionConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Size limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Largest single package part the worksheet selector will decompress
    #[serde(default = "default_max_part_bytes")]
    pub max_part_bytes: u64,
}

/// Rendering pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Office suite binary used for spreadsheet -> PDF conversion
    #[serde(default = "default_office_binary")]
    pub office_binary: String,

    /// Time allowed for the office conversion in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_dpi")]
    pub default_dpi: u32,

    #[serde(default = "default_min_dpi")]
    pub min_dpi: u32,

    #[serde(default = "default_max_dpi")]
    pub max_dpi: u32,

    /// Directory holding libpdfium. Falls back to ./ and the system library path.
    #[serde(default)]
    pub pdfium_library_path: Option<PathBuf>,
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Worksheet selection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Prefixes of style/part codes that mark a populated content sheet
    #[serde(default = "default_style_code_prefixes")]
    pub style_code_prefixes: Vec<String>,
}

impl AppConfig {
    /// Load configuration from an optional `config.*` file and `SHEETSNAP__*` env vars
    pub fn load() -> ServiceResult<Self> {
        Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("selection.style_code_prefixes")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build config: {}", e),
            })?
            .try_deserialize()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to deserialize config: {}", e),
            })
    }

    /// Build the worksheet selector described by this configuration
    pub fn worksheet_selector(&self) -> ServiceResult<WorksheetSelector> {
        let policy = ScoringPolicy::new(&self.selection.style_code_prefixes).map_err(|e| {
            ServiceError::Config {
                message: format!("Invalid style code prefixes: {}", e),
            }
        })?;
        Ok(WorksheetSelector::new(policy, self.limits.max_part_bytes))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            limits: default_limits(),
            render: default_render(),
            selection: default_selection(),
        }
    }
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_upload_bytes: default_max_upload_bytes(),
        max_part_bytes: default_max_part_bytes(),
    }
}

fn default_max_upload_bytes() -> u64 {
    52_428_800 // 50MB
}

fn default_max_part_bytes() -> u64 {
    67_108_864 // 64MB
}

fn default_render() -> RenderConfig {
    RenderConfig {
        office_binary: default_office_binary(),
        timeout_secs: default_timeout_secs(),
        default_dpi: default_dpi(),
        min_dpi: default_min_dpi(),
        max_dpi: default_max_dpi(),
        pdfium_library_path: None,
    }
}

fn default_office_binary() -> String {
    "libreoffice".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_dpi() -> u32 {
    200
}

fn default_min_dpi() -> u32 {
    36
}

fn default_max_dpi() -> u32 {
    600
}

fn default_selection() -> SelectionConfig {
    SelectionConfig {
        style_code_prefixes: default_style_code_prefixes(),
    }
}

fn default_style_code_prefixes() -> Vec<String> {
    DEFAULT_STYLE_CODE_PREFIXES
        .iter()
        .map(|p| p.to_string())
        .collect()
}
