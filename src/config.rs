use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Ceiling on the total size of a parsed multipart form
pub const DEFAULT_MAX_FORM_SIZE: u64 = 10 << 28;

/// Used when the client does not send `uploadDir`
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";

/// Prefix of the environment variables that override the defaults
pub const ENV_PREFIX: &str = "MULTILOAD_";

/// Top-level configuration, split between the listener and the upload handling
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
}

impl Config {
    /// Built-in defaults, overridden by `MULTILOAD_`-prefixed environment variables.
    ///
    /// Nested keys are separated by `__`, e.g. `MULTILOAD_SERVER__PORT=9000` or
    /// `MULTILOAD_UPLOAD__DEFAULT_UPLOAD_DIR=/srv/uploads`.
    pub fn load() -> Result<Config, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }
}

/// Where the HTTP server listens
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 8080 }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Upload handling settings, shared with handlers as `web::Data`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UploadConfig {
    pub default_upload_dir: PathBuf,
    pub max_form_size: u64,
    pub temp_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            default_upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_form_size: DEFAULT_MAX_FORM_SIZE,
            temp_dir: None,
        }
    }
}

impl UploadConfig {
    /// Directory used when the request names none
    pub fn with_default_upload_dir<I: Into<PathBuf>>(mut self, dir: I) -> Self {
        self.default_upload_dir = dir.into();
        self
    }

    /// Forms larger than this are rejected while parsing
    pub fn with_max_form_size(mut self, max_form_size: u64) -> Self {
        self.max_form_size = max_form_size;
        self
    }

    /// To spool file parts somewhere other than the tempfile default
    pub fn with_temp_dir<I: Into<PathBuf>>(mut self, temp_dir: I) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }
}
