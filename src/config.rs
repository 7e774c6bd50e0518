use anyhow::Context;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for photo URLs in responses, without a trailing slash.
    pub base_url: String,
    /// `None` selects the in-memory user store.
    pub database_url: Option<String>,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("PORT").or_else(|| lookup("APP_PORT")) {
            Some(v) => v.parse::<u16>().with_context(|| format!("invalid PORT {v:?}"))?,
            None => 8080,
        };
        let base_url = lookup("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());
        let upload_dir = lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".into());
        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse::<usize>()
                .with_context(|| format!("invalid MAX_UPLOAD_BYTES {v:?}"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            host,
            port,
            base_url,
            database_url,
            upload_dir,
            max_upload_bytes,
        })
    }
}
