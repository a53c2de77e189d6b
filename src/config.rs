use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the JSON documents and the `backups/` subdirectory.
    pub data_dir: PathBuf,
    /// How many startup backups to keep before pruning.
    pub max_backups: usize,
    pub default_admin_username: String,
    pub default_admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let max_backups = std::env::var("MAX_BACKUPS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10);
        let default_admin_username =
            std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".into());
        let default_admin_password =
            std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".into());
        Ok(Self {
            data_dir,
            max_backups,
            default_admin_username,
            default_admin_password,
        })
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_backups: 10,
            default_admin_username: "admin".into(),
            default_admin_password: "admin123".into(),
        }
    }
}
