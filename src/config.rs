use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Notion integration token used for every record store call
    pub notion_token: String,

    /// Notion database holding the movie list
    pub notion_database_id: String,

    /// Notion API base URL
    #[serde(default = "default_notion_api_url")]
    pub notion_api_url: String,

    /// Value sent in the `Notion-Version` header
    #[serde(default = "default_notion_version")]
    pub notion_version: String,

    /// Seconds before a built catalog is considered stale
    #[serde(default = "default_revalidate_interval_seconds")]
    pub revalidate_interval_seconds: u64,

    /// Maximum number of pages requested during one catalog build
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_title_property")]
    pub title_property: String,

    #[serde(default = "default_categories_property")]
    pub categories_property: String,

    #[serde(default = "default_watched_property")]
    pub watched_property: String,

    /// Fixed seed for the pick RNG, mostly useful for demos
    #[serde(default)]
    pub pick_seed: Option<u64>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_notion_api_url() -> String {
    "https://api.notion.com".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

fn default_revalidate_interval_seconds() -> u64 {
    60
}

fn default_max_pages() -> usize {
    100
}

fn default_title_property() -> String {
    "Title".to_string()
}

fn default_categories_property() -> String {
    "Categories".to_string()
}

fn default_watched_property() -> String {
    "Watched".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Names of the Notion database properties the app reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    pub title: String,
    pub categories: String,
    pub watched: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: default_title_property(),
            categories: default_categories_property(),
            watched: default_watched_property(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the service unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.notion_token.trim().is_empty() {
            anyhow::bail!("NOTION_TOKEN must not be empty");
        }
        if self.notion_database_id.trim().is_empty() {
            anyhow::bail!("NOTION_DATABASE_ID must not be empty");
        }
        if self.revalidate_interval_seconds == 0 {
            anyhow::bail!("REVALIDATE_INTERVAL_SECONDS must be greater than zero");
        }
        if self.max_pages == 0 {
            anyhow::bail!("MAX_PAGES must be greater than zero");
        }
        Ok(())
    }

    pub fn property_names(&self) -> PropertyNames {
        PropertyNames {
            title: self.title_property.clone(),
            categories: self.categories_property.clone(),
            watched: self.watched_property.clone(),
        }
    }

    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_secs(self.revalidate_interval_seconds)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
