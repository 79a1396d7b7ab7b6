use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

pub const API_KEY_ENV: &str = "GALLERIA_UNSPLASH_KEY";

#[derive(Parser, Debug)]
#[command(name = "galleria", about = "Image feeds with likes, comments and collections")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Items requested per feed page
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Browse the external image feed
    Explore {
        /// Search query
        #[arg(short, long)]
        query: Option<String>,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Browse public uploads, newest first
    Uploads {
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Upload an image file as a public record
    Upload {
        #[arg(long)]
        user: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        link: Option<String>,
    },
    /// Toggle a like on an uploaded image
    Like {
        #[arg(long)]
        user: String,
        #[arg(long)]
        item: String,
    },
    /// Comment on an uploaded image
    Comment {
        #[arg(long)]
        user: String,
        /// Display name recorded with the comment
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        item: String,
        text: String,
    },
    /// Save an image locator to a file named after its alt text
    Download {
        url: String,
        #[arg(long)]
        alt: Option<String>,
        /// Directory to write into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Show an uploaded image with its likes, comments and replies
    Show {
        #[arg(long)]
        item: String,
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub unsplash: UnsplashConfig,
    pub feed: FeedConfig,
    pub uploads: UploadsConfig,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UnsplashConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub page_size: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UploadsConfig {
    pub max_file_bytes: usize,
}

impl Default for UnsplashConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.unsplash.com".to_string(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 750 * 1024,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI and environment overrides
        if let Some(page_size) = cli.page_size {
            config.feed.page_size = page_size;
        }
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.unsplash.api_key = Some(key);
            }
        }
        if config.feed.page_size == 0 {
            anyhow::bail!("feed.page_size must be at least 1");
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("galleria.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".galleria")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("galleria.db"))
    }
}
