use crate::config::AppConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "house-atlas")]
#[command(about = "Search, filter and cluster house listings from the reviews backend")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Override backend.base_url")]
    pub base_url: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 搜尋並以篩選條件分頁列出
    Search {
        query: String,
        #[arg(long)]
        adm_area: Option<String>,
        #[arg(long)]
        district: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        min_rating: f64,
        #[arg(long)]
        has_reviews: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// 搜尋後在地圖視窗內聚合
    Map {
        query: String,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lng: Option<f64>,
        #[arg(long)]
        zoom: Option<f64>,
        #[arg(long, help = "Cluster id to expand")]
        expand: Option<u64>,
    },
    /// 單一房屋的詳細資料與評論
    House { id: String },
    /// 行政區清單
    Areas,
    /// 區清單
    Districts,
    /// 登入並顯示目前使用者
    Whoami {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

impl CliConfig {
    /// 讀取設定檔 (若有)，套用命令列覆寫後驗證
    pub fn load_app_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };
        if let Some(base_url) = &self.base_url {
            config.backend.base_url = base_url.clone();
        }
        config.validate()?;
        Ok(config)
    }
}
