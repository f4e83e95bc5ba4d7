use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `[logging] level` 套在本 crate；`--verbose` 時提升為 debug 並打開相依套件的 info
fn default_directives(level: &str, verbose: bool) -> String {
    if verbose {
        "house_atlas=debug,info".to_string()
    } else {
        format!("house_atlas={}", level)
    }
}

// RUST_LOG 優先於設定檔
fn build_filter(level: &str, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level, verbose)))
}

pub fn init_cli_logger(level: &str, verbose: bool) {
    tracing_subscriber::registry()
        .with(build_filter(level, verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// 以 JSON 行輸出，給收集日誌的環境使用
pub fn init_json_logger(level: &str, verbose: bool) {
    tracing_subscriber::registry()
        .with(build_filter(level, verbose))
        .with(tracing_subscriber::fmt::layer().with_target(true).json())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_overrides_configured_level() {
        assert_eq!(default_directives("warn", false), "house_atlas=warn");
        assert_eq!(default_directives("warn", true), "house_atlas=debug,info");
        assert!(EnvFilter::try_new(default_directives("info", false)).is_ok());
    }
}
