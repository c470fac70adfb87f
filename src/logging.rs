use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "snow_globe=debug,wgpu=warn"). Without it `RUST_LOG` is honoured and the
/// fallback level is `info`.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
}

static INIT: Once = Once::new();

/// Initializes the global logger once; later calls are ignored.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder
                .filter_level(log::LevelFilter::Info)
                // wgpu is chatty at info
                .filter_module("wgpu_core", log::LevelFilter::Warn)
                .filter_module("wgpu_hal", log::LevelFilter::Warn)
                .filter_module("naga", log::LevelFilter::Warn);
        }

        if let Err(e) = builder.try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        }
        log::debug!("logging initialized");
    });
}

#[cfg(target_arch = "wasm32")]
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let level = config
            .env_filter
            .as_deref()
            .and_then(|filter| filter.parse::<log::Level>().ok())
            .unwrap_or(log::Level::Info);
        if let Err(e) = console_log::init_with_level(level) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    });
}
