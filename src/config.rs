use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Milli";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> &'static str {
    "milli=info"
}

/// Get the application data directory (~/Milli on all platforms)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Milli")
}

/// Default path of the SQLite database
pub fn database_path() -> PathBuf {
    app_data_dir().join("milli.db")
}
