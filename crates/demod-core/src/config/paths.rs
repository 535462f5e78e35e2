//! Standard locations for demod-core configuration files

use std::path::PathBuf;

/// Directory holding demod-core configuration
///
/// Returns: `{config_dir}/demod-core` (e.g. `~/.config/demod-core` on Linux),
/// or `./demod-core` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("demod-core")
}

/// Path of a named config file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_namespaced() {
        assert!(default_config_dir().ends_with("demod-core"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("manager.yaml");
        assert!(path.ends_with("demod-core/manager.yaml"));
    }
}
