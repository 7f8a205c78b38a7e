use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rvoip_session_arbiter::ArbiterConfig;

/// `$XDG_CONFIG_HOME/rvoip-arbiter/config.toml` or the platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rvoip-arbiter").join("config.toml"))
}

pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path().context("no --config given and no user config directory found"),
    }
}

/// Read, parse and validate a TOML configuration file
pub fn load(path: &Path) -> Result<ArbiterConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid configuration in {}", path.display()))
}

pub fn parse(text: &str) -> Result<ArbiterConfig> {
    let config: ArbiterConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [credentials]
        uri = "sip:alice@example.com"
        password = "secret"

        [endpoint]
        uri = "wss://sip.example.com:7443"
    "#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert!(config.register);
        assert!(config.acquire_local_media);
        assert!(config.capture.audio.echo_cancellation);
        assert!(config.call_media.audio);
        assert!(!config.call_media.video);
        assert_eq!(config.outbound_proxy(), "wss://sip.example.com:7443");
    }

    #[test]
    fn test_overrides() {
        let text = format!(
            "register = false\n{}\n[call_media]\nvideo = true\n",
            MINIMAL.replace("[endpoint]", "[endpoint]\noutbound_proxy = \"wss://proxy.example.com\"")
        );
        let config = parse(&text).unwrap();
        assert!(!config.register);
        assert!(config.call_media.video);
        assert_eq!(config.outbound_proxy(), "wss://proxy.example.com");
    }

    #[test]
    fn test_invalid_uri_rejected() {
        let text = MINIMAL.replace("sip:alice@example.com", "alice@example.com");
        let err = parse(&text).unwrap_err();
        assert!(err.to_string().contains("credentials.uri"));
    }

    #[test]
    fn test_demo_config() {
        let config = parse(include_str!("../../../demos/arbiter.toml")).unwrap();
        assert_eq!(config.credentials.uri, "sip:alice@example.com");
    }

    #[test]
    fn test_missing_file() {
        let err = load(Path::new("/nonexistent/rvoip-arbiter.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
