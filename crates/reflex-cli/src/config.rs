//! Configuration Vault – reads `~/.reflex/config.toml`.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Persisted bridge configuration stored in `~/.reflex/config.toml`.
///
/// Every field is optional in the file; the reference constants apply
/// otherwise, so a missing file is a fully working setup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Serial device path of the training device.
    #[serde(default = "default_device")]
    pub device: String,

    /// Serial baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// TCP port for the gateway WebSocket server.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_device() -> String {
    "/dev/tty.usbmodem11401".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_listen_port() -> u16 {
    3001
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
            listen_port: default_listen_port(),
        }
    }
}

/// Return the path to `~/.reflex/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".reflex").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `REFLEX_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `REFLEX_DEVICE` | `device` |
/// | `REFLEX_BAUD_RATE` | `baud_rate` |
/// | `REFLEX_LISTEN_PORT` | `listen_port` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("REFLEX_DEVICE") {
        cfg.device = v;
    }
    if let Ok(v) = std::env::var("REFLEX_BAUD_RATE")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
    if let Ok(v) = std::env::var("REFLEX_LISTEN_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.listen_port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.device, "/dev/tty.usbmodem11401");
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.listen_port, 3001);
    }

    #[test]
    fn config_path_points_to_reflex_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".reflex"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn load_from_reads_partial_file_with_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        fs::write(&path, "listen_port = 4000\n").expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.listen_port, 4000);
        assert_eq!(cfg.baud_rate, 9600, "unset fields keep their defaults");
    }

    #[test]
    fn load_from_rejects_malformed_toml() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        fs::write(&path, "listen_port = [not a port").expect("write");

        assert!(load_from(&path).is_err());
    }

    #[test]
    fn apply_env_overrides_changes_device() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("REFLEX_DEVICE", "/dev/ttyACM7") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.device, "/dev/ttyACM7");
        unsafe { std::env::remove_var("REFLEX_DEVICE") };
    }

    #[test]
    fn apply_env_overrides_changes_baud_rate() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("REFLEX_BAUD_RATE", "115200") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.baud_rate, 115200);
        unsafe { std::env::remove_var("REFLEX_BAUD_RATE") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_port() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("REFLEX_LISTEN_PORT", "not-a-port") };
        let mut cfg = Config::default();
        let original_port = cfg.listen_port;
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.listen_port, original_port);
        unsafe { std::env::remove_var("REFLEX_LISTEN_PORT") };
    }
}
