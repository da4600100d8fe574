//! Init command - write the configuration file.

use std::path::Path;

use gpstracker::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
pub fn run() -> Result<(), CliError> {
    let path = config_file_path();
    let existed = write_config(&path)?;

    if existed {
        println!("Configuration file updated with any missing settings:");
    } else {
        println!("Configuration file created:");
    }
    println!("  {}", path.display());
    println!();
    println!("Edit this file or use 'gpstracker config set' to customize settings.");
    println!("RUST_LOG and --log-level override the configured log level.");
    Ok(())
}

/// Write the config at `path`, keeping values from an existing file.
///
/// Returns whether a file was already there.
fn write_config(path: &Path) -> Result<bool, CliError> {
    let existed = path.exists();
    let config = ConfigFile::load_from(path)?;
    config.save_to(path)?;
    Ok(existed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gpstracker").join("config.ini");

        assert!(!write_config(&path).unwrap());
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_keeps_existing_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[tracking]\nrequired_accuracy = 7.5\n").unwrap();

        assert!(write_config(&path).unwrap());

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.service.tracking.required_accuracy_m, 7.5);
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("broadcast_capacity"));
    }
}
