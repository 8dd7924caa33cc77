//! Application initialization and configuration

use std::str::FromStr;
use std::time::Duration;
use anyhow::{Context, Result};
use log::{debug, LevelFilter};
use crate::bridge::BridgeKind;
use crate::codec::Codec;
use crate::config::{ConfigManager, GroupcastConfig};
use crate::location::SharedLocation;
use crate::{cli, logging};

pub fn load_configuration(args: &cli::Args) -> Result<ConfigManager> {
    let mut manager = if let Some(config_file) = &args.config_file {
        debug!("Loading configuration from explicit file: {}", config_file.display());
        ConfigManager::load_from_file(config_file.clone())?
    } else {
        ConfigManager::load()?
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

pub fn configure_logging(args: &cli::Args, config: &ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        match config.get_log_level("base", "console-level") {
            Ok(Some(level)) => level,
            Ok(None) => LevelFilter::Info,
            Err(e) => {
                debug!("Invalid console-level in config, using default: {}", e);
                LevelFilter::Info
            }
        }
    };

    let format = match (&args.log_format, config.get_value("base", "log-format")) {
        (Some(format), _) => logging::LogFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?,
        (None, Some(format)) => logging::LogFormat::from_str(format).unwrap_or_default(),
        (None, None) => logging::LogFormat::Text,
    };

    let log_file_path = args.log_file.clone()
        .or_else(|| config.get_path("base", "log-file"));

    let file_log_level = match &args.log_file_level {
        Some(level_str) => Some(logging::parse_log_level(level_str)?),
        None => match config.get_log_level("base", "file-log-level") {
            Ok(level) => level,
            Err(e) => {
                debug!("Invalid file-log-level in config, ignoring: {}", e);
                None
            }
        },
    };

    let (destination, file_level) = match (log_file_path, file_log_level) {
        (Some(file_path), level) => (
            logging::LogDestination::Both(file_path),
            Some(level.unwrap_or(console_level)),
        ),
        (None, Some(_)) => {
            return Err(anyhow::anyhow!("Log file level specified without log file"));
        }
        (None, None) => (logging::LogDestination::Console, None),
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Resolve the dispatcher configuration: config file first, then CLI overrides
pub fn build_config(args: &cli::Args, config: &ConfigManager) -> Result<GroupcastConfig> {
    let mut resolved = config.get_groupcast_config()?;

    if args.root.is_some() || args.group.is_some() || args.directory.is_some() {
        let location = &resolved.location;
        resolved.location = SharedLocation::new(
            args.root.clone().unwrap_or_else(|| location.root().to_path_buf()),
            args.group.clone().unwrap_or_else(|| location.group().to_string()),
            args.directory.clone().unwrap_or_else(|| location.directory().to_string()),
        );
    }

    if let Some(codec) = &args.codec {
        resolved.codec = Codec::from_str(codec).map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Some(bridge) = &args.bridge {
        resolved.bridge = BridgeKind::from_str(bridge).map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Some(interval) = args.poll_interval_ms {
        resolved.poll_interval = Some(Duration::from_millis(interval));
    }

    resolved.validate().context("Invalid command line overrides")?;

    debug!(
        "Using {} ({} codec, {} bridge)",
        resolved.location.objects_dir().display(),
        resolved.codec,
        resolved.bridge
    );

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::{Path, PathBuf};
    use crate::config::Configuration;

    fn args(argv: &[&str]) -> cli::Args {
        cli::Args::try_parse_from(argv).unwrap()
    }

    fn manager(entries: &[(&str, &str, &str)]) -> ConfigManager {
        let mut config = Configuration::new();
        for (section, key, value) in entries {
            config
                .entry(section.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }
        ConfigManager::from_config(config)
    }

    #[test]
    fn test_logging_flags_override_config() {
        let config = manager(&[("base", "console-level", "warn"), ("base", "log-format", "json")]);

        let from_config = configure_logging(&args(&["groupcast", "info"]), &config).unwrap();
        assert_eq!(from_config.console_level, LevelFilter::Warn);
        assert_eq!(from_config.format, logging::LogFormat::Json);

        let from_flags =
            configure_logging(&args(&["groupcast", "info", "--debug", "--log-format", "text"]), &config).unwrap();
        assert_eq!(from_flags.console_level, LevelFilter::Trace);
        assert_eq!(from_flags.format, logging::LogFormat::Text);
    }

    #[test]
    fn test_log_file_defaults_to_console_level() {
        let log_config = configure_logging(
            &args(&["groupcast", "info", "--verbose", "--log-file", "groupcast.log"]),
            &manager(&[]),
        )
        .unwrap();

        assert_eq!(log_config.destination, logging::LogDestination::Both(PathBuf::from("groupcast.log")));
        assert_eq!(log_config.file_level, Some(LevelFilter::Debug));
    }

    #[test]
    fn test_file_level_from_config_without_file_fails() {
        let result = configure_logging(&args(&["groupcast", "info"]), &manager(&[("base", "file-log-level", "debug")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let config = manager(&[
            ("store", "root", "/srv/shared"),
            ("store", "group", "group.from.file"),
            ("store", "codec", "json"),
            ("bridge", "kind", "fs"),
        ]);

        let resolved = build_config(
            &args(&["groupcast", "list", "--group", "group.from.cli", "--codec", "bincode", "--bridge", "local"]),
            &config,
        )
        .unwrap();

        assert_eq!(resolved.location.root(), Path::new("/srv/shared"));
        assert_eq!(resolved.location.group(), "group.from.cli");
        assert_eq!(resolved.codec, Codec::Bincode);
        assert_eq!(resolved.bridge, BridgeKind::Local);
    }

    #[test]
    fn test_poll_interval_override() {
        let resolved = build_config(&args(&["groupcast", "info", "--poll-interval-ms", "75"]), &manager(&[])).unwrap();
        assert_eq!(resolved.poll_interval, Some(Duration::from_millis(75)));
    }
}
