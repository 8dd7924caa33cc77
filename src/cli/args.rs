use clap::{Parser, Subcommand};
use anyhow::Result;
use std::path::PathBuf;
use log::debug;

/// Exchange named objects between processes sharing a directory
#[derive(Parser, Debug)]
#[command(name = "groupcast")]
#[command(about = "Exchange named objects between processes sharing a directory, with change notifications")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (debug level logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Log file path for file output
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION", global = true)]
    pub config_name: Option<String>,

    // ============ SHARED LOCATION ============

    /// Root directory holding application groups
    #[arg(long, value_name = "PATH", global = true)]
    pub root: Option<PathBuf>,

    /// Application group identifier shared by cooperating processes
    #[arg(short, long, value_name = "GROUP", global = true)]
    pub group: Option<String>,

    /// Directory name inside the group
    #[arg(short = 'D', long, value_name = "NAME", global = true)]
    pub directory: Option<String>,

    /// Payload codec: json or bincode
    #[arg(long, value_name = "CODEC", global = true)]
    pub codec: Option<String>,

    /// Notification bridge: fs or local
    #[arg(long, value_name = "KIND", global = true)]
    pub bridge: Option<String>,

    /// Poll the signal directory every N milliseconds instead of using file events
    #[arg(long, value_name = "MS", global = true)]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Store a text object and notify listeners
    Send {
        /// Object identifier
        identifier: String,

        /// Object text (reads --file or stdin when omitted)
        text: Option<String>,

        /// Read the object text from a file
        #[arg(short, long, value_name = "FILE", conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Print the object stored for an identifier
    Get {
        identifier: String,
    },

    /// Delete the object stored for an identifier
    Delete {
        identifier: String,
    },

    /// Delete every stored object
    DeleteAll,

    /// List stored identifiers
    List,

    /// Print objects as they change until interrupted
    Watch {
        /// Identifiers to watch
        #[arg(required = true)]
        identifiers: Vec<String>,

        /// Exit after this many updates
        #[arg(short = 'n', long, value_name = "N")]
        count: Option<usize>,
    },

    /// Show the resolved configuration and shared paths
    Info,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    if let Some(format) = &args.log_format {
        format.parse::<crate::logging::LogFormat>().map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Some(level) = &args.log_file_level {
        crate::logging::parse_log_level(level)?;
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!("--log-file-level requires --log-file to be specified"));
    }

    if let Some(codec) = &args.codec {
        codec.parse::<crate::codec::Codec>().map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Some(bridge) = &args.bridge {
        bridge.parse::<crate::bridge::BridgeKind>().map_err(|e| anyhow::anyhow!(e))?;
    }

    if args.poll_interval_ms == Some(0) {
        return Err(anyhow::anyhow!("--poll-interval-ms must be greater than zero"));
    }

    match &args.command {
        Command::Send { identifier, .. } | Command::Get { identifier } | Command::Delete { identifier } => {
            validate_identifier(identifier)?
        }
        Command::Watch { identifiers, count } => {
            for identifier in identifiers {
                validate_identifier(identifier)?;
            }
            if *count == Some(0) {
                return Err(anyhow::anyhow!("--count must be greater than zero"));
            }
        }
        Command::DeleteAll | Command::List | Command::Info => {}
    }

    Ok(())
}

fn validate_identifier(identifier: &str) -> Result<()> {
    if !crate::identifier::is_valid(identifier) {
        return Err(anyhow::anyhow!("Identifier must not be empty"));
    }
    Ok(())
}
