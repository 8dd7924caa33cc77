//! Subcommand execution

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use anyhow::{Context, Result};
use chrono::Local;
use crossbeam_channel as channel;
use log::{debug, info};
use crate::cli::Command;
use crate::config::GroupcastConfig;
use crate::dispatch::Dispatcher;
use crate::registry::listener_fn;

/// Open a dispatcher for the configuration and run one subcommand
pub fn run_command(command: &Command, config: &GroupcastConfig) -> Result<()> {
    let dispatcher = Dispatcher::open(config)
        .with_context(|| format!("Failed to open {}", config.location.objects_dir().display()))?;

    let result = execute(command, config, &dispatcher, &mut io::stdout().lock());
    dispatcher.shutdown();
    result
}

/// Run a subcommand against an open dispatcher, writing results to `out`
pub fn execute(
    command: &Command,
    config: &GroupcastConfig,
    dispatcher: &Dispatcher,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Send { identifier, text, file } => {
            let object = read_object_text(text.as_deref(), file.as_deref(), io::stdin())?;
            dispatcher
                .try_send_object(&object, identifier)
                .with_context(|| format!("Failed to send '{}'", identifier))?;
            info!("Sent '{}' ({} bytes)", identifier, object.len());
        }
        Command::Get { identifier } => {
            let object: Option<String> = dispatcher
                .try_retrieve_object(identifier)
                .with_context(|| format!("Failed to read '{}'", identifier))?;
            match object {
                Some(object) => writeln!(out, "{}", object)?,
                None => anyhow::bail!("No object stored for '{}'", identifier),
            }
        }
        Command::Delete { identifier } => {
            dispatcher
                .try_delete_object(identifier)
                .with_context(|| format!("Failed to delete '{}'", identifier))?;
        }
        Command::DeleteAll => {
            let removed = dispatcher.try_delete_all_objects()?;
            writeln!(out, "Deleted {} objects", removed)?;
        }
        Command::List => {
            for identifier in dispatcher.stored_identifiers()? {
                writeln!(out, "{}", identifier)?;
            }
        }
        Command::Watch { identifiers, count } => {
            watch(dispatcher, identifiers, *count, out)?;
        }
        Command::Info => {
            print_info(config, out)?;
            writeln!(out, "stored:     {}", dispatcher.stored_identifiers()?.len())?;
        }
    }

    Ok(())
}

/// Print every update to the watched identifiers; stops after `count` updates
/// when given, otherwise runs until the process is interrupted
pub fn watch(
    dispatcher: &Dispatcher,
    identifiers: &[String],
    count: Option<usize>,
    out: &mut dyn Write,
) -> Result<()> {
    let (sender, updates) = channel::unbounded::<(String, String)>();
    let listener = listener_fn(move |identifier: &str, object: String| {
        let _ = sender.send((identifier.to_string(), object));
    });

    for identifier in identifiers {
        dispatcher.add_listener(identifier, &listener);
    }
    info!("Watching {} identifiers via {} bridge", identifiers.len(), dispatcher.bridge_name());

    let mut seen = 0;
    while count.map_or(true, |limit| seen < limit) {
        let (identifier, object) = updates.recv().context("Update channel closed")?;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(out, "{} {}: {}", timestamp, identifier, object)?;
        out.flush()?;
        seen += 1;
    }

    for identifier in identifiers {
        dispatcher.remove_listener(identifier, &listener);
    }
    debug!("Watch finished after {} updates", seen);
    Ok(())
}

/// Object text from the argument, a file, or the given reader
pub fn read_object_text(text: Option<&str>, file: Option<&Path>, mut input: impl Read) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read object from {}", path.display())),
        (None, None) => {
            let mut buffer = String::new();
            input
                .read_to_string(&mut buffer)
                .context("Failed to read object from stdin")?;
            Ok(buffer)
        }
    }
}

/// Resolved configuration and shared paths
pub fn print_info(config: &GroupcastConfig, out: &mut dyn Write) -> Result<()> {
    let location = &config.location;
    writeln!(out, "root:       {}", location.root().display())?;
    writeln!(out, "group:      {}", location.group())?;
    writeln!(out, "directory:  {}", location.directory())?;
    writeln!(out, "objects:    {}", location.objects_dir().display())?;
    writeln!(out, "signals:    {}", location.signals_dir().display())?;
    writeln!(out, "extension:  {}", config.extension)?;
    writeln!(out, "codec:      {}", config.codec)?;
    writeln!(out, "bridge:     {}", config.bridge)?;
    match config.poll_interval {
        Some(interval) => writeln!(out, "poll:       {} ms", interval.as_millis())?,
        None => writeln!(out, "poll:       native events")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;
    use crate::bridge::BridgeKind;
    use crate::codec::Codec;
    use crate::location::SharedLocation;

    fn local_config(temp_dir: &TempDir) -> GroupcastConfig {
        GroupcastConfig {
            location: SharedLocation::new(temp_dir.path(), "group.test", "objects"),
            extension: "archive".to_string(),
            codec: Codec::Json,
            bridge: BridgeKind::Local,
            poll_interval: None,
        }
    }

    struct Session {
        config: GroupcastConfig,
        dispatcher: Dispatcher,
    }

    fn open_session(temp_dir: &TempDir) -> Session {
        let config = local_config(temp_dir);
        let dispatcher = Dispatcher::open(&config).unwrap();
        Session { config, dispatcher }
    }

    fn run(session: &Session, command: Command) -> Result<String> {
        let mut out = Vec::new();
        execute(&command, &session.config, &session.dispatcher, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_send_get_list_delete() {
        let temp_dir = TempDir::new().unwrap();
        let session = open_session(&temp_dir);

        run(&session, Command::Send {
            identifier: "greeting".to_string(),
            text: Some("hello".to_string()),
            file: None,
        })
        .unwrap();

        assert_eq!(run(&session, Command::Get { identifier: "greeting".to_string() }).unwrap(), "hello\n");
        assert_eq!(run(&session, Command::List).unwrap(), "greeting\n");

        run(&session, Command::Delete { identifier: "greeting".to_string() }).unwrap();
        assert!(run(&session, Command::Get { identifier: "greeting".to_string() }).is_err());
    }

    #[test]
    fn test_delete_all_reports_count() {
        let temp_dir = TempDir::new().unwrap();
        let session = open_session(&temp_dir);
        session.dispatcher.send_object("one", "a");
        session.dispatcher.send_object("two", "b");

        assert_eq!(run(&session, Command::DeleteAll).unwrap(), "Deleted 2 objects\n");
        assert_eq!(run(&session, Command::List).unwrap(), "");
    }

    #[test]
    fn test_watch_stops_after_count() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = Arc::new(Dispatcher::open(&local_config(&temp_dir)).unwrap());

        let sending = Arc::clone(&dispatcher);
        let sender = thread::spawn(move || {
            // Wait for the watcher to register
            for _ in 0..200 {
                if sending.listener_count("score") > 0 {
                    sending.send_object("1-0", "score");
                    sending.send_object("2-0", "score");
                    return;
                }
                thread::sleep(Duration::from_millis(10));
            }
        });

        let mut out = Vec::new();
        watch(&dispatcher, &["score".to_string()], Some(2), &mut out).unwrap();
        sender.join().unwrap();

        let output = String::from_utf8(out).unwrap();
        let lines: Vec<_> = output.lines().collect();
        // Each signal re-reads the store, so the first line may already show the second write
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" score: "));
        assert!(lines[1].ends_with("score: 2-0"));
        assert!(dispatcher.registered_identifiers().is_empty());
    }

    #[test]
    fn test_read_object_text_sources() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("object.txt");
        fs::write(&path, "from file").unwrap();

        assert_eq!(read_object_text(Some("inline"), None, io::empty()).unwrap(), "inline");
        assert_eq!(read_object_text(None, Some(&path), io::empty()).unwrap(), "from file");
        assert_eq!(read_object_text(None, None, "piped".as_bytes()).unwrap(), "piped");
        assert!(read_object_text(None, Some(&temp_dir.path().join("missing")), io::empty()).is_err());
    }

    #[test]
    fn test_print_info() {
        let temp_dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        print_info(&local_config(&temp_dir), &mut out).unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("group:      group.test"));
        assert!(output.contains("bridge:     local"));
        assert!(output.contains("poll:       native events"));
    }

    #[test]
    fn test_info_command_reports_stored_count() {
        let temp_dir = TempDir::new().unwrap();
        let session = open_session(&temp_dir);
        session.dispatcher.send_object("one", "a");

        let output = run(&session, Command::Info).unwrap();
        assert!(output.contains("group:      group.test"));
        assert!(output.ends_with("stored:     1\n"));
    }
}
