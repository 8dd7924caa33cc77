//! Filesystem signal channel
//!
//! Cross-process bridge built on the shared directory. Publishing an
//! identifier atomically replaces `<signals>/<escaped id>.signal` with a fresh
//! nonce. Every endpoint watches the signal directory and dispatches the
//! identifiers it is subscribed to. A single publish can produce several
//! filesystem events; the nonce collapses them into one signal.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use log::{debug, trace, warn};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::bridge::error::{BridgeError, BridgeResult};
use crate::bridge::traits::{NotificationBridge, SignalHandler};
use crate::identifier;
use crate::location::{ensure_dir, temp_file_in, SharedLocation};

/// Extension of signal files
pub const SIGNAL_EXTENSION: &str = "signal";

/// State shared between the bridge and its worker thread
struct Shared {
    subscriptions: Mutex<HashSet<String>>,
    handler: Mutex<Option<SignalHandler>>,
    last_seen: Mutex<HashMap<String, String>>,
}

impl Shared {
    /// Returns true when the identifier is subscribed and the nonce differs
    /// from the last one seen for it
    fn observe(&self, identifier: &str, nonce: &str) -> bool {
        let subscriptions = self.subscriptions.lock();
        if !subscriptions.contains(identifier) {
            return false;
        }
        let mut last_seen = self.last_seen.lock();
        match last_seen.get(identifier) {
            Some(previous) if previous == nonce => false,
            _ => {
                last_seen.insert(identifier.to_string(), nonce.to_string());
                true
            }
        }
    }
}

/// Cross-process bridge over a watched signal directory
pub struct FsBridge {
    directory: PathBuf,
    shared: Arc<Shared>,
    watcher: Mutex<Option<Box<dyn Watcher + Send>>>,
    stop: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    shut_down: AtomicBool,
}

impl FsBridge {
    /// Watch the signal directory of a shared location
    pub fn for_location(location: &SharedLocation, poll_interval: Option<Duration>) -> BridgeResult<Self> {
        Self::new(location.signals_dir(), poll_interval)
    }

    /// Watch an explicit signal directory.
    ///
    /// With `poll_interval` set, the directory is polled instead of relying on
    /// native change events, for filesystems that do not deliver them.
    pub fn new(directory: impl Into<PathBuf>, poll_interval: Option<Duration>) -> BridgeResult<Self> {
        let directory = directory.into();
        ensure_dir(&directory).map_err(|e| BridgeError::io(&directory, e))?;
        // Watchers report canonical paths on some platforms
        let directory = directory.canonicalize().unwrap_or(directory);

        let shared = Arc::new(Shared {
            subscriptions: Mutex::new(HashSet::new()),
            handler: Mutex::new(None),
            last_seen: Mutex::new(HashMap::new()),
        });

        let (event_tx, event_rx) = unbounded::<notify::Result<Event>>();
        let (stop_tx, stop_rx) = unbounded::<()>();

        let forward = move |event: notify::Result<Event>| {
            let _ = event_tx.send(event);
        };

        let mut watcher: Box<dyn Watcher + Send> = match poll_interval {
            Some(interval) => {
                let config = Config::default()
                    .with_poll_interval(interval)
                    .with_compare_contents(true);
                Box::new(PollWatcher::new(forward, config)?)
            }
            None => Box::new(RecommendedWatcher::new(forward, Config::default())?),
        };
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        let worker = {
            let shared = Arc::clone(&shared);
            let worker_dir = directory.clone();
            thread::Builder::new()
                .name("groupcast-fs-signals".to_string())
                .spawn(move || Self::run(event_rx, stop_rx, shared, worker_dir))
                .map_err(|e| BridgeError::io(&directory, e))?
        };
        let worker_id = worker.thread().id();

        debug!(
            "Watching signal directory {} ({})",
            directory.display(),
            if poll_interval.is_some() { "polling" } else { "native events" }
        );

        Ok(Self {
            directory,
            shared,
            watcher: Mutex::new(Some(watcher)),
            stop: Mutex::new(Some(stop_tx)),
            worker: Mutex::new(Some(worker)),
            worker_id,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn signal_path(&self, identifier: &str) -> PathBuf {
        self.directory.join(identifier::file_name(identifier, SIGNAL_EXTENSION))
    }

    fn run(events: Receiver<notify::Result<Event>>, stop: Receiver<()>, shared: Arc<Shared>, directory: PathBuf) {
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(Ok(event)) => Self::process_event(&event, &shared, &directory),
                    Ok(Err(e)) => warn!("Signal watcher error: {}", e),
                    Err(_) => break,
                },
                recv(stop) -> _ => break,
            }
        }
        debug!("Signal worker for {} stopped", directory.display());
    }

    fn process_event(event: &Event, shared: &Shared, directory: &Path) {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any => {}
            _ => return,
        }

        for path in &event.paths {
            if path.parent() != Some(directory) {
                continue;
            }
            let identifier = match path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| identifier::from_file_name(name, SIGNAL_EXTENSION))
            {
                Some(identifier) => identifier,
                None => continue,
            };

            if !shared.subscriptions.lock().contains(&identifier) {
                trace!("Ignoring signal '{}' without subscription", identifier);
                continue;
            }

            let nonce = match fs::read_to_string(path) {
                Ok(nonce) => nonce,
                Err(e) => {
                    trace!("Signal file {} unreadable: {}", path.display(), e);
                    continue;
                }
            };

            if !shared.observe(&identifier, &nonce) {
                trace!("Collapsing duplicate event for signal '{}'", identifier);
                continue;
            }

            let handler = shared.handler.lock().clone();
            match handler {
                Some(handler) => handler(&identifier),
                None => trace!("No handler attached for signal '{}'", identifier),
            }
        }
    }

    fn check_running(&self) -> BridgeResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            Err(BridgeError::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl NotificationBridge for FsBridge {
    fn subscribe(&self, identifier: &str) -> BridgeResult<()> {
        self.check_running()?;
        if !identifier::is_valid(identifier) {
            return Err(BridgeError::InvalidIdentifier);
        }

        let mut subscriptions = self.shared.subscriptions.lock();
        if !subscriptions.insert(identifier.to_string()) {
            return Ok(());
        }

        // Remember the current nonce so a stale signal file is not replayed
        if let Ok(nonce) = fs::read_to_string(self.signal_path(identifier)) {
            self.shared.last_seen.lock().insert(identifier.to_string(), nonce);
        }

        debug!("Subscribed to signal '{}'", identifier);
        Ok(())
    }

    fn unsubscribe(&self, identifier: &str) -> BridgeResult<()> {
        if !identifier::is_valid(identifier) {
            return Err(BridgeError::InvalidIdentifier);
        }
        let mut subscriptions = self.shared.subscriptions.lock();
        if subscriptions.remove(identifier) {
            self.shared.last_seen.lock().remove(identifier);
            debug!("Unsubscribed from signal '{}'", identifier);
        }
        Ok(())
    }

    fn unsubscribe_all(&self) -> BridgeResult<()> {
        let mut subscriptions = self.shared.subscriptions.lock();
        debug!("Dropping {} signal subscriptions", subscriptions.len());
        subscriptions.clear();
        self.shared.last_seen.lock().clear();
        Ok(())
    }

    fn publish(&self, identifier: &str) -> BridgeResult<()> {
        self.check_running()?;
        if !identifier::is_valid(identifier) {
            return Err(BridgeError::InvalidIdentifier);
        }
        ensure_dir(&self.directory).map_err(|e| BridgeError::io(&self.directory, e))?;

        let nonce = Uuid::new_v4().to_string();
        let path = self.signal_path(identifier);
        let temp_path = temp_file_in(&self.directory);

        if let Err(e) = fs::write(&temp_path, nonce.as_bytes()) {
            let _ = fs::remove_file(&temp_path);
            return Err(BridgeError::io(&temp_path, e));
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(BridgeError::io(&path, e));
        }

        trace!("Published signal '{}' ({})", identifier, nonce);
        Ok(())
    }

    fn attach(&self, handler: SignalHandler) {
        *self.shared.handler.lock() = Some(handler);
    }

    fn detach(&self) {
        self.shared.handler.lock().take();
    }

    fn subscriptions(&self) -> Vec<String> {
        let mut subscriptions: Vec<String> = self.shared.subscriptions.lock().iter().cloned().collect();
        subscriptions.sort();
        subscriptions
    }

    fn shutdown(&self) -> BridgeResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.watcher.lock().take();
        self.stop.lock().take();

        if let Some(worker) = self.worker.lock().take() {
            if thread::current().id() == self.worker_id {
                debug!("Filesystem bridge shut down from its own worker; not joining");
            } else if worker.join().is_err() {
                warn!("Signal worker for {} panicked", self.directory.display());
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

impl Drop for FsBridge {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
