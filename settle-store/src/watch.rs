//! Managed profile watcher.
//!
//! FSEvents is directory-based, so the watcher observes the profile's parent
//! directory (non-recursive) and filters events down to the profile path.
//! Each relevant event re-reads the whole profile and hands it to
//! [`Registry::refresh_from`]; a failed read leaves the managed tier as it was.
//!
//! On a machine that is not enrolled yet the profile directory may not exist.
//! The watcher then observes the nearest existing ancestor and moves down as
//! the missing directories appear, re-reading the profile once it reaches the
//! profile's own directory. If that directory is removed it climbs back up.
//!
//! Events are handled on a dedicated thread that owns the `notify` watcher,
//! since watches cannot be changed from inside the event handler.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use settle_core::Registry;

use crate::error::{io_err, StoreError};
use crate::managed::ManagedProfileFile;

enum Signal {
    Fs(notify::Result<Event>),
    Stop,
}

/// Keeps the registry's managed tier in step with the profile on disk.
/// Watching stops when this value is dropped.
pub struct ManagedProfileWatcher {
    profile: PathBuf,
    stop: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
}

impl ManagedProfileWatcher {
    /// Starts watching. The profile's directory does not need to exist yet.
    ///
    /// This does not read the profile; callers apply the current contents
    /// with [`Registry::refresh_from`] after starting, so nothing written in
    /// between is missed.
    pub fn start(registry: Arc<Registry>, source: ManagedProfileFile) -> Result<Self, StoreError> {
        let mut plan = WatchPlan::new(source.path())?;

        let (tx, rx) = mpsc::channel();
        let events = tx.clone();
        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| {
            let _ = events.send(Signal::Fs(event));
        })?;
        plan.arm(&mut watcher)?;
        if !plan.is_armed() {
            tracing::info!(
                path = %plan.profile.display(),
                watching = ?plan.watching,
                "managed profile directory missing; waiting for it to appear"
            );
        }

        let profile = plan.profile.clone();
        let worker = thread::Builder::new()
            .name("settle-profile-watch".to_string())
            .spawn(move || run(watcher, plan, rx, registry, source))
            .map_err(|e| io_err(&profile, e))?;
        tracing::debug!(path = %profile.display(), "watching managed profile");

        Ok(Self {
            profile,
            stop: tx,
            worker: Some(worker),
        })
    }

    pub fn profile(&self) -> &Path {
        &self.profile
    }
}

impl Drop for ManagedProfileWatcher {
    fn drop(&mut self) {
        let _ = self.stop.send(Signal::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl std::fmt::Debug for ManagedProfileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProfileWatcher")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Watch placement
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct WatchPlan {
    profile: PathBuf,
    /// Directory holding the profile, rooted at a canonical ancestor.
    dir: PathBuf,
    /// Directory currently registered with the watcher.
    watching: Option<PathBuf>,
}

impl WatchPlan {
    fn new(profile: &Path) -> Result<Self, StoreError> {
        let Some(name) = profile.file_name() else {
            return Err(io_err(
                profile,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "profile path has no file name"),
            ));
        };
        let dir = match profile.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => std::env::current_dir().map_err(|e| io_err(dir, e))?.join(dir),
            None => std::env::current_dir().map_err(|e| io_err(profile, e))?,
        };
        // Canonicalize the existing part so that FSEvents paths (which arrive
        // as real paths, e.g. /private/var/... on macOS) compare equal.
        let dir = match nearest_existing(&dir) {
            Some(existing) => {
                let canonical = fs::canonicalize(&existing).map_err(|e| io_err(&existing, e))?;
                match dir.strip_prefix(&existing) {
                    Ok(rest) => canonical.join(rest),
                    Err(_) => canonical,
                }
            }
            None => dir,
        };
        Ok(Self {
            profile: dir.join(name),
            dir,
            watching: None,
        })
    }

    fn is_armed(&self) -> bool {
        self.watching.as_deref() == Some(self.dir.as_path())
    }

    /// Moves the watch to the deepest existing directory on the way to the
    /// profile. Returns whether this call put it on the profile's directory.
    fn arm<W: Watcher>(&mut self, watcher: &mut W) -> Result<bool, notify::Error> {
        let was_armed = self.is_armed();
        // Re-check after every move: a directory created before its parent
        // was watched raises no event.
        while let Some(target) = nearest_existing(&self.dir) {
            if self.watching.as_ref() == Some(&target) {
                break;
            }
            if let Some(previous) = self.watching.take() {
                let _ = watcher.unwatch(&previous);
            }
            watcher.watch(&target, RecursiveMode::NonRecursive)?;
            tracing::debug!(path = %target.display(), "watching directory for managed profile");
            self.watching = Some(target);
        }
        Ok(!was_armed && self.is_armed())
    }
}

fn nearest_existing(dir: &Path) -> Option<PathBuf> {
    dir.ancestors().find(|p| p.is_dir()).map(Path::to_path_buf)
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

fn run(
    mut watcher: RecommendedWatcher,
    mut plan: WatchPlan,
    rx: Receiver<Signal>,
    registry: Arc<Registry>,
    source: ManagedProfileFile,
) {
    for signal in rx {
        let event = match signal {
            Signal::Stop => break,
            Signal::Fs(Ok(event)) => event,
            Signal::Fs(Err(err)) => {
                tracing::warn!(error = %err, "managed profile watcher event error");
                continue;
            }
        };
        // Directories on the way to the profile may have appeared or gone.
        let reached = plan.arm(&mut watcher).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to move managed profile watch");
            false
        });
        if reached || touches_profile(&event, &plan.profile) {
            reload(&registry, &source, &plan.profile);
        }
    }
    tracing::debug!(path = %plan.profile.display(), "managed profile watcher stopped");
}

fn reload(registry: &Registry, source: &ManagedProfileFile, profile: &Path) {
    match registry.refresh_from(source) {
        Ok(changed) => tracing::info!(
            path = %profile.display(),
            changed = changed.len(),
            "managed profile reloaded"
        ),
        Err(err) => tracing::warn!(
            path = %profile.display(),
            error = %err,
            "managed profile reload failed; keeping previous overrides"
        ),
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Removal counts: a deleted profile means nothing is managed any more.
pub(crate) fn touches_profile(event: &Event, profile: &Path) -> bool {
    is_relevant_event_kind(&event.kind) && event.paths.iter().any(|path| path == profile)
}
