use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use ignore::gitignore::Gitignore;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::filter::{Op, RawEvent};

/// A running watch: the event and error streams consumed by the scheduler.
///
/// Dropping `watcher` closes both channels, which stops the control loop.
pub struct WatchHandle {
    pub watcher: RecommendedWatcher,
    pub events: Receiver<RawEvent>,
    pub errors: Receiver<notify::Error>,
}

/// Start watching `paths`. Gitignored paths are dropped here, before they
/// ever reach the event filter, unless `respect_gitignore` is false.
pub fn spawn(paths: &[PathBuf], recursive: bool, respect_gitignore: bool) -> Result<WatchHandle> {
    let paths = paths
        .iter()
        .map(|p| {
            p.canonicalize()
                .with_context(|| format!("adding watch path {}", p.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let (event_tx, events) = unbounded();
    let (error_tx, errors) = unbounded();

    let ignores: Vec<Ignore> = if respect_gitignore {
        paths.iter().map(|p| Ignore::load(p)).collect()
    } else {
        Vec::new()
    };

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        forward(res, &ignores, &event_tx, &error_tx);
    })
    .context("creating watcher")?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    for path in &paths {
        watcher
            .watch(path, mode)
            .with_context(|| format!("adding watch path {}", path.display()))?;
    }

    Ok(WatchHandle {
        watcher,
        events,
        errors,
    })
}

fn forward(
    res: notify::Result<Event>,
    ignores: &[Ignore],
    events: &Sender<RawEvent>,
    errors: &Sender<notify::Error>,
) {
    let event = match res {
        Ok(event) => event,
        Err(err) => {
            let _ = errors.send(err);
            return;
        }
    };

    if Op::from_kind(&event.kind).is_empty() {
        return;
    }
    // A rename carries both the old and new path; each is its own event.
    for (index, path) in event.paths.into_iter().enumerate() {
        let ops = Op::for_path(&event.kind, index);
        if ignores.iter().any(|ig| ig.is_ignored(&path)) {
            debug!(path = %path.display(), "ignored by .gitignore");
            continue;
        }
        let _ = events.send(RawEvent::new(path, ops));
    }
}

/// The `.gitignore` at the root of one watched directory.
struct Ignore {
    root: PathBuf,
    matcher: Gitignore,
}

impl Ignore {
    fn load(root: &Path) -> Self {
        // Events arrive with absolute paths; match against the same form.
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let (matcher, err) = Gitignore::new(root.join(".gitignore"));
        if let Some(err) = err {
            debug!(error = %err, "no usable .gitignore");
        }
        Self { root, matcher }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let is_dir = path.metadata().map(|m| m.is_dir()).unwrap_or(false);
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}
