use std::collections::HashMap;
use std::ops::BitOr;
use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind, RenameMode};

/// Set of filesystem operations carried by one event, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Op(u8);

impl Op {
    pub const NONE: Op = Op(0);
    pub const WRITE: Op = Op(1 << 0);
    pub const CREATE: Op = Op(1 << 1);
    pub const REMOVE: Op = Op(1 << 2);
    pub const RENAME: Op = Op(1 << 3);
    pub const CHMOD: Op = Op(1 << 4);

    /// True if any bit of `other` is also set in `self`.
    pub fn intersects(self, other: Op) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Classify a `notify` event kind.
    ///
    /// Unspecified modifications count as writes; access events carry no
    /// operation at all and can never be interesting. The destination of a
    /// rename is a create, so saving via a temp file and renaming it into
    /// place is seen as the target file appearing.
    pub fn from_kind(kind: &EventKind) -> Op {
        match kind {
            EventKind::Create(_) => Op::CREATE,
            EventKind::Remove(_) => Op::REMOVE,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Op::CREATE,
            EventKind::Modify(ModifyKind::Name(_)) => Op::RENAME,
            EventKind::Modify(ModifyKind::Metadata(_)) => Op::CHMOD,
            EventKind::Modify(_) => Op::WRITE,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Op::NONE,
        }
    }

    /// Classify the `index`th path of an event. A two-path rename lists
    /// the old path first and the new one second; the new one is a create.
    pub fn for_path(kind: &EventKind, index: usize) -> Op {
        match kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if index > 0 => Op::CREATE,
            _ => Op::from_kind(kind),
        }
    }
}

impl BitOr for Op {
    type Output = Op;

    fn bitor(self, rhs: Op) -> Op {
        Op(self.0 | rhs.0)
    }
}

/// One filesystem change, as delivered by the watcher. Consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub ops: Op,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, ops: Op) -> Self {
        Self {
            path: path.into(),
            ops,
        }
    }
}

/// Decides whether a raw event should arm the scheduler.
///
/// Suffix decisions are memoized per path for the life of the filter; the
/// cache only grows, bounded by the number of distinct paths seen.
pub struct EventFilter {
    ops: Vec<Op>,
    suffixes: Vec<String>,
    cache: HashMap<PathBuf, bool>,
}

impl EventFilter {
    pub fn new(suffixes: Vec<String>, ops: Vec<Op>) -> Self {
        Self {
            ops,
            suffixes,
            cache: HashMap::new(),
        }
    }

    pub fn check(&mut self, event: &RawEvent) -> bool {
        if !self.ops.iter().any(|op| event.ops.intersects(*op)) {
            return false;
        }
        if let Some(&interesting) = self.cache.get(&event.path) {
            return interesting;
        }
        let suffix = suffix_of(&event.path);
        let interesting = self.suffixes.iter().any(|s| s == &suffix);
        self.cache.insert(event.path.clone(), interesting);
        interesting
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Everything after the last `.` of the final path segment, or "" if it
/// has no dot. Dotfiles count: `.envrc` has the suffix `envrc`.
fn suffix_of(path: &Path) -> String {
    let Some(name) = path.file_name() else {
        return String::new();
    };
    let name = name.to_string_lossy();
    match name.rfind('.') {
        Some(idx) => name[idx + 1..].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    fn filter(suffixes: &[&str]) -> EventFilter {
        EventFilter::new(
            suffixes.iter().map(|s| s.to_string()).collect(),
            vec![Op::WRITE, Op::CREATE],
        )
    }

    #[test]
    fn boring_op_is_rejected_without_caching() {
        let mut f = filter(&["rs"]);
        assert!(!f.check(&RawEvent::new("src/main.rs", Op::REMOVE)));
        assert!(!f.check(&RawEvent::new("src/main.rs", Op::CHMOD | Op::RENAME)));
        assert_eq!(f.cached(), 0);
    }

    #[test]
    fn interesting_suffix_on_watched_op() {
        let mut f = filter(&["rs", "toml"]);
        assert!(f.check(&RawEvent::new("src/main.rs", Op::WRITE)));
        assert!(f.check(&RawEvent::new("Cargo.toml", Op::CREATE)));
        assert!(!f.check(&RawEvent::new("README.md", Op::WRITE)));
        assert_eq!(f.cached(), 3);
    }

    #[test]
    fn any_overlapping_op_is_enough() {
        let mut f = filter(&["rs"]);
        assert!(f.check(&RawEvent::new("lib.rs", Op::CHMOD | Op::WRITE)));
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        let mut f = filter(&["rs"]);
        assert!(!f.check(&RawEvent::new("LIB.RS", Op::WRITE)));
    }

    #[test]
    fn cached_answer_wins_over_recomputation() {
        let mut f = filter(&["rs"]);
        assert!(f.check(&RawEvent::new("lib.rs", Op::WRITE)));

        // Same path, different suffix list: the memoized answer is returned.
        f.suffixes = vec!["toml".to_string()];
        assert!(f.check(&RawEvent::new("lib.rs", Op::WRITE)));
        assert_eq!(f.cached(), 1);
    }

    #[test]
    fn extensionless_needs_empty_suffix() {
        let mut f = filter(&["rs"]);
        assert!(!f.check(&RawEvent::new("Makefile", Op::WRITE)));

        let mut f = filter(&["rs", ""]);
        assert!(f.check(&RawEvent::new("Makefile", Op::WRITE)));
        assert!(f.check(&RawEvent::new("trailing.", Op::WRITE)));
    }

    #[test]
    fn suffix_uses_final_segment_only() {
        assert_eq!(suffix_of(Path::new("a.d/Makefile")), "");
        assert_eq!(suffix_of(Path::new("a/b/archive.tar.gz")), "gz");
        assert_eq!(suffix_of(Path::new(".envrc")), "envrc");
        assert_eq!(suffix_of(Path::new("/")), "");
    }

    #[test]
    fn kinds_map_to_ops() {
        assert_eq!(Op::from_kind(&EventKind::Create(CreateKind::File)), Op::CREATE);
        assert_eq!(Op::from_kind(&EventKind::Remove(RemoveKind::Any)), Op::REMOVE);
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Op::WRITE
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Op::RENAME
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Op::CREATE
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            Op::CHMOD
        );
        assert!(Op::from_kind(&EventKind::Access(AccessKind::Any)).is_empty());
    }

    #[test]
    fn rename_destination_is_a_create() {
        let both = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        assert_eq!(Op::for_path(&both, 0), Op::RENAME);
        assert_eq!(Op::for_path(&both, 1), Op::CREATE);

        let write = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        assert_eq!(Op::for_path(&write, 1), Op::WRITE);
    }

    #[test]
    fn atomic_save_is_interesting_by_default() {
        let mut f = filter(&["rs"]);
        let to = EventKind::Modify(ModifyKind::Name(RenameMode::To));
        assert!(f.check(&RawEvent::new("src/main.rs", Op::from_kind(&to))));
    }
}
