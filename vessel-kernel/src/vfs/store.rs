//! The VFS store: an in-memory mirror backing linearizable reads, with a
//! [`DbHandle`] actor persisting every mutation so state survives a restart
//! (design doc §4.1).
//!
//! Every operation normalizes its path first (see [`normalize`]), then takes
//! the mirror's write lock for the whole operation. This keeps the store's
//! visible behaviour atomic even though the SQLite write happens
//! out-of-band; a crash between the mirror update and the DB ack can only
//! lose the most recent write, never corrupt the tree.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use vessel_shared::errors::{FsErrorCode, VesselError, VesselResult};

use crate::bus::{EventBus, FsEventKind, KernelEvent};

use super::db::DbHandle;
use super::types::{FileHandle, FileMeta, OpenBuffer, OpenFlag};

#[derive(Clone, Debug)]
struct Node {
    meta: FileMeta,
    content: Vec<u8>,
}

/// A single `textSearch` hit.
#[derive(Debug, Clone)]
pub struct TextMatch {
    pub path: String,
    pub line_number: u32,
    pub line: String,
    pub score: f64,
    pub match_start: u32,
    pub match_end: u32,
}

/// Filter/behaviour knobs for [`VfsStore::text_search`] (design doc §4.1,
/// `TextSearchOptions`). All fields default to "match everything, plain
/// substring, case-insensitive".
#[derive(Debug, Clone, Default)]
pub struct TextSearchParams {
    pub folders: Vec<String>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub case_sensitive: bool,
    pub is_regex: bool,
    pub is_word_match: bool,
    /// Maximum edit distance accepted by the fuzzy fallback. `0` means "use
    /// the store's default bound" rather than "disable fuzzy matching" —
    /// the fallback only ever runs when the exact/regex phase found nothing.
    pub fuzzy_threshold: u32,
}

/// One in-flight `openFile` buffer, keyed by its [`FileHandle`].
struct OpenEntry {
    path: String,
    flags: OpenFlag,
    buffer: OpenBuffer,
}

pub struct VfsStore {
    tree: RwLock<BTreeMap<String, Node>>,
    open_handles: RwLock<HashMap<FileHandle, OpenEntry>>,
    next_handle: AtomicU64,
    db: DbHandle,
    bus: EventBus,
}

impl VfsStore {
    /// Opens the store, loading any persisted state from `persist_path`
    /// (`None` for an ephemeral, in-memory-only container) and ensuring the
    /// root directory exists.
    pub async fn open(persist_path: Option<&Path>, bus: EventBus) -> VesselResult<Arc<Self>> {
        let db = DbHandle::open(persist_path)?;
        let loaded = db.load_all().await?;

        let mut tree = BTreeMap::new();
        for (meta, content) in loaded {
            tree.insert(meta.path.clone(), Node { meta, content });
        }
        tree.entry("/".to_string()).or_insert_with(|| Node {
            meta: FileMeta::new_dir("/", Utc::now()),
            content: Vec::new(),
        });

        let store = Arc::new(Self {
            tree: RwLock::new(tree),
            open_handles: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            db,
            bus,
        });
        Ok(store)
    }

    pub async fn stat(&self, path: &str) -> VesselResult<FileMeta> {
        let path = normalize(path)?;
        let tree = self.tree.read();
        tree.get(&path)
            .map(|n| n.meta.clone())
            .ok_or_else(|| VesselError::fs_at(FsErrorCode::ENOENT, path, "no such file or directory"))
    }

    pub async fn read_file(&self, path: &str) -> VesselResult<Vec<u8>> {
        let path = normalize(path)?;
        let tree = self.tree.read();
        let node = tree
            .get(&path)
            .ok_or_else(|| VesselError::fs_at(FsErrorCode::ENOENT, &path, "no such file or directory"))?;
        if node.meta.is_dir() {
            return Err(VesselError::fs_at(FsErrorCode::EISDIR, path, "is a directory"));
        }
        Ok(node.content.clone())
    }

    pub async fn write_file(&self, path: &str, content: Vec<u8>) -> VesselResult<()> {
        let path = normalize(path)?;
        self.require_parent_dir(&path)?;

        let now = Utc::now();
        let meta = {
            let mut tree = self.tree.write();
            if let Some(existing) = tree.get(&path) {
                if existing.meta.is_dir() {
                    return Err(VesselError::fs_at(FsErrorCode::EISDIR, path, "is a directory"));
                }
            }
            let is_new = !tree.contains_key(&path);
            let mut meta = tree
                .get(&path)
                .map(|n| n.meta.clone())
                .unwrap_or_else(|| FileMeta::new_file(&path, 0, now));
            meta.size = content.len() as u64;
            meta.mtime = now;
            meta.ctime = now;
            tree.insert(path.clone(), Node { meta: meta.clone(), content: content.clone() });
            let _ = is_new;
            meta
        };

        self.db.put(meta, content).await?;
        self.bus.publish(KernelEvent::FileChange {
            kind: FsEventKind::Change,
            path: path.clone(),
        });
        Ok(())
    }

    pub async fn mkdir(&self, path: &str, recursive: bool) -> VesselResult<()> {
        let path = normalize(path)?;
        if path == "/" {
            return Ok(());
        }
        if !recursive {
            return self.mkdir_one(&path).await;
        }
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let mut built = String::new();
        for segment in segments {
            built.push('/');
            built.push_str(segment);
            match self.mkdir_one(&built).await {
                Ok(()) | Err(VesselError::Fs { code: FsErrorCode::EEXIST, .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn mkdir_one(&self, path: &str) -> VesselResult<()> {
        self.require_parent_dir(path)?;

        let now = Utc::now();
        let meta = {
            let mut tree = self.tree.write();
            if tree.contains_key(path) {
                return Err(VesselError::fs_at(FsErrorCode::EEXIST, path, "already exists"));
            }
            let meta = FileMeta::new_dir(path, now);
            tree.insert(path.to_string(), Node { meta: meta.clone(), content: Vec::new() });
            meta
        };

        self.db.put(meta, Vec::new()).await?;
        self.bus.publish(KernelEvent::FileChange { kind: FsEventKind::AddDir, path: path.to_string() });
        Ok(())
    }

    pub async fn unlink(&self, path: &str) -> VesselResult<()> {
        let path = normalize(path)?;
        {
            let mut tree = self.tree.write();
            let node = tree
                .get(&path)
                .ok_or_else(|| VesselError::fs_at(FsErrorCode::ENOENT, &path, "no such file or directory"))?;
            if node.meta.is_dir() {
                return Err(VesselError::fs_at(FsErrorCode::EISDIR, path, "is a directory"));
            }
            tree.remove(&path);
        }
        self.db.delete(path.clone()).await?;
        self.bus.publish(KernelEvent::FileChange { kind: FsEventKind::RemoveFile, path });
        Ok(())
    }

    pub async fn rmdir(&self, path: &str, recursive: bool) -> VesselResult<()> {
        let path = normalize(path)?;
        if path == "/" {
            return Err(VesselError::fs_at(FsErrorCode::EACCES, path, "cannot remove root"));
        }
        let victims: Vec<String> = {
            let mut tree = self.tree.write();
            let node = tree
                .get(&path)
                .ok_or_else(|| VesselError::fs_at(FsErrorCode::ENOENT, &path, "no such file or directory"))?;
            if !node.meta.is_dir() {
                return Err(VesselError::fs_at(FsErrorCode::ENOTDIR, path, "not a directory"));
            }
            let prefix = format!("{path}/");
            let descendants: Vec<String> = tree.keys().filter(|k| k.starts_with(&prefix)).cloned().collect();
            if !descendants.is_empty() && !recursive {
                return Err(VesselError::fs_at(FsErrorCode::ENOTEMPTY, path, "directory not empty"));
            }
            let mut victims = descendants;
            victims.push(path.clone());
            // Longest paths first so every child is removed from the mirror
            // before its parent.
            victims.sort_by_key(|p| Reverse(p.len()));
            for victim in &victims {
                tree.remove(victim);
            }
            victims
        };

        for victim in &victims {
            self.db.delete(victim.clone()).await?;
        }
        self.bus.publish(KernelEvent::FileChange { kind: FsEventKind::RemoveDir, path });
        Ok(())
    }

    pub async fn rename(&self, from: &str, to: &str) -> VesselResult<()> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        if from == to {
            return Ok(());
        }
        self.require_parent_dir(&to)?;

        let mut replaced: Vec<String> = Vec::new();
        let moved: Vec<(String, Node)> = {
            let mut tree = self.tree.write();
            if !tree.contains_key(&from) {
                return Err(VesselError::fs_at(FsErrorCode::ENOENT, &from, "no such file or directory"));
            }
            // An existing destination is atomically replaced rather than
            // rejected, except a non-empty directory (ambiguous what
            // "replace" would mean for its contents).
            if let Some(existing) = tree.get(&to) {
                let to_prefix = format!("{to}/");
                if existing.meta.is_dir() && tree.keys().any(|k| k.starts_with(&to_prefix)) {
                    return Err(VesselError::fs_at(FsErrorCode::ENOTEMPTY, &to, "directory not empty"));
                }
                replaced.push(to.clone());
                tree.remove(&to);
            }
            let prefix = format!("{from}/");
            let keys: Vec<String> = tree
                .keys()
                .filter(|k| *k == &from || k.starts_with(&prefix))
                .cloned()
                .collect();
            let mut moved = Vec::with_capacity(keys.len());
            for key in keys {
                let mut node = tree.remove(&key).expect("key just observed present");
                let new_key = format!("{to}{}", &key[from.len()..]);
                node.meta.path = new_key.clone();
                node.meta.mtime = Utc::now();
                moved.push((new_key.clone(), node.clone()));
                tree.insert(new_key, node);
            }
            moved
        };

        for victim in &replaced {
            self.db.delete(victim.clone()).await?;
        }
        self.db.rename_prefix(from.clone(), to.clone()).await?;
        self.bus
            .publish(KernelEvent::FileChange { kind: FsEventKind::RemoveFile, path: from });
        for (path, _) in &moved {
            self.bus
                .publish(KernelEvent::FileChange { kind: FsEventKind::AddFile, path: path.clone() });
        }
        Ok(())
    }

    /// Opens `path` for buffered writes, returning a handle that owns its
    /// buffer until [`sync`](Self::sync) commits it or
    /// [`close_file`](Self::close_file) discards it (design doc §4.1,
    /// `openFile`). `create` makes a missing path acceptable; without it a
    /// missing path is `ENOENT`. `truncate` starts the buffer empty;
    /// otherwise it's seeded with the file's current content so `sync` after
    /// a partial write still commits the whole thing.
    pub async fn open_file(&self, path: &str, flags: OpenFlag) -> VesselResult<FileHandle> {
        let path = normalize(path)?;
        let initial = {
            let tree = self.tree.read();
            match tree.get(&path) {
                Some(node) if node.meta.is_dir() => {
                    return Err(VesselError::fs_at(FsErrorCode::EISDIR, path, "is a directory"));
                }
                Some(node) => {
                    if flags.truncate {
                        Vec::new()
                    } else {
                        node.content.clone()
                    }
                }
                None if flags.create => Vec::new(),
                None => return Err(VesselError::fs_at(FsErrorCode::ENOENT, path, "no such file or directory")),
            }
        };
        let handle = FileHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.open_handles
            .write()
            .insert(handle, OpenEntry { path, flags, buffer: OpenBuffer { content: initial } });
        Ok(handle)
    }

    /// Appends (or, for a handle opened without `append`, replaces) the
    /// handle's buffered content. Nothing is visible to other readers until
    /// [`sync`](Self::sync) commits it.
    pub async fn write_handle(&self, handle: FileHandle, data: Vec<u8>) -> VesselResult<()> {
        let mut handles = self.open_handles.write();
        let entry = handles
            .get_mut(&handle)
            .ok_or_else(|| VesselError::fs(FsErrorCode::EBUSY, "unknown or already-closed file handle"))?;
        if entry.flags.append {
            entry.buffer.content.extend(data);
        } else {
            entry.buffer.content = data;
        }
        Ok(())
    }

    /// Commits the handle's buffered content as the file's content, exactly
    /// as [`write_file`](Self::write_file) would. The handle stays open
    /// afterward so further writes can be synced again.
    pub async fn sync(&self, handle: FileHandle) -> VesselResult<FileMeta> {
        let path = {
            let handles = self.open_handles.read();
            let entry = handles
                .get(&handle)
                .ok_or_else(|| VesselError::fs(FsErrorCode::EBUSY, "unknown or already-closed file handle"))?;
            entry.path.clone()
        };
        let content = self.open_handles.read().get(&handle).expect("checked above").buffer.content.clone();
        self.write_file(&path, content).await?;
        self.stat(&path).await
    }

    /// Drops the handle. Any buffered content not already committed via
    /// `sync` is discarded, matching "close without flush is a no-op".
    pub async fn close_file(&self, handle: FileHandle) -> VesselResult<()> {
        self.open_handles
            .write()
            .remove(&handle)
            .ok_or_else(|| VesselError::fs(FsErrorCode::EBUSY, "unknown or already-closed file handle"))?;
        Ok(())
    }

    pub async fn readdir(&self, path: &str) -> VesselResult<Vec<FileMeta>> {
        let path = normalize(path)?;
        let tree = self.tree.read();
        let node = tree
            .get(&path)
            .ok_or_else(|| VesselError::fs_at(FsErrorCode::ENOENT, &path, "no such file or directory"))?;
        if !node.meta.is_dir() {
            return Err(VesselError::fs_at(FsErrorCode::ENOTDIR, path, "not a directory"));
        }
        let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
        let mut entries = Vec::new();
        for (key, node) in tree.iter() {
            if key == &path {
                continue;
            }
            if let Some(rest) = key.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    entries.push(node.meta.clone());
                }
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Two-phase text search (design doc §4.1): an exact/regex/word-match
    /// scan first, a bounded edit-distance fallback only when that finds
    /// nothing. The FTS5 index narrows the exact phase's candidate set as an
    /// optimization, never as the source of truth — an empty FTS result
    /// falls back to a full scan rather than being trusted as "no matches",
    /// since FTS5's tokenizer can choke on query syntax a literal/regex scan
    /// wouldn't. The fuzzy fallback always scans every file, since a
    /// near-miss line won't show up as an FTS hit at all.
    pub async fn text_search(&self, query: &str, params: &TextSearchParams, limit: usize) -> VesselResult<Vec<TextMatch>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let matcher = Matcher::new(query, params)?;

        let candidates = self.db.search(query.to_string()).await.unwrap_or_default();
        let candidate_set: Option<HashSet<String>> =
            if candidates.is_empty() { None } else { Some(candidates.into_iter().collect()) };

        let tree = self.tree.read();
        let mut exact = Vec::new();
        for node in tree.values() {
            if node.meta.is_dir() || !path_matches_filters(&node.meta.path, params) {
                continue;
            }
            if let Some(set) = &candidate_set {
                if !set.contains(&node.meta.path) {
                    continue;
                }
            }
            let Ok(text) = std::str::from_utf8(&node.content) else {
                continue;
            };
            for (idx, line) in text.lines().enumerate() {
                if let Some((start, end)) = matcher.find(line) {
                    exact.push(TextMatch {
                        path: node.meta.path.clone(),
                        line_number: idx as u32 + 1,
                        line: line.to_string(),
                        score: 1.0,
                        match_start: start,
                        match_end: end,
                    });
                }
            }
        }

        if !exact.is_empty() {
            exact.truncate(limit);
            return Ok(exact);
        }

        let mut fuzzy = Vec::new();
        let bound = if params.fuzzy_threshold > 0 { params.fuzzy_threshold as usize } else { (query.len() / 3).max(1) };
        for node in tree.values() {
            if node.meta.is_dir() || !path_matches_filters(&node.meta.path, params) {
                continue;
            }
            let Ok(text) = std::str::from_utf8(&node.content) else {
                continue;
            };
            for (idx, line) in text.lines().enumerate() {
                let distance = strsim::levenshtein(line, query);
                if distance <= bound {
                    let score = 1.0 - (distance as f64 / query.len().max(1) as f64);
                    fuzzy.push(TextMatch {
                        path: node.meta.path.clone(),
                        line_number: idx as u32 + 1,
                        line: line.to_string(),
                        score,
                        match_start: 0,
                        match_end: 0,
                    });
                }
            }
        }

        fuzzy.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        fuzzy.truncate(limit);
        Ok(fuzzy)
    }

    fn require_parent_dir(&self, path: &str) -> VesselResult<()> {
        let parent = parent_of(path);
        let tree = self.tree.read();
        match tree.get(&parent) {
            Some(node) if node.meta.is_dir() => Ok(()),
            Some(_) => Err(VesselError::fs_at(FsErrorCode::ENOTDIR, parent, "not a directory")),
            None => Err(VesselError::fs_at(FsErrorCode::ENOENT, parent, "no such file or directory")),
        }
    }
}

/// Compiled form of a `textSearch` query, chosen once per call rather than
/// re-parsed per line.
enum Matcher {
    Literal { needle: String, case_sensitive: bool },
    Regex(regex::Regex),
}

impl Matcher {
    fn new(query: &str, params: &TextSearchParams) -> VesselResult<Self> {
        if params.is_regex || params.is_word_match {
            let pattern = if params.is_regex && params.is_word_match {
                format!(r"\b(?:{query})\b")
            } else if params.is_regex {
                query.to_string()
            } else {
                format!(r"\b{}\b", regex::escape(query))
            };
            let regex = regex::RegexBuilder::new(&pattern)
                .case_insensitive(!params.case_sensitive)
                .build()
                .map_err(|e| VesselError::fs(FsErrorCode::EIO, format!("invalid search pattern: {e}")))?;
            Ok(Matcher::Regex(regex))
        } else {
            Ok(Matcher::Literal { needle: query.to_string(), case_sensitive: params.case_sensitive })
        }
    }

    /// Byte offsets of the first match in `line`, if any.
    fn find(&self, line: &str) -> Option<(u32, u32)> {
        match self {
            Matcher::Literal { needle, case_sensitive } => {
                if *case_sensitive {
                    line.find(needle.as_str()).map(|start| (start as u32, (start + needle.len()) as u32))
                } else {
                    let lower_line = line.to_lowercase();
                    let lower_needle = needle.to_lowercase();
                    lower_line
                        .find(&lower_needle)
                        .map(|start| (start as u32, (start + lower_needle.len()) as u32))
                }
            }
            Matcher::Regex(re) => re.find(line).map(|m| (m.start() as u32, m.end() as u32)),
        }
    }
}

/// `folders` restricts to a path prefix, `includes`/`excludes` are glob
/// patterns matched against the full path (design doc §4.1, `TextSearchOptions`).
fn path_matches_filters(path: &str, params: &TextSearchParams) -> bool {
    if !params.folders.is_empty() && !params.folders.iter().any(|f| path.starts_with(f.as_str())) {
        return false;
    }
    if !params.includes.is_empty() {
        let included = params
            .includes
            .iter()
            .any(|pat| glob::Pattern::new(pat).map(|p| p.matches(path)).unwrap_or(false));
        if !included {
            return false;
        }
    }
    if params
        .excludes
        .iter()
        .any(|pat| glob::Pattern::new(pat).map(|p| p.matches(path)).unwrap_or(false))
    {
        return false;
    }
    true
}

fn parent_of(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => "/".to_string(),
    }
}

/// Normalizes a path to an absolute, `/`-separated form with no trailing
/// slash (root excepted), resolving `.`/`..` segments lexically.
fn normalize(path: &str) -> VesselResult<String> {
    if path.is_empty() {
        return Err(VesselError::fs(FsErrorCode::ENOENT, "empty path"));
    }
    let absolute = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    let mut segments: Vec<&str> = Vec::new();
    for seg in absolute.split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(format!("/{}", segments.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn new_store() -> Arc<VfsStore> {
        VfsStore::open(None, EventBus::new()).await.unwrap()
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = new_store().await;
        store.write_file("/a.txt", b"hi".to_vec()).await.unwrap();
        assert_eq!(store.read_file("/a.txt").await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn write_requires_existing_parent_dir() {
        let store = new_store().await;
        let err = store.write_file("/no/such/dir/a.txt", b"x".to_vec()).await.unwrap_err();
        assert_eq!(err.short_code(), "ENOENT");
    }

    #[tokio::test]
    async fn mkdir_then_readdir_lists_child() {
        let store = new_store().await;
        store.mkdir("/dir", false).await.unwrap();
        store.write_file("/dir/a.txt", b"x".to_vec()).await.unwrap();
        let entries = store.readdir("/dir").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "/dir/a.txt");
    }

    #[tokio::test]
    async fn mkdir_recursive_creates_missing_parents() {
        let store = new_store().await;
        store.mkdir("/a/b/c", true).await.unwrap();
        assert!(store.stat("/a").await.unwrap().is_dir());
        assert!(store.stat("/a/b").await.unwrap().is_dir());
        assert!(store.stat("/a/b/c").await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn mkdir_non_recursive_rejects_missing_parent() {
        let store = new_store().await;
        let err = store.mkdir("/a/b", false).await.unwrap_err();
        assert_eq!(err.short_code(), "ENOENT");
    }

    #[tokio::test]
    async fn rmdir_rejects_non_empty() {
        let store = new_store().await;
        store.mkdir("/dir", false).await.unwrap();
        store.write_file("/dir/a.txt", b"x".to_vec()).await.unwrap();
        let err = store.rmdir("/dir", false).await.unwrap_err();
        assert_eq!(err.short_code(), "ENOTEMPTY");
    }

    #[tokio::test]
    async fn rmdir_recursive_removes_tree() {
        let store = new_store().await;
        store.mkdir("/dir", false).await.unwrap();
        store.write_file("/dir/a.txt", b"x".to_vec()).await.unwrap();
        store.mkdir("/dir/sub", false).await.unwrap();
        store.write_file("/dir/sub/b.txt", b"y".to_vec()).await.unwrap();
        store.rmdir("/dir", true).await.unwrap();
        assert!(store.stat("/dir").await.is_err());
        assert!(store.stat("/dir/sub/b.txt").await.is_err());
    }

    #[tokio::test]
    async fn rename_moves_subtree() {
        let store = new_store().await;
        store.mkdir("/dir", false).await.unwrap();
        store.write_file("/dir/a.txt", b"x".to_vec()).await.unwrap();
        store.rename("/dir", "/moved").await.unwrap();
        assert!(store.stat("/dir").await.is_err());
        assert_eq!(store.read_file("/moved/a.txt").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn rename_replaces_existing_destination_file() {
        let store = new_store().await;
        store.write_file("/a.txt", b"new".to_vec()).await.unwrap();
        store.write_file("/b.txt", b"old".to_vec()).await.unwrap();
        store.rename("/a.txt", "/b.txt").await.unwrap();
        assert_eq!(store.read_file("/b.txt").await.unwrap(), b"new");
        assert!(store.stat("/a.txt").await.is_err());
    }

    #[tokio::test]
    async fn rename_rejects_non_empty_destination_directory() {
        let store = new_store().await;
        store.mkdir("/src", false).await.unwrap();
        store.mkdir("/dst", false).await.unwrap();
        store.write_file("/dst/keep.txt", b"x".to_vec()).await.unwrap();
        let err = store.rename("/src", "/dst").await.unwrap_err();
        assert_eq!(err.short_code(), "ENOTEMPTY");
    }

    #[tokio::test]
    async fn text_search_finds_exact_match() {
        let store = new_store().await;
        store.write_file("/a.txt", b"hello world\nbye".to_vec()).await.unwrap();
        let hits = store.text_search("world", &TextSearchParams::default(), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line_number, 1);
        assert_eq!(hits[0].match_start, 6);
        assert_eq!(hits[0].match_end, 11);
    }

    #[tokio::test]
    async fn text_search_is_regex_matches_pattern() {
        let store = new_store().await;
        store.write_file("/a.txt", b"foo123\nbar".to_vec()).await.unwrap();
        let params = TextSearchParams { is_regex: true, ..Default::default() };
        let hits = store.text_search(r"\d+", &params, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/a.txt");
    }

    #[tokio::test]
    async fn text_search_respects_folders_filter() {
        let store = new_store().await;
        store.mkdir("/src", false).await.unwrap();
        store.mkdir("/docs", false).await.unwrap();
        store.write_file("/src/a.txt", b"needle".to_vec()).await.unwrap();
        store.write_file("/docs/b.txt", b"needle".to_vec()).await.unwrap();
        let params = TextSearchParams { folders: vec!["/docs".to_string()], ..Default::default() };
        let hits = store.text_search("needle", &params, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "/docs/b.txt");
    }

    #[tokio::test]
    async fn text_search_falls_back_to_fuzzy_when_no_exact_match() {
        let store = new_store().await;
        store.write_file("/a.txt", b"helo world".to_vec()).await.unwrap();
        let hits = store.text_search("hello", &TextSearchParams::default(), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score < 1.0);
    }

    #[tokio::test]
    async fn open_file_write_handle_sync_commits_content() {
        let store = new_store().await;
        let handle = store.open_file("/a.txt", OpenFlag { create: true, truncate: true, append: false }).await.unwrap();
        store.write_handle(handle, b"hello".to_vec()).await.unwrap();
        store.sync(handle).await.unwrap();
        assert_eq!(store.read_file("/a.txt").await.unwrap(), b"hello");
        store.close_file(handle).await.unwrap();
    }

    #[tokio::test]
    async fn close_file_without_sync_discards_buffer() {
        let store = new_store().await;
        store.write_file("/a.txt", b"original".to_vec()).await.unwrap();
        let handle = store.open_file("/a.txt", OpenFlag::default()).await.unwrap();
        store.write_handle(handle, b"overwritten".to_vec()).await.unwrap();
        store.close_file(handle).await.unwrap();
        assert_eq!(store.read_file("/a.txt").await.unwrap(), b"original");
    }

    #[test]
    fn normalize_resolves_dotdot() {
        assert_eq!(normalize("/a/b/../c").unwrap(), "/a/c");
        assert_eq!(normalize("rel/path").unwrap(), "/rel/path");
        assert_eq!(normalize("/").unwrap(), "/");
    }
}
