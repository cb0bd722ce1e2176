//! In-memory provider with scriptable failures.
//!
//! Paths are matched case-insensitively. Every volume root is a directory node; a
//! mounted mount point switches everything below it to another volume. Timestamps
//! come from a logical clock so results are reproducible.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{FsError, Result};
use crate::path::{NormalizedPath, normalize};
use crate::platform::traits::{FileSystem, Listing};
use crate::platform::types::{
    EntryInfo, FileAttributes, FileOutcome, FileProgress, FileTimes, ProgressAction,
    ProgressCallback, RawEntry, ReparseTag, SecuritySnapshot, TransactionHandle,
};

const CLOCK_BASE: i64 = 1_700_000_000;
const CLUSTER_SIZE: u64 = 4096;
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
const DEFAULT_VOLUME: &str = r"C:\";

/// Bits derived from the node kind rather than stored.
const DERIVED: FileAttributes = FileAttributes::DIRECTORY
    .union(FileAttributes::REPARSE_POINT)
    .union(FileAttributes::NORMAL);

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    File(Vec<u8>),
    Directory,
    Symlink { target: String, directory: bool },
    MountPoint { volume: String, mounted: bool },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: NodeKind,
    attributes: FileAttributes,
    created: DateTime<Utc>,
    accessed: DateTime<Utc>,
    modified: DateTime<Utc>,
    security: Option<SecuritySnapshot>,
}

impl Node {
    fn new(name: String, kind: NodeKind, now: DateTime<Utc>) -> Self {
        Self {
            name,
            kind,
            attributes: FileAttributes::empty(),
            created: now,
            accessed: now,
            modified: now,
            security: None,
        }
    }

    /// Can hold children.
    fn is_container(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Directory | NodeKind::MountPoint { mounted: true, .. }
        )
    }

    fn is_directory_like(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Directory
                | NodeKind::MountPoint { .. }
                | NodeKind::Symlink {
                    directory: true,
                    ..
                }
        )
    }

    fn info(&self) -> EntryInfo {
        let (mut attributes, size, reparse_tag) = match &self.kind {
            NodeKind::File(data) => (self.attributes, data.len() as u64, None),
            NodeKind::Directory => (self.attributes | FileAttributes::DIRECTORY, 0, None),
            NodeKind::Symlink { directory, .. } => {
                let mut attributes = self.attributes | FileAttributes::REPARSE_POINT;
                if *directory {
                    attributes |= FileAttributes::DIRECTORY;
                }
                (attributes, 0, Some(ReparseTag::Symlink))
            }
            NodeKind::MountPoint { .. } => (
                self.attributes | FileAttributes::DIRECTORY | FileAttributes::REPARSE_POINT,
                0,
                Some(ReparseTag::MountPoint),
            ),
        };
        if attributes.is_empty() {
            attributes = FileAttributes::NORMAL;
        }

        EntryInfo {
            attributes,
            size,
            allocated_size: size.div_ceil(CLUSTER_SIZE) * CLUSTER_SIZE,
            created: Some(self.created),
            accessed: Some(self.accessed),
            modified: Some(self.modified),
            reparse_tag,
        }
    }
}

/// One primitive call observed by [`MemoryFileSystem`].
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub operation: &'static str,
    pub path: String,
    pub transaction: Option<TransactionHandle>,
}

struct State {
    nodes: BTreeMap<String, Node>,
    volumes: Vec<String>,
    clock: i64,
    calls: Vec<CallRecord>,
    denied_listings: HashSet<String>,
    not_empty_once: HashMap<String, String>,
    chunk_size: usize,
}

fn key_of(path: &str) -> String {
    path.to_lowercase()
}

fn child_prefix(key: &str) -> String {
    if key.ends_with('\\') {
        key.to_string()
    } else {
        format!("{key}\\")
    }
}

fn display_name(path: &NormalizedPath) -> String {
    path.file_name().unwrap_or(path.as_str()).to_string()
}

impl State {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::from_timestamp(CLOCK_BASE + self.clock, 0).unwrap_or_default()
    }

    fn record(
        &mut self,
        operation: &'static str,
        path: &NormalizedPath,
        tx: Option<&TransactionHandle>,
    ) {
        self.calls.push(CallRecord {
            operation,
            path: path.to_string(),
            transaction: tx.cloned(),
        });
    }

    fn children<'s>(&'s self, key: &str) -> impl Iterator<Item = (&'s String, &'s Node)> + 's {
        let prefix = child_prefix(key);
        let prefix_len = prefix.len();
        self.nodes
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .filter(move |(k, _)| !k[prefix_len..].contains('\\'))
    }

    fn descendant_keys(&self, key: &str) -> Vec<String> {
        let prefix = child_prefix(key);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn parent_is_container(&self, path: &NormalizedPath) -> bool {
        path.parent()
            .and_then(|parent| self.nodes.get(&key_of(parent.as_str())))
            .is_some_and(Node::is_container)
    }

    /// Deepest volume root or mounted mount point above `key`.
    fn volume_of(&self, key: &str) -> String {
        let covers = |ancestor: &str| key == ancestor || key.starts_with(&child_prefix(ancestor));

        let mut best: Option<(usize, String)> = None;
        for root in &self.volumes {
            if covers(root) && best.as_ref().is_none_or(|(len, _)| root.len() > *len) {
                best = Some((root.len(), root.clone()));
            }
        }
        for (k, node) in &self.nodes {
            if let NodeKind::MountPoint {
                volume,
                mounted: true,
            } = &node.kind
                && key.starts_with(&child_prefix(k))
                && best.as_ref().is_none_or(|(len, _)| k.len() > *len)
            {
                best = Some((k.len(), key_of(volume)));
            }
        }
        best.map(|(_, volume)| volume).unwrap_or_default()
    }

    fn ensure_directories(&mut self, path: &NormalizedPath) -> Result<()> {
        let mut chain = Vec::new();
        let mut current = Some(path.clone());
        while let Some(p) = current {
            current = p.parent();
            chain.push(p);
        }

        for p in chain.into_iter().rev() {
            let key = key_of(p.as_str());
            match self.nodes.get(&key) {
                Some(node) if node.is_container() => {}
                Some(_) => return Err(FsError::already_exists(&p)),
                None if p.parent().is_none() => return Err(FsError::path_not_found(&p)),
                None => {
                    let now = self.tick();
                    self.nodes
                        .insert(key, Node::new(display_name(&p), NodeKind::Directory, now));
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, path: &NormalizedPath, kind: NodeKind) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_directories(&parent)?;
        }
        let now = self.tick();
        self.nodes
            .insert(key_of(path.as_str()), Node::new(display_name(path), kind, now));
        Ok(())
    }

    fn check_destination(&self, destination: &NormalizedPath, overwrite: bool) -> Result<()> {
        if !self.parent_is_container(destination) {
            return Err(FsError::path_not_found(destination));
        }
        if let Some(existing) = self.nodes.get(&key_of(destination.as_str())) {
            if !overwrite {
                return Err(FsError::already_exists(destination));
            }
            if existing.is_directory_like()
                || existing.attributes.contains(FileAttributes::READ_ONLY)
            {
                return Err(FsError::access_denied(destination));
            }
        }
        Ok(())
    }
}

struct MemoryListing {
    entries: std::vec::IntoIter<RawEntry>,
    open: Rc<Cell<usize>>,
}

impl Iterator for MemoryListing {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(Ok)
    }
}

impl Drop for MemoryListing {
    fn drop(&mut self) {
        self.open.set(self.open.get().saturating_sub(1));
    }
}

/// Deterministic [`FileSystem`] kept entirely in memory.
pub struct MemoryFileSystem {
    state: RefCell<State>,
    open_listings: Rc<Cell<usize>>,
}

impl MemoryFileSystem {
    /// Empty file system with a single `C:\` volume.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        let root = key_of(DEFAULT_VOLUME);
        nodes.insert(
            root.clone(),
            Node::new(
                DEFAULT_VOLUME.to_string(),
                NodeKind::Directory,
                DateTime::from_timestamp(CLOCK_BASE, 0).unwrap_or_default(),
            ),
        );

        Self {
            state: RefCell::new(State {
                nodes,
                volumes: vec![root],
                clock: 0,
                calls: Vec::new(),
                denied_listings: HashSet::new(),
                not_empty_once: HashMap::new(),
                chunk_size: DEFAULT_CHUNK_SIZE,
            }),
            open_listings: Rc::new(Cell::new(0)),
        }
    }

    /// Bytes per progress report during `copy_file`.
    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        self.state.borrow_mut().chunk_size = chunk_size.max(1);
        self
    }

    pub fn add_volume(&self, root: &str) -> Result<()> {
        let root = normalize(root, false)?;
        let key = key_of(root.as_str());
        let mut state = self.state.borrow_mut();
        let now = state.tick();
        state
            .nodes
            .insert(key.clone(), Node::new(root.to_string(), NodeKind::Directory, now));
        state.volumes.push(key);
        Ok(())
    }

    pub fn create_dir_all(&self, path: &str) -> Result<()> {
        let path = normalize(path, false)?;
        self.state.borrow_mut().ensure_directories(&path)
    }

    /// Create or replace a file, creating missing parents.
    pub fn write_file(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = normalize(path, false)?;
        self.state
            .borrow_mut()
            .insert(&path, NodeKind::File(data.into()))
    }

    pub fn add_symlink(&self, path: &str, target: &str, directory: bool) -> Result<()> {
        let path = normalize(path, false)?;
        self.state.borrow_mut().insert(
            &path,
            NodeKind::Symlink {
                target: target.to_string(),
                directory,
            },
        )
    }

    /// Mount `volume` at `path`. Files written below `path` afterwards live on `volume`.
    pub fn add_mount_point(&self, path: &str, volume: &str) -> Result<()> {
        let path = normalize(path, false)?;
        self.state.borrow_mut().insert(
            &path,
            NodeKind::MountPoint {
                volume: volume.to_string(),
                mounted: true,
            },
        )
    }

    pub fn set_read_only(&self, path: &str, read_only: bool) -> Result<()> {
        let path = normalize(path, false)?;
        let mut state = self.state.borrow_mut();
        let node = state
            .nodes
            .get_mut(&key_of(path.as_str()))
            .ok_or_else(|| FsError::file_not_found(&path))?;
        node.attributes.set(FileAttributes::READ_ONLY, read_only);
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        let path = normalize(path, false).ok()?;
        match &self.state.borrow().nodes.get(&key_of(path.as_str()))?.kind {
            NodeKind::File(data) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize(path, false)
            .is_ok_and(|p| self.state.borrow().nodes.contains_key(&key_of(p.as_str())))
    }

    /// Listing `path` fails with `AccessDenied` from now on.
    pub fn deny_listing(&self, path: &str) -> Result<()> {
        let path = normalize(path, false)?;
        self.state
            .borrow_mut()
            .denied_listings
            .insert(key_of(path.as_str()));
        Ok(())
    }

    /// The next removal of directory `path` creates file `intruder` inside it and
    /// fails with `DirectoryNotEmpty`, as if another process wrote there.
    pub fn fail_once_not_empty(&self, path: &str, intruder: &str) -> Result<()> {
        let path = normalize(path, false)?;
        self.state
            .borrow_mut()
            .not_empty_once
            .insert(key_of(path.as_str()), intruder.to_string());
        Ok(())
    }

    /// Listings handed out and not yet dropped.
    pub fn open_listings(&self) -> usize {
        self.open_listings.get()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFileSystem {
    fn list_children(
        &self,
        dir: &NormalizedPath,
        tx: Option<&TransactionHandle>,
    ) -> Result<Listing<'_>> {
        let mut state = self.state.borrow_mut();
        state.record("list_children", dir, tx);

        let key = key_of(dir.as_str());
        if state.denied_listings.contains(&key) {
            return Err(FsError::access_denied(dir));
        }
        let node = state
            .nodes
            .get(&key)
            .ok_or_else(|| FsError::path_not_found(dir))?;
        let listed = match &node.kind {
            NodeKind::Directory | NodeKind::MountPoint { .. } => key.clone(),
            NodeKind::Symlink {
                target,
                directory: true,
            } => key_of(target),
            _ => return Err(FsError::path_not_found(dir)),
        };

        let dot = node.info();
        let mut entries = vec![
            RawEntry {
                name: ".".to_string(),
                info: dot.clone(),
            },
            RawEntry {
                name: "..".to_string(),
                info: dot,
            },
        ];
        entries.extend(state.children(&listed).map(|(_, child)| RawEntry {
            name: child.name.clone(),
            info: child.info(),
        }));

        self.open_listings.set(self.open_listings.get() + 1);
        Ok(Box::new(MemoryListing {
            entries: entries.into_iter(),
            open: Rc::clone(&self.open_listings),
        }))
    }

    fn stat(
        &self,
        path: &NormalizedPath,
        tx: Option<&TransactionHandle>,
    ) -> Result<Option<EntryInfo>> {
        let mut state = self.state.borrow_mut();
        state.record("stat", path, tx);
        Ok(state.nodes.get(&key_of(path.as_str())).map(Node::info))
    }

    fn create_directory(
        &self,
        path: &NormalizedPath,
        template: Option<&NormalizedPath>,
        security: Option<&SecuritySnapshot>,
        tx: Option<&TransactionHandle>,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record("create_directory", path, tx);

        let key = key_of(path.as_str());
        if let Some(existing) = state.nodes.get(&key) {
            return if existing.kind == NodeKind::Directory || existing.is_container() {
                Ok(())
            } else {
                Err(FsError::already_exists(path))
            };
        }
        if !state.parent_is_container(path) {
            return Err(FsError::path_not_found(path));
        }

        let attributes = template
            .and_then(|t| state.nodes.get(&key_of(t.as_str())))
            .map(|t| t.attributes)
            .unwrap_or_default();
        let now = state.tick();
        let mut node = Node::new(display_name(path), NodeKind::Directory, now);
        node.attributes = attributes.difference(DERIVED);
        node.security = security.cloned();
        state.nodes.insert(key, node);
        Ok(())
    }

    fn delete_file(&self, path: &NormalizedPath, tx: Option<&TransactionHandle>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record("delete_file", path, tx);

        let key = key_of(path.as_str());
        let Some(node) = state.nodes.get(&key) else {
            return Err(if state.parent_is_container(path) {
                FsError::file_not_found(path)
            } else {
                FsError::path_not_found(path)
            });
        };
        if node.is_directory_like() || node.attributes.contains(FileAttributes::READ_ONLY) {
            return Err(FsError::access_denied(path));
        }
        state.nodes.remove(&key);
        Ok(())
    }

    fn delete_directory(
        &self,
        path: &NormalizedPath,
        tx: Option<&TransactionHandle>,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record("delete_directory", path, tx);

        let key = key_of(path.as_str());
        let node = state
            .nodes
            .get(&key)
            .ok_or_else(|| FsError::file_not_found(path))?;
        if node.attributes.contains(FileAttributes::READ_ONLY) {
            return Err(FsError::access_denied(path));
        }

        match node.kind {
            NodeKind::File(_) | NodeKind::Symlink {
                directory: false, ..
            } => return Err(FsError::path_not_found(path)),
            NodeKind::MountPoint { mounted: true, .. } => {
                return Err(FsError::access_denied(path));
            }
            NodeKind::Directory => {
                if let Some(intruder) = state.not_empty_once.remove(&key) {
                    let child = path.child(&intruder);
                    let now = state.tick();
                    state.nodes.insert(
                        key_of(child.as_str()),
                        Node::new(intruder, NodeKind::File(Vec::new()), now),
                    );
                    return Err(FsError::directory_not_empty(path));
                }
                if state.children(&key).next().is_some() {
                    return Err(FsError::directory_not_empty(path));
                }
            }
            NodeKind::Symlink { .. } | NodeKind::MountPoint { .. } => {}
        }

        state.nodes.remove(&key);
        Ok(())
    }

    fn copy_file(
        &self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        overwrite: bool,
        progress: &mut ProgressCallback<'_>,
        tx: Option<&TransactionHandle>,
    ) -> Result<FileOutcome> {
        let (node, chunk_size) = {
            let mut state = self.state.borrow_mut();
            state.record("copy_file", source, tx);
            let node = state
                .nodes
                .get(&key_of(source.as_str()))
                .cloned()
                .ok_or_else(|| FsError::file_not_found(source))?;
            state.check_destination(destination, overwrite)?;
            (node, state.chunk_size)
        };

        // The state borrow is released while the callback runs.
        let (kind, bytes) = match node.kind {
            NodeKind::Directory => return Err(FsError::access_denied(source)),
            NodeKind::File(data) => {
                let total_bytes = data.len() as u64;
                let mut transferred_bytes = 0u64;
                for piece in data.chunks(chunk_size) {
                    transferred_bytes += piece.len() as u64;
                    let action = progress(&FileProgress {
                        total_bytes,
                        transferred_bytes,
                    });
                    if action == ProgressAction::Cancel {
                        debug!("Copy of {} cancelled after {} bytes", source, transferred_bytes);
                        return Ok(FileOutcome::Aborted {
                            bytes: transferred_bytes,
                        });
                    }
                }
                (NodeKind::File(data), total_bytes)
            }
            NodeKind::Symlink { target, directory } => {
                (NodeKind::Symlink { target, directory }, 0)
            }
            NodeKind::MountPoint { volume, .. } => (
                NodeKind::Symlink {
                    target: volume,
                    directory: true,
                },
                0,
            ),
        };

        let mut state = self.state.borrow_mut();
        let now = state.tick();
        let mut copy = Node::new(display_name(destination), kind, now);
        copy.attributes = node.attributes;
        state.nodes.insert(key_of(destination.as_str()), copy);
        Ok(FileOutcome::Completed { bytes })
    }

    fn move_file(
        &self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        allow_copy_fallback: bool,
        progress: &mut ProgressCallback<'_>,
        tx: Option<&TransactionHandle>,
    ) -> Result<FileOutcome> {
        let src_key = key_of(source.as_str());
        let dst_key = key_of(destination.as_str());

        let node = {
            let mut state = self.state.borrow_mut();
            state.record("move_file", source, tx);
            let node = state
                .nodes
                .get(&src_key)
                .cloned()
                .ok_or_else(|| FsError::file_not_found(source))?;
            if state.nodes.contains_key(&dst_key) {
                return Err(FsError::already_exists(destination));
            }
            if !state.parent_is_container(destination) {
                return Err(FsError::path_not_found(destination));
            }

            if state.volume_of(&src_key) == state.volume_of(&dst_key) {
                let mut moved = vec![src_key.clone()];
                moved.extend(state.descendant_keys(&src_key));
                for key in moved {
                    if let Some(mut entry) = state.nodes.remove(&key) {
                        if key == src_key {
                            entry.name = display_name(destination);
                        }
                        let rekeyed = format!("{}{}", dst_key, &key[src_key.len()..]);
                        state.nodes.insert(rekeyed, entry);
                    }
                }
                drop(state);

                let bytes = node.info().size;
                let _ = progress(&FileProgress {
                    total_bytes: bytes,
                    transferred_bytes: bytes,
                });
                return Ok(FileOutcome::Completed { bytes });
            }
            node
        };

        if !allow_copy_fallback {
            return Err(FsError::CrossVolumeNotSupported {
                source_path: source.to_host_path(),
                destination: destination.to_host_path(),
            });
        }
        if node.is_container() {
            return Err(FsError::Unexpected {
                path: source.to_host_path(),
                source: io::Error::new(
                    io::ErrorKind::Unsupported,
                    "directory moves across volumes require a tree copy",
                ),
            });
        }

        match self.copy_file(source, destination, false, progress, tx)? {
            FileOutcome::Completed { bytes } => {
                if node.is_directory_like() {
                    self.delete_directory(source, tx)?;
                } else {
                    self.delete_file(source, tx)?;
                }
                Ok(FileOutcome::Completed { bytes })
            }
            aborted => Ok(aborted),
        }
    }

    fn set_attributes(
        &self,
        path: &NormalizedPath,
        attributes: FileAttributes,
        tx: Option<&TransactionHandle>,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record("set_attributes", path, tx);
        let node = state
            .nodes
            .get_mut(&key_of(path.as_str()))
            .ok_or_else(|| FsError::file_not_found(path))?;
        node.attributes = attributes.difference(DERIVED);
        Ok(())
    }

    fn set_times(
        &self,
        path: &NormalizedPath,
        times: &FileTimes,
        tx: Option<&TransactionHandle>,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record("set_times", path, tx);
        let node = state
            .nodes
            .get_mut(&key_of(path.as_str()))
            .ok_or_else(|| FsError::file_not_found(path))?;
        if let Some(created) = times.created {
            node.created = created;
        }
        if let Some(accessed) = times.accessed {
            node.accessed = accessed;
        }
        if let Some(modified) = times.modified {
            node.modified = modified;
        }
        Ok(())
    }

    fn unmount_reparse_point(&self, path: &NormalizedPath) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record("unmount_reparse_point", path, None);

        let key = key_of(path.as_str());
        let node = state
            .nodes
            .get_mut(&key)
            .ok_or_else(|| FsError::file_not_found(path))?;
        let NodeKind::MountPoint { mounted, .. } = &mut node.kind else {
            return Err(FsError::Unexpected {
                path: path.to_host_path(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a volume mount point"),
            });
        };
        *mounted = false;

        // The volume's content goes with it.
        for descendant in state.descendant_keys(&key) {
            state.nodes.remove(&descendant);
        }
        Ok(())
    }

    fn capture_security(&self, path: &NormalizedPath) -> Result<SecuritySnapshot> {
        let state = self.state.borrow();
        let node = state
            .nodes
            .get(&key_of(path.as_str()))
            .ok_or_else(|| FsError::file_not_found(path))?;
        Ok(node
            .security
            .clone()
            .unwrap_or_else(|| SecuritySnapshot::new(Vec::new())))
    }

    fn apply_security(&self, path: &NormalizedPath, snapshot: &SecuritySnapshot) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let node = state
            .nodes
            .get_mut(&key_of(path.as_str()))
            .ok_or_else(|| FsError::file_not_found(path))?;
        node.security = Some(snapshot.clone());
        Ok(())
    }

    fn same_volume(&self, a: &NormalizedPath, b: &NormalizedPath) -> bool {
        let state = self.state.borrow();
        state.volume_of(&key_of(a.as_str())) == state.volume_of(&key_of(b.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn np(raw: &str) -> NormalizedPath {
        normalize(raw, false).expect("normalize")
    }

    fn names(fs: &MemoryFileSystem, dir: &str) -> Vec<String> {
        fs.list_children(&np(dir), None)
            .expect("list")
            .map(|e| e.expect("entry").name)
            .collect()
    }

    fn continue_always(_: &FileProgress) -> ProgressAction {
        ProgressAction::Continue
    }

    #[test]
    fn test_listing_starts_with_dot_entries() {
        let fs = MemoryFileSystem::new();
        fs.write_file(r"C:\data\b.txt", "b").expect("write");
        fs.write_file(r"C:\data\A.txt", "a").expect("write");

        assert_eq!(names(&fs, r"C:\data"), [".", "..", "A.txt", "b.txt"]);
        assert_eq!(names(&fs, r"c:\DATA"), [".", "..", "A.txt", "b.txt"]);
    }

    #[test]
    fn test_listing_handle_released_on_drop() {
        let fs = MemoryFileSystem::new();
        fs.create_dir_all(r"C:\d").expect("mkdir");

        let listing = fs.list_children(&np(r"C:\d"), None).expect("list");
        assert_eq!(fs.open_listings(), 1);
        drop(listing);
        assert_eq!(fs.open_listings(), 0);
    }

    #[test]
    fn test_list_missing_directory() {
        let fs = MemoryFileSystem::new();
        let err = fs
            .list_children(&np(r"C:\missing"), None)
            .err()
            .expect("must fail");
        assert!(matches!(err, FsError::PathNotFound { .. }));
    }

    #[test]
    fn test_delete_read_only_file_is_denied() {
        let fs = MemoryFileSystem::new();
        fs.write_file(r"C:\ro.txt", "x").expect("write");
        fs.set_read_only(r"C:\ro.txt", true).expect("attr");

        let err = fs.delete_file(&np(r"C:\ro.txt"), None).expect_err("denied");
        assert!(matches!(err, FsError::AccessDenied { .. }));
    }

    #[test]
    fn test_delete_non_empty_directory() {
        let fs = MemoryFileSystem::new();
        fs.write_file(r"C:\d\f", "x").expect("write");

        let err = fs
            .delete_directory(&np(r"C:\d"), None)
            .expect_err("not empty");
        assert!(matches!(err, FsError::DirectoryNotEmpty { .. }));
    }

    #[test]
    fn test_fail_once_not_empty_adds_intruder() {
        let fs = MemoryFileSystem::new();
        fs.create_dir_all(r"C:\d").expect("mkdir");
        fs.fail_once_not_empty(r"C:\d", "late.tmp").expect("script");

        assert!(fs.delete_directory(&np(r"C:\d"), None).is_err());
        assert!(fs.exists(r"C:\d\late.tmp"));
    }

    #[test]
    fn test_copy_file_reports_chunks_and_cancels() {
        let fs = MemoryFileSystem::new().with_chunk_size(4);
        fs.write_file(r"C:\src.bin", vec![0u8; 10]).expect("write");

        let mut seen = Vec::new();
        let mut record = |p: &FileProgress| {
            seen.push(p.transferred_bytes);
            ProgressAction::Continue
        };
        let outcome = fs
            .copy_file(&np(r"C:\src.bin"), &np(r"C:\dst.bin"), false, &mut record, None)
            .expect("copy");
        assert_eq!(outcome, FileOutcome::Completed { bytes: 10 });
        assert_eq!(seen, [4, 8, 10]);

        let mut cancel = |_: &FileProgress| ProgressAction::Cancel;
        let outcome = fs
            .copy_file(&np(r"C:\src.bin"), &np(r"C:\other.bin"), false, &mut cancel, None)
            .expect("copy");
        assert_eq!(outcome, FileOutcome::Aborted { bytes: 4 });
        assert!(!fs.exists(r"C:\other.bin"));
    }

    #[test]
    fn test_move_within_volume_renames_subtree() {
        let fs = MemoryFileSystem::new();
        fs.write_file(r"C:\a\x\f.txt", "f").expect("write");

        fs.move_file(&np(r"C:\a"), &np(r"C:\b"), false, &mut continue_always, None)
            .expect("move");

        assert!(!fs.exists(r"C:\a"));
        assert_eq!(fs.read_file(r"C:\b\x\f.txt").as_deref(), Some(&b"f"[..]));
        assert_eq!(names(&fs, r"C:\"), [".", "..", "b"]);
    }

    #[test]
    fn test_move_across_volumes_requires_fallback() {
        let fs = MemoryFileSystem::new();
        fs.add_volume(r"D:\").expect("volume");
        fs.write_file(r"C:\f.txt", "f").expect("write");

        let err = fs
            .move_file(&np(r"C:\f.txt"), &np(r"D:\f.txt"), false, &mut continue_always, None)
            .expect_err("cross volume");
        assert!(matches!(err, FsError::CrossVolumeNotSupported { .. }));

        fs.move_file(&np(r"C:\f.txt"), &np(r"D:\f.txt"), true, &mut continue_always, None)
            .expect("fallback");
        assert!(!fs.exists(r"C:\f.txt"));
        assert!(fs.exists(r"D:\f.txt"));
    }

    #[test]
    fn test_mount_point_is_a_separate_volume() {
        let fs = MemoryFileSystem::new();
        fs.add_mount_point(r"C:\mnt", "Volume{data}").expect("mount");
        fs.write_file(r"C:\mnt\inner.txt", "v").expect("write");

        assert!(!fs.same_volume(&np(r"C:\mnt\inner.txt"), &np(r"C:\other")));
        assert!(fs.same_volume(&np(r"C:\mnt"), &np(r"C:\other")));

        fs.unmount_reparse_point(&np(r"C:\mnt")).expect("unmount");
        assert!(!fs.exists(r"C:\mnt\inner.txt"));
        fs.delete_directory(&np(r"C:\mnt"), None).expect("delete node");
        assert!(!fs.exists(r"C:\mnt"));
    }

    #[test]
    fn test_calls_record_transaction() {
        let fs = MemoryFileSystem::new();
        let tx = TransactionHandle::new("tx");
        fs.create_directory(&np(r"C:\t"), None, None, Some(&tx))
            .expect("create");

        let calls = fs.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, "create_directory");
        assert!(calls[0].transaction.as_ref().is_some_and(|t| t.ptr_eq(&tx)));
    }
}
