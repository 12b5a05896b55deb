// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File {
        content: Vec<u8>,
        executable: bool,
        /// Reads fail with an I/O error once this many bytes were served.
        fail_read_after: Option<usize>,
    },
    Dir,
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Paths on which `set_executable` fails.
    locked: HashSet<PathBuf>,
    /// Number of `create` calls per path.
    creates: HashMap<PathBuf, usize>,
}

/// In-memory filesystem for tests.
///
/// Parent directories are created implicitly whenever a file is added.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.insert_file(path.as_ref(), content.into(), false, None);
    }

    pub fn add_executable(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.insert_file(path.as_ref(), content.into(), true, None);
    }

    /// Add a file whose reads break after `fail_after` bytes, simulating an
    /// I/O error half-way through a copy.
    pub fn add_broken_file(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        fail_after: usize,
    ) {
        self.insert_file(path.as_ref(), content.into(), false, Some(fail_after));
    }

    /// Make `set_executable` fail for `path`.
    pub fn lock_permissions(&self, path: impl AsRef<Path>) {
        self.lock().locked.insert(path.as_ref().to_path_buf());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().entries.get(path.as_ref()) {
            Some(MockEntry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        matches!(self.lock().entries.get(path.as_ref()), Some(MockEntry::Dir))
    }

    /// How many times `path` was opened for writing.
    pub fn create_count(&self, path: impl AsRef<Path>) -> usize {
        self.lock().creates.get(path.as_ref()).copied().unwrap_or(0)
    }

    fn insert_file(
        &self,
        path: &Path,
        content: Vec<u8>,
        executable: bool,
        fail_read_after: Option<usize>,
    ) {
        let mut state = self.lock();
        if let Some(parent) = path.parent() {
            ensure_dirs(&mut state.entries, parent);
        }
        state.entries.insert(
            path.to_path_buf(),
            MockEntry::File {
                content,
                executable,
                fail_read_after,
            },
        );
    }
}

fn ensure_dirs(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        entries
            .entry(ancestor.to_path_buf())
            .or_insert(MockEntry::Dir);
    }
}

/// Reader that serves `content` and then fails, if configured to.
struct MockReader {
    inner: Cursor<Vec<u8>>,
    fail_after: Option<usize>,
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let served = self.inner.position() as usize;
        match self.fail_after {
            Some(limit) if served >= limit => Err(io::Error::other("simulated read failure")),
            Some(limit) => {
                let cap = (limit - served).min(buf.len());
                self.inner.read(&mut buf[..cap])
            }
            None => self.inner.read(buf),
        }
    }
}

/// Writer that appends straight into the shared map, so partially written
/// files stay visible after a failed copy.
struct MockWriter {
    state: Arc<Mutex<MockState>>,
    path: PathBuf,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        match state.entries.get_mut(&self.path) {
            Some(MockEntry::File { content, .. }) => {
                content.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file vanished: {:?}", self.path),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileSystem for MockFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        match self.lock().entries.get(path) {
            Some(MockEntry::File {
                content,
                fail_read_after,
                ..
            }) => Ok(Box::new(MockReader {
                inner: Cursor::new(content.clone()),
                fail_after: *fail_read_after,
            })),
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        {
            let mut state = self.lock();
            if matches!(state.entries.get(path), Some(MockEntry::Dir)) {
                return Err(anyhow!("Is a directory: {:?}", path));
            }
            *state.creates.entry(path.to_path_buf()).or_insert(0) += 1;
        }
        // Truncate; a freshly created file is not executable.
        self.insert_file(path, Vec::new(), false, None);
        Ok(Box::new(MockWriter {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File { .. }))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if matches!(state.entries.get(path), Some(MockEntry::File { .. })) {
            return Err(anyhow!("Not a directory: {:?}", path));
        }
        ensure_dirs(&mut state.entries, path);
        Ok(())
    }

    fn is_executable(&self, path: &Path) -> bool {
        matches!(
            self.lock().entries.get(path),
            Some(MockEntry::File {
                executable: true,
                ..
            })
        )
    }

    fn set_executable(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.locked.contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        match state.entries.get_mut(path) {
            Some(MockEntry::File { executable, .. }) => {
                *executable = true;
                Ok(())
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }
}
