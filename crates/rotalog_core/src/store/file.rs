//! File-based store for persistent logs.

use super::error::{StoreError, StoreResult};
use super::SegmentStore;
use crate::config::WriterConfig;
use crate::id::StateId;
use crate::rotation::RotationState;
use parking_lot::Mutex;
use rotalog_codec::{from_cbor, to_cbor, Document};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const SEGMENT_DIR: &str = "segments";
const SEGMENT_EXT: &str = "seg";
const STATE_FILE: &str = "rotation_state.cbor";
const FRAME_HEADER: usize = 4;

/// All rotation states of one database, keyed by tag.
type StateCollection = BTreeMap<String, RotationState>;

/// A store backed by a directory.
///
/// Layout under `<root>/<database>/`:
/// - `segments/<name>.seg`: append-only frames of `[len: u32 LE][CBOR document]`
/// - `rotation_state.cbor`: the metadata collection, rewritten atomically
///   (temp file, fsync, rename) on every change
///
/// # Thread Safety
///
/// Metadata read-modify-write runs under an in-process lock, which makes
/// `create_state` and `replace_state` atomic for every writer sharing this
/// instance. Nothing protects against a second process using the same
/// directory.
///
/// # Example
///
/// ```no_run
/// use rotalog_core::FileSegmentStore;
/// use std::path::Path;
///
/// let store = FileSegmentStore::open(Path::new("/var/log/app"), "rotalog").unwrap();
/// assert!(store.segment_names().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct FileSegmentStore {
    database: String,
    dir: PathBuf,
    segments_dir: PathBuf,
    state_path: PathBuf,
    state_lock: Mutex<()>,
    append_lock: Mutex<()>,
}

impl FileSegmentStore {
    /// Opens (creating if needed) the database directory `<root>/<database>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn open(root: &Path, database: &str) -> StoreResult<Self> {
        let dir = root.join(database);
        let segments_dir = dir.join(SEGMENT_DIR);
        fs::create_dir_all(&segments_dir)?;
        Ok(Self {
            database: database.to_string(),
            state_path: dir.join(STATE_FILE),
            dir,
            segments_dir,
            state_lock: Mutex::new(()),
            append_lock: Mutex::new(()),
        })
    }

    /// Opens the database directory named by `config.database_name` under
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn from_config(root: &Path, config: &WriterConfig) -> StoreResult<Self> {
        Self::open(root, &config.database_name)
    }

    /// The database directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `segment`.
    ///
    /// # Errors
    ///
    /// Returns an error if `segment` is not a plain file name.
    pub fn segment_path(&self, segment: &str) -> StoreResult<PathBuf> {
        let plain = !segment.is_empty()
            && !segment.starts_with('.')
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !plain {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid segment name {segment:?}"),
            )));
        }
        Ok(self
            .segments_dir
            .join(format!("{segment}.{SEGMENT_EXT}")))
    }

    /// Names of segments present on disk, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment directory cannot be listed.
    pub fn segment_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.segments_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Decodes every document in `segment`, in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the file ends mid-frame.
    pub fn read_segment(&self, segment: &str) -> StoreResult<Vec<Document>> {
        let bytes = match fs::read(self.segment_path(segment)?) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let header_end = offset + FRAME_HEADER;
            let Some(header) = bytes.get(offset..header_end) else {
                return Err(StoreError::corrupted(format!(
                    "{segment}: truncated frame header at offset {offset}"
                )));
            };
            let mut len = [0u8; FRAME_HEADER];
            len.copy_from_slice(header);
            let body_end = header_end + u32::from_le_bytes(len) as usize;
            let Some(body) = bytes.get(header_end..body_end) else {
                return Err(StoreError::corrupted(format!(
                    "{segment}: truncated frame body at offset {offset}"
                )));
            };
            docs.push(from_cbor(body)?);
            offset = body_end;
        }
        Ok(docs)
    }

    /// Size of the segment file on disk (0 if absent), frame headers included.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn segment_file_len(&self, segment: &str) -> StoreResult<u64> {
        match fs::metadata(self.segment_path(segment)?) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn read_states(&self) -> StoreResult<StateCollection> {
        match fs::read(&self.state_path) {
            Ok(bytes) => Ok(from_cbor(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StateCollection::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_states(&self, states: &StateCollection) -> StoreResult<()> {
        let bytes = to_cbor(states)?;
        let tmp = self.state_path.with_extension("cbor.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.state_path)?;
        Ok(())
    }
}

impl SegmentStore for FileSegmentStore {
    fn insert(&self, segment: &str, document: &Document) -> StoreResult<()> {
        let path = self.segment_path(segment)?;
        let body = to_cbor(document)?;
        let len = u32::try_from(body.len()).map_err(|_| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("document of {} bytes does not fit a frame", body.len()),
            ))
        })?;

        let mut frame = Vec::with_capacity(FRAME_HEADER + body.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&body);

        let _guard = self.append_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&frame)?;
        file.flush()?;
        Ok(())
    }

    fn drop_segment(&self, segment: &str) -> StoreResult<()> {
        let path = self.segment_path(segment)?;
        let _guard = self.append_lock.lock();
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_state(&self, tag: &str) -> StoreResult<Option<RotationState>> {
        let _guard = self.state_lock.lock();
        Ok(self.read_states()?.remove(tag))
    }

    fn create_state(&self, mut initial: RotationState) -> StoreResult<RotationState> {
        let _guard = self.state_lock.lock();
        let mut states = self.read_states()?;
        if states.contains_key(&initial.tag) {
            return Err(StoreError::AlreadyExists { tag: initial.tag });
        }
        initial.identity = StateId::generate();
        initial.version = 0;
        states.insert(initial.tag.clone(), initial.clone());
        self.write_states(&states)?;
        Ok(initial)
    }

    fn replace_state(
        &self,
        identity: StateId,
        expected_version: u64,
        state: &RotationState,
    ) -> StoreResult<u64> {
        let _guard = self.state_lock.lock();
        let mut states = self.read_states()?;
        let stored = states
            .values_mut()
            .find(|s| s.identity == identity)
            .ok_or(StoreError::StateNotFound { identity })?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict {
                identity,
                expected: expected_version,
                actual: stored.version,
            });
        }
        let mut next = state.clone();
        next.identity = identity;
        next.version = expected_version + 1;
        next.tag = stored.tag.clone();
        *stored = next;
        self.write_states(&states)?;
        Ok(expected_version + 1)
    }

    fn database_name(&self) -> Option<&str> {
        Some(&self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::SegmentRef;
    use rotalog_codec::FieldValue;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileSegmentStore) {
        let dir = TempDir::new().unwrap();
        let store = FileSegmentStore::open(dir.path(), "testdb").unwrap();
        (dir, store)
    }

    fn doc(n: i64) -> Document {
        let mut d = Document::new();
        d.insert("n".into(), FieldValue::from(n));
        d
    }

    fn initial(tag: &str) -> RotationState {
        RotationState::initial(tag, 1024, 3, SegmentRef::new("logs_1", 0))
    }

    #[test]
    fn file_open_creates_layout() {
        let (dir, store) = setup();
        assert_eq!(store.dir(), dir.path().join("testdb"));
        assert!(dir.path().join("testdb").join(SEGMENT_DIR).is_dir());
    }

    #[test]
    fn file_from_config_uses_configured_database() {
        let dir = TempDir::new().unwrap();
        let config = WriterConfig::new().database_name("audit");
        let store = FileSegmentStore::from_config(dir.path(), &config).unwrap();

        assert_eq!(store.database_name(), Some("audit"));
        assert_eq!(store.dir(), dir.path().join("audit"));
        store.insert("logs_1", &doc(1)).unwrap();
        assert!(dir
            .path()
            .join("audit")
            .join(SEGMENT_DIR)
            .join("logs_1.seg")
            .is_file());
    }

    #[test]
    fn file_insert_and_read_back() {
        let (_dir, store) = setup();
        for n in 0..5 {
            store.insert("logs_1", &doc(n)).unwrap();
        }
        let docs = store.read_segment("logs_1").unwrap();
        assert_eq!(docs, (0..5).map(doc).collect::<Vec<_>>());
        assert_eq!(store.segment_names().unwrap(), vec!["logs_1"]);
    }

    #[test]
    fn file_frame_overhead_is_header_only() {
        let (_dir, store) = setup();
        let d = doc(1234);
        let size = store.measure_size(&d).unwrap();
        store.insert("logs_1", &d).unwrap();
        assert_eq!(store.segment_file_len("logs_1").unwrap(), size + FRAME_HEADER as u64);
    }

    #[test]
    fn file_drop_segment() {
        let (_dir, store) = setup();
        store.insert("logs_1", &doc(1)).unwrap();
        store.insert("logs_2", &doc(2)).unwrap();
        store.drop_segment("logs_1").unwrap();
        assert_eq!(store.segment_names().unwrap(), vec!["logs_2"]);
        assert!(store.drop_segment("logs_1").is_ok());
    }

    #[test]
    fn file_rejects_path_like_segment_names() {
        let (_dir, store) = setup();
        assert!(store.insert("../escape", &doc(1)).is_err());
        assert!(store.insert("", &doc(1)).is_err());
        assert!(store.drop_segment("a/b").is_err());
    }

    #[test]
    fn file_truncated_segment_is_corrupted() {
        let (_dir, store) = setup();
        store.insert("logs_1", &doc(1)).unwrap();
        let path = store.segment_path("logs_1").unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();

        assert!(matches!(
            store.read_segment("logs_1"),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn file_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let created = {
            let store = FileSegmentStore::open(dir.path(), "testdb").unwrap();
            store.create_state(initial("t")).unwrap()
        };
        let store = FileSegmentStore::open(dir.path(), "testdb").unwrap();
        assert_eq!(store.load_state("t").unwrap(), Some(created));
    }

    #[test]
    fn file_create_duplicate_tag_fails() {
        let (_dir, store) = setup();
        store.create_state(initial("t")).unwrap();
        assert!(matches!(
            store.create_state(initial("t")),
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn file_replace_with_version_check() {
        let (_dir, store) = setup();
        let created = store.create_state(initial("t")).unwrap();
        let other = store.create_state(initial("u")).unwrap();

        let mut next = created.clone();
        next.current.size = 512;
        assert_eq!(store.replace_state(created.identity, 0, &next).unwrap(), 1);
        assert!(matches!(
            store.replace_state(created.identity, 0, &next),
            Err(StoreError::Conflict { actual: 1, .. })
        ));

        assert_eq!(store.load_state("t").unwrap().unwrap().current.size, 512);
        assert_eq!(store.load_state("u").unwrap(), Some(other));
    }

    #[test]
    fn file_corrupted_state_file() {
        let (dir, store) = setup();
        fs::write(dir.path().join("testdb").join(STATE_FILE), b"\xff\xff").unwrap();
        assert!(store.load_state("t").is_err());
    }
}
