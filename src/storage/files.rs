//! The two-file on-disk layout of a single index.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::{Result, TesseraError};
use crate::storage::PersistenceConfig;
use crate::storage::codec::{read_frame, write_frame};
use crate::vector::core::document::Document;
use crate::vector::store::RecordStore;

/// File holding the vectors of an index.
pub const VECTORS_FILE: &str = "vectors.bin";

/// File holding the documents of an index.
pub const DOCUMENTS_FILE: &str = "documents.bin";

/// Frame magic of [`VECTORS_FILE`].
pub const VECTORS_MAGIC: [u8; 4] = *b"TSVV";

/// Frame magic of [`DOCUMENTS_FILE`].
pub const DOCUMENTS_MAGIC: [u8; 4] = *b"TSVD";

const TEMP_SUFFIX: &str = ".tmp";

/// Directory holding the files of index `name` under `root`.
pub fn index_dir(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

/// Write `store` to `<root>/<name>/`, creating the directory if needed.
///
/// Both files are first written next to their final names and synced, then
/// renamed into place. A crash between the two renames can still leave one
/// old and one new file; the record-count check on load rejects that pair
/// whenever the counts differ.
pub fn save_store(
    root: &Path,
    name: &str,
    store: &RecordStore,
    config: &PersistenceConfig,
) -> Result<PathBuf> {
    let dir = index_dir(root, name);
    fs::create_dir_all(&dir)?;

    let vectors = encode_vectors(store, config)?;
    let documents = encode_documents(store.documents(), config)?;

    let vectors_path = dir.join(VECTORS_FILE);
    let documents_path = dir.join(DOCUMENTS_FILE);
    let vectors_tmp = write_temp(&vectors_path, &vectors)?;
    let documents_tmp = match write_temp(&documents_path, &documents) {
        Ok(path) => path,
        Err(e) => {
            let _ = fs::remove_file(&vectors_tmp);
            return Err(e);
        }
    };

    fs::rename(&vectors_tmp, &vectors_path)?;
    fs::rename(&documents_tmp, &documents_path)?;

    debug!(
        dir = %dir.display(),
        records = store.len(),
        vector_bytes = vectors.len(),
        document_bytes = documents.len(),
        "wrote index files"
    );
    Ok(dir)
}

/// Read the store persisted at `<root>/<name>/`.
pub fn load_store(root: &Path, name: &str, config: &PersistenceConfig) -> Result<RecordStore> {
    let dir = index_dir(root, name);
    if !dir.is_dir() {
        return Err(TesseraError::not_found(format!(
            "Directory {} not found",
            dir.display()
        )));
    }

    let vectors = decode_vectors(&mut open(&dir.join(VECTORS_FILE))?, config)?;
    let documents = decode_documents(&mut open(&dir.join(DOCUMENTS_FILE))?, config)?;
    RecordStore::from_parts(vectors, documents)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(TesseraError::not_found(format!(
            "File {} not found",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TEMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    let file = File::create(&tmp)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(tmp)
}

fn encode_vectors(store: &RecordStore, config: &PersistenceConfig) -> Result<Vec<u8>> {
    let arity = store.dimension().unwrap_or(0);
    let arity = u32::try_from(arity)
        .map_err(|_| {
            TesseraError::invalid_argument("vector dimension does not fit in u32")
        })?;

    let mut payload = vec![0u8; store.len() * arity as usize * 4];
    for (chunk, vector) in payload
        .chunks_exact_mut(arity.max(1) as usize * 4)
        .zip(store.vectors())
    {
        LittleEndian::write_f32_into(vector, chunk);
    }

    let mut out = Vec::new();
    write_frame(
        &mut out,
        VECTORS_MAGIC,
        store.len() as u64,
        arity,
        &payload,
        config.block_size,
    )?;
    Ok(out)
}

fn decode_vectors<R: io::Read>(input: &mut R, config: &PersistenceConfig) -> Result<Vec<Vec<f32>>> {
    let (header, payload) = read_frame(input, VECTORS_MAGIC, config)?;

    if header.record_count != 0 && header.arity == 0 {
        return Err(TesseraError::corrupt_data("vectors with zero dimensions"));
    }
    let expected_len = header
        .record_count
        .checked_mul(header.arity as u64)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| TesseraError::corrupt_data("vector header overflows"))?;
    if expected_len != payload.len() as u64 {
        return Err(TesseraError::corrupt_data(format!(
            "{} vectors of dimension {} need {} bytes, payload holds {}",
            header.record_count,
            header.arity,
            expected_len,
            payload.len()
        )));
    }

    if header.record_count == 0 {
        return Ok(Vec::new());
    }

    let row_bytes = header.arity as usize * 4;
    Ok(payload
        .chunks_exact(row_bytes)
        .map(|chunk| {
            let mut vector = vec![0.0f32; header.arity as usize];
            LittleEndian::read_f32_into(chunk, &mut vector);
            vector
        })
        .collect())
}

fn encode_documents(documents: &[Document], config: &PersistenceConfig) -> Result<Vec<u8>> {
    let payload = bincode::DefaultOptions::new().serialize(documents)?;

    let mut out = Vec::new();
    write_frame(
        &mut out,
        DOCUMENTS_MAGIC,
        documents.len() as u64,
        0,
        &payload,
        config.block_size,
    )?;
    Ok(out)
}

fn decode_documents<R: io::Read>(
    input: &mut R,
    config: &PersistenceConfig,
) -> Result<Vec<Document>> {
    let (header, payload) = read_frame(input, DOCUMENTS_MAGIC, config)?;

    // The limit equals the payload length, so running past it means the
    // payload lies about its own structure.
    let documents: Vec<Document> = bincode::DefaultOptions::new()
        .with_limit(payload.len() as u64)
        .deserialize(&payload)
        .map_err(|e| {
            TesseraError::corrupt_data(format!("malformed document payload: {e}"))
        })?;
    if documents.len() as u64 != header.record_count {
        return Err(TesseraError::corrupt_data(format!(
            "header declares {} documents, payload holds {}",
            header.record_count,
            documents.len()
        )));
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample_store() -> RecordStore {
        let mut store = RecordStore::new();
        store.push(&[1.0, 0.0, -2.5], Document::new("a")).unwrap();
        let sourced = Document::with_source("b", "notes.md", Some(4));
        store.push(&[0.25, 1.0, 3.0], sourced).unwrap();
        store
    }

    #[test]
    fn test_save_then_load_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig::default();
        let store = sample_store();

        let written = save_store(dir.path(), "idx", &store, &config).unwrap();
        assert!(written.join(VECTORS_FILE).is_file());
        assert!(written.join(DOCUMENTS_FILE).is_file());
        assert!(!written.join("vectors.bin.tmp").exists());

        let loaded = load_store(dir.path(), "idx", &config).unwrap();
        assert_eq!(loaded.vectors(), store.vectors());
        assert_eq!(loaded.documents(), store.documents());
        let sourced = &loaded.documents()[1];
        assert_eq!(sourced.source_path.as_deref(), Some("notes.md"));
        assert_eq!(sourced.line_number, Some(4));
    }

    #[test]
    fn test_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig::default();
        save_store(dir.path(), "empty", &RecordStore::new(), &config).unwrap();
        let loaded = load_store(dir.path(), "empty", &config).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension(), None);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_store(dir.path(), "absent", &PersistenceConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig::default();
        let written = save_store(dir.path(), "idx", &sample_store(), &config).unwrap();
        fs::remove_file(written.join(DOCUMENTS_FILE)).unwrap();
        let err = load_store(dir.path(), "idx", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_mismatched_counts_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig::default();
        let written = save_store(dir.path(), "idx", &sample_store(), &config).unwrap();

        let mut smaller = RecordStore::new();
        smaller
            .push(&[1.0, 1.0, 1.0], Document::new("only"))
            .unwrap();
        let other = save_store(dir.path(), "other", &smaller, &config).unwrap();
        fs::copy(other.join(DOCUMENTS_FILE), written.join(DOCUMENTS_FILE)).unwrap();

        let err = load_store(dir.path(), "idx", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_swapped_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig::default();
        let written = save_store(dir.path(), "idx", &sample_store(), &config).unwrap();
        fs::copy(written.join(VECTORS_FILE), written.join(DOCUMENTS_FILE)).unwrap();

        let err = load_store(dir.path(), "idx", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_garbage_documents_rejected() {
        let config = PersistenceConfig::default();
        let mut bytes = Vec::new();
        let (garbage, block_size) = ([0xFF; 32], config.block_size);
        write_frame(&mut bytes, DOCUMENTS_MAGIC, 1, 0, &garbage, block_size).unwrap();
        let err = decode_documents(&mut io::Cursor::new(bytes), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_vector_header_must_match_payload() {
        let config = PersistenceConfig::default();
        let mut bytes = Vec::new();
        // claims 3 vectors of dimension 2 but carries only 8 bytes
        let short = [0u8; 8];
        write_frame(&mut bytes, VECTORS_MAGIC, 3, 2, &short, config.block_size).unwrap();
        let err = decode_vectors(&mut io::Cursor::new(bytes), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }
}
