//! Index-aligned storage of vectors and their documents.

use ahash::AHashSet;

use crate::error::{Result, TesseraError};
use crate::vector::core::document::{Document, DocumentId};
use crate::vector::core::vector::{validate_dimension, validate_vector};

/// Two parallel sequences: the vector at position `i` and the document at
/// position `i` form one record.
///
/// The sequences always have equal length and move in lockstep. All stored
/// vectors share one dimension, fixed by the first insert and released again
/// once the store becomes empty. Vectors are copied on insert, so callers
/// keep no alias into the store.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    vectors: Vec<Vec<f32>>,
    documents: Vec<Document>,
    ids: AHashSet<DocumentId>,
    dimension: Option<usize>,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-paired sequences, validating every
    /// invariant an incrementally built store would hold.
    pub fn from_parts(vectors: Vec<Vec<f32>>, documents: Vec<Document>) -> Result<Self> {
        if vectors.len() != documents.len() {
            return Err(TesseraError::corrupt_data(format!(
                "vector count {} does not match document count {}",
                vectors.len(),
                documents.len()
            )));
        }

        let mut store = RecordStore {
            vectors: Vec::with_capacity(vectors.len()),
            documents: Vec::with_capacity(documents.len()),
            ids: AHashSet::with_capacity(documents.len()),
            dimension: None,
        };
        for (vector, document) in vectors.into_iter().zip(documents) {
            store
                .push_owned(vector, document)
                .map_err(|e| TesseraError::corrupt_data(e.to_string()))?;
        }
        Ok(store)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Dimension shared by every stored vector, `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// All vectors in insertion order.
    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// All documents in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// The record at `position`.
    pub fn get(&self, position: usize) -> Option<(&[f32], &Document)> {
        let vector = self.vectors.get(position)?;
        let document = self.documents.get(position)?;
        Some((vector.as_slice(), document))
    }

    /// Iterate records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&[f32], &Document)> {
        self.vectors
            .iter()
            .map(Vec::as_slice)
            .zip(self.documents.iter())
    }

    /// Append a record, copying the vector. Returns its position.
    pub fn push(&mut self, vector: &[f32], document: Document) -> Result<usize> {
        self.push_owned(vector.to_vec(), document)
    }

    /// Append several records at once. Either every record is added or, on
    /// the first invalid one, none are.
    pub fn extend(&mut self, records: Vec<(Vec<f32>, Document)>) -> Result<()> {
        let mut dimension = self.dimension;
        let mut batch_ids = AHashSet::with_capacity(records.len());
        for (vector, document) in &records {
            validate_vector(vector)?;
            match dimension {
                Some(expected) => validate_dimension(vector, expected)?,
                None => dimension = Some(vector.len()),
            }
            if self.ids.contains(&document.id()) || !batch_ids.insert(document.id()) {
                return Err(TesseraError::invalid_argument(format!(
                    "Document {} is already stored",
                    document.id()
                )));
            }
        }

        self.vectors.reserve(records.len());
        self.documents.reserve(records.len());
        for (vector, document) in records {
            self.push_owned(vector, document)?;
        }
        Ok(())
    }

    fn push_owned(&mut self, vector: Vec<f32>, document: Document) -> Result<usize> {
        validate_vector(&vector)?;
        if let Some(dimension) = self.dimension {
            validate_dimension(&vector, dimension)?;
        }
        if self.ids.contains(&document.id()) {
            return Err(TesseraError::invalid_argument(format!(
                "Document {} is already stored",
                document.id()
            )));
        }

        self.dimension = Some(vector.len());
        self.ids.insert(document.id());
        self.vectors.push(vector);
        self.documents.push(document);
        Ok(self.documents.len() - 1)
    }

    /// Position of a document, matched by identity.
    pub fn position_of_document(&self, document: &Document) -> Option<usize> {
        if !self.ids.contains(&document.id()) {
            return None;
        }
        self.documents.iter().position(|d| d == document)
    }

    /// Position of the first vector equal in content to `vector`.
    pub fn position_of_vector(&self, vector: &[f32]) -> Option<usize> {
        self.vectors.iter().position(|v| v.as_slice() == vector)
    }

    /// Remove the record at `position` from both sequences.
    pub fn remove_at(&mut self, position: usize) -> Result<(Vec<f32>, Document)> {
        if position >= self.documents.len() {
            return Err(TesseraError::not_found(format!(
                "No record at position {} ({} records)",
                position,
                self.documents.len()
            )));
        }

        let vector = self.vectors.remove(position);
        let document = self.documents.remove(position);
        self.ids.remove(&document.id());
        if self.documents.is_empty() {
            self.dimension = None;
        }
        Ok((vector, document))
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.vectors.clear();
        self.documents.clear();
        self.ids.clear();
        self.dimension = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut store = RecordStore::new();
        let doc = Document::new("a");
        let position = store.push(&[1.0, 2.0], doc.clone()).unwrap();
        assert_eq!(position, 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.dimension(), Some(2));

        let (vector, stored) = store.get(0).unwrap();
        assert_eq!(vector, &[1.0f32, 2.0]);
        assert_eq!(stored, &doc);
    }

    #[test]
    fn test_push_copies_vector() {
        let mut store = RecordStore::new();
        let mut caller_vector: Vec<f32> = vec![1.0, 2.0];
        store.push(&caller_vector, Document::new("a")).unwrap();
        caller_vector[0] = 99.0;
        assert_eq!(store.vectors()[0], vec![1.0, 2.0]);
    }

    #[test]
    fn test_push_rejects_bad_vectors() {
        let mut store = RecordStore::new();
        assert!(store.push(&[], Document::new("empty")).is_err());
        store.push(&[1.0, 2.0], Document::new("a")).unwrap();
        assert!(store.push(&[1.0, 2.0, 3.0], Document::new("b")).is_err());
        assert!(store.push(&[f32::NAN, 1.0], Document::new("c")).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_push_rejects_duplicate_identity() {
        let mut store = RecordStore::new();
        let doc = Document::new("a");
        store.push(&[1.0], doc.clone()).unwrap();
        assert!(store.push(&[2.0], doc).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_extend_is_all_or_nothing() {
        let mut store = RecordStore::new();
        store.push(&[1.0, 2.0], Document::new("a")).unwrap();

        let bad = vec![
            (vec![3.0, 4.0], Document::new("b")),
            (vec![5.0], Document::new("c")),
        ];
        assert!(store.extend(bad).is_err());
        assert_eq!(store.len(), 1);

        let dup = Document::new("d");
        let duplicated = vec![(vec![3.0, 4.0], dup.clone()), (vec![5.0, 6.0], dup)];
        assert!(store.extend(duplicated).is_err());
        assert_eq!(store.len(), 1);

        let good = vec![
            (vec![3.0, 4.0], Document::new("b")),
            (vec![5.0, 6.0], Document::new("c")),
        ];
        store.extend(good).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.documents()[2].text(), "c");
    }

    #[test]
    fn test_remove_keeps_sequences_aligned() {
        let mut store = RecordStore::new();
        let a = Document::new("a");
        let b = Document::new("b");
        let c = Document::new("c");
        store.push(&[1.0], a.clone()).unwrap();
        store.push(&[2.0], b.clone()).unwrap();
        store.push(&[3.0], c.clone()).unwrap();

        let position = store.position_of_document(&b).unwrap();
        let (vector, removed) = store.remove_at(position).unwrap();
        assert_eq!(vector, vec![2.0]);
        assert_eq!(removed, b);

        assert_eq!(store.vectors(), &[vec![1.0f32], vec![3.0f32]]);
        assert_eq!(store.documents(), &[a, c]);
        assert!(store.position_of_document(&b).is_none());
    }

    #[test]
    fn test_position_of_vector_matches_content() {
        let mut store = RecordStore::new();
        store.push(&[1.0, 0.0], Document::new("a")).unwrap();
        store.push(&[0.0, 1.0], Document::new("b")).unwrap();
        assert_eq!(store.position_of_vector(&[0.0, 1.0]), Some(1));
        assert_eq!(store.position_of_vector(&[1.0, 1.0]), None);
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let mut store = RecordStore::new();
        assert!(store.remove_at(0).is_err());
    }

    #[test]
    fn test_dimension_resets_when_empty() {
        let mut store = RecordStore::new();
        store.push(&[1.0, 2.0], Document::new("a")).unwrap();
        store.clear();
        assert_eq!(store.dimension(), None);
        store.push(&[1.0, 2.0, 3.0], Document::new("b")).unwrap();
        assert_eq!(store.dimension(), Some(3));

        store.remove_at(0).unwrap();
        assert_eq!(store.dimension(), None);
    }

    #[test]
    fn test_from_parts_validates() {
        let docs = vec![Document::new("a"), Document::new("b")];
        let too_few = vec![vec![1.0]];
        assert!(RecordStore::from_parts(too_few, docs.clone()).is_err());
        let ragged = vec![vec![1.0], vec![1.0, 2.0]];
        assert!(RecordStore::from_parts(ragged, docs.clone()).is_err());

        let vectors = vec![vec![1.0], vec![2.0]];
        let store = RecordStore::from_parts(vectors, docs.clone()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.documents(), docs.as_slice());
    }
}
