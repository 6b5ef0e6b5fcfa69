//! In-memory dense vector index (§4.2): a flat matrix of unit vectors kept
//! alongside a `section_id <-> row` bijection, persisted as a raw float file
//! plus a JSON row-mapping file (grounded on the flat-file persistence
//! pattern used for embeddings elsewhere in this codebase — no separate
//! vector database, just a matrix and a mapping).

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct IndexMapping {
    dim: usize,
    content_hash: String,
    /// `rows[i]` is the `section_id` stored in matrix row `i`.
    rows: Vec<i64>,
}

/// A dense matrix of L2-normalized vectors, one row per indexed section.
pub struct VectorIndex {
    dim: usize,
    matrix: Vec<Vec<f32>>,
    row_of: HashMap<i64, usize>,
    rows: Vec<i64>,
}

impl VectorIndex {
    pub fn empty(dim: usize) -> Self {
        VectorIndex {
            dim,
            matrix: Vec::new(),
            row_of: HashMap::new(),
            rows: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn contains(&self, section_id: i64) -> bool {
        self.row_of.contains_key(&section_id)
    }

    /// Insert or replace the vector for `section_id`. Vectors must already
    /// be unit-length (§3: "fixed-dimension, L2-normalized").
    pub fn upsert(&mut self, section_id: i64, vector: Vec<f32>) -> EngineResult<()> {
        if vector.len() != self.dim {
            return Err(EngineError::InvalidInput(format!(
                "vector dim {} does not match index dim {}",
                vector.len(),
                self.dim
            )));
        }
        if let Some(&row) = self.row_of.get(&section_id) {
            self.matrix[row] = vector;
        } else {
            let row = self.matrix.len();
            self.matrix.push(vector);
            self.rows.push(section_id);
            self.row_of.insert(section_id, row);
        }
        Ok(())
    }

    /// Remove a set of sections (used on document deletion or re-ingest).
    /// Rebuilds the matrix compactly; §4.2 doesn't require O(1) deletes,
    /// only that stale vectors never surface in a search.
    pub fn remove_many(&mut self, section_ids: &[i64]) {
        let drop: std::collections::HashSet<i64> = section_ids.iter().copied().collect();
        if drop.is_empty() {
            return;
        }
        let mut new_matrix = Vec::with_capacity(self.matrix.len());
        let mut new_rows = Vec::with_capacity(self.rows.len());
        for (row, &section_id) in self.rows.iter().enumerate() {
            if !drop.contains(&section_id) {
                new_matrix.push(std::mem::take(&mut self.matrix[row]));
                new_rows.push(section_id);
            }
        }
        self.matrix = new_matrix;
        self.rows = new_rows;
        self.row_of = self
            .rows
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();
    }

    /// Cosine similarity against every indexed vector, since both the
    /// query and index vectors are unit-length this is a plain dot product
    /// (§4.7: "cosine similarity; since vectors are unit-length this is
    /// just the inner product"). Returns `(section_id, similarity)` pairs,
    /// unsorted.
    pub fn similarities(&self, query: &[f32]) -> Vec<(i64, f32)> {
        self.matrix
            .iter()
            .zip(self.rows.iter())
            .map(|(v, &section_id)| (section_id, dot(v, query)))
            .collect()
    }

    /// Write the matrix and mapping atomically: each is written to a
    /// sibling temp file first and renamed into place, so a crash mid-write
    /// never leaves a torn or mismatched pair on disk (§4.3).
    pub fn persist(&self, matrix_path: &Path, mapping_path: &Path) -> EngineResult<()> {
        let mut bytes = Vec::with_capacity(self.matrix.len() * self.dim * 4);
        for v in &self.matrix {
            for f in v {
                bytes.extend_from_slice(&f.to_le_bytes());
            }
        }

        let mapping = IndexMapping {
            dim: self.dim,
            content_hash: content_hash(&bytes),
            rows: self.rows.clone(),
        };
        let json = serde_json::to_vec_pretty(&mapping)
            .map_err(|e| EngineError::Store(format!("serializing vector mapping: {e}")))?;

        write_atomically(matrix_path, &bytes)
            .map_err(|e| EngineError::Store(format!("writing vector matrix: {e}")))?;
        write_atomically(mapping_path, &json)
            .map_err(|e| EngineError::Store(format!("writing vector mapping: {e}")))?;
        Ok(())
    }

    /// Load a persisted index, verifying the matrix file's content hash
    /// against the one recorded in the mapping file (§4.2: drift between
    /// the matrix and the mapping must be detected at startup, not
    /// silently served).
    pub fn load(matrix_path: &Path, mapping_path: &Path) -> EngineResult<Self> {
        let bytes = std::fs::read(matrix_path)
            .map_err(|e| EngineError::Store(format!("reading vector matrix: {e}")))?;
        let mapping_json = std::fs::read(mapping_path)
            .map_err(|e| EngineError::Store(format!("reading vector mapping: {e}")))?;
        let mapping: IndexMapping = serde_json::from_slice(&mapping_json)
            .map_err(|e| EngineError::Store(format!("parsing vector mapping: {e}")))?;

        let actual_hash = content_hash(&bytes);
        if actual_hash != mapping.content_hash {
            return Err(EngineError::Store(
                "vector matrix file does not match its mapping (content hash mismatch); rebuild required".to_string(),
            ));
        }

        let row_width = mapping.dim * 4;
        if mapping.dim == 0 || bytes.len() != mapping.rows.len() * row_width {
            return Err(EngineError::Store(
                "vector matrix file size does not match its mapping row count".to_string(),
            ));
        }

        let mut matrix = Vec::with_capacity(mapping.rows.len());
        for chunk in bytes.chunks_exact(row_width) {
            let v: Vec<f32> = chunk
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            matrix.push(v);
        }

        let row_of = mapping
            .rows
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();

        Ok(VectorIndex {
            dim: mapping.dim,
            matrix,
            row_of,
            rows: mapping.rows,
        })
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn content_hash(bytes: &[u8]) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(bytes))
}

/// Write `bytes` to a `.tmp` sibling of `path` and rename it into place.
/// The rename is atomic on the same filesystem, so readers only ever see
/// the old file or the fully-written new one, never a partial write.
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
