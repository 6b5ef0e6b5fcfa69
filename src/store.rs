//! Persistent Store (§4.1): documents, sections, and a mirrored FTS5 virtual
//! table in one SQLite file. WAL journaling is turned on so concurrent reader
//! connections never block a writer's commit and vice versa (§5's
//! "read-read never blocks, write is exclusive" is the contract; WAL is how a
//! single SQLite file actually delivers it without a connection pool crate).
//!
//! The write path (`upsert_document`, `delete_document`) goes through one
//! long-lived connection guarded by a mutex. Reads open a short-lived
//! connection per call — cheap against an already-warm OS page cache, and it
//! means read callers never queue behind each other the way a shared `&mut
//! Connection` would force them to.

use crate::error::{EngineError, EngineResult};
use crate::model::{normalize_facets, normalize_priority, DocumentHeader, DocumentInput, Section};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub struct Store {
    db_path: PathBuf,
    write_conn: Mutex<Connection>,
}

impl Store {
    pub fn open(db_path: &Path) -> EngineResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::Store(format!("creating data dir: {e}")))?;
        }
        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;
        Ok(Store {
            db_path: db_path.to_path_buf(),
            write_conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for tests and for the `/nonexistent` startup-rebuild path.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Store {
            db_path: PathBuf::from(":memory:"),
            write_conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> EngineResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE IF NOT EXISTS documents (
                 name TEXT PRIMARY KEY,
                 display_name TEXT NOT NULL,
                 version TEXT NOT NULL,
                 base_url TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS sections (
                 section_id INTEGER PRIMARY KEY AUTOINCREMENT,
                 doc_name TEXT NOT NULL REFERENCES documents(name),
                 title TEXT NOT NULL,
                 path TEXT NOT NULL,
                 url TEXT NOT NULL,
                 priority INTEGER NOT NULL,
                 keywords_json TEXT NOT NULL,
                 use_cases_json TEXT NOT NULL,
                 tags_json TEXT NOT NULL,
                 content TEXT NOT NULL,
                 UNIQUE(doc_name, path)
             );
             CREATE VIRTUAL TABLE IF NOT EXISTS sections_fts USING fts5(
                 title, keywords, use_cases, tags, content,
                 tokenize='porter unicode61'
             );",
        )?;
        Ok(())
    }

    /// Run `f` against a connection suitable for reads. File-backed stores
    /// open a fresh short-lived connection (WAL lets it run alongside the
    /// writer without blocking); the in-memory store has only one connection
    /// to offer, so reads briefly share the write lock.
    fn with_read<T>(&self, f: impl FnOnce(&Connection) -> EngineResult<T>) -> EngineResult<T> {
        if self.db_path == Path::new(":memory:") {
            let conn = self.write_conn.lock();
            f(&conn)
        } else {
            let conn = Connection::open(&self.db_path)?;
            f(&conn)
        }
    }

    /// Atomic re-ingest (§4.1): purge all rows for `doc.name`, insert the new
    /// ones, rebuild FTS rows, all in one transaction. Returns assigned
    /// `section_id`s in section order.
    pub fn upsert_document(&self, doc: &DocumentInput) -> EngineResult<Vec<i64>> {
        let mut conn = self.write_conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| EngineError::Ingest(e.to_string()))?;

        purge_document(&tx, &doc.name).map_err(|e| EngineError::Ingest(e.to_string()))?;

        tx.execute(
            "INSERT INTO documents (name, display_name, version, base_url) VALUES (?1, ?2, ?3, ?4)",
            params![doc.name, doc.display_name, doc.version, doc.base_url],
        )
        .map_err(|e| EngineError::Ingest(e.to_string()))?;

        let mut ids = Vec::with_capacity(doc.sections.len());
        for s in &doc.sections {
            let keywords = normalize_facets(&s.keywords);
            let use_cases = normalize_facets(&s.use_cases);
            let tags = normalize_facets(&s.tags);
            let priority = normalize_priority(s.priority);

            let keywords_json = serde_json::to_string(&keywords).unwrap();
            let use_cases_json = serde_json::to_string(&use_cases).unwrap();
            let tags_json = serde_json::to_string(&tags).unwrap();

            tx.execute(
                "INSERT INTO sections
                    (doc_name, title, path, url, priority, keywords_json, use_cases_json, tags_json, content)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    doc.name, s.title, s.path, s.url, priority, keywords_json, use_cases_json,
                    tags_json, s.content
                ],
            )
            .map_err(|e| EngineError::Ingest(e.to_string()))?;

            let section_id = tx.last_insert_rowid();
            ids.push(section_id);

            tx.execute(
                "INSERT INTO sections_fts (rowid, title, keywords, use_cases, tags, content)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    section_id,
                    s.title,
                    keywords.join(" "),
                    use_cases.join(" "),
                    tags.join(" "),
                    s.content
                ],
            )
            .map_err(|e| EngineError::Ingest(e.to_string()))?;
        }

        tx.commit().map_err(|e| EngineError::Ingest(e.to_string()))?;
        Ok(ids)
    }

    /// Purge a document and return the `section_id`s that were removed, so
    /// the caller can tombstone the VectorIndex in step.
    pub fn delete_document(&self, name: &str) -> EngineResult<Vec<i64>> {
        let mut conn = self.write_conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| EngineError::Store(e.to_string()))?;
        let ids = purge_document(&tx, name).map_err(|e| EngineError::Store(e.to_string()))?;
        tx.commit().map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(ids)
    }

    pub fn get_section(&self, section_id: i64) -> EngineResult<Section> {
        self.with_read(|conn| {
            conn.query_row(
                "SELECT section_id, doc_name, title, path, url, priority,
                        keywords_json, use_cases_json, tags_json, content
                 FROM sections WHERE section_id = ?1",
                params![section_id],
                row_to_section,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    EngineError::NotFound(format!("section {section_id}"))
                }
                other => EngineError::Store(other.to_string()),
            })
        })
    }

    pub fn section_exists(&self, section_id: i64) -> bool {
        self.get_section(section_id).is_ok()
    }

    pub fn list_documents(&self) -> EngineResult<Vec<DocumentHeader>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.name, d.display_name, d.version, COUNT(s.section_id)
                 FROM documents d LEFT JOIN sections s ON s.doc_name = d.name
                 GROUP BY d.name ORDER BY d.name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(DocumentHeader {
                    name: row.get(0)?,
                    display_name: row.get(1)?,
                    version: row.get(2)?,
                    sections: row.get::<_, i64>(3)? as usize,
                })
            })?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r.map_err(|e| EngineError::Store(e.to_string()))?);
            }
            Ok(out)
        })
    }

    /// Stable iteration order `(doc_name, section_id)` (§4.1).
    pub fn iter_sections(&self) -> EngineResult<Vec<Section>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT section_id, doc_name, title, path, url, priority,
                        keywords_json, use_cases_json, tags_json, content
                 FROM sections ORDER BY doc_name ASC, section_id ASC",
            )?;
            let rows = stmt.query_map([], row_to_section)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r.map_err(|e| EngineError::Store(e.to_string()))?);
            }
            Ok(out)
        })
    }

    pub fn iter_sections_for_doc(&self, doc_name: &str) -> EngineResult<Vec<Section>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT section_id, doc_name, title, path, url, priority,
                        keywords_json, use_cases_json, tags_json, content
                 FROM sections WHERE doc_name = ?1 ORDER BY section_id ASC",
            )?;
            let rows = stmt.query_map(params![doc_name], row_to_section)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r.map_err(|e| EngineError::Store(e.to_string()))?);
            }
            Ok(out)
        })
    }

    /// BM25 search against `sections_fts`, optionally scoped to `doc_name`.
    /// Returns `(section_id, bm25_rank)` pairs — lower rank is better, per
    /// SQLite's `bm25()` convention (negative, more negative = more relevant).
    pub fn fts_search(
        &self,
        query: &str,
        doc_name: Option<&str>,
        limit: usize,
    ) -> EngineResult<Vec<(i64, f64)>> {
        self.with_read(|conn| {
            let sql = match doc_name {
                Some(_) => {
                    "SELECT f.rowid, bm25(sections_fts) FROM sections_fts f
                     JOIN sections s ON s.section_id = f.rowid
                     WHERE sections_fts MATCH ?1 AND s.doc_name = ?2
                     ORDER BY bm25(sections_fts) LIMIT ?3"
                }
                None => {
                    "SELECT f.rowid, bm25(sections_fts) FROM sections_fts f
                     WHERE sections_fts MATCH ?1
                     ORDER BY bm25(sections_fts) LIMIT ?2"
                }
            };
            let mut stmt = conn.prepare(sql)?;
            let rows_result = match doc_name {
                Some(d) => stmt
                    .query_map(params![fts_query(query), d, limit as i64], |r| {
                        Ok((r.get::<_, i64>(0)?, r.get::<_, f64>(1)?))
                    })
                    .map(|rows| rows.collect::<Vec<_>>()),
                None => stmt
                    .query_map(params![fts_query(query), limit as i64], |r| {
                        Ok((r.get::<_, i64>(0)?, r.get::<_, f64>(1)?))
                    })
                    .map(|rows| rows.collect::<Vec<_>>()),
            };
            match rows_result {
                Ok(rows) => {
                    let mut out = Vec::new();
                    for r in rows {
                        out.push(r.map_err(|e| EngineError::Store(e.to_string()))?);
                    }
                    Ok(out)
                }
                // A MATCH query with no tokens (e.g. pure punctuation) is a
                // syntax error to FTS5, not a genuine store fault — treat it
                // as "no candidates".
                Err(rusqlite::Error::SqliteFailure(_, _)) => Ok(Vec::new()),
                Err(e) => Err(EngineError::Store(e.to_string())),
            }
        })
    }
}

/// FTS5 treats bare `-`, `"` etc. as query syntax. Quote each token so the
/// raw query string can never be misparsed as FTS5 operators (§4.6 "using
/// the raw query string" — raw from the caller's point of view, but the
/// Store still has to hand SQLite something syntactically valid).
fn fts_query(query: &str) -> String {
    crate::tokenize::tokenize(query)
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn purge_document(conn: &rusqlite::Connection, name: &str) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT section_id FROM sections WHERE doc_name = ?1")?;
    let ids: Vec<i64> = stmt
        .query_map(params![name], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    drop(stmt);

    for id in &ids {
        conn.execute("DELETE FROM sections_fts WHERE rowid = ?1", params![id])?;
    }
    conn.execute("DELETE FROM sections WHERE doc_name = ?1", params![name])?;
    conn.execute("DELETE FROM documents WHERE name = ?1", params![name])?;
    Ok(ids)
}

fn row_to_section(row: &rusqlite::Row) -> rusqlite::Result<Section> {
    let keywords_json: String = row.get(6)?;
    let use_cases_json: String = row.get(7)?;
    let tags_json: String = row.get(8)?;
    Ok(Section {
        section_id: row.get(0)?,
        doc_name: row.get(1)?,
        title: row.get(2)?,
        path: row.get(3)?,
        url: row.get(4)?,
        priority: row.get(5)?,
        keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
        use_cases: serde_json::from_str(&use_cases_json).unwrap_or_default(),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        content: row.get(9)?,
    })
}
