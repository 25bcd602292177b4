//! aegis-memory
//!
//! Embedded full-text index over agent workspace markdown. Files are split
//! into fixed-size line chunks and indexed in SQLite FTS5; `search` returns
//! bm25-ranked snippets with line ranges so prompts can cite exact lines.
//! The connection is process-lifetime and mutex-guarded.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const CHUNK_SIZE: usize = 12;

/// One search hit: a chunk of a workspace file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySearchResult {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
    pub score: f64,
    pub source: String,
}

pub struct MemoryIndex {
    conn: Mutex<Connection>,
}

impl MemoryIndex {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("open memory index {:?}", db_path))?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Walk a workspace and (re)index every markdown file, sorted by path.
    pub fn index_workspace(&self, workspace_dir: impl AsRef<Path>) -> Result<usize> {
        let mut files = Vec::new();
        collect_markdown_files(workspace_dir.as_ref(), &mut files)?;
        files.sort();

        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for file in &files {
            reindex_file(&conn, file)?;
        }
        Ok(files.len())
    }

    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<MemorySearchResult>> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut statement = conn
            .prepare(
                "SELECT c.path, c.start_line, c.end_line, c.snippet, bm25(chunks_fts) AS rank
                 FROM chunks_fts
                 JOIN chunks c ON chunks_fts.rowid = c.id
                 WHERE chunks_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )
            .context("prepare memory search")?;

        let rows = statement
            .query_map(
                rusqlite::params![normalized, max_results as i64],
                |row| {
                    let rank: f64 = row.get(4)?;
                    Ok(MemorySearchResult {
                        path: row.get(0)?,
                        start_line: row.get::<_, i64>(1)? as usize,
                        end_line: row.get::<_, i64>(2)? as usize,
                        snippet: row.get(3)?,
                        score: 1.0 / (1.0 + rank.abs()),
                        source: "fts".to_string(),
                    })
                },
            )
            .context("run memory search")?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.context("read memory search row")?);
        }
        Ok(results)
    }
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS chunks (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           path TEXT NOT NULL,
           start_line INTEGER NOT NULL,
           end_line INTEGER NOT NULL,
           snippet TEXT NOT NULL
         )",
        [],
    )
    .context("create chunks table")?;
    conn.execute(
        "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts
         USING fts5(snippet, content='chunks', content_rowid='id')",
        [],
    )
    .context("create chunks fts table")?;
    Ok(())
}

fn reindex_file(conn: &Connection, file_path: &PathBuf) -> Result<()> {
    let path_key = file_path.display().to_string();
    delete_chunks_for_path(conn, &path_key)?;

    let content = fs::read_to_string(file_path)
        .with_context(|| format!("read workspace file {:?}", file_path))?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Ok(());
    }

    let mut start = 0usize;
    while start < lines.len() {
        let end = (start + CHUNK_SIZE).min(lines.len());
        let snippet = lines[start..end].join("\n").trim().to_string();
        if !snippet.is_empty() {
            conn.execute(
                "INSERT INTO chunks(path, start_line, end_line, snippet)
                 VALUES(?1, ?2, ?3, ?4)",
                rusqlite::params![path_key, (start + 1) as i64, end as i64, snippet],
            )
            .context("insert chunk")?;
            let row_id = conn.last_insert_rowid();
            conn.execute(
                "INSERT INTO chunks_fts(rowid, snippet) VALUES(?1, ?2)",
                rusqlite::params![row_id, snippet],
            )
            .context("insert fts chunk")?;
        }
        start = end;
    }
    Ok(())
}

fn delete_chunks_for_path(conn: &Connection, path: &str) -> Result<()> {
    let mut statement = conn
        .prepare("SELECT id FROM chunks WHERE path = ?1")
        .context("prepare chunk lookup")?;
    let ids = statement
        .query_map(rusqlite::params![path], |row| row.get::<_, i64>(0))
        .context("query chunk ids")?
        .collect::<std::result::Result<Vec<i64>, _>>()
        .context("read chunk ids")?;

    for id in ids {
        conn.execute(
            "DELETE FROM chunks_fts WHERE rowid = ?1",
            rusqlite::params![id],
        )
        .context("delete fts chunk")?;
    }
    conn.execute("DELETE FROM chunks WHERE path = ?1", rusqlite::params![path])
        .context("delete chunks")?;
    Ok(())
}

fn collect_markdown_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("read_dir {:?}", dir))? {
        let entry = entry.with_context(|| format!("read_dir entry in {:?}", dir))?;
        let path = entry.path();
        if path.is_dir() {
            collect_markdown_files(&path, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
            files.push(path);
        }
    }
    Ok(())
}

/// AND together quoted tokens so multi-word queries require every term.
fn normalize_query(query: &str) -> String {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|token| token.replace('"', ""))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect();
    tokens.join(" AND ")
}
