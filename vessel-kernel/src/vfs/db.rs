//! SQLite-backed persistence for the VFS store (design doc §4.1, "Persistence
//! backend").
//!
//! `rusqlite::Connection` is `!Sync`, so rather than wrap it behind a mutex
//! (and serialize every reader behind file I/O) we give it a dedicated
//! single-writer task that owns the connection exclusively and takes commands
//! over a channel. The in-memory mirror in `store.rs` is the thing readers
//! actually hit; this actor exists purely so state survives a restart.

use std::path::Path;

use rusqlite::{params, Connection};
use tokio::sync::{mpsc, oneshot};

use vessel_shared::errors::{FsErrorCode, VesselError, VesselResult};

use super::types::FileMeta;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    path        TEXT PRIMARY KEY,
    mode        INTEGER NOT NULL,
    uid         INTEGER NOT NULL,
    gid         INTEGER NOT NULL,
    size        INTEGER NOT NULL,
    atime       TEXT NOT NULL,
    mtime       TEXT NOT NULL,
    ctime       TEXT NOT NULL,
    birthtime   TEXT NOT NULL,
    organisation TEXT,
    agent       TEXT,
    content     BLOB NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS files_fts USING fts5(
    path UNINDEXED,
    content,
    content='files',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS files_ai AFTER INSERT ON files BEGIN
    INSERT INTO files_fts(rowid, path, content) VALUES (new.rowid, new.path, new.content);
END;

CREATE TRIGGER IF NOT EXISTS files_ad AFTER DELETE ON files BEGIN
    INSERT INTO files_fts(files_fts, rowid, path, content) VALUES ('delete', old.rowid, old.path, old.content);
END;

CREATE TRIGGER IF NOT EXISTS files_au AFTER UPDATE ON files BEGIN
    INSERT INTO files_fts(files_fts, rowid, path, content) VALUES ('delete', old.rowid, old.path, old.content);
    INSERT INTO files_fts(rowid, path, content) VALUES (new.rowid, new.path, new.content);
END;
"#;

#[derive(Debug)]
pub enum DbCommand {
    Put {
        meta: FileMeta,
        content: Vec<u8>,
        reply: oneshot::Sender<VesselResult<()>>,
    },
    Delete {
        path: String,
        reply: oneshot::Sender<VesselResult<()>>,
    },
    RenamePrefix {
        from_prefix: String,
        to_prefix: String,
        reply: oneshot::Sender<VesselResult<()>>,
    },
    LoadAll {
        reply: oneshot::Sender<VesselResult<Vec<(FileMeta, Vec<u8>)>>>,
    },
    Search {
        query: String,
        reply: oneshot::Sender<VesselResult<Vec<String>>>,
    },
}

/// Handle to the running database actor. Cloning is cheap; every clone
/// shares the same underlying connection task.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::Sender<DbCommand>,
}

impl DbHandle {
    /// Opens (creating if absent) the database at `path` and spawns its
    /// owning actor task. Pass `None` for an ephemeral in-memory database,
    /// used by tests and by containers booted without a `persistPath`.
    pub fn open(path: Option<&Path>) -> VesselResult<Self> {
        let conn = match path {
            Some(p) => Connection::open(p),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| VesselError::fs(FsErrorCode::EIO, format!("opening vfs database: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| VesselError::fs(FsErrorCode::EIO, format!("applying vfs schema: {e}")))?;

        let (tx, mut rx) = mpsc::channel::<DbCommand>(256);
        std::thread::Builder::new()
            .name("vessel-vfs-db".into())
            .spawn(move || {
                let conn = conn;
                while let Some(cmd) = rx.blocking_recv() {
                    run_command(&conn, cmd);
                }
            })
            .map_err(|e| VesselError::Internal(format!("spawning vfs db thread: {e}")))?;

        Ok(Self { tx })
    }

    pub async fn put(&self, meta: FileMeta, content: Vec<u8>) -> VesselResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(DbCommand::Put { meta, content, reply }).await?;
        rx.await
            .map_err(|_| VesselError::Internal("vfs db actor dropped reply".into()))?
    }

    pub async fn delete(&self, path: String) -> VesselResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(DbCommand::Delete { path, reply }).await?;
        rx.await
            .map_err(|_| VesselError::Internal("vfs db actor dropped reply".into()))?
    }

    pub async fn rename_prefix(&self, from_prefix: String, to_prefix: String) -> VesselResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(DbCommand::RenamePrefix { from_prefix, to_prefix, reply })
            .await?;
        rx.await
            .map_err(|_| VesselError::Internal("vfs db actor dropped reply".into()))?
    }

    pub async fn load_all(&self) -> VesselResult<Vec<(FileMeta, Vec<u8>)>> {
        let (reply, rx) = oneshot::channel();
        self.send(DbCommand::LoadAll { reply }).await?;
        rx.await
            .map_err(|_| VesselError::Internal("vfs db actor dropped reply".into()))?
    }

    /// Candidate paths matching `query` via the FTS5 index. This is an
    /// optimization hint only: a store-level scan still runs to confirm and
    /// refine, since FTS5's tokenizer doesn't guarantee the same matches as
    /// an exact substring/regex scan. On any FTS error, returns an empty
    /// list so the caller falls back to a full scan instead of missing
    /// matches.
    pub async fn search(&self, query: String) -> VesselResult<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(DbCommand::Search { query, reply }).await?;
        rx.await
            .map_err(|_| VesselError::Internal("vfs db actor dropped reply".into()))?
    }

    async fn send(&self, cmd: DbCommand) -> VesselResult<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| VesselError::Internal("vfs db actor no longer running".into()))
    }
}

fn run_command(conn: &Connection, cmd: DbCommand) {
    match cmd {
        DbCommand::Put { meta, content, reply } => {
            let result = put(conn, &meta, &content);
            let _ = reply.send(result);
        }
        DbCommand::Delete { path, reply } => {
            let result = conn
                .execute("DELETE FROM files WHERE path = ?1", params![path])
                .map(|_| ())
                .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()));
            let _ = reply.send(result);
        }
        DbCommand::RenamePrefix { from_prefix, to_prefix, reply } => {
            let result = rename_prefix(conn, &from_prefix, &to_prefix);
            let _ = reply.send(result);
        }
        DbCommand::LoadAll { reply } => {
            let result = load_all(conn);
            let _ = reply.send(result);
        }
        DbCommand::Search { query, reply } => {
            let result: VesselResult<Vec<String>> = Ok(search(conn, &query).unwrap_or_default());
            let _ = reply.send(result);
        }
    }
}

fn put(conn: &Connection, meta: &FileMeta, content: &[u8]) -> VesselResult<()> {
    conn.execute(
        "INSERT INTO files (path, mode, uid, gid, size, atime, mtime, ctime, birthtime, organisation, agent, content)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(path) DO UPDATE SET
            mode = excluded.mode, uid = excluded.uid, gid = excluded.gid, size = excluded.size,
            atime = excluded.atime, mtime = excluded.mtime, ctime = excluded.ctime,
            organisation = excluded.organisation, agent = excluded.agent, content = excluded.content",
        params![
            meta.path,
            meta.mode.0,
            meta.uid,
            meta.gid,
            meta.size as i64,
            meta.atime.to_rfc3339(),
            meta.mtime.to_rfc3339(),
            meta.ctime.to_rfc3339(),
            meta.birthtime.to_rfc3339(),
            meta.organisation,
            meta.agent,
            content,
        ],
    )
    .map(|_| ())
    .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))
}

fn rename_prefix(conn: &Connection, from_prefix: &str, to_prefix: &str) -> VesselResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?;
    {
        let mut stmt = tx
            .prepare("SELECT path FROM files WHERE path = ?1 OR path LIKE ?2")
            .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?;
        let like_pattern = format!("{from_prefix}/%");
        let paths: Vec<String> = stmt
            .query_map(params![from_prefix, like_pattern], |row| row.get(0))
            .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?
            .collect::<Result<_, _>>()
            .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?;
        for old_path in paths {
            let new_path = format!("{to_prefix}{}", &old_path[from_prefix.len()..]);
            tx.execute(
                "UPDATE files SET path = ?1 WHERE path = ?2",
                params![new_path, old_path],
            )
            .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?;
        }
    }
    tx.commit().map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))
}

fn load_all(conn: &Connection) -> VesselResult<Vec<(FileMeta, Vec<u8>)>> {
    let mut stmt = conn
        .prepare(
            "SELECT path, mode, uid, gid, size, atime, mtime, ctime, birthtime, organisation, agent, content FROM files",
        )
        .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            let atime: String = row.get(5)?;
            let mtime: String = row.get(6)?;
            let ctime: String = row.get(7)?;
            let birthtime: String = row.get(8)?;
            Ok((
                FileMeta {
                    path: row.get(0)?,
                    mode: super::types::Mode(row.get(1)?),
                    uid: row.get(2)?,
                    gid: row.get(3)?,
                    size: row.get::<_, i64>(4)? as u64,
                    atime: parse_rfc3339(&atime),
                    mtime: parse_rfc3339(&mtime),
                    ctime: parse_rfc3339(&ctime),
                    birthtime: parse_rfc3339(&birthtime),
                    organisation: row.get(9)?,
                    agent: row.get(10)?,
                },
                row.get::<_, Vec<u8>>(11)?,
            ))
        })
        .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?;
    Ok(rows)
}

/// `query` is escaped as a single double-quoted FTS5 phrase so arbitrary
/// user input (including FTS operator characters like `-` or `*`) is always
/// treated literally rather than as query syntax.
fn search(conn: &Connection, query: &str) -> VesselResult<Vec<String>> {
    let phrase = format!("\"{}\"", query.replace('"', "\"\""));
    let mut stmt = conn
        .prepare("SELECT path FROM files_fts WHERE files_fts MATCH ?1")
        .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?;
    let rows = stmt
        .query_map(params![phrase], |row| row.get::<_, String>(0))
        .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| VesselError::fs(FsErrorCode::EIO, e.to_string()))?;
    Ok(rows)
}

fn parse_rfc3339(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn put_then_load_round_trips() {
        let db = DbHandle::open(None).unwrap();
        let meta = FileMeta::new_file("/a.txt", 5, Utc::now());
        db.put(meta.clone(), b"hello".to_vec()).await.unwrap();

        let all = db.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0.path, "/a.txt");
        assert_eq!(all[0].1, b"hello");
    }

    #[tokio::test]
    async fn rename_prefix_moves_nested_paths() {
        let db = DbHandle::open(None).unwrap();
        db.put(FileMeta::new_file("/dir/a.txt", 1, Utc::now()), b"a".to_vec())
            .await
            .unwrap();
        db.put(FileMeta::new_dir("/dir", Utc::now()), Vec::new())
            .await
            .unwrap();

        db.rename_prefix("/dir".into(), "/moved".into()).await.unwrap();

        let all = db.load_all().await.unwrap();
        let paths: Vec<_> = all.iter().map(|(m, _)| m.path.clone()).collect();
        assert!(paths.contains(&"/moved".to_string()));
        assert!(paths.contains(&"/moved/a.txt".to_string()));
    }

    #[tokio::test]
    async fn search_finds_path_by_content() {
        let db = DbHandle::open(None).unwrap();
        db.put(FileMeta::new_file("/a.txt", 11, Utc::now()), b"hello world".to_vec())
            .await
            .unwrap();
        db.put(FileMeta::new_file("/b.txt", 3, Utc::now()), b"bye".to_vec())
            .await
            .unwrap();

        let hits = db.search("world".into()).await.unwrap();
        assert_eq!(hits, vec!["/a.txt".to_string()]);
    }
}
