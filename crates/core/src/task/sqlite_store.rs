//! SQLite-backed task store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use super::store::{TaskError, TaskPatch, TaskStore};
use super::types::{Task, TaskFailure, TaskStatus, TranscodeState};

const TASK_COLUMNS: &str =
    "id, draft_id, title, status, created_at, updated_at, completed_at, error, transcode";

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Open (or create) the store at the given path.
    pub fn new(path: &Path) -> Result<Self, TaskError> {
        let conn = Connection::open(path).map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskError> {
        let conn = Connection::open_in_memory().map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                draft_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT,
                error TEXT,
                transcode TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_updated_at ON tasks(updated_at);
            "#,
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let id: String = row.get(0)?;
        let draft_id: String = row.get(1)?;
        let title: String = row.get(2)?;
        let status_str: String = row.get(3)?;
        let created_at_str: String = row.get(4)?;
        let updated_at_str: String = row.get(5)?;
        let completed_at_str: Option<String> = row.get(6)?;
        let error_json: Option<String> = row.get(7)?;
        let transcode_json: Option<String> = row.get(8)?;

        let status = TaskStatus::from_str_opt(&status_str).unwrap_or(TaskStatus::Pending);

        let created_at = parse_timestamp(&created_at_str);
        let updated_at = parse_timestamp(&updated_at_str);
        let completed_at = completed_at_str.as_deref().map(parse_timestamp);

        let error: Option<TaskFailure> =
            error_json.and_then(|json| serde_json::from_str(&json).ok());
        let transcode: Option<TranscodeState> =
            transcode_json.and_then(|json| serde_json::from_str(&json).ok());

        Ok(Task {
            id,
            draft_id,
            title,
            status,
            created_at,
            updated_at,
            completed_at,
            error,
            transcode,
        })
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<Option<Task>, TaskError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS),
            params![id],
            Self::row_to_task,
        );

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TaskError::Database(e.to_string())),
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl TaskStore for SqliteTaskStore {
    fn register(&self, draft_id: &str, title: &str) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let existing = conn.query_row(
            &format!("SELECT {} FROM tasks WHERE draft_id = ?", TASK_COLUMNS),
            params![draft_id],
            Self::row_to_task,
        );
        match existing {
            Ok(task) => return Ok(task),
            Err(rusqlite::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(TaskError::Database(e.to_string())),
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = TaskStatus::Pending;

        conn.execute(
            "INSERT INTO tasks (id, draft_id, title, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                draft_id,
                title,
                status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(Task {
            id,
            draft_id: draft_id.to_string(),
            title: title.to_string(),
            status,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
            transcode: None,
        })
    }

    fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let mut task =
            Self::get_locked(&conn, id)?.ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(completed_at) = patch.completed_at {
            task.completed_at = Some(completed_at);
        }
        if patch.clear_error {
            task.error = None;
        }
        if let Some(error) = patch.error {
            task.error = Some(error);
        }
        if let Some(transcode) = patch.transcode {
            task.transcode = Some(transcode);
        }
        task.updated_at = Utc::now();

        let error_json = task
            .error
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| TaskError::Database(e.to_string()))?;
        let transcode_json = task
            .transcode
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| TaskError::Database(e.to_string()))?;

        conn.execute(
            "UPDATE tasks SET status = ?, updated_at = ?, completed_at = ?, error = ?, transcode = ? WHERE id = ?",
            params![
                task.status.as_str(),
                task.updated_at.to_rfc3339(),
                task.completed_at.map(|t| t.to_rfc3339()),
                error_json,
                transcode_json,
                id,
            ],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(task)
    }

    fn get(&self, id: &str) -> Result<Option<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::get_locked(&conn, id)
    }

    fn remove(&self, id: &str) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let task =
            Self::get_locked(&conn, id)?.ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        conn.execute("DELETE FROM tasks WHERE id = ?", params![id])
            .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(task)
    }

    fn list_resumable(&self) -> Result<Vec<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tasks WHERE status IN ('pending', 'uploading', 'transcoding', 'mirroring') ORDER BY created_at ASC",
                TASK_COLUMNS
            ))
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_task)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut tasks = Vec::new();
        for row_result in rows {
            tasks.push(row_result.map_err(|e| TaskError::Database(e.to_string()))?);
        }

        Ok(tasks)
    }

    fn count(&self, status: TaskStatus) -> Result<i64, TaskError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?",
            params![status.as_str()],
            |row| row.get(0),
        )
        .map_err(|e| TaskError::Database(e.to_string()))
    }

    fn sweep_completed(&self, max_age: Duration) -> Result<usize, TaskError> {
        let conn = self.conn.lock().unwrap();

        let cutoff = Utc::now() - max_age;
        let deleted = conn
            .execute(
                "DELETE FROM tasks WHERE status IN ('complete', 'cancelled') AND updated_at < ?",
                params![cutoff.to_rfc3339()],
            )
            .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(deleted)
    }
}
