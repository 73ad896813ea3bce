//! Notepad example application with optional JSON-file persistence.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::context::CallContext;
use crate::errors::HandlerError;
use crate::params::Params;
use crate::registry::{Handler, HandlerRegistry};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier, unique within the notebook.
    pub id: i64,
    /// Title line.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Local time of creation (`YYYY-MM-DD HH:MM:SS`).
    pub created_at: String,
    /// Local time of the last edit.
    pub updated_at: String,
}

/// Notes plus the file they persist to.
#[derive(Debug, Default)]
pub struct NoteBook {
    notes: Mutex<Vec<Note>>,
    path: Option<PathBuf>,
}

impl NoteBook {
    /// Empty notebook, optionally backed by `path`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            notes: Mutex::new(Vec::new()),
            path,
        }
    }

    /// Notebook seeded with a welcome note.
    pub fn with_welcome(path: Option<PathBuf>) -> Self {
        let book = Self::new(path);
        let _ = book.add(
            "欢迎使用 Pvue 记事本",
            "这是您的第一条笔记。\n您可以：\n1. 添加新笔记\n2. 编辑现有笔记\n3. 删除不需要的笔记\n4. 保存所有更改",
        );
        book
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Snapshot of all notes.
    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    /// Create a note with the next free id.
    pub fn add(&self, title: &str, content: &str) -> Note {
        let mut notes = self.notes.lock();
        let id = notes.iter().map(|n| n.id).max().map_or(1, |max| max + 1);
        let stamp = now();
        let note = Note {
            id,
            title: title.to_owned(),
            content: content.to_owned(),
            created_at: stamp.clone(),
            updated_at: stamp,
        };
        notes.push(note.clone());
        note
    }

    /// Edit note `id`. `None` when it does not exist.
    pub fn update(&self, id: i64, title: &str, content: &str) -> Option<Note> {
        let mut notes = self.notes.lock();
        let note = notes.iter_mut().find(|n| n.id == id)?;
        title.clone_into(&mut note.title);
        content.clone_into(&mut note.content);
        note.updated_at = now();
        Some(note.clone())
    }

    /// Remove note `id`. Removing an absent id succeeds.
    pub fn delete(&self, id: i64) {
        self.notes.lock().retain(|n| n.id != id);
    }

    /// Replace all notes.
    pub fn replace(&self, notes: Vec<Note>) {
        *self.notes.lock() = notes;
    }

    /// Write all notes to the backing file as pretty JSON.
    pub async fn save(&self) -> Result<(), String> {
        let Some(path) = &self.path else {
            return Err("未配置笔记文件".to_owned());
        };
        let body = serde_json::to_string_pretty(&self.notes()).map_err(|e| e.to_string())?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
        tokio::fs::write(path, body)
            .await
            .map_err(|e| e.to_string())?;
        info!(path = %path.display(), "notes saved");
        Ok(())
    }

    /// Reload notes from the backing file. A missing file keeps the
    /// in-memory notes.
    pub async fn load(&self) -> Result<Vec<Note>, String> {
        let Some(path) = &self.path else {
            return Ok(self.notes());
        };
        let body = match tokio::fs::read_to_string(path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(self.notes()),
            Err(e) => return Err(e.to_string()),
        };
        let notes: Vec<Note> = serde_json::from_str(&body).map_err(|e| e.to_string())?;
        self.replace(notes.clone());
        info!(path = %path.display(), count = notes.len(), "notes loaded");
        Ok(notes)
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|e| HandlerError::failed(e.to_string()))
}

struct SaveNotes(Arc<NoteBook>);

#[async_trait]
impl Handler for SaveNotes {
    async fn call(&self, params: Params, _ctx: &CallContext) -> Result<Value, HandlerError> {
        params.expect_len(0)?;
        Ok(match self.0.save().await {
            Ok(()) => json!({"success": true, "message": "笔记保存成功"}),
            Err(e) => {
                warn!(error = %e, "saving notes failed");
                json!({"success": false, "message": format!("保存失败：{e}")})
            }
        })
    }
}

struct LoadNotes(Arc<NoteBook>);

#[async_trait]
impl Handler for LoadNotes {
    async fn call(&self, params: Params, _ctx: &CallContext) -> Result<Value, HandlerError> {
        params.expect_len(0)?;
        Ok(match self.0.load().await {
            Ok(notes) => json!({"success": true, "notes": notes, "message": "笔记加载成功"}),
            Err(e) => {
                warn!(error = %e, "loading notes failed");
                json!({"success": false, "message": format!("加载失败：{e}")})
            }
        })
    }
}

/// Register the notepad handlers against `book`.
pub fn register(registry: &HandlerRegistry, book: &Arc<NoteBook>) {
    let b = book.clone();
    let _ = registry.register_fn("get_notes", move |p| {
        p.expect_len(0)?;
        to_value(&b.notes())
    });

    let b = book.clone();
    let _ = registry.register_fn("add_note", move |p| {
        p.expect_len(2)?;
        to_value(&b.add(p.str(0)?, p.str(1)?))
    });

    let b = book.clone();
    let _ = registry.register_fn("update_note", move |p| {
        p.expect_len(3)?;
        to_value(&b.update(p.i64(0)?, p.str(1)?, p.str(2)?))
    });

    let b = book.clone();
    let _ = registry.register_fn("delete_note", move |p| {
        p.expect_len(1)?;
        b.delete(p.i64(0)?);
        Ok(Value::Bool(true))
    });

    let _ = registry.register("save_notes", SaveNotes(book.clone()));
    let _ = registry.register("load_notes", LoadNotes(book.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn call(reg: &HandlerRegistry, function: &str, params: Value) -> Value {
        let text = json!({"function": function, "params": params}).to_string();
        reg.dispatch(&text, &CallContext::detached()).await.unwrap()
    }

    fn setup(path: Option<PathBuf>) -> (HandlerRegistry, Arc<NoteBook>) {
        let reg = HandlerRegistry::new();
        let book = Arc::new(NoteBook::with_welcome(path));
        register(&reg, &book);
        (reg, book)
    }

    #[test]
    fn welcome_note_has_timestamps() {
        let book = NoteBook::with_welcome(None);
        let notes = book.notes();
        assert_eq!(notes.len(), 1);
        assert!(chrono::NaiveDateTime::parse_from_str(&notes[0].created_at, TIMESTAMP_FORMAT).is_ok());
    }

    #[tokio::test]
    async fn add_returns_note() {
        let (reg, _book) = setup(None);
        let note = call(&reg, "add_note", json!(["标题", "内容"])).await;
        assert_eq!(note["id"], 2);
        assert_eq!(note["title"], "标题");
        assert_eq!(note["content"], "内容");
        assert!(note["created_at"].is_string());
    }

    #[tokio::test]
    async fn update_existing_and_missing() {
        let (reg, book) = setup(None);
        let note = call(&reg, "update_note", json!([1, "new", "body"])).await;
        assert_eq!(note["title"], "new");
        assert_eq!(book.notes()[0].content, "body");

        let missing = call(&reg, "update_note", json!([42, "x", "y"])).await;
        assert!(missing.is_null());
    }

    #[tokio::test]
    async fn delete_always_true() {
        let (reg, book) = setup(None);
        assert_eq!(call(&reg, "delete_note", json!([1])).await, json!(true));
        assert_eq!(call(&reg, "delete_note", json!([1])).await, json!(true));
        assert!(book.notes().is_empty());
    }

    #[tokio::test]
    async fn save_without_file_reports_failure() {
        let (reg, _book) = setup(None);
        let result = call(&reg, "save_notes", json!([])).await;
        assert_eq!(result["success"], false);
        assert!(result["message"].as_str().unwrap().starts_with("保存失败："));
    }

    #[tokio::test]
    async fn load_without_file_returns_memory() {
        let (reg, _book) = setup(None);
        let result = call(&reg, "load_notes", json!([])).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["notes"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.json");

        let (reg, book) = setup(Some(path.clone()));
        let _ = call(&reg, "add_note", json!(["persisted", "text"])).await;
        let saved = call(&reg, "save_notes", json!([])).await;
        assert_eq!(saved, json!({"success": true, "message": "笔记保存成功"}));
        assert!(path.exists());

        book.replace(Vec::new());
        let loaded = call(&reg, "load_notes", json!([])).await;
        assert_eq!(loaded["success"], true);
        assert_eq!(loaded["notes"].as_array().unwrap().len(), 2);
        assert_eq!(book.notes()[1].title, "persisted");
    }

    #[tokio::test]
    async fn load_corrupt_file_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, "not json").unwrap();

        let (reg, book) = setup(Some(path));
        let result = call(&reg, "load_notes", json!([])).await;
        assert_eq!(result["success"], false);
        assert!(result["message"].as_str().unwrap().starts_with("加载失败："));
        assert_eq!(book.notes().len(), 1);
    }
}
