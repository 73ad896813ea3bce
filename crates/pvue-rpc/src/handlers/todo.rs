//! Todo list example application.
//!
//! State lives in a [`TodoList`] owned by the registering code and shared
//! with each handler closure; there is no process-wide list.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::HandlerError;
use crate::registry::HandlerRegistry;

/// One todo item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Identifier, unique within the list.
    pub id: i64,
    /// Item text.
    pub text: String,
    /// Completion flag.
    pub completed: bool,
}

/// Mutable list of todos.
#[derive(Debug, Default)]
pub struct TodoList {
    items: Mutex<Vec<Todo>>,
}

impl TodoList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// List pre-filled with the demo items.
    pub fn with_samples() -> Self {
        let items = [("学习 Vue 3", false), ("学习 Python", true), ("开发 Pvue 应用", false)]
            .into_iter()
            .zip(1..)
            .map(|((text, completed), id)| Todo {
                id,
                text: text.to_owned(),
                completed,
            })
            .collect();
        Self {
            items: Mutex::new(items),
        }
    }

    /// Snapshot of all items.
    pub fn items(&self) -> Vec<Todo> {
        self.items.lock().clone()
    }

    /// Append an item with the next free id and return the list.
    pub fn add(&self, text: &str) -> Vec<Todo> {
        let mut items = self.items.lock();
        let id = items.iter().map(|t| t.id).max().map_or(1, |max| max + 1);
        items.push(Todo {
            id,
            text: text.to_owned(),
            completed: false,
        });
        items.clone()
    }

    /// Set the completion flag of `id` (no-op when absent) and return the list.
    pub fn update(&self, id: i64, completed: bool) -> Vec<Todo> {
        let mut items = self.items.lock();
        if let Some(todo) = items.iter_mut().find(|t| t.id == id) {
            todo.completed = completed;
        }
        items.clone()
    }

    /// Remove `id` and return the list.
    pub fn delete(&self, id: i64) -> Vec<Todo> {
        let mut items = self.items.lock();
        items.retain(|t| t.id != id);
        items.clone()
    }

    /// Remove every completed item and return the list.
    pub fn clear_completed(&self) -> Vec<Todo> {
        let mut items = self.items.lock();
        items.retain(|t| !t.completed);
        items.clone()
    }

    /// `(total, completed)` counts.
    pub fn counts(&self) -> (usize, usize) {
        let items = self.items.lock();
        (items.len(), items.iter().filter(|t| t.completed).count())
    }
}

fn to_value(items: &[Todo]) -> Result<Value, HandlerError> {
    serde_json::to_value(items).map_err(|e| HandlerError::failed(e.to_string()))
}

/// Register the todo handlers against `list`.
pub fn register(registry: &HandlerRegistry, list: &Arc<TodoList>) {
    let l = list.clone();
    let _ = registry.register_fn("get_todos", move |p| {
        p.expect_len(0)?;
        to_value(&l.items())
    });

    let l = list.clone();
    let _ = registry.register_fn("add_todo", move |p| {
        p.expect_len(1)?;
        to_value(&l.add(p.str(0)?))
    });

    let l = list.clone();
    let _ = registry.register_fn("update_todo", move |p| {
        p.expect_len(2)?;
        to_value(&l.update(p.i64(0)?, p.bool(1)?))
    });

    let l = list.clone();
    let _ = registry.register_fn("delete_todo", move |p| {
        p.expect_len(1)?;
        to_value(&l.delete(p.i64(0)?))
    });

    let l = list.clone();
    let _ = registry.register_fn("clear_completed_todos", move |p| {
        p.expect_len(0)?;
        to_value(&l.clear_completed())
    });

    let l = list.clone();
    let _ = registry.register_fn("get_app_custom_info", move |p| {
        p.expect_len(0)?;
        let (total, completed) = l.counts();
        Ok(json!({
            "app_name": "Pvue Todo App",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "基于 Pvue 框架开发的待办事项应用",
            "author": "Pvue Team",
            "todo_count": total,
            "completed_count": completed,
        }))
    });
}
