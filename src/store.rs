// Task store: ordered task list with write-through persistence

use crate::backend::{Backend, validate_key};
use crate::codec;
use crate::filter::{CategoryFilter, Filter, StatusFilter};
use crate::models::{DEFAULT_CATEGORY, Priority, Task, TaskCount, now_iso, now_ms};
use eyre::{Context, Result};
use tracing::{debug, info, warn};

/// Key the task list is persisted under
pub const DEFAULT_TASKS_KEY: &str = "tasks";

/// What a mutation did, delivered to subscribers after the save attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added(i64),
    Toggled { id: i64, completed: bool },
    Edited(i64),
    Deleted(i64),
    Reordered { source: i64, target: i64 },
    Sorted,
    Cleared(usize),
}

type Listener = Box<dyn FnMut(&Change)>;

/// Authoritative in-memory task list backed by a key-value blob store
///
/// Every mutation that changes the list saves the full list before it
/// returns. A failed save keeps the in-memory change, marks the store dirty
/// and parks the error for the caller (see [`TaskStore::take_save_error`]);
/// the next successful save reconciles the backend.
pub struct TaskStore<B: Backend> {
    backend: B,
    key: String,
    tasks: Vec<Task>,
    dirty: bool,
    save_error: Option<eyre::Report>,
    listeners: Vec<Listener>,
}

impl<B: Backend> TaskStore<B> {
    /// Open a store over `backend`, loading the list saved under `tasks`
    pub fn open(backend: B) -> Result<Self> {
        Self::open_with_key(backend, DEFAULT_TASKS_KEY)
    }

    /// Open a store that persists under a custom key
    ///
    /// A missing or undecodable blob starts an empty list; only a failure to
    /// read from the backend is an error.
    pub fn open_with_key(backend: B, key: &str) -> Result<Self> {
        validate_key(key)?;

        let tasks = match backend.read(key).context("Failed to read task list")? {
            Some(blob) => codec::decode(&blob),
            None => {
                debug!(key, "No saved task list, starting empty");
                Vec::new()
            }
        };

        info!(key, count = tasks.len(), "Opened task store");

        Ok(Self {
            backend,
            key: key.to_string(),
            tasks,
            dirty: false,
            save_error: None,
            listeners: Vec::new(),
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// True when the backend is behind the in-memory list
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Take the error from the most recent failed write-through save
    pub fn take_save_error(&mut self) -> Option<eyre::Report> {
        self.save_error.take()
    }

    /// Register a listener called after every mutation that changes the list
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&Change) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a new task
    ///
    /// Returns `None` without touching the list when `text` is blank or no
    /// larger id is left to hand out. A blank category falls back to the
    /// default one; a blank due date means none.
    pub fn add(&mut self, text: &str, priority: Priority, category: &str, due_date: Option<&str>) -> Option<Task> {
        let text = text.trim();
        if text.is_empty() {
            debug!("add: empty text, ignoring");
            return None;
        }

        let Some(id) = self.next_id() else {
            warn!("add: id space exhausted, ignoring");
            return None;
        };

        let category = match category.trim() {
            "" => DEFAULT_CATEGORY,
            c => c,
        };

        let task = Task {
            id,
            text: text.to_string(),
            completed: false,
            priority,
            category: category.to_string(),
            due_date: due_date.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
            created_at: now_iso(),
        };

        debug!(id = task.id, category = %task.category, "add: appending task");
        self.tasks.push(task.clone());
        self.commit(Change::Added(task.id));

        Some(task)
    }

    /// Flip completion; returns the new `completed` value, `None` if the id is unknown
    pub fn toggle(&mut self, id: i64) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.completed = !task.completed;
        let completed = task.completed;

        self.commit(Change::Toggled { id, completed });
        Some(completed)
    }

    /// Replace a task's text with the trimmed `new_text`
    ///
    /// Blank text, an unknown id, or unchanged text leave the list untouched.
    pub fn edit(&mut self, id: i64, new_text: &str) -> bool {
        let new_text = new_text.trim();
        if new_text.is_empty() {
            debug!(id, "edit: empty text, ignoring");
            return false;
        }

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if task.text == new_text {
            return false;
        }
        task.text = new_text.to_string();

        self.commit(Change::Edited(id));
        true
    }

    /// Remove and return a task, `None` if the id is unknown
    pub fn delete(&mut self, id: i64) -> Option<Task> {
        let index = self.position(id)?;
        let task = self.tasks.remove(index);

        self.commit(Change::Deleted(id));
        Some(task)
    }

    /// Move `source_id` to the index `target_id` occupies before the move
    ///
    /// Moving up lands the task just before the target; moving down lands it
    /// just after. Unknown ids and `source_id == target_id` are no-ops.
    pub fn reorder(&mut self, source_id: i64, target_id: i64) -> bool {
        if source_id == target_id {
            return false;
        }

        let (Some(source), Some(target)) = (self.position(source_id), self.position(target_id)) else {
            return false;
        };

        let moved = self.tasks.remove(source);
        self.tasks.insert(target, moved);

        debug!(source_id, target_id, from = source, to = target, "reorder: moved task");
        self.commit(Change::Reordered {
            source: source_id,
            target: target_id,
        });
        true
    }

    /// Stable ascending sort by due date; tasks without one come first
    pub fn sort_by_due_date(&mut self) {
        self.tasks.sort_by(|a, b| a.due_key().cmp(b.due_key()));
        self.commit(Change::Sorted);
    }

    /// Remove every completed task; returns how many were removed
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        let removed = before - self.tasks.len();

        if removed > 0 {
            self.commit(Change::Cleared(removed));
        }
        removed
    }

    /// Write the full list to the backend now
    pub fn save(&mut self) -> Result<()> {
        match self.write_through() {
            Ok(()) => {
                self.dirty = false;
                self.save_error = None;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Tasks matching both predicates, in list order
    pub fn filter(&self, status: StatusFilter, category: impl Into<CategoryFilter>) -> Vec<Task> {
        self.filter_by(&Filter::new(status, category))
    }

    pub fn filter_by(&self, filter: &Filter) -> Vec<Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).cloned().collect()
    }

    pub fn count(&self) -> TaskCount {
        TaskCount {
            active: self.tasks.iter().filter(|t| !t.completed).count(),
            total: self.tasks.len(),
        }
    }

    /// Distinct categories in first-seen order
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for task in &self.tasks {
            if !categories.contains(&task.category) {
                categories.push(task.category.clone());
            }
        }
        categories
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn position(&self, id: i64) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Epoch-millis id, bumped past the largest existing id when the clock lags
    ///
    /// `None` once the largest id is `i64::MAX`; ids never wrap.
    fn next_id(&self) -> Option<i64> {
        let now = now_ms();
        match self.tasks.iter().map(|t| t.id).max() {
            Some(max) if max >= now => max.checked_add(1),
            _ => Some(now),
        }
    }

    fn write_through(&mut self) -> Result<()> {
        let blob = codec::encode(&self.tasks)?;
        self.backend.write(&self.key, &blob).context("Failed to save task list")
    }

    fn commit(&mut self, change: Change) {
        match self.write_through() {
            Ok(()) => {
                self.dirty = false;
                self.save_error = None;
            }
            Err(e) => {
                warn!(key = %self.key, error = ?e, "Save failed, keeping changes in memory");
                self.dirty = true;
                self.save_error = Some(e);
            }
        }

        for listener in &mut self.listeners {
            listener(&change);
        }
    }
}
