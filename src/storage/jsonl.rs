//! JSONL storage for tasks
//!
//! Tasks are stored in `.taskgraph/tasks.jsonl` with one JSON object per
//! line, in creation order. That order is the retrieval order seen by the
//! planner. Every access goes through a sidecar lock file: readers hold it
//! shared, appends and read-modify-write cycles hold it exclusively, and
//! every rewrite goes through a temp file and a rename.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Priority, Task, TaskAccessor, TaskId, TaskStatus};

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse task at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize task: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Task not found: {0}")]
    NotFound(TaskId),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> TaskStoreError + '_ {
    move |source| TaskStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Store for task data in JSONL format
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,

    /// Priority changes waiting for `commit`
    staged: HashMap<TaskId, Priority>,
}

impl TaskStore {
    /// Creates a new task store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staged: HashMap::new(),
        }
    }

    /// Creates the default store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".taskgraph").join("tasks.jsonl"))
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("jsonl.lock")
    }

    fn ensure_parent(&self) -> Result<(), TaskStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        Ok(())
    }

    fn open_lock(&self) -> Result<File, TaskStoreError> {
        self.ensure_parent()?;
        let lock_path = self.lock_path();
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(io_err(&lock_path))
    }

    /// Runs `f` while holding the store's exclusive write lock
    fn locked<R>(
        &self,
        f: impl FnOnce() -> Result<R, TaskStoreError>,
    ) -> Result<R, TaskStoreError> {
        let lock = self.open_lock()?;
        lock.lock_exclusive().map_err(io_err(&self.lock_path()))?;

        // Lock is released when `lock` is dropped
        f()
    }

    /// Runs `f` while holding the store's lock in shared mode
    fn shared<R>(
        &self,
        f: impl FnOnce() -> Result<R, TaskStoreError>,
    ) -> Result<R, TaskStoreError> {
        let lock = self.open_lock()?;
        lock.lock_shared().map_err(io_err(&self.lock_path()))?;
        f()
    }

    /// Reads all tasks in file order
    ///
    /// A task that appears on several lines keeps its first position and
    /// its last content.
    pub fn read_all(&self) -> Result<Vec<Task>, TaskStoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        self.shared(|| self.read_unlocked())
    }

    fn read_unlocked(&self) -> Result<Vec<Task>, TaskStoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.path)(e)),
        };

        let reader = BufReader::new(&file);
        let mut tasks: Vec<Task> = Vec::new();
        let mut positions: HashMap<TaskId, usize> = HashMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(io_err(&self.path))?;

            if line.trim().is_empty() {
                continue;
            }

            let task: Task = serde_json::from_str(&line).map_err(|source| TaskStoreError::Parse {
                line: line_num + 1,
                source,
            })?;

            match positions.get(&task.id) {
                Some(&pos) => tasks[pos] = task,
                None => {
                    positions.insert(task.id.clone(), tasks.len());
                    tasks.push(task);
                }
            }
        }

        Ok(tasks)
    }

    /// Writes all tasks to the store (full rewrite, order preserved)
    pub fn write_all(&self, tasks: &[Task]) -> Result<(), TaskStoreError> {
        self.locked(|| self.write_unlocked(tasks))
    }

    fn write_unlocked(&self, tasks: &[Task]) -> Result<(), TaskStoreError> {
        // Write to temp file first
        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(io_err(&temp_path))?;

            let mut writer = BufWriter::new(&file);
            for task in tasks {
                let line = serde_json::to_string(task)?;
                writeln!(writer, "{}", line).map_err(io_err(&temp_path))?;
            }
            writer.flush().map_err(io_err(&temp_path))?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))?;

        debug!(count = tasks.len(), path = %self.path.display(), "wrote task store");
        Ok(())
    }

    /// Appends a single task
    pub fn append(&self, task: &Task) -> Result<(), TaskStoreError> {
        self.locked(|| {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(io_err(&self.path))?;

            let mut writer = BufWriter::new(&file);
            let line = serde_json::to_string(task)?;
            writeln!(writer, "{}", line).map_err(io_err(&self.path))?;
            writer.flush().map_err(io_err(&self.path))
        })
    }

    /// Looks up a single task
    pub fn get(&self, task_id: &TaskId) -> Result<Option<Task>, TaskStoreError> {
        Ok(self.read_all()?.into_iter().find(|t| &t.id == task_id))
    }

    /// Replaces a task in place
    pub fn update(&self, task: &Task) -> Result<(), TaskStoreError> {
        self.locked(|| {
            let mut tasks = self.read_unlocked()?;
            let slot = tasks
                .iter_mut()
                .find(|t| t.id == task.id)
                .ok_or_else(|| TaskStoreError::NotFound(task.id.clone()))?;
            *slot = task.clone();
            self.write_unlocked(&tasks)
        })
    }

    /// Removes a task by ID
    pub fn remove(&self, task_id: &TaskId) -> Result<bool, TaskStoreError> {
        self.locked(|| {
            let mut tasks = self.read_unlocked()?;
            let before = tasks.len();
            tasks.retain(|t| &t.id != task_id);
            if tasks.len() == before {
                return Ok(false);
            }
            self.write_unlocked(&tasks)?;
            Ok(true)
        })
    }

    /// Status of every task, keyed by ID
    pub fn statuses(&self) -> Result<HashMap<TaskId, TaskStatus>, TaskStoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .map(|t| (t.id, t.status))
            .collect())
    }
}

impl TaskAccessor for TaskStore {
    type Error = TaskStoreError;

    fn tasks(&self) -> Result<Vec<Task>, TaskStoreError> {
        self.read_all()
    }

    fn task(&self, id: &TaskId) -> Result<Option<Task>, TaskStoreError> {
        self.get(id)
    }

    fn set_priority(&mut self, id: &TaskId, priority: Priority) -> Result<(), TaskStoreError> {
        self.staged.insert(id.clone(), priority);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TaskStoreError> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let staged = std::mem::take(&mut self.staged);
        self.locked(|| {
            let mut tasks = self.read_unlocked()?;
            let mut applied = 0;
            for task in tasks.iter_mut() {
                if let Some(priority) = staged.get(&task.id) {
                    task.set_priority(*priority);
                    applied += 1;
                }
            }
            if applied < staged.len() {
                warn!(
                    missing = staged.len() - applied,
                    "some staged priority changes target deleted tasks"
                );
            }
            self.write_unlocked(&tasks)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_task(title: &str) -> Task {
        Task::new(title.parse().unwrap(), title)
    }

    fn store_in(dir: &TempDir) -> TaskStore {
        TaskStore::new(dir.path().join("tasks.jsonl"))
    }

    #[test]
    fn read_empty_store() {
        let dir = TempDir::new().unwrap();
        assert!(store_in(&dir).read_all().unwrap().is_empty());
    }

    #[test]
    fn write_and_read_keep_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let tasks = vec![make_task("zeta"), make_task("alpha"), make_task("mid")];
        store.write_all(&tasks).unwrap();

        let loaded = store.read_all().unwrap();
        let ids: Vec<&str> = loaded.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn append_and_update() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut task = make_task("one");
        store.append(&task).unwrap();
        store.append(&make_task("two")).unwrap();

        task.status = TaskStatus::InProgress;
        store.update(&task).unwrap();

        let loaded = store.read_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].status, TaskStatus::InProgress);
    }

    #[test]
    fn update_unknown_task_fails() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.append(&make_task("one")).unwrap();

        let result = store.update(&make_task("ghost"));
        assert!(matches!(result, Err(TaskStoreError::NotFound(_))));
    }

    #[test]
    fn duplicate_lines_keep_first_position_last_content() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut first = make_task("first");
        store.append(&first).unwrap();
        store.append(&make_task("second")).unwrap();
        first.title = "renamed".to_string();
        store.append(&first).unwrap();

        let loaded = store.read_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "renamed");
    }

    #[test]
    fn remove_task() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let task = make_task("gone");
        store.append(&task).unwrap();

        assert!(store.remove(&task.id).unwrap());
        assert!(!store.remove(&task.id).unwrap());
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn staged_priorities_apply_on_commit() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let task = make_task("bump");
        store.append(&task).unwrap();

        store.set_priority(&task.id, Priority::Urgent).unwrap();
        assert_eq!(store.get(&task.id).unwrap().unwrap().priority, Priority::Medium);

        store.commit().unwrap();
        assert_eq!(store.get(&task.id).unwrap().unwrap().priority, Priority::Urgent);
    }

    #[test]
    fn assigned_to_filters_by_user() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.append(&make_task("a").with_assignee("alice")).unwrap();
        store.append(&make_task("b").with_assignee("bob")).unwrap();

        let mine = store.assigned_to("alice").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id.as_str(), "a");
    }

    #[test]
    fn corrupt_line_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.append(&make_task("ok")).unwrap();
        fs::write(
            store.path(),
            format!("{}\nnot json\n", fs::read_to_string(store.path()).unwrap().trim()),
        )
        .unwrap();

        assert!(matches!(
            store.read_all(),
            Err(TaskStoreError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write_all(&[make_task("one")]).unwrap();

        assert!(!store.path().with_extension("jsonl.tmp").exists());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("nested").join("tasks.jsonl"));

        store.append(&make_task("one")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn reads_wait_for_writers_on_the_lock_file() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.append(&make_task("one")).unwrap();

        // Stand in for a writer in another process
        let writer = OpenOptions::new()
            .write(true)
            .open(store.lock_path())
            .unwrap();
        writer.lock_exclusive().unwrap();

        let reader = TaskStore::new(store.path());
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            tx.send(reader.read_all().map(|tasks| tasks.len())).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        // The writer appends and releases; the reader then sees its line
        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file, "{}", serde_json::to_string(&make_task("two")).unwrap()).unwrap();
        FileExt::unlock(&writer).unwrap();

        let read = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(read, 2);
        handle.join().unwrap();
    }
}
