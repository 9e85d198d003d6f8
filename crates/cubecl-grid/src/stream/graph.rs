use hashbrown::HashMap;

use crate::error::LaunchError;
use crate::id::TaskId;

/// The final state of a launched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Every group of the task completed.
    Completed,
    /// At least one group of the task failed.
    Failed,
}

/// A task registered in a [TaskGraph].
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// The id of the task.
    pub id: TaskId,
    /// The name the task was launched with.
    pub name: String,
    /// The tasks this one happens after.
    pub after: Vec<TaskId>,
    /// The final state of the task.
    pub state: TaskState,
}

/// The happens-after edges between the tasks of a stream.
///
/// Completed tasks are forgotten at every synchronization point: anything launched before
/// the last sync is known to be complete. Failed tasks are kept until the following sync so
/// that launches depending on them in between are still refused.
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: HashMap<TaskId, TaskRecord>,
    order: Vec<TaskId>,
    synced_up_to: Option<TaskId>,
}

impl TaskGraph {
    /// Check that every dependency in `after` completed.
    pub fn check_ready(&self, after: &[TaskId]) -> Result<(), LaunchError> {
        for dependency in after {
            match self.tasks.get(dependency) {
                Some(record) if record.state == TaskState::Failed => {
                    return Err(LaunchError::DependencyFailed {
                        dependency: *dependency,
                    });
                }
                Some(_) => {}
                None => match self.synced_up_to {
                    Some(synced) if *dependency <= synced => {}
                    _ => {
                        return Err(LaunchError::UnknownDependency {
                            dependency: *dependency,
                        });
                    }
                },
            }
        }

        Ok(())
    }

    /// Register a task that finished in `state`.
    pub fn register(&mut self, id: TaskId, name: &str, after: &[TaskId], state: TaskState) {
        let record = TaskRecord {
            id,
            name: name.to_string(),
            after: after.to_vec(),
            state,
        };
        self.tasks.insert(id, record);
        self.order.push(id);
    }

    /// The state of a known task.
    pub fn state(&self, id: &TaskId) -> Option<TaskState> {
        self.tasks.get(id).map(|record| record.state)
    }

    /// Whether `task` transitively happens after `dependency`.
    pub fn happens_after(&self, task: &TaskId, dependency: &TaskId) -> bool {
        let mut stack = vec![*task];

        while let Some(current) = stack.pop() {
            let Some(record) = self.tasks.get(&current) else {
                continue;
            };
            for parent in record.after.iter() {
                if parent == dependency {
                    return true;
                }
                stack.push(*parent);
            }
        }

        false
    }

    /// The known tasks in launch order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskRecord> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// The number of known tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is known.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Forget completed tasks, every task launched so far is now known to be done.
    ///
    /// Failed tasks already present at the previous sync were reported and are dropped.
    pub fn mark_synced(&mut self) {
        let previous = self.synced_up_to;
        if let Some(last) = self.order.iter().max() {
            self.synced_up_to = Some(*last);
        }

        self.tasks.retain(|id, record| {
            record.state == TaskState::Failed && previous.is_none_or(|synced| *id > synced)
        });
        let tasks = &self.tasks;
        self.order.retain(|id| tasks.contains_key(id));
    }
}
