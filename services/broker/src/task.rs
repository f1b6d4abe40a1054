use std::sync::Arc;

use parking_lot::Mutex;

/// A task's lifecycle state. Ordered exactly as spec'd: a waiter blocked for
/// state `S` wakes once `task.state() >= S`. `Completed` and `Terminated`
/// are alternate terminal branches reached from `Assigned` by the same
/// `response` message, distinguished only by whether its code parses as an
/// integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskState {
    Unconfirmed = 0,
    Confirmed = 1,
    Assigned = 2,
    Completed = 3,
    Terminated = 4,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Terminated)
    }
}

#[derive(Debug)]
struct TaskInner {
    id: Option<u64>,
    state: TaskState,
    code: i64,
    output: String,
}

/// One outstanding unit of work submitted through [`crate::BrokerAdapter::request`].
///
/// `command` is fixed at construction; `id`, `state`, `code`, and `output`
/// are mutated by the adapter's dispatch loop as confirmations, assignments,
/// and responses arrive, and read by callers through the accessors below.
#[derive(Debug)]
pub struct Task {
    command: String,
    inner: Mutex<TaskInner>,
}

impl Task {
    pub(crate) fn new(command: String) -> Arc<Self> {
        Arc::new(Self {
            command,
            inner: Mutex::new(TaskInner {
                id: None,
                state: TaskState::Unconfirmed,
                code: -1,
                output: String::new(),
            }),
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn id(&self) -> Option<u64> {
        self.inner.lock().id
    }

    pub fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    pub fn code(&self) -> i64 {
        self.inner.lock().code
    }

    /// Decoded output: real responses arrive with `\n`/`\t`/`\\` wire-escaped,
    /// per spec.md §6's `output(decode=true)` accessor contract.
    pub fn output(&self) -> String {
        chat_protocol::escape::decode_output(&self.inner.lock().output)
    }

    pub(crate) fn confirm(&self, id: Option<u64>) {
        let mut inner = self.inner.lock();
        inner.id = id;
        inner.state = TaskState::Confirmed;
    }

    pub(crate) fn assign(&self, worker: String) {
        let mut inner = self.inner.lock();
        inner.output = worker;
        inner.state = TaskState::Assigned;
    }

    pub(crate) fn complete(&self, code: i64, output: String) {
        let mut inner = self.inner.lock();
        inner.code = code;
        inner.output = output;
        inner.state = TaskState::Completed;
    }

    pub(crate) fn terminate(&self, code_text: String) {
        let mut inner = self.inner.lock();
        inner.code = -1;
        inner.output = code_text;
        inner.state = TaskState::Terminated;
    }

    /// Demotes a rejected completion back to `unconfirmed`, preserving the
    /// task's id so the next response can still be correlated if the broker
    /// later responds again by command.
    pub(crate) fn demote(&self) {
        let mut inner = self.inner.lock();
        inner.state = TaskState::Unconfirmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ordering_is_monotone() {
        assert!(TaskState::Unconfirmed < TaskState::Confirmed);
        assert!(TaskState::Confirmed < TaskState::Assigned);
        assert!(TaskState::Assigned < TaskState::Completed);
        assert!(TaskState::Completed < TaskState::Terminated);
    }

    #[test]
    fn fresh_task_starts_unconfirmed_with_sentinel_id() {
        let task = Task::new("ls".to_string());
        assert_eq!(task.state(), TaskState::Unconfirmed);
        assert_eq!(task.id(), None);
        assert_eq!(task.code(), -1);
    }
}
