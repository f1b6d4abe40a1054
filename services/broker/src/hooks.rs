use std::sync::Arc;

use crate::task::Task;

/// The adapter's upcall capability set. A consumer supplies an implementation
/// at construction (or accepts [`NullHooks`]); this is the "small interface
/// object with defaults" alternative to an inheritance chain of virtual
/// methods.
pub trait BrokerHooks: Send + Sync {
    /// Fired once a task leaves `unconfirmed`, whether accepted or rejected.
    fn on_task_confirmed(&self, _task: &Arc<Task>, _accepted: bool) {}

    /// Fired when a confirmed task is handed to `worker`.
    fn on_task_assigned(&self, _task: &Arc<Task>, _worker: &str) {}

    /// Fired on a `response` for an assigned task, whether it completed or
    /// terminated. Returning `false` rejects the completion and demotes the
    /// task back to `unconfirmed`.
    fn on_task_completed(&self, _task: &Arc<Task>) -> bool {
        true
    }

    fn on_idle_worker(&self, _worker: &str) {}
    fn on_busy_worker(&self, _worker: &str) {}
    fn on_capacity_changed(&self, _capacity: u64, _details: &str) {}

    /// Overlay channels to subscribe to once the handshake completes.
    fn subscribed_items(&self) -> Vec<String> {
        chat_protocol::DEFAULT_SUBSCRIBED_ITEMS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// The no-op hook set: logs nothing, accepts every completion, subscribes to
/// the default items.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl BrokerHooks for NullHooks {}
