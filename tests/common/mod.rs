//! Common test utilities shared across integration tests.

use errand::{Storage, Task, TaskId, TaskStatus};
use std::time::Duration;

/// Wait for a task to reach an expected status, polling storage.
///
/// Polls storage every 10ms and times out after the specified duration.
///
/// # Panics
///
/// Panics if the timeout is reached before the task reaches the expected status.
pub async fn wait_for_status(
    storage: &dyn Storage,
    task_id: &TaskId,
    expected: TaskStatus,
    timeout: Duration,
) -> Task {
    let start = tokio::time::Instant::now();
    loop {
        let task = storage.get_task(task_id).await.unwrap();
        if task.status == expected {
            return task;
        }
        if start.elapsed() > timeout {
            panic!(
                "Timeout waiting for task {} to reach {:?}, current status: {:?}",
                task_id, expected, task.status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
