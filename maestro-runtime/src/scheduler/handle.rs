use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle for one registered task. Cancelling it ends that task's
/// scheduling loop at its next suspension point; the service and its
/// other tasks are unaffected.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    name: String,
    token: CancellationToken,
}

impl TaskHandle {
    pub(crate) fn new(name: String, token: CancellationToken) -> Self {
        Self { name, token }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cooperatively cancel this registration. Idempotent.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(task = %self.name, "task cancelled");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
