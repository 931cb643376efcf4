use futures::Future;
use tokio_util::sync::CancellationToken;

/// Group of background listeners that live as long as their owner.
///
/// Dropping the pool (or calling [`TaskPool::cancel_all`]) stops every task
/// at its next await point.
pub struct TaskPool {
    cancel_token: CancellationToken,
}

impl TaskPool {
    pub fn new() -> TaskPool {
        TaskPool {
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn execute<F>(&self, name: &'static str, func: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = func => {},
                () = token.cancelled() => {
                    log::debug!("Background task '{name}' cancelled");
                }
            }
        });
    }

    pub fn cancel_all(&self) {
        self.cancel_token.cancel();
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
