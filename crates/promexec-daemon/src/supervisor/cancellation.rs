use promexec_types::{PromexecError, PromexecResult};
use std::sync::Arc;
use tokio::sync::watch;

/// Single-fire shutdown broadcast. Once fired it stays fired.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { sender: Arc::new(tx) }
    }

    /// Fires the signal. A second fire is rejected with `AlreadyShutdown`.
    pub fn fire(&self) -> PromexecResult<()> {
        let mut fired_now = false;
        self.sender.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                fired_now = true;
                true
            }
        });

        if fired_now {
            Ok(())
        } else {
            Err(PromexecError::AlreadyShutdown)
        }
    }

    pub fn is_fired(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    pub fn is_fired(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn fired(&mut self) {
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                break;
            }
        }
    }
}
