use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromexecError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Port allocation error: {0}")]
    Allocation(String),

    #[error("Scrape receiver bind error: {0}")]
    Bind(String),

    #[error("Scrape receiver unbind error: {0}")]
    Unbind(String),

    #[error("Subprocess error: {0}")]
    Subprocess(#[from] SubprocessError),

    #[error("Shutdown already requested")]
    AlreadyShutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PromexecError {
    /// Only subprocess failures feed the restart policy; everything else ends supervision.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PromexecError::Subprocess(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubprocessError {
    #[error("failed to launch process: {0}")]
    Launch(String),

    #[error("process exited with status {0}")]
    ExitCode(i32),

    #[error("process terminated by signal {0}")]
    Signaled(i32),

    #[error("failed to wait for process: {0}")]
    Wait(String),
}

pub type PromexecResult<T> = Result<T, PromexecError>;
