use promexec_types::{EnvVar, PromexecError, PromexecResult, PORT_PLACEHOLDER};
use serde::Serialize;

/// Launch template. `{{port}}` in the command or any env value is filled per run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubprocessSpec {
    command: String,
    env: Vec<EnvVar>,
}

impl SubprocessSpec {
    pub fn new(command: impl Into<String>, env: Vec<EnvVar>) -> PromexecResult<Self> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(PromexecError::Config("No command to execute".into()));
        }
        Ok(Self { command, env })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn env(&self) -> &[EnvVar] {
        &self.env
    }

    pub fn uses_port(&self) -> bool {
        self.command.contains(PORT_PLACEHOLDER) || self.env.iter().any(EnvVar::has_placeholder)
    }

    pub fn materialize(&self, port: u16) -> MaterializedSpec {
        let port = port.to_string();
        MaterializedSpec {
            command: self.command.replace(PORT_PLACEHOLDER, &port),
            env: self
                .env
                .iter()
                .map(|var| EnvVar::new(var.name.clone(), var.value.replace(PORT_PLACEHOLDER, &port)))
                .collect(),
        }
    }
}

/// A spec with every placeholder substituted, ready to launch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MaterializedSpec {
    pub command: String,
    pub env: Vec<EnvVar>,
}
