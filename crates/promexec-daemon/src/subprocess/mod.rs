mod runner;
mod spec;

pub use runner::{CommandRunner, ProcessRunner};
pub use spec::{MaterializedSpec, SubprocessSpec};
