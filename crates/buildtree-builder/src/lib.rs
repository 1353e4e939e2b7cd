mod cleanup;
mod env;
mod events;
mod executor;
mod fs_utils;
mod installer;
mod layout;
mod runner;

pub use cleanup::cleanup;
pub use env::{BuildEnvironment, DEFAULT_RUNTIME_SUBDIR};
pub use events::{BuildEvent, EventSink};
pub use executor::{BuildExecutor, BuildOptions, BuildReport, NodeFailure};
pub use installer::{run_installation, CleanupOutcome, InstallSummary};
pub use layout::BuildLayout;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
