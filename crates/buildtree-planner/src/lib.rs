mod assign;
mod outdated;
mod plan;
mod scan;
mod types;

pub use assign::assign_actions;
pub use outdated::compute_outdated_or_missing;
pub use plan::plan;
pub use scan::{scan_installed_versions, split_directory_name};
pub use types::{Plan, PlanError, PlannedPackage, WizardMode};

#[cfg(test)]
mod tests;
