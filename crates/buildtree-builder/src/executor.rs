use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use buildtree_core::{Error, Extractor, NodeAction, NodeId, PackageNode, PackageTree};
use tracing::{debug, info, warn};

use crate::env::BuildEnvironment;
use crate::events::{BuildEvent, EventSink};
use crate::layout::BuildLayout;
use crate::runner::{CommandOutput, CommandRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub layout: BuildLayout,
    pub environment: BuildEnvironment,
    /// Extra arguments appended to `./configure --prefix=<install_dir>`.
    pub configure_options: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub node: NodeId,
    pub error: Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Packages freshly installed from their archive, in build order.
    pub installed: Vec<NodeId>,
    /// Packages whose steps all succeeded, in build order.
    pub built: Vec<NodeId>,
    /// Top-level directory reported by each unpacked archive.
    pub(crate) unpacked_roots: Vec<(NodeId, String)>,
    pub failures: Vec<NodeFailure>,
    pub completed_leaves: usize,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Configure,
    Clean,
    Build,
    Install,
}

impl Step {
    fn description(self) -> &'static str {
        match self {
            Self::Configure => "Checking for dependencies...",
            Self::Clean => "Cleaning...",
            Self::Build => "Building...",
            Self::Install => "Installing...",
        }
    }

    fn error(self, package: &str, diagnostic: String) -> Error {
        let package = package.to_string();
        match self {
            Self::Configure => Error::Configure { package, diagnostic },
            Self::Clean => Error::Clean { package, diagnostic },
            Self::Build => Error::Build { package, diagnostic },
            Self::Install => Error::Install { package, diagnostic },
        }
    }
}

/// Walks the package tree depth first and runs the build steps of every
/// node according to its action.
///
/// Packages are built strictly one after another. A failing package is
/// reported through the event sink and its subtree is skipped; sibling
/// branches still run. Every command receives the package's build directory
/// explicitly, the process working directory is never changed.
pub struct BuildExecutor<'a, R, S> {
    options: &'a BuildOptions,
    runner: &'a mut R,
    sink: &'a mut S,
    report: BuildReport,
}

impl<'a, R, S> BuildExecutor<'a, R, S>
where
    R: CommandRunner,
    S: EventSink,
{
    pub fn new(options: &'a BuildOptions, runner: &'a mut R, sink: &'a mut S) -> Self {
        Self {
            options,
            runner,
            sink,
            report: BuildReport::default(),
        }
    }

    pub fn execute(mut self, tree: &PackageTree) -> BuildReport {
        self.traverse(tree, tree.root());
        self.report
    }

    fn traverse(&mut self, tree: &PackageTree, id: NodeId) {
        if !self.build_node(tree, id) {
            return;
        }
        let children = tree.children_of(id);
        if children.is_empty() {
            self.report.completed_leaves += 1;
            self.sink.emit(BuildEvent::SubtreeCompleted);
            return;
        }
        for child in children {
            self.traverse(tree, *child);
        }
    }

    fn build_node(&mut self, tree: &PackageTree, id: NodeId) -> bool {
        let node = tree.node(id);
        if node.action == NodeAction::None {
            debug!(package = %node.name, "nothing to do");
            return true;
        }

        info!(package = %node.name, action = node.action.as_str(), "building package");
        match self.run_steps(id, node) {
            Ok(()) => {
                if node.action == NodeAction::Install {
                    self.report.installed.push(id);
                }
                self.report.built.push(id);
                true
            }
            Err(error) => {
                warn!(
                    package = %node.name,
                    title = error.title(),
                    skipped = tree.descendants(id).len(),
                    "{}",
                    error.header()
                );
                self.sink.emit(BuildEvent::error(&error));
                self.report.failures.push(NodeFailure { node: id, error });
                false
            }
        }
    }

    fn run_steps(&mut self, id: NodeId, node: &PackageNode) -> Result<(), Error> {
        let action = node.action;

        if action == NodeAction::Install {
            self.describe(node, "Decompressing the package");
            let top_level = self.unpack(node)?;
            debug!(package = %node.name, top_level = %top_level, "unpacked");
            self.report.unpacked_roots.push((id, top_level));
            self.sink.emit(BuildEvent::ProgressIncrement);
        }

        let build_dir = self.enter_directory(node)?;

        if matches!(action, NodeAction::Install | NodeAction::Rebuild) {
            let mut command = Command::new("sh");
            command.arg("-c").arg(format!(
                "./configure --prefix={} {}",
                shell_quote(self.options.layout.install_dir()),
                self.options.configure_options.trim()
            ));
            self.run_step(node, Step::Configure, &build_dir, command)?;
        }

        if matches!(action, NodeAction::Upgrade | NodeAction::Rebuild) {
            let mut command = Command::new("make");
            command.arg("clean");
            self.run_step(node, Step::Clean, &build_dir, command)?;
        }

        if action != NodeAction::Upgrade {
            self.run_step(node, Step::Build, &build_dir, Command::new("make"))?;
        }

        let mut command = Command::new("make");
        command.arg("install");
        self.run_step(node, Step::Install, &build_dir, command)
    }

    fn describe(&mut self, node: &PackageNode, what: &str) {
        self.sink.emit(BuildEvent::ActionDescription(format!(
            "Package: {}  -  {what}",
            node.name
        )));
    }

    /// Extract the archive into the source directory and return the
    /// top-level directory it created.
    fn unpack(&mut self, node: &PackageNode) -> Result<String, Error> {
        let unpack_error = |diagnostic: String| Error::Unpack {
            package: node.package_archive_name.clone(),
            diagnostic,
        };
        let archive_file_name = node
            .archive_file_name()
            .ok_or_else(|| unpack_error("package has no version".to_string()))?;
        let archive_path = self.options.layout.archive_path(&archive_file_name);
        let source_dir = self.options.layout.source_dir();

        let extractor = node.archive_type.extractor();
        let mut command = extract_command(extractor, &archive_path, source_dir);
        let output = self
            .runner
            .run(&mut command)
            .map_err(|err| unpack_error(err.to_string()))?;
        if !output.success || !output.stderr.trim().is_empty() {
            return Err(unpack_error(failure_text(&output)));
        }

        Ok(top_level_entry(extractor, &output.stdout)
            .unwrap_or_else(|| node.directory_name().unwrap_or_default()))
    }

    fn enter_directory(&self, node: &PackageNode) -> Result<PathBuf, Error> {
        let missing = |diagnostic: String| Error::MissingFolder {
            package: node.package_archive_name.clone(),
            diagnostic,
        };
        let directory_name = node
            .directory_name()
            .ok_or_else(|| missing("package has no version".to_string()))?;
        let build_dir = self.options.layout.build_dir(&directory_name);
        if !build_dir.is_dir() {
            return Err(missing(format!(
                "{}: No such file or directory",
                build_dir.display()
            )));
        }
        Ok(build_dir)
    }

    fn run_step(
        &mut self,
        node: &PackageNode,
        step: Step,
        build_dir: &Path,
        mut command: Command,
    ) -> Result<(), Error> {
        self.describe(node, step.description());
        command
            .current_dir(build_dir)
            .envs(self.options.environment.vars())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = self
            .runner
            .run(&mut command)
            .map_err(|err| step.error(&node.package_archive_name, err.to_string()))?;
        if !output.success {
            return Err(step.error(&node.package_archive_name, output.stderr));
        }
        self.sink.emit(BuildEvent::ProgressIncrement);
        Ok(())
    }
}

fn extract_command(extractor: Extractor, archive_path: &Path, dst: &Path) -> Command {
    let mut command = if extractor == Extractor::Tar {
        let mut command = Command::new("tar");
        command.arg("-xvf").arg(archive_path).arg("-C").arg(dst);
        command
    } else {
        let mut command = Command::new("unzip");
        command.arg("-o").arg(archive_path).arg("-d").arg(dst);
        command
    };
    command.stdin(Stdio::null());
    command
}

/// First path component of the first entry listed by the extractor.
pub(crate) fn top_level_entry(extractor: Extractor, listing: &str) -> Option<String> {
    let listed = if extractor == Extractor::Tar {
        listing.lines().map(str::trim).find(|line| !line.is_empty())
    } else {
        listing.lines().find_map(|line| {
            let (kind, path) = line.trim().split_once(':')?;
            matches!(kind, "creating" | "inflating" | "extracting").then(|| path.trim())
        })
    };
    let first_path = listed?;

    let first_path = first_path.strip_prefix("./").unwrap_or(first_path);
    let relative = match Path::new(first_path).strip_prefix("/") {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => PathBuf::from(first_path),
    };
    let component = relative.components().next()?;
    Some(component.as_os_str().to_string_lossy().into_owned())
}

fn failure_text(output: &CommandOutput) -> String {
    if !output.stderr.trim().is_empty() {
        return output.stderr.clone();
    }
    match output.code {
        Some(code) => format!("extractor exited with status {code}"),
        None => "extractor was terminated by a signal".to_string(),
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}
