use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use buildtree_builder::{
    run_installation, BuildOptions, CleanupOutcome, InstallSummary, SystemRunner,
};
use buildtree_catalog::{augment_tree, DownloadQueue, HttpFetcher, HttpVersionSource};
use buildtree_core::{NodeAction, PackageTree};
use buildtree_planner::{plan, Plan, PlanError, PlannedPackage, WizardMode};
use tracing::{debug, info};

use crate::config::Settings;
use crate::render::{render_error_report, BuildProgress, TerminalRenderer};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const PROFILE_MARKER: &str = "# buildtree environment";

pub fn run_wizard(
    settings: &Settings,
    mode: WizardMode,
    assume_yes: bool,
    renderer: TerminalRenderer,
) -> Result<()> {
    let layout = settings.layout()?;
    let mut tree = load_tree(settings)?;
    discover(&mut tree, renderer)?;

    layout.ensure_base_dirs()?;
    let plan = build_plan(&mut tree, layout.source_dir(), mode, renderer)?;
    if plan.is_noop() {
        renderer.print_status("ok", "everything is up to date");
        return Ok(());
    }

    renderer.print_section("Plan");
    if mode == WizardMode::Upgrade {
        renderer.print_lines(&format_outdated_lines(&plan));
    }
    renderer.print_lines(&format_plan_lines(&plan));
    if !assume_yes && !confirm(&format!("Proceed with {}?", mode.as_str()))? {
        renderer.print_status("warn", "aborted");
        return Ok(());
    }

    let queue = DownloadQueue::for_tree(&tree, layout.source_dir())?
        .with_width(settings.download_width);
    if !queue.is_empty() {
        renderer.print_section("Download");
        let fetcher = HttpFetcher::new(HTTP_TIMEOUT)?;
        queue.run(&fetcher, |request, status| {
            renderer.print_status(
                "ok",
                &format!("{} {}", status.as_str(), request.destination.display()),
            );
        })?;
    }

    renderer.print_section("Build");
    let options = BuildOptions {
        environment: settings.environment(&layout),
        layout,
        configure_options: settings.configure_options.clone(),
    };
    let mut sink = BuildProgress::new(
        renderer.start_progress(mode.as_str(), plan.step_count()),
        renderer.style(),
    );
    let summary = run_installation(&tree, &options, &mut SystemRunner, &mut sink);
    sink.finish();

    finish_summary(&tree, &summary, &options, renderer)
}

pub fn run_plan(
    settings: &Settings,
    mode: WizardMode,
    json: bool,
    renderer: TerminalRenderer,
) -> Result<()> {
    let mut tree = load_tree(settings)?;
    discover(&mut tree, renderer)?;
    let plan = build_plan(&mut tree, settings.source_dir()?, mode, renderer)?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&plan).context("failed to serialize plan as json")?;
        println!("{rendered}");
        return Ok(());
    }
    if mode == WizardMode::Upgrade {
        renderer.print_lines(&format_outdated_lines(&plan));
    }
    renderer.print_lines(&format_plan_lines(&plan));
    println!("steps: {}", plan.step_count());
    Ok(())
}

pub fn run_tree(settings: &Settings, with_versions: bool) -> Result<()> {
    let mut tree = load_tree(settings)?;
    if with_versions {
        let source = HttpVersionSource::new(HTTP_TIMEOUT)?;
        augment_tree(&mut tree, &source)?;
    }
    print!("{}", tree.render(tree.root()));
    Ok(())
}

pub fn run_env(
    settings: &Settings,
    write_profile: Option<PathBuf>,
    renderer: TerminalRenderer,
) -> Result<()> {
    let layout = settings.layout()?;
    let exports = settings.environment(&layout).shell_exports();

    let Some(requested) = write_profile else {
        renderer.print_lines(&exports);
        return Ok(());
    };
    let profile = if requested.as_os_str().is_empty() {
        default_profile_path()?
    } else {
        requested
    };
    if append_profile_exports(&profile, &exports)? {
        renderer.print_status("ok", &format!("updated {}", profile.display()));
    } else {
        renderer.print_status(
            "ok",
            &format!("{} already sets the environment", profile.display()),
        );
    }
    Ok(())
}

fn load_tree(settings: &Settings) -> Result<PackageTree> {
    let manifest = settings.manifest()?;
    let tree = PackageTree::from_manifest_path(manifest)
        .with_context(|| format!("failed to load manifest: {}", manifest.display()))?;
    debug!(packages = tree.node_count(), "manifest loaded");
    Ok(tree)
}

fn discover(tree: &mut PackageTree, renderer: TerminalRenderer) -> Result<()> {
    let source = HttpVersionSource::new(HTTP_TIMEOUT)?;
    if let Err(err) = augment_tree(tree, &source) {
        if let Some(report) = err.as_report() {
            renderer.print_lines(&render_error_report(
                renderer.style(),
                report.title(),
                &report.header(),
                report.diagnostic(),
            ));
        }
        return Err(err).context("failed to discover package versions");
    }
    Ok(())
}

fn build_plan(
    tree: &mut PackageTree,
    source_dir: &Path,
    mode: WizardMode,
    renderer: TerminalRenderer,
) -> Result<Plan> {
    match plan(tree, source_dir, mode) {
        Ok(plan) => Ok(plan),
        Err(PlanError::UpdatesFound { packages }) => {
            renderer.print_lines(&render_error_report(
                renderer.style(),
                "Updates Found",
                "Your installation is outdated or not properly installed.",
                &format!("Run an install or an upgrade first: {}", packages.join(", ")),
            ));
            Err(anyhow!("rebuild refused: {} package(s) need updating", packages.len()))
        }
        Err(err) => Err(err).context("failed to plan the run"),
    }
}

fn finish_summary(
    tree: &PackageTree,
    summary: &InstallSummary,
    options: &BuildOptions,
    renderer: TerminalRenderer,
) -> Result<()> {
    match &summary.cleanup {
        CleanupOutcome::Completed { removed } => {
            info!(removed = removed.len(), "cleanup finished");
            renderer.print_status(
                "ok",
                &format!(
                    "built {} package(s), removed {} stale path(s)",
                    summary.report.built.len(),
                    removed.len()
                ),
            );
            renderer.print_section("Environment");
            renderer.print_status(
                "step",
                "add these lines to your shell profile, or run `buildtree env --write-profile`:",
            );
            renderer.print_lines(&options.environment.shell_exports());
            Ok(())
        }
        CleanupOutcome::Failed(err) => Err(anyhow!(
            "packages were built but cleanup failed: {}",
            err.header()
        )),
        CleanupOutcome::Skipped => {
            let failed = summary
                .report
                .failures
                .iter()
                .map(|failure| tree.node(failure.node).name.as_str())
                .collect::<Vec<_>>();
            Err(anyhow!(
                "installation failed for {} package(s): {}",
                failed.len(),
                failed.join(", ")
            ))
        }
    }
}

fn format_package_line(package: &PlannedPackage) -> String {
    let version = package.version.as_deref().unwrap_or("?");
    format!(
        "{}{} {} [{}]",
        "  ".repeat(package.depth),
        package.name,
        version,
        package.action.as_str()
    )
}

pub fn format_plan_lines(plan: &Plan) -> Vec<String> {
    plan.packages
        .iter()
        .filter(|package| package.action != NodeAction::None)
        .map(format_package_line)
        .collect()
}

pub fn format_outdated_lines(plan: &Plan) -> Vec<String> {
    if plan.outdated.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["updates available:".to_string()];
    lines.extend(plan.outdated.iter().map(|package| {
        format!(
            "  {} {} -> {}",
            package.name,
            package.installed_version.as_deref().unwrap_or("not installed"),
            package.version.as_deref().unwrap_or("?")
        )
    }));
    lines
}

fn confirm(prompt: &str) -> Result<bool> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Err(anyhow!("confirmation required; rerun with --yes"));
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(parse_confirmation(&answer))
}

pub fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn default_profile_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set"))?;
    Ok(PathBuf::from(home).join(".bashrc"))
}

/// Append the export block unless the profile already carries it. Returns
/// whether the file changed.
pub fn append_profile_exports(profile: &Path, exports: &[String]) -> Result<bool> {
    let existing = match fs::read_to_string(profile) {
        Ok(existing) => existing,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", profile.display()))
        }
    };
    if existing.contains(PROFILE_MARKER) {
        return Ok(false);
    }

    let mut block = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(PROFILE_MARKER);
    block.push('\n');
    for line in exports {
        block.push_str(line);
        block.push('\n');
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(profile)
        .with_context(|| format!("failed to open {}", profile.display()))?;
    file.write_all(block.as_bytes())
        .with_context(|| format!("failed to write {}", profile.display()))?;
    Ok(true)
}
