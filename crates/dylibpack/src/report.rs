//! User-facing output
//!
//! Every function returns lines rather than printing, so `main` decides
//! between stdout and stderr.

use dylibpack_core::{ClosedGraph, Discovery, NodeOutcome, PatchFailure, PatchReport};
use serde::Serialize;
use std::path::Path;

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

pub(crate) fn header(input: &Path) -> String {
    format!("Patching {}", input.display())
}

pub(crate) fn count_line(count: usize) -> String {
    format!("{count} total non-system dependenc{}", plural(count))
}

/// One line per dependency, naming its direct dependencies by position
///
/// Position 0 is the root binary.
pub(crate) fn minimal_listing(graph: &ClosedGraph) -> Vec<String> {
    let mut lines = vec![count_line(graph.dependency_count())];

    for (id, node) in graph.dependencies() {
        let slots: Vec<String> = graph
            .direct_dependencies(id)
            .iter()
            .map(|dep| dep.index().to_string())
            .collect();
        let slots = if slots.is_empty() {
            "No dependencies".to_string()
        } else {
            slots.join(", ")
        };
        lines.push(format!("{}\t{} -> {slots}", id.index(), node.declared_name()));
    }

    lines
}

/// Every dependency followed by all of its transitive dependencies
pub(crate) fn verbose_listing(graph: &ClosedGraph) -> Vec<String> {
    let mut lines = vec![count_line(graph.dependency_count())];

    for (id, node) in graph.dependencies() {
        lines.push(node.declared_name().to_string());
        lines.extend(
            graph
                .transitive_dependencies(id)
                .into_iter()
                .map(|dep| format!("-> {}", graph.node(dep).declared_name())),
        );
    }

    lines
}

pub(crate) fn listing(graph: &ClosedGraph, verbose: bool) -> Vec<String> {
    if verbose {
        verbose_listing(graph)
    } else {
        minimal_listing(graph)
    }
}

pub(crate) fn discovery_warnings(discovery: &Discovery, verbose: bool) -> Vec<String> {
    let outcome = &discovery.outcome;
    if !outcome.has_warnings() {
        return Vec::new();
    }

    let mut lines = vec![
        "Some of the paths in the dependency tree could not be resolved".to_string(),
        format!(
            "Maybe you already bundled {}?",
            discovery.graph().root().declared_name()
        ),
    ];

    if verbose {
        lines.extend(
            outcome
                .unresolved
                .iter()
                .map(|path| format!("Could not resolve {path}")),
        );
        lines.extend(
            outcome
                .failed_inspections
                .iter()
                .map(|(path, error)| format!("Could not inspect {}: {error}", path.display())),
        );
    } else {
        lines.push("Run with -v to see failed paths".to_string());
    }

    lines
}

pub(crate) fn patch_failure(failure: &PatchFailure, verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for outcome in &failure.failed {
        lines.push(format!("Error patching {}", outcome.name));
        if verbose && !outcome.stderr.trim().is_empty() {
            lines.push(outcome.stderr.trim_end().to_string());
        }
    }
    if !verbose {
        lines.push("Run with -v for more information".to_string());
    }

    lines
}

pub(crate) fn success(input: &Path, dependencies: usize) -> String {
    format!(
        "{} + {dependencies} dependenc{} successfully patched",
        file_name(input),
        plural(dependencies)
    )
}

/// Machine-readable run summary
#[derive(Debug, Serialize)]
pub(crate) struct JsonSummary<'a> {
    root: &'a Path,
    destination: &'a Path,
    root_loader_path: &'a str,
    dry_run: bool,
    dependencies: Vec<JsonDependency<'a>>,
    unresolved: &'a [String],
    failed_inspections: Vec<String>,
    patched: Option<Vec<JsonOutcome<'a>>>,
}

#[derive(Debug, Serialize)]
struct JsonDependency<'a> {
    name: &'a str,
    path: &'a Path,
    referred_as: Vec<&'a str>,
    dependencies: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct JsonOutcome<'a> {
    name: &'a str,
    file: &'a Path,
    success: bool,
    exit_code: Option<i32>,
    stderr: &'a str,
}

impl<'a> JsonSummary<'a> {
    pub(crate) fn new(discovery: &'a Discovery, dry_run: bool, report: Option<&'a PatchReport>) -> Self {
        let graph = discovery.graph();
        let dependencies = graph
            .dependencies()
            .map(|(id, node)| JsonDependency {
                name: node.declared_name(),
                path: node.canonical_path(),
                referred_as: node.referred_as().iter().map(String::as_str).collect(),
                dependencies: graph
                    .direct_dependencies(id)
                    .iter()
                    .map(|dep| graph.node(*dep).declared_name())
                    .collect(),
            })
            .collect();

        Self {
            root: graph.root().canonical_path(),
            destination: discovery.destination.dir(),
            root_loader_path: discovery.destination.root_loader_path(),
            dry_run,
            dependencies,
            unresolved: discovery.unresolved(),
            failed_inspections: discovery
                .outcome
                .failed_inspections
                .iter()
                .map(|(path, error)| format!("{}: {error}", path.display()))
                .collect(),
            patched: report.map(|report| report.outcomes().iter().map(JsonOutcome::from).collect()),
        }
    }
}

impl<'a> From<&'a NodeOutcome> for JsonOutcome<'a> {
    fn from(outcome: &'a NodeOutcome) -> Self {
        Self {
            name: &outcome.name,
            file: &outcome.file,
            success: outcome.success,
            exit_code: outcome.exit_code,
            stderr: &outcome.stderr,
        }
    }
}
