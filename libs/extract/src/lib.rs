//! Connectivity extraction of pure-layer layout geometry.
//!
//! Given a cell whose contents are raw layer shapes (pure-layer nodes and
//! dumb wires), extraction produces a new cell that expresses the same
//! geometry as contacts, transistors, wires with pins, and exports. Shapes
//! that cannot be explained are kept as pure-layer nodes and reported as
//! [`ExtractIssue`]s.
//!
//! ```
//! # use extract::{ExtractOptions, Extractor, NoTrace};
//! # use layir::{LibraryBuilder, Cell};
//! # let tech = tech::testing::test_tech();
//! let mut lib = LibraryBuilder::new();
//! let root = lib.add_cell(Cell::new("top")).unwrap();
//! let lib = lib.build().unwrap();
//!
//! let options = ExtractOptions::default().validate().unwrap();
//! let output = Extractor::new(&tech, options).run(&lib, root, &mut NoTrace).unwrap();
//! assert!(output.library.try_cell_named("top_extracted").is_some());
//! ```

use std::collections::{HashMap, HashSet};

use arcstr::ArcStr;
use diagnostics::{IssueSet, Severity};
use indexmap::IndexMap;
use layir::{CellId, Library, LibraryBuilder};
use tech::{LayerId, Technology};
use tracing::{span, Level};

pub mod config;
pub mod error;
pub mod issue;
pub mod process;
pub mod shapes;
pub mod trace;

mod bridge;
mod centerline;
mod cleanup;
mod collect;
mod context;
mod cuts;
mod exports;
mod fallback;
mod merge;
mod nets;
mod transistor;
mod via;
mod wire;

#[cfg(test)]
mod tests;

pub use config::{
    ActiveHandling, ConfigError, ExtractOptions, StageFlags, ValidatedOptions, ViaHalo,
};
pub use context::{CancelToken, ExtractStats};
pub use error::{ExtractError, Result};
pub use issue::{Cause, ExtractIssue, Rejection, TemplateFailure};
pub use process::{ProcessInfo, Substrate};
pub use trace::{NoTrace, Stage, TraceAction, TraceEvent, TraceSink, VecTrace};

use context::ExtractContext;

/// The result of extracting one source cell.
#[derive(Debug)]
pub enum CellOutcome {
    /// The cell was extracted into a new cell.
    Extracted {
        /// The new cell, in [`ExtractOutput::library`].
        cell: CellId,
        /// What the new cell contains.
        stats: ExtractStats,
    },
    /// Extraction of the cell stopped with an error.
    ///
    /// Parents of a failed cell keep instantiating the source cell.
    Failed(ExtractError),
}

impl CellOutcome {
    /// The extracted cell, if extraction succeeded.
    pub fn cell(&self) -> Option<CellId> {
        match self {
            CellOutcome::Extracted { cell, .. } => Some(*cell),
            CellOutcome::Failed(_) => None,
        }
    }
}

/// Everything produced by an extraction run.
#[derive(Debug)]
pub struct ExtractOutput {
    /// The input library with the extracted cells added.
    pub library: LibraryBuilder,
    /// Per source cell, in the order the cells were extracted.
    ///
    /// The root cell is always last.
    pub outcomes: IndexMap<CellId, CellOutcome>,
    /// Diagnostics from all extracted cells.
    pub issues: IssueSet<ExtractIssue>,
}

impl ExtractOutput {
    /// The extracted counterpart of `source`, if there is one.
    pub fn extracted(&self, source: CellId) -> Option<CellId> {
        self.outcomes.get(&source).and_then(CellOutcome::cell)
    }

    /// The outcome for the root cell of the run.
    pub fn root(&self) -> Option<&CellOutcome> {
        self.outcomes.last().map(|(_, outcome)| outcome)
    }
}

/// Runs extraction over a library with one technology and set of options.
pub struct Extractor<'a> {
    tech: &'a Technology,
    options: ValidatedOptions,
    cancel: CancelToken,
}

impl<'a> Extractor<'a> {
    /// Creates an extractor.
    pub fn new(tech: &'a Technology, options: ValidatedOptions) -> Self {
        Self {
            tech,
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Uses `cancel` to stop the run from elsewhere.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A token that cancels this extractor's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The options in use.
    pub fn options(&self) -> &ValidatedOptions {
        &self.options
    }

    /// Extracts the cell named `root`.
    pub fn run_named(
        &self,
        library: &Library,
        root: &str,
        trace: &mut dyn TraceSink,
    ) -> Result<ExtractOutput> {
        let id = library
            .try_cell_id_named(root)
            .ok_or_else(|| ExtractError::UnknownCell(root.into()))?;
        self.run(library, id, trace)
    }

    /// Extracts `root` and, if the options are recursive, every opaque cell below it.
    ///
    /// Only an unknown root is an error here; failures of individual cells
    /// are reported in [`ExtractOutput::outcomes`].
    pub fn run(
        &self,
        library: &Library,
        root: CellId,
        trace: &mut dyn TraceSink,
    ) -> Result<ExtractOutput> {
        if library.try_cell(root).is_none() {
            return Err(ExtractError::UnknownCell(arcstr::format!("{root}")));
        }
        let source: &LibraryBuilder = library;
        let process = ProcessInfo::classify(self.tech, &self.options, source, root);
        tracing::debug!(
            substrate = ?process.substrate,
            unify_active = process.unify_active,
            "classified process"
        );

        let mut out = source.clone();
        let mut memo = HashMap::new();
        let mut outcomes = IndexMap::new();
        let mut issues = IssueSet::new();

        for id in self.order(source, root) {
            let result =
                self.extract_cell(&mut out, &memo, &process, id, &mut *trace, &mut issues);
            let outcome = match result {
                Ok((cell, stats)) => {
                    memo.insert(id, cell);
                    CellOutcome::Extracted { cell, stats }
                }
                Err(err) => {
                    tracing::error!(cell = %source.cell(id).name(), %err, "failed to extract cell");
                    CellOutcome::Failed(err)
                }
            };
            outcomes.insert(id, outcome);
        }

        Ok(ExtractOutput {
            library: out,
            outcomes,
            issues,
        })
    }

    /// The cells to extract, children before parents, ending with `root`.
    ///
    /// Expanded cells are flattened into their parents and are not extracted
    /// on their own, but the opaque cells inside them are.
    fn order(&self, library: &LibraryBuilder, root: CellId) -> Vec<CellId> {
        let mut order = Vec::new();
        if self.options.recursive {
            let mut done = HashSet::new();
            self.visit(library, root, &mut done, &mut order);
        }
        if !order.contains(&root) {
            order.push(root);
        }
        order
    }

    fn visit(
        &self,
        library: &LibraryBuilder,
        id: CellId,
        done: &mut HashSet<CellId>,
        order: &mut Vec<CellId>,
    ) {
        let Some(cell) = library.try_cell(id) else {
            return;
        };
        for child in cell.children() {
            let Some(child_cell) = library.try_cell(child) else {
                continue;
            };
            if self.options.should_expand(child_cell.name()) {
                // Flattened into the parent, but its opaque children are not.
                self.visit(library, child, done, order);
            } else if done.insert(child) {
                self.visit(library, child, done, order);
                order.push(child);
            }
        }
    }

    fn extract_cell(
        &self,
        out: &mut LibraryBuilder,
        memo: &HashMap<CellId, CellId>,
        process: &ProcessInfo,
        source: CellId,
        trace: &mut dyn TraceSink,
        issues: &mut IssueSet<ExtractIssue>,
    ) -> Result<(CellId, ExtractStats)> {
        let source_name: ArcStr = out
            .try_cell(source)
            .ok_or_else(|| ExtractError::UnknownCell(arcstr::format!("{source}")))?
            .name()
            .clone();
        let name = self.options.destination_name(&source_name);
        if out.try_cell_id_named(&name).is_some() {
            return Err(ExtractError::DestinationExists(name));
        }

        let span = span!(Level::INFO, "extract", cell = %source_name);
        let _guard = span.enter();

        let mut ctx = ExtractContext::new(
            self.tech,
            &self.options,
            process,
            out,
            memo,
            &self.cancel,
            trace,
            name,
        );
        run_stages(&mut ctx, source)?;

        let ExtractContext {
            mut cell,
            issues: cell_issues,
            mut stats,
            export_requests,
            ..
        } = ctx;

        exports::apply_requests(
            self.tech,
            out,
            &mut cell,
            export_requests,
            &self.options.placeholder_prefix,
        );
        let id = out.add_cell(cell)?;

        tracing::info!(
            contacts = stats.contacts,
            transistors = stats.transistors,
            other_devices = stats.other_devices,
            arcs = stats.arcs,
            pins = stats.pins,
            pure_layer = stats.pure_layer,
            exports = stats.exports,
            dust = stats.dust,
            issues = cell_issues.len(),
            "extracted cell"
        );
        issues.extend(cell_issues);
        Ok((id, stats))
    }
}

/// Runs the pipeline over one cell, in order.
fn run_stages(ctx: &mut ExtractContext<'_>, source: CellId) -> Result<()> {
    let stages = ctx.options.stages;

    collect::collect(ctx, source)?;
    check_subset(ctx, Stage::Collect);
    if stages.vias {
        via::extract_vias(ctx)?;
        check_subset(ctx, Stage::Vias);
    }
    if stages.transistors {
        transistor::extract_transistors(ctx)?;
        check_subset(ctx, Stage::Transistors);
    }
    if stages.wires {
        wire::extract_wires(ctx)?;
        check_subset(ctx, Stage::Wires);
    }
    if stages.bridges {
        bridge::bridge(ctx)?;
        check_subset(ctx, Stage::Bridges);
    }
    fallback::fallback(ctx)?;
    check_subset(ctx, Stage::PureLayer);
    exports::reconcile(ctx)?;
    if stages.auto_cleanup {
        cleanup::cleanup(ctx)?;
    }
    Ok(())
}

/// Working geometry only ever shrinks.
///
/// Anything a stage leaves outside the collected geometry is reported and clipped.
fn check_subset(ctx: &mut ExtractContext<'_>, stage: Stage) {
    if ctx.working.is_subset_of(&ctx.original) {
        return;
    }
    let layers: Vec<LayerId> = ctx.working.layers().collect();
    for layer in layers {
        let excess = ctx.working.region(layer).difference(&ctx.original.region(layer));
        if excess.is_empty() {
            continue;
        }
        let at = excess
            .interior_point()
            .map(|p| ctx.options.snap_f(p))
            .or_else(|| excess.bbox().map(|b| b.center()))
            .unwrap_or_default();
        ctx.working.subtract(layer, &excess);
        let name = ctx.tech.layer(layer).name().clone();
        ctx.issue(
            Cause::GeometryGrew { stage, layer: name },
            Severity::Error,
            vec![at],
        );
    }
}
