/*
 * Codegraph PDG - Program Dependence Graph engine
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (Span, errors, diagnostics) and the fixpoint solver
 * - features/    : Vertical slices (syntax → flow_graph → dominance → data_flow → pdg → export)
 * - pipeline/    : Per-procedure orchestration and parallel batches
 * - config/      : Versioned YAML configuration
 *
 * Performance:
 * - Rayon work-stealing across procedures
 * - Post-dominance and reaching definitions joined per procedure
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Node construction takes the full payload
#![allow(clippy::should_implement_trait)] // from_str naming intentional
#![allow(clippy::new_without_default)] // Explicit constructors for stage types

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and utilities
pub mod shared;

/// Feature modules (analysis stages)
pub mod features;

/// Pipeline orchestration
pub mod pipeline;

/// Configuration system
pub mod config;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::PdgConfig;
pub use features::export::export;
pub use features::pdg::ProgramDependenceGraph;
pub use features::syntax::{JavaAdapter, Procedure, SyntaxAdapter};
pub use pipeline::{BatchAnalyzer, BatchResult, PdgPipeline, ProcedureAnalysis};
pub use shared::models::{Diagnostic, DiagnosticKind, PdgError, Result};
