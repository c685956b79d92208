//! Canonical type-IR engine for validator generation.
//!
//! Converts a table of declared type definitions into fully canonical,
//! fully instantiated IR ready for validator code generation:
//!
//! - **Resolution** inlines non-structural aliases and leaves structural and
//!   nominal boundaries opaque.
//! - **Instantiation** expands every parameterized reference into a concrete
//!   body, memoized by canonical key, with cycle detection and per-key usage
//!   statistics.
//! - **Flatten** normalizes union and intersection operand lists.
//! - **Intersection solving** reduces every intersection to a single merged
//!   type or the `never` sentinel.
//!
//! The whole pipeline is a synchronous, deterministic tree transform with no
//! I/O; shared state is confined to the per-compilation registry, memo, and
//! usage accumulators threaded explicitly through every call.

pub mod diagnostics;
pub mod flatten;
pub mod instantiate;
pub mod intersect;
pub mod recursion;
pub mod registry;
pub mod resolve;
pub mod types;

pub use diagnostics::{SolverError, SolverResult};
pub use flatten::flatten;
pub use instantiate::{
    InstantiationState, MAX_INSTANTIATION_DEPTH, MemoEntry, UsageStats, canonical_key, instantiate,
};
pub use intersect::{IntersectionSolver, MAX_INTERSECTION_DEPTH, solve_intersections};
pub use recursion::{RecursionGuard, RecursionResult};
pub use registry::TypeRegistry;
pub use resolve::resolve_all;
pub use types::{
    BuiltinKind, IntrinsicKind, LiteralValue, ObjectShape, PropertyInfo, TupleShape, TypeIr,
};

use indexmap::IndexMap;
use tracing::debug;

/// Output of a full pipeline run: one canonical IR value per requested type,
/// plus the populated instantiation memo.
///
/// The code generator must emit any memo entry with `circular = true` as a
/// named, independently invokable validator; inlining it would not
/// terminate. `usage` counts inform the inline-vs-named decision for the
/// rest.
#[derive(Debug)]
pub struct Canonicalized {
    pub types: IndexMap<String, TypeIr>,
    pub memo: IndexMap<String, MemoEntry>,
    pub usage: UsageStats,
}

/// Run the full pipeline for the requested type names.
///
/// Resolves the table in place, instantiates each requested type, then
/// flattens and intersection-solves every memo entry and every requested
/// root. Errors abort the run for the affected type; nothing is retried
/// because the pipeline is a pure function of its static input.
pub fn canonicalize(
    registry: &mut TypeRegistry,
    requested: &[&str],
) -> SolverResult<Canonicalized> {
    debug!(declarations = registry.len(), "resolving declaration table");
    resolve_all(registry)?;

    let mut state = InstantiationState::new(registry);
    let mut roots = Vec::with_capacity(requested.len());
    for name in requested {
        debug!(name = %name, "instantiating requested type");
        let root = instantiate(&TypeIr::reference(*name), &mut state)?;
        roots.push((name.to_string(), root));
    }
    let (mut memo, usage) = state.into_parts();

    // Solve against a pre-solve snapshot so dereferences are independent of
    // entry order.
    let snapshot = memo.clone();
    for key in snapshot.keys() {
        let flattened = flatten(&snapshot[key].value);
        let solved = solve_intersections(&flattened, &snapshot)?;
        memo[key].value = solved;
    }

    let mut types = IndexMap::with_capacity(roots.len());
    for (name, root) in roots {
        let flattened = flatten(&root);
        types.insert(name, solve_intersections(&flattened, &memo)?);
    }

    Ok(Canonicalized { types, memo, usage })
}

#[cfg(test)]
#[path = "../tests/pipeline_tests.rs"]
mod pipeline_tests;
