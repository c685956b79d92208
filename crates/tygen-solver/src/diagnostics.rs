//! User-facing solver errors.
//!
//! Two disjoint error tiers exist in this crate:
//!
//! 1. **Input errors** ([`SolverError`]) — the declaration table the
//!    front-end handed us is wrong in a way the user can fix. These abort
//!    generation for the affected type and are reported with a kind tag and
//!    message; the boundary layer attaches source locations.
//! 2. **Invariant violations** — IR shapes that the earlier passes were
//!    supposed to rule out. These are plain panics, always indicate a solver
//!    defect, and must never be downgraded into a [`SolverError`].

use thiserror::Error;

/// User-facing input errors raised by resolution, instantiation, or the
/// intersection solver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    /// A type reference names a declaration that was never registered.
    #[error("type `{0}` is not registered")]
    UnregisteredType(String),

    /// Type parameters were supplied to a declaration kind that cannot
    /// accept them.
    #[error("type `{name}` does not accept type parameters (declaration is {kind})")]
    TypeDoesNotAcceptGenericParameters { name: String, kind: &'static str },

    /// Two tuples with incompatible lengths/optionality were intersected.
    #[error(
        "cannot intersect tuples of length {longer} and {shorter}: \
         the extra positions are not optional and no rest element exists"
    )]
    TupleShapeMismatch { shorter: usize, longer: usize },

    /// Declared types nest deeper than the recursion ceiling.
    #[error("recursion limit exceeded while {context} (depth {depth})")]
    DepthLimitExceeded { context: &'static str, depth: u32 },
}

pub type SolverResult<T> = Result<T, SolverError>;
