//! Generic instantiation with memoization and cycle detection.
//!
//! Every `Ref` in a resolved tree is expanded into a concrete body exactly
//! once per distinct canonical key (`Name<arg, ...>`), stored in the memo,
//! and replaced in the tree by an `Instantiated` indirection. A key found on
//! the current call-ancestry path is a structural cycle: the reference
//! becomes an indirection without recursing, and once the whole traversal
//! finishes the memo entry is marked `circular`. The code generator must
//! emit circular entries as named, callable validators; inlining them would
//! not terminate.

use crate::diagnostics::{SolverError, SolverResult};
use crate::recursion::{RecursionGuard, RecursionResult};
use crate::registry::TypeRegistry;
use crate::types::{ObjectShape, PropertyInfo, TupleShape, TypeIr};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::{debug, trace};

/// Ceiling on generic nesting depth. Deeper inputs are reported as a user
/// error rather than overflowing the stack.
pub const MAX_INSTANTIATION_DEPTH: u32 = 50;

/// Per-key reference counts accumulated during instantiation.
pub type UsageStats = FxHashMap<String, u32>;

/// One instantiated declaration body.
///
/// `usage` records the references made while instantiating this body, so a
/// memo hit can fold them into the running totals without re-traversal.
/// `circular` is flipped to true in a post-pass once a cycle through this
/// key is confirmed; it is never otherwise mutated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemoEntry {
    pub usage: UsageStats,
    pub value: TypeIr,
    pub circular: bool,
}

/// Shared state threaded through one compilation's instantiation calls.
pub struct InstantiationState<'a> {
    registry: &'a TypeRegistry,
    memo: IndexMap<String, MemoEntry>,
    usage: UsageStats,
    guard: RecursionGuard<String>,
    circular_pending: FxHashSet<String>,
    new_keys: Vec<String>,
}

impl<'a> InstantiationState<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            memo: IndexMap::new(),
            usage: UsageStats::default(),
            guard: RecursionGuard::new(MAX_INSTANTIATION_DEPTH),
            circular_pending: FxHashSet::default(),
            new_keys: Vec::new(),
        }
    }

    pub fn memo(&self) -> &IndexMap<String, MemoEntry> {
        &self.memo
    }

    /// Running usage totals across all instantiation calls so far.
    pub fn usage(&self) -> &UsageStats {
        &self.usage
    }

    /// Memo keys created by the most recent top-level [`instantiate`] call.
    pub fn new_keys(&self) -> &[String] {
        &self.new_keys
    }

    /// Consume the state, yielding the memo and the usage totals.
    pub fn into_parts(self) -> (IndexMap<String, MemoEntry>, UsageStats) {
        (self.memo, self.usage)
    }
}

/// Compute the canonical memo key for a reference with already-instantiated
/// type parameters.
pub fn canonical_key(name: &str, args: &[TypeIr]) -> String {
    if args.is_empty() {
        return name.to_string();
    }
    let mut key = String::from(name);
    key.push('<');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            key.push_str(", ");
        }
        let _ = write!(key, "{arg}");
    }
    key.push('>');
    key
}

/// Expand every reference in `ir`, memoizing by canonical key.
///
/// When this call is top-level (no outer instantiation in flight), finishing
/// it confirms all pending cycles globally and flips their memo entries'
/// `circular` flags. A cycle can be discovered deep inside a still-open
/// outer call, so the flags cannot be set any earlier.
pub fn instantiate(ir: &TypeIr, state: &mut InstantiationState<'_>) -> SolverResult<TypeIr> {
    let top_level = state.guard.is_idle();
    if top_level {
        state.new_keys.clear();
    }
    let result = instantiate_ir(ir, state);
    if top_level && result.is_ok() {
        for key in std::mem::take(&mut state.circular_pending) {
            if let Some(entry) = state.memo.get_mut(&key) {
                debug!(key = %key, "marking memo entry circular");
                entry.circular = true;
            }
        }
    }
    result
}

fn instantiate_ir(ir: &TypeIr, state: &mut InstantiationState<'_>) -> SolverResult<TypeIr> {
    match ir {
        TypeIr::Ref { name, args } => {
            let args = args
                .iter()
                .map(|a| instantiate_ir(a, state))
                .collect::<SolverResult<Vec<_>>>()?;
            let key = canonical_key(name, &args);
            *state.usage.entry(key.clone()).or_insert(0) += 1;

            // An in-progress key means a structural cycle; the indirection
            // alone breaks it.
            if state.guard.contains(&key) {
                trace!(key = %key, "cycle detected, deferring to indirection");
                state.circular_pending.insert(key.clone());
                return Ok(TypeIr::Instantiated { key });
            }

            if let Some(entry) = state.memo.get(&key) {
                trace!(key = %key, "memo hit");
                let recorded: Vec<(String, u32)> = entry
                    .usage
                    .iter()
                    .map(|(k, count)| (k.clone(), *count))
                    .collect();
                for (k, count) in recorded {
                    *state.usage.entry(k).or_insert(0) += count;
                }
                return Ok(TypeIr::Instantiated { key });
            }

            let declaration = state
                .registry
                .get(name)
                .ok_or_else(|| SolverError::UnregisteredType(name.clone()))?;
            let body = match declaration {
                TypeIr::Alias { body, .. } => (**body).clone(),
                TypeIr::Interface { shape, .. } => TypeIr::Object(shape.clone()),
                TypeIr::Builtin { kind, elements } => TypeIr::Builtin {
                    kind: *kind,
                    elements: elements.clone(),
                },
                other => {
                    return Err(SolverError::TypeDoesNotAcceptGenericParameters {
                        name: name.clone(),
                        kind: declaration_kind(other),
                    });
                }
            };
            let substituted = body.substitute(&args);

            match state.guard.enter(key.clone()) {
                RecursionResult::Entered => {}
                RecursionResult::Cycle => unreachable!("ancestry membership checked above"),
                RecursionResult::DepthExceeded => {
                    return Err(SolverError::DepthLimitExceeded {
                        context: "instantiating generic types",
                        depth: MAX_INSTANTIATION_DEPTH,
                    });
                }
            }
            // Fresh accumulator for the body, so the entry records exactly
            // the references its own expansion makes.
            let outer_usage = std::mem::take(&mut state.usage);
            let value = instantiate_ir(&substituted, state);
            let body_usage = std::mem::replace(&mut state.usage, outer_usage);
            state.guard.leave(&key);
            let value = value?;

            for (k, count) in &body_usage {
                *state.usage.entry(k.clone()).or_insert(0) += *count;
            }
            debug!(key = %key, "memoized instantiation");
            state.memo.insert(
                key.clone(),
                MemoEntry {
                    usage: body_usage,
                    value,
                    circular: false,
                },
            );
            state.new_keys.push(key.clone());
            Ok(TypeIr::Instantiated { key })
        }
        TypeIr::Intrinsic(_) | TypeIr::Literal(_) | TypeIr::Instantiated { .. } | TypeIr::Never => {
            Ok(ir.clone())
        }
        TypeIr::Param(index) => {
            panic!("unsubstituted type parameter ${index} reached instantiation")
        }
        TypeIr::Alias { .. } | TypeIr::Interface { .. } => {
            panic!("declaration node inside a type body: {ir:?}")
        }
        TypeIr::Object(shape) => Ok(TypeIr::Object(instantiate_shape(shape, state)?)),
        TypeIr::Builtin { kind, elements } => Ok(TypeIr::Builtin {
            kind: *kind,
            elements: elements
                .iter()
                .map(|e| instantiate_ir(e, state))
                .collect::<SolverResult<Vec<_>>>()?,
        }),
        TypeIr::Tuple(tuple) => Ok(TypeIr::Tuple(TupleShape {
            elements: tuple
                .elements
                .iter()
                .map(|e| instantiate_ir(e, state))
                .collect::<SolverResult<Vec<_>>>()?,
            rest: match &tuple.rest {
                Some(rest) => Some(Box::new(instantiate_ir(rest, state)?)),
                None => None,
            },
            first_optional: tuple.first_optional,
        })),
        TypeIr::Union(operands) => Ok(TypeIr::Union(
            operands
                .iter()
                .map(|o| instantiate_ir(o, state))
                .collect::<SolverResult<Vec<_>>>()?,
        )),
        TypeIr::Intersection(operands) => Ok(TypeIr::Intersection(
            operands
                .iter()
                .map(|o| instantiate_ir(o, state))
                .collect::<SolverResult<Vec<_>>>()?,
        )),
    }
}

fn instantiate_shape(
    shape: &ObjectShape,
    state: &mut InstantiationState<'_>,
) -> SolverResult<ObjectShape> {
    Ok(ObjectShape {
        properties: shape
            .properties
            .iter()
            .map(|p| {
                Ok(PropertyInfo {
                    name: p.name.clone(),
                    optional: p.optional,
                    ty: instantiate_ir(&p.ty, state)?,
                })
            })
            .collect::<SolverResult<Vec<_>>>()?,
        string_index: match &shape.string_index {
            Some(index) => Some(Box::new(instantiate_ir(index, state)?)),
            None => None,
        },
        number_index: match &shape.number_index {
            Some(index) => Some(Box::new(instantiate_ir(index, state)?)),
            None => None,
        },
    })
}

fn declaration_kind(ir: &TypeIr) -> &'static str {
    match ir {
        TypeIr::Intrinsic(_) => "an intrinsic",
        TypeIr::Literal(_) => "a literal",
        TypeIr::Ref { .. } => "a reference",
        TypeIr::Instantiated { .. } => "an instantiation",
        TypeIr::Param(_) => "a type parameter",
        TypeIr::Alias { .. } => "an alias",
        TypeIr::Interface { .. } => "an interface",
        TypeIr::Builtin { .. } => "a builtin",
        TypeIr::Object(_) => "an object pattern",
        TypeIr::Tuple(_) => "a tuple",
        TypeIr::Union(_) => "a union",
        TypeIr::Intersection(_) => "an intersection",
        TypeIr::Never => "never",
    }
}

#[cfg(test)]
#[path = "../tests/instantiate_tests.rs"]
mod tests;
