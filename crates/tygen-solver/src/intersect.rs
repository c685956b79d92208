//! The intersection solver.
//!
//! Reduces every `Intersection` node in a tree to a single merged type or to
//! `Never`, the absorbing "no possible value" sentinel. Operands are first
//! dereferenced through the instantiation memo, classified into disjoint
//! runtime-value categories, and then merged per category. `Never` is the
//! only terminal state: once a pairwise step produces it, the whole node
//! short-circuits and nothing ever transforms it back.

use crate::diagnostics::{SolverError, SolverResult};
use crate::instantiate::MemoEntry;
use crate::recursion::{RecursionGuard, RecursionResult};
use crate::types::{
    BuiltinKind, IntrinsicKind, LiteralValue, ObjectShape, PropertyInfo, TupleShape, TypeIr,
};
use indexmap::IndexMap;
use tracing::trace;

/// Ceiling on memo-dereference nesting while merging.
pub const MAX_INTERSECTION_DEPTH: u32 = 100;

/// Disjoint runtime-value categories.
///
/// Two operands in different categories admit no common value, so their
/// intersection is `Never` without any structural work. `any`/`unknown` are
/// handled before classification and never reach this table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ValueCategory {
    Array,
    Boolean,
    Number,
    String,
    Null,
    Undefined,
    Object,
    Map,
    Set,
}

/// Reduce every intersection in `ir` against the given instantiation memo.
pub fn solve_intersections(
    ir: &TypeIr,
    memo: &IndexMap<String, MemoEntry>,
) -> SolverResult<TypeIr> {
    IntersectionSolver::new(memo).solve(ir)
}

/// Stateful solver: carries the memo and the set of memo keys currently
/// dereferenced on the merge path (used to reject circular property merges).
pub struct IntersectionSolver<'a> {
    memo: &'a IndexMap<String, MemoEntry>,
    guard: RecursionGuard<String>,
}

impl<'a> IntersectionSolver<'a> {
    pub fn new(memo: &'a IndexMap<String, MemoEntry>) -> Self {
        Self {
            memo,
            guard: RecursionGuard::new(MAX_INTERSECTION_DEPTH),
        }
    }

    /// Rewrite `ir`, reducing every intersection found anywhere in the tree.
    pub fn solve(&mut self, ir: &TypeIr) -> SolverResult<TypeIr> {
        match ir {
            TypeIr::Intersection(operands) => {
                let operands = operands
                    .iter()
                    .map(|o| self.solve(o))
                    .collect::<SolverResult<Vec<_>>>()?;
                let mut iter = operands.into_iter();
                let mut acc = match iter.next() {
                    Some(first) => first,
                    None => panic!("intersection with no operands"),
                };
                for operand in iter {
                    if acc.is_never() || operand.is_never() {
                        return Ok(TypeIr::Never);
                    }
                    acc = self.intersect(acc, operand)?;
                }
                Ok(acc)
            }
            TypeIr::Union(operands) => Ok(TypeIr::Union(
                operands
                    .iter()
                    .map(|o| self.solve(o))
                    .collect::<SolverResult<Vec<_>>>()?,
            )),
            TypeIr::Intrinsic(_)
            | TypeIr::Literal(_)
            | TypeIr::Instantiated { .. }
            | TypeIr::Never => Ok(ir.clone()),
            TypeIr::Ref { name, .. } => {
                panic!("unresolved reference `{name}` reached the intersection solver")
            }
            TypeIr::Param(index) => {
                panic!("unsubstituted type parameter ${index} reached the intersection solver")
            }
            TypeIr::Alias { .. } | TypeIr::Interface { .. } => {
                panic!("declaration node reached the intersection solver: {ir:?}")
            }
            TypeIr::Object(shape) => Ok(TypeIr::Object(self.solve_shape(shape)?)),
            TypeIr::Builtin { kind, elements } => Ok(TypeIr::Builtin {
                kind: *kind,
                elements: elements
                    .iter()
                    .map(|e| self.solve(e))
                    .collect::<SolverResult<Vec<_>>>()?,
            }),
            TypeIr::Tuple(tuple) => Ok(TypeIr::Tuple(TupleShape {
                elements: tuple
                    .elements
                    .iter()
                    .map(|e| self.solve(e))
                    .collect::<SolverResult<Vec<_>>>()?,
                rest: match &tuple.rest {
                    Some(rest) => Some(Box::new(self.solve(rest)?)),
                    None => None,
                },
                first_optional: tuple.first_optional,
            })),
        }
    }

    fn solve_shape(&mut self, shape: &ObjectShape) -> SolverResult<ObjectShape> {
        Ok(ObjectShape {
            properties: shape
                .properties
                .iter()
                .map(|p| {
                    Ok(PropertyInfo {
                        name: p.name.clone(),
                        optional: p.optional,
                        ty: self.solve(&p.ty)?,
                    })
                })
                .collect::<SolverResult<Vec<_>>>()?,
            string_index: match &shape.string_index {
                Some(index) => Some(Box::new(self.solve(index)?)),
                None => None,
            },
            number_index: match &shape.number_index {
                Some(index) => Some(Box::new(self.solve(index)?)),
                None => None,
            },
        })
    }

    /// Pairwise intersection of two already-solved operands.
    fn intersect(&mut self, a: TypeIr, b: TypeIr) -> SolverResult<TypeIr> {
        // Structurally equal operands intersect to themselves. Checked before
        // dereferencing: opening the same key for both sides of `X & X`
        // would misread the second open as a cycle.
        if a == b {
            return Ok(a);
        }
        let (a, opened_a) = self.deref(a, &[])?;
        let (b, opened_b) = match self.deref(b, &opened_a) {
            Ok(pair) => pair,
            Err(err) => {
                for key in opened_a.iter().rev() {
                    self.guard.leave(key);
                }
                return Err(err);
            }
        };
        // An indirection into the chain the left operand traversed names the
        // same underlying type, not a cycle: `X & X` is `X`.
        if let TypeIr::Instantiated { key } = &b {
            if opened_a.contains(key) {
                let key = key.clone();
                for key in opened_b.iter().rev().chain(opened_a.iter().rev()) {
                    self.guard.leave(key);
                }
                return Ok(TypeIr::Instantiated { key });
            }
        }
        let result = self.intersect_impl(a, b);
        for key in opened_b.iter().rev().chain(opened_a.iter().rev()) {
            self.guard.leave(key);
        }
        result
    }

    /// Follow `Instantiated` indirections through the memo, keeping the
    /// traversed keys open until the merge using them completes.
    ///
    /// A key in `sibling` was opened by the other operand of the same
    /// pairwise step; the chain stops there and the caller resolves the
    /// operands as the same type. Any other already-open key means the
    /// operand refers back into a merge in progress; no finite merged type
    /// exists, so the operand collapses to `Never`.
    fn deref(&mut self, ir: TypeIr, sibling: &[String]) -> SolverResult<(TypeIr, Vec<String>)> {
        let mut opened = Vec::new();
        let mut current = ir;
        loop {
            match current {
                TypeIr::Instantiated { key } if sibling.contains(&key) => {
                    return Ok((TypeIr::Instantiated { key }, opened));
                }
                TypeIr::Instantiated { key } => match self.guard.enter(key.clone()) {
                    RecursionResult::Entered => {
                        let entry = self.memo.get(&key).unwrap_or_else(|| {
                            panic!("memo key `{key}` missing during intersection")
                        });
                        trace!(key = %key, "dereferencing memo entry");
                        opened.push(key);
                        current = entry.value.clone();
                    }
                    RecursionResult::Cycle => return Ok((TypeIr::Never, opened)),
                    RecursionResult::DepthExceeded => {
                        return Err(SolverError::DepthLimitExceeded {
                            context: "solving intersections",
                            depth: MAX_INTERSECTION_DEPTH,
                        });
                    }
                },
                other => {
                    // A freshly dereferenced body may still carry unsolved
                    // intersections of its own.
                    let solved = if opened.is_empty() {
                        other
                    } else {
                        match self.solve(&other) {
                            Ok(solved) => solved,
                            Err(err) => {
                                for key in opened.iter().rev() {
                                    self.guard.leave(key);
                                }
                                return Err(err);
                            }
                        }
                    };
                    return Ok((solved, opened));
                }
            }
        }
    }

    fn intersect_impl(&mut self, a: TypeIr, b: TypeIr) -> SolverResult<TypeIr> {
        if a.is_never() || b.is_never() {
            return Ok(TypeIr::Never);
        }
        // any/unknown absorb; the distinction is irrelevant at the
        // generation level, so the left escape wins.
        if a.is_anything() {
            return Ok(a);
        }
        if b.is_anything() {
            return Ok(b);
        }

        let category_a = classify(&a);
        let category_b = classify(&b);
        if category_a != category_b {
            trace!(?category_a, ?category_b, "disjoint categories");
            return Ok(TypeIr::Never);
        }

        match category_a {
            ValueCategory::Array => self.intersect_array_like(a, b),
            ValueCategory::Boolean | ValueCategory::Number | ValueCategory::String => {
                Ok(intersect_primitive(a, b))
            }
            ValueCategory::Null => Ok(TypeIr::Intrinsic(IntrinsicKind::Null)),
            ValueCategory::Undefined => Ok(TypeIr::Intrinsic(IntrinsicKind::Undefined)),
            ValueCategory::Object => self.intersect_objects(a, b),
            ValueCategory::Map => self.intersect_maps(a, b),
            ValueCategory::Set => self.intersect_sets(a, b),
        }
    }

    // -- Array ----------------------------------------------------------------

    fn intersect_array_like(&mut self, a: TypeIr, b: TypeIr) -> SolverResult<TypeIr> {
        match (a, b) {
            (TypeIr::Tuple(x), TypeIr::Tuple(y)) => self.merge_tuples(x, y),
            (
                TypeIr::Builtin { kind: BuiltinKind::Array, elements: ea },
                TypeIr::Builtin { kind: BuiltinKind::Array, elements: eb },
            ) => {
                let element = self.intersect(ea[0].clone(), eb[0].clone())?;
                Ok(TypeIr::array(element))
            }
            (TypeIr::Builtin { kind: BuiltinKind::Array, elements }, TypeIr::Tuple(tuple))
            | (TypeIr::Tuple(tuple), TypeIr::Builtin { kind: BuiltinKind::Array, elements }) => {
                self.broadcast_array(&elements[0], tuple)
            }
            (a, b) => panic!("expected array-like operands, got {a:?} and {b:?}"),
        }
    }

    /// Intersect an array's element type against every tuple position,
    /// including the rest element when present.
    fn broadcast_array(&mut self, element: &TypeIr, tuple: TupleShape) -> SolverResult<TypeIr> {
        let mut elements = Vec::with_capacity(tuple.elements.len());
        for position in tuple.elements {
            elements.push(self.intersect(position, element.clone())?);
        }
        let rest = match tuple.rest {
            Some(rest) => Some(Box::new(self.intersect(*rest, element.clone())?)),
            None => None,
        };
        Ok(TypeIr::Tuple(TupleShape {
            elements,
            rest,
            first_optional: tuple.first_optional,
        }))
    }

    fn merge_tuples(&mut self, x: TupleShape, y: TupleShape) -> SolverResult<TypeIr> {
        let (shorter, longer) = if x.elements.len() <= y.elements.len() {
            (x, y)
        } else {
            (y, x)
        };
        let short_len = shorter.elements.len();

        // Extra positions on the longer side must either match the shorter
        // side's rest element or all be optional (and therefore droppable).
        if longer.elements.len() > short_len
            && shorter.rest.is_none()
            && longer.first_optional > short_len
        {
            return Err(SolverError::TupleShapeMismatch {
                shorter: short_len,
                longer: longer.elements.len(),
            });
        }

        let mut elements = Vec::with_capacity(short_len);
        for (left, right) in shorter.elements.iter().zip(longer.elements.iter()) {
            elements.push(self.intersect(left.clone(), right.clone())?);
        }
        if let Some(rest) = &shorter.rest {
            for position in longer.elements.iter().skip(short_len) {
                elements.push(self.intersect((**rest).clone(), position.clone())?);
            }
        }

        let rest = match (shorter.rest, longer.rest) {
            (Some(a), Some(b)) => Some(Box::new(self.intersect(*a, *b)?)),
            _ => None,
        };
        // A position is required in the merge if either side requires it.
        let first_optional = shorter.first_optional.max(longer.first_optional);
        Ok(TypeIr::Tuple(TupleShape {
            elements,
            rest,
            first_optional,
        }))
    }

    // -- object ---------------------------------------------------------------

    fn intersect_objects(&mut self, a: TypeIr, b: TypeIr) -> SolverResult<TypeIr> {
        match (a, b) {
            (TypeIr::Intrinsic(IntrinsicKind::Object), other)
            | (other, TypeIr::Intrinsic(IntrinsicKind::Object)) => Ok(other),
            (TypeIr::Object(sa), TypeIr::Object(sb)) => self.merge_shapes(sa, sb),
            (a, b) => panic!("expected object operands, got {a:?} and {b:?}"),
        }
    }

    fn merge_shapes(&mut self, a: ObjectShape, b: ObjectShape) -> SolverResult<TypeIr> {
        // Index signatures first: take whichever side defines one, intersect
        // when both do.
        let string_index = match (a.string_index.clone(), b.string_index.clone()) {
            (Some(x), Some(y)) => Some(self.intersect(*x, *y)?),
            (Some(x), None) | (None, Some(x)) => Some(*x),
            (None, None) => None,
        };
        let number_index = match (a.number_index.clone(), b.number_index.clone()) {
            (Some(x), Some(y)) => Some(self.intersect(*x, *y)?),
            (Some(x), None) | (None, Some(x)) => Some(*x),
            (None, None) => None,
        };
        // Every numeric key is also a string key, so a surviving number
        // indexer must satisfy the string indexer too.
        let number_index = match (&string_index, number_index) {
            (Some(s), Some(n)) => Some(self.intersect(s.clone(), n)?),
            (_, n) => n,
        };

        let mut properties: Vec<PropertyInfo> = Vec::new();
        for pa in &a.properties {
            match b.property(&pa.name) {
                Some(pb) => {
                    // A shared property whose value loops back into one of
                    // the operands cannot be merged finitely; the whole
                    // object intersection is unsupported.
                    if self.embeds_open_key(&pa.ty) || self.embeds_open_key(&pb.ty) {
                        trace!(property = %pa.name, "circular property merge rejected");
                        return Ok(TypeIr::Never);
                    }
                    let ty = self.intersect(pa.ty.clone(), pb.ty.clone())?;
                    properties.push(PropertyInfo {
                        name: pa.name.clone(),
                        optional: pa.optional && pb.optional,
                        ty,
                    });
                }
                None => properties.push(pa.clone()),
            }
        }
        for pb in &b.properties {
            if a.property(&pb.name).is_none() {
                properties.push(pb.clone());
            }
        }

        Ok(TypeIr::Object(ObjectShape {
            properties,
            string_index: string_index.map(Box::new),
            number_index: number_index.map(Box::new),
        }))
    }

    /// Whether `ir` contains an indirection to a memo key currently open on
    /// the merge path. Pure traversal: indirections are not dereferenced.
    fn embeds_open_key(&self, ir: &TypeIr) -> bool {
        match ir {
            TypeIr::Instantiated { key } => self.guard.contains(key),
            TypeIr::Intrinsic(_) | TypeIr::Literal(_) | TypeIr::Param(_) | TypeIr::Never => false,
            TypeIr::Ref { args, .. } => args.iter().any(|a| self.embeds_open_key(a)),
            TypeIr::Alias { body, .. } => self.embeds_open_key(body),
            TypeIr::Interface { shape, .. } | TypeIr::Object(shape) => {
                shape.properties.iter().any(|p| self.embeds_open_key(&p.ty))
                    || shape
                        .string_index
                        .as_deref()
                        .is_some_and(|t| self.embeds_open_key(t))
                    || shape
                        .number_index
                        .as_deref()
                        .is_some_and(|t| self.embeds_open_key(t))
            }
            TypeIr::Builtin { elements, .. } => {
                elements.iter().any(|e| self.embeds_open_key(e))
            }
            TypeIr::Tuple(tuple) => {
                tuple.elements.iter().any(|e| self.embeds_open_key(e))
                    || tuple
                        .rest
                        .as_deref()
                        .is_some_and(|r| self.embeds_open_key(r))
            }
            TypeIr::Union(operands) | TypeIr::Intersection(operands) => {
                operands.iter().any(|o| self.embeds_open_key(o))
            }
        }
    }

    // -- Map / Set ------------------------------------------------------------

    fn intersect_maps(&mut self, a: TypeIr, b: TypeIr) -> SolverResult<TypeIr> {
        let (TypeIr::Builtin { elements: ea, .. }, TypeIr::Builtin { elements: eb, .. }) =
            (&a, &b)
        else {
            panic!("expected map operands, got {a:?} and {b:?}");
        };
        let key = self.intersect(ea[0].clone(), eb[0].clone())?;
        if key.is_never() {
            // Disjoint key types: no entry can exist, the map type is empty.
            return Ok(TypeIr::Never);
        }
        let value = self.intersect(ea[1].clone(), eb[1].clone())?;
        if value.is_never() {
            // Unlike keys, value intersection failure means an earlier pass
            // produced an inconsistent map type.
            panic!("map value intersection produced an impossible type");
        }
        Ok(TypeIr::map(key, value))
    }

    fn intersect_sets(&mut self, a: TypeIr, b: TypeIr) -> SolverResult<TypeIr> {
        let (TypeIr::Builtin { elements: ea, .. }, TypeIr::Builtin { elements: eb, .. }) =
            (&a, &b)
        else {
            panic!("expected set operands, got {a:?} and {b:?}");
        };
        let element = self.intersect(ea[0].clone(), eb[0].clone())?;
        if element.is_never() {
            return Ok(TypeIr::Never);
        }
        Ok(TypeIr::set(element))
    }
}

// -- primitives ---------------------------------------------------------------

fn intersect_primitive(a: TypeIr, b: TypeIr) -> TypeIr {
    match (a, b) {
        (TypeIr::Intrinsic(kind), TypeIr::Intrinsic(_)) => TypeIr::Intrinsic(kind),
        // Literal narrows the primitive.
        (TypeIr::Literal(value), TypeIr::Intrinsic(_))
        | (TypeIr::Intrinsic(_), TypeIr::Literal(value)) => TypeIr::Literal(value),
        (TypeIr::Literal(x), TypeIr::Literal(y)) => {
            if x == y {
                TypeIr::Literal(x)
            } else {
                TypeIr::Never
            }
        }
        (a, b) => panic!("expected primitive operands, got {a:?} and {b:?}"),
    }
}

fn classify(ir: &TypeIr) -> ValueCategory {
    match ir {
        TypeIr::Builtin { kind: BuiltinKind::Array, .. } | TypeIr::Tuple(_) => {
            ValueCategory::Array
        }
        TypeIr::Builtin { kind: BuiltinKind::Set, .. } => ValueCategory::Set,
        TypeIr::Builtin { kind: BuiltinKind::Map, .. } => ValueCategory::Map,
        TypeIr::Intrinsic(IntrinsicKind::Boolean) | TypeIr::Literal(LiteralValue::Boolean(_)) => {
            ValueCategory::Boolean
        }
        TypeIr::Intrinsic(IntrinsicKind::Number) | TypeIr::Literal(LiteralValue::Number(_)) => {
            ValueCategory::Number
        }
        TypeIr::Intrinsic(IntrinsicKind::String) | TypeIr::Literal(LiteralValue::String(_)) => {
            ValueCategory::String
        }
        TypeIr::Intrinsic(IntrinsicKind::Null) => ValueCategory::Null,
        TypeIr::Intrinsic(IntrinsicKind::Undefined) => ValueCategory::Undefined,
        TypeIr::Intrinsic(IntrinsicKind::Object) | TypeIr::Object(_) => ValueCategory::Object,
        other => panic!("no disjointness classification for {other:?}"),
    }
}

#[cfg(test)]
#[path = "../tests/intersect_tests.rs"]
mod tests;
