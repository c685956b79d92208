//! Union and intersection operand normalization.
//!
//! Splices nested unions into their parent union and nested intersections
//! into their parent intersection, drops structurally-equal duplicates, and
//! collapses single-operand lists. No type algebra happens here; `never` and
//! `any` handling belongs to the intersection solver.

use crate::types::{ObjectShape, PropertyInfo, TupleShape, TypeIr};

/// Normalize every union and intersection operand list in the tree.
pub fn flatten(ir: &TypeIr) -> TypeIr {
    match ir {
        TypeIr::Union(operands) => {
            let mut out: Vec<TypeIr> = Vec::new();
            for operand in operands {
                match flatten(operand) {
                    TypeIr::Union(inner) => {
                        for item in inner {
                            push_unique(&mut out, item);
                        }
                    }
                    other => push_unique(&mut out, other),
                }
            }
            collapse(out, TypeIr::Union)
        }
        TypeIr::Intersection(operands) => {
            let mut out: Vec<TypeIr> = Vec::new();
            for operand in operands {
                match flatten(operand) {
                    TypeIr::Intersection(inner) => {
                        for item in inner {
                            push_unique(&mut out, item);
                        }
                    }
                    other => push_unique(&mut out, other),
                }
            }
            collapse(out, TypeIr::Intersection)
        }
        TypeIr::Intrinsic(_)
        | TypeIr::Literal(_)
        | TypeIr::Ref { .. }
        | TypeIr::Instantiated { .. }
        | TypeIr::Param(_)
        | TypeIr::Never => ir.clone(),
        TypeIr::Alias { params, body } => TypeIr::Alias {
            params: *params,
            body: Box::new(flatten(body)),
        },
        TypeIr::Interface { params, shape } => TypeIr::Interface {
            params: *params,
            shape: flatten_shape(shape),
        },
        TypeIr::Object(shape) => TypeIr::Object(flatten_shape(shape)),
        TypeIr::Builtin { kind, elements } => TypeIr::Builtin {
            kind: *kind,
            elements: elements.iter().map(flatten).collect(),
        },
        TypeIr::Tuple(tuple) => TypeIr::Tuple(TupleShape {
            elements: tuple.elements.iter().map(flatten).collect(),
            rest: tuple.rest.as_ref().map(|r| Box::new(flatten(r))),
            first_optional: tuple.first_optional,
        }),
    }
}

fn push_unique(out: &mut Vec<TypeIr>, item: TypeIr) {
    if !out.contains(&item) {
        out.push(item);
    }
}

fn collapse(mut operands: Vec<TypeIr>, rebuild: fn(Vec<TypeIr>) -> TypeIr) -> TypeIr {
    match operands.len() {
        0 => TypeIr::Never,
        1 => operands.remove(0),
        _ => rebuild(operands),
    }
}

fn flatten_shape(shape: &ObjectShape) -> ObjectShape {
    ObjectShape {
        properties: shape
            .properties
            .iter()
            .map(|p| PropertyInfo {
                name: p.name.clone(),
                optional: p.optional,
                ty: flatten(&p.ty),
            })
            .collect(),
        string_index: shape.string_index.as_ref().map(|t| Box::new(flatten(t))),
        number_index: shape.number_index.as_ref().map(|t| Box::new(flatten(t))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntrinsicKind;

    fn string() -> TypeIr {
        TypeIr::Intrinsic(IntrinsicKind::String)
    }

    fn number() -> TypeIr {
        TypeIr::Intrinsic(IntrinsicKind::Number)
    }

    #[test]
    fn splices_nested_unions_and_dedups() {
        let nested = TypeIr::union(vec![
            string(),
            TypeIr::union(vec![number(), string()]),
        ]);
        assert_eq!(flatten(&nested), TypeIr::union(vec![string(), number()]));
    }

    #[test]
    fn collapses_singleton_operand_lists() {
        let redundant = TypeIr::union(vec![string(), string()]);
        assert_eq!(flatten(&redundant), string());

        let intersection = TypeIr::intersection(vec![number(), number()]);
        assert_eq!(flatten(&intersection), number());
    }

    #[test]
    fn flattens_inside_containers() {
        // A front-end may hand over degenerate singleton unions.
        let array = TypeIr::array(TypeIr::Union(vec![
            string(),
            TypeIr::Union(vec![number()]),
        ]));
        assert_eq!(
            flatten(&array),
            TypeIr::array(TypeIr::union(vec![string(), number()]))
        );
    }

    #[test]
    fn keeps_distinct_intersections_intact() {
        let intersection = TypeIr::intersection(vec![
            TypeIr::intersection(vec![string(), number()]),
            TypeIr::bool_lit(true),
        ]);
        assert_eq!(
            flatten(&intersection),
            TypeIr::intersection(vec![string(), number(), TypeIr::bool_lit(true)])
        );
    }
}
