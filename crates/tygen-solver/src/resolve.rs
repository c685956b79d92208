//! Reference resolution.
//!
//! Rewrites every `Ref` to a non-structural alias into the alias body,
//! transitively, while leaving structural and nominal boundaries (interfaces,
//! object-pattern aliases, builtin containers) as opaque references. Inlining
//! a structural declaration would force infinite unrolling of recursive
//! types, so those stay behind their names until instantiation.
//!
//! The table is rewritten in place and resolution is idempotent: each
//! declaration's visited set starts with its own name, so a directly
//! self-referential alias resolves to itself on every run.

use crate::diagnostics::{SolverError, SolverResult};
use crate::registry::TypeRegistry;
use crate::types::{ObjectShape, PropertyInfo, TupleShape, TypeIr};
use rustc_hash::FxHashSet;
use tracing::trace;

/// Canonicalize every internal `Ref` in every declaration of the table.
pub fn resolve_all(registry: &mut TypeRegistry) -> SolverResult<()> {
    for name in registry.names() {
        let declaration = registry
            .get(&name)
            .cloned()
            .unwrap_or_else(|| panic!("declaration `{name}` disappeared during resolution"));
        trace!(name = %name, "resolving declaration");
        let mut visited = FxHashSet::default();
        visited.insert(name.clone());
        let resolved = resolve_ir(&declaration, registry, &mut visited)?;
        registry.replace(&name, resolved);
    }
    Ok(())
}

fn resolve_ir(
    ir: &TypeIr,
    registry: &TypeRegistry,
    visited: &mut FxHashSet<String>,
) -> SolverResult<TypeIr> {
    match ir {
        TypeIr::Ref { name, args } => {
            let args = args
                .iter()
                .map(|a| resolve_ir(a, registry, visited))
                .collect::<SolverResult<Vec<_>>>()?;

            // A name already on this path stays a reference; re-expanding it
            // would inline forever.
            if visited.contains(name) {
                return Ok(TypeIr::Ref {
                    name: name.clone(),
                    args,
                });
            }

            let declaration = registry
                .get(name)
                .ok_or_else(|| SolverError::UnregisteredType(name.clone()))?;

            match declaration {
                // Non-structural alias: inline transitively.
                TypeIr::Alias { body, .. } if !body.is_object_pattern() => {
                    let substituted = body.substitute(&args);
                    visited.insert(name.clone());
                    let resolved = resolve_ir(&substituted, registry, visited);
                    visited.remove(name);
                    resolved
                }
                // Structural/nominal boundary: keep the reference opaque.
                TypeIr::Alias { .. } | TypeIr::Interface { .. } | TypeIr::Builtin { .. } => {
                    Ok(TypeIr::Ref {
                        name: name.clone(),
                        args,
                    })
                }
                other => panic!(
                    "reference `{name}` resolved to a non-declaration node: {other:?}"
                ),
            }
        }
        TypeIr::Intrinsic(_)
        | TypeIr::Literal(_)
        | TypeIr::Instantiated { .. }
        | TypeIr::Param(_)
        | TypeIr::Never => Ok(ir.clone()),
        TypeIr::Alias { params, body } => Ok(TypeIr::Alias {
            params: *params,
            body: Box::new(resolve_ir(body, registry, visited)?),
        }),
        TypeIr::Interface { params, shape } => Ok(TypeIr::Interface {
            params: *params,
            shape: resolve_shape(shape, registry, visited)?,
        }),
        TypeIr::Object(shape) => Ok(TypeIr::Object(resolve_shape(shape, registry, visited)?)),
        TypeIr::Builtin { kind, elements } => Ok(TypeIr::Builtin {
            kind: *kind,
            elements: elements
                .iter()
                .map(|e| resolve_ir(e, registry, visited))
                .collect::<SolverResult<Vec<_>>>()?,
        }),
        TypeIr::Tuple(tuple) => Ok(TypeIr::Tuple(TupleShape {
            elements: tuple
                .elements
                .iter()
                .map(|e| resolve_ir(e, registry, visited))
                .collect::<SolverResult<Vec<_>>>()?,
            rest: match &tuple.rest {
                Some(rest) => Some(Box::new(resolve_ir(rest, registry, visited)?)),
                None => None,
            },
            first_optional: tuple.first_optional,
        })),
        TypeIr::Union(operands) => Ok(TypeIr::Union(
            operands
                .iter()
                .map(|o| resolve_ir(o, registry, visited))
                .collect::<SolverResult<Vec<_>>>()?,
        )),
        TypeIr::Intersection(operands) => Ok(TypeIr::Intersection(
            operands
                .iter()
                .map(|o| resolve_ir(o, registry, visited))
                .collect::<SolverResult<Vec<_>>>()?,
        )),
    }
}

fn resolve_shape(
    shape: &ObjectShape,
    registry: &TypeRegistry,
    visited: &mut FxHashSet<String>,
) -> SolverResult<ObjectShape> {
    Ok(ObjectShape {
        properties: shape
            .properties
            .iter()
            .map(|p| {
                Ok(PropertyInfo {
                    name: p.name.clone(),
                    optional: p.optional,
                    ty: resolve_ir(&p.ty, registry, visited)?,
                })
            })
            .collect::<SolverResult<Vec<_>>>()?,
        string_index: match &shape.string_index {
            Some(index) => Some(Box::new(resolve_ir(index, registry, visited)?)),
            None => None,
        },
        number_index: match &shape.number_index {
            Some(index) => Some(Box::new(resolve_ir(index, registry, visited)?)),
            None => None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntrinsicKind;

    #[test]
    fn inlines_non_structural_aliases_transitively() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register("Id", TypeIr::alias(0, TypeIr::reference("string")));
        registry.register(
            "Pair",
            TypeIr::alias(
                0,
                TypeIr::Tuple(TupleShape::required(vec![
                    TypeIr::reference("Id"),
                    TypeIr::reference("number"),
                ])),
            ),
        );
        resolve_all(&mut registry).unwrap();

        assert_eq!(
            registry.get("Pair"),
            Some(&TypeIr::alias(
                0,
                TypeIr::Tuple(TupleShape::required(vec![
                    TypeIr::Intrinsic(IntrinsicKind::String),
                    TypeIr::Intrinsic(IntrinsicKind::Number),
                ]))
            ))
        );
    }

    #[test]
    fn keeps_structural_boundaries_opaque() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register(
            "Point",
            TypeIr::interface(
                0,
                ObjectShape::new(vec![PropertyInfo::new("x", TypeIr::reference("number"))]),
            ),
        );
        registry.register("Points", TypeIr::alias(0, TypeIr::array(TypeIr::reference("Point"))));
        resolve_all(&mut registry).unwrap();

        // The interface reference survives; only the primitive inlined.
        assert_eq!(
            registry.get("Points"),
            Some(&TypeIr::alias(0, TypeIr::array(TypeIr::reference("Point"))))
        );
        assert_eq!(
            registry.get("Point"),
            Some(&TypeIr::interface(
                0,
                ObjectShape::new(vec![PropertyInfo::new(
                    "x",
                    TypeIr::Intrinsic(IntrinsicKind::Number)
                )]),
            ))
        );
    }

    #[test]
    fn unknown_reference_is_reported() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register("Broken", TypeIr::alias(0, TypeIr::reference("Missing")));
        assert_eq!(
            resolve_all(&mut registry),
            Err(SolverError::UnregisteredType("Missing".into()))
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register(
            "Json",
            TypeIr::alias(
                0,
                TypeIr::union(vec![
                    TypeIr::reference("string"),
                    TypeIr::array(TypeIr::reference("Json")),
                ]),
            ),
        );
        resolve_all(&mut registry).unwrap();
        let after_first: Vec<_> = registry.iter().map(|(n, t)| (n.clone(), t.clone())).collect();

        resolve_all(&mut registry).unwrap();
        let after_second: Vec<_> = registry.iter().map(|(n, t)| (n.clone(), t.clone())).collect();
        assert_eq!(after_first, after_second);
    }
}
