//! The closed IR sum type and its supporting shapes.
//!
//! Every pass in this crate is an exhaustive `match` over [`TypeIr`], so the
//! compiler enforces that adding a variant touches every pass. IR values are
//! plain owned trees compared structurally; true cycles are only ever
//! expressed through named indirections ([`TypeIr::Instantiated`] keys into
//! the instantiation memo), never through back-pointers, which is what keeps
//! every traversal finite.

use serde::Serialize;
use std::fmt;

// =============================================================================
// Leaf kinds
// =============================================================================

/// Base runtime-value types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IntrinsicKind {
    Any,
    Unknown,
    String,
    Number,
    Boolean,
    Object,
    Null,
    Undefined,
}

impl IntrinsicKind {
    /// Canonical lower-case name, as used in registry pre-registration and
    /// memo keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Unknown => "unknown",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Null => "null",
            Self::Undefined => "undefined",
        }
    }

    /// All intrinsics, in registration order.
    pub const ALL: [IntrinsicKind; 8] = [
        Self::Any,
        Self::Unknown,
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::Object,
        Self::Null,
        Self::Undefined,
    ];
}

/// Exact-value literal types.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Built-in container kinds. `Array` and `Set` carry one element type,
/// `Map` carries a key type and a value type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinKind {
    Array,
    Set,
    Map,
}

impl BuiltinKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Array => "Array",
            Self::Set => "Set",
            Self::Map => "Map",
        }
    }

    /// Number of element types the container carries.
    pub const fn arity(self) -> usize {
        match self {
            Self::Array | Self::Set => 1,
            Self::Map => 2,
        }
    }
}

// =============================================================================
// Structural shapes
// =============================================================================

/// A single named property of an object pattern.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PropertyInfo {
    pub name: String,
    pub optional: bool,
    pub ty: TypeIr,
}

impl PropertyInfo {
    pub fn new(name: impl Into<String>, ty: TypeIr) -> Self {
        Self {
            name: name.into(),
            optional: false,
            ty,
        }
    }

    pub fn optional(name: impl Into<String>, ty: TypeIr) -> Self {
        Self {
            name: name.into(),
            optional: true,
            ty,
        }
    }
}

/// Structural object shape: ordered named properties plus optional string
/// and number index signatures.
#[derive(Clone, Debug, PartialEq, Default, Serialize)]
pub struct ObjectShape {
    pub properties: Vec<PropertyInfo>,
    pub string_index: Option<Box<TypeIr>>,
    pub number_index: Option<Box<TypeIr>>,
}

impl ObjectShape {
    pub fn new(properties: Vec<PropertyInfo>) -> Self {
        Self {
            properties,
            string_index: None,
            number_index: None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Fixed-plus-variadic sequence shape.
///
/// Positions at index `first_optional` and beyond may be omitted; `rest`, if
/// present, types every position past the fixed elements.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TupleShape {
    pub elements: Vec<TypeIr>,
    pub rest: Option<Box<TypeIr>>,
    pub first_optional: usize,
}

impl TupleShape {
    /// A tuple where every position is required.
    pub fn required(elements: Vec<TypeIr>) -> Self {
        let first_optional = elements.len();
        Self {
            elements,
            rest: None,
            first_optional,
        }
    }
}

// =============================================================================
// TypeIr
// =============================================================================

/// The closed IR sum type.
///
/// `Ref` nodes exist only pre-instantiation; instantiation rewrites every
/// reference into an `Instantiated` indirection keyed into the memo. `Never`
/// is produced only by the intersection solver and is terminal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TypeIr {
    /// Base type (`string`, `number`, `any`, ...).
    Intrinsic(IntrinsicKind),
    /// Exact-value type.
    Literal(LiteralValue),
    /// Unresolved reference to a named declaration, optionally parameterized.
    Ref { name: String, args: Vec<TypeIr> },
    /// Indirection into the instantiation memo by canonical key.
    Instantiated { key: String },
    /// Placeholder for the Nth type parameter inside a generic body.
    Param(u32),
    /// Named alias declaration.
    Alias { params: u32, body: Box<TypeIr> },
    /// Named nominal declaration with an object-pattern body.
    Interface { params: u32, shape: ObjectShape },
    /// Built-in container with 1 (Array/Set) or 2 (Map) element types.
    Builtin {
        kind: BuiltinKind,
        elements: Vec<TypeIr>,
    },
    /// Structural object shape.
    Object(ObjectShape),
    /// Fixed-plus-variadic sequence.
    Tuple(TupleShape),
    /// Logical OR of at least two operands.
    Union(Vec<TypeIr>),
    /// Logical AND of at least two operands.
    Intersection(Vec<TypeIr>),
    /// The empty type: no runtime value can satisfy it.
    Never,
}

impl TypeIr {
    // -- constructors ---------------------------------------------------------

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn applied(name: impl Into<String>, args: Vec<TypeIr>) -> Self {
        Self::Ref {
            name: name.into(),
            args,
        }
    }

    pub fn string_lit(value: impl Into<String>) -> Self {
        Self::Literal(LiteralValue::String(value.into()))
    }

    pub fn number_lit(value: f64) -> Self {
        Self::Literal(LiteralValue::Number(value))
    }

    pub fn bool_lit(value: bool) -> Self {
        Self::Literal(LiteralValue::Boolean(value))
    }

    pub fn array(element: TypeIr) -> Self {
        Self::Builtin {
            kind: BuiltinKind::Array,
            elements: vec![element],
        }
    }

    pub fn set(element: TypeIr) -> Self {
        Self::Builtin {
            kind: BuiltinKind::Set,
            elements: vec![element],
        }
    }

    pub fn map(key: TypeIr, value: TypeIr) -> Self {
        Self::Builtin {
            kind: BuiltinKind::Map,
            elements: vec![key, value],
        }
    }

    pub fn alias(params: u32, body: TypeIr) -> Self {
        Self::Alias {
            params,
            body: Box::new(body),
        }
    }

    pub fn interface(params: u32, shape: ObjectShape) -> Self {
        Self::Interface { params, shape }
    }

    pub fn union(operands: Vec<TypeIr>) -> Self {
        debug_assert!(operands.len() >= 2, "union requires at least 2 operands");
        Self::Union(operands)
    }

    pub fn intersection(operands: Vec<TypeIr>) -> Self {
        debug_assert!(
            operands.len() >= 2,
            "intersection requires at least 2 operands"
        );
        Self::Intersection(operands)
    }

    // -- predicates -----------------------------------------------------------

    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }

    /// `any` and `unknown` absorb every intersection operand.
    pub fn is_anything(&self) -> bool {
        matches!(
            self,
            Self::Intrinsic(IntrinsicKind::Any) | Self::Intrinsic(IntrinsicKind::Unknown)
        )
    }

    pub fn is_object_pattern(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    // -- substitution ---------------------------------------------------------

    /// Replace every `Param(i)` placeholder with `args[i]`.
    ///
    /// Arity is the front-end's responsibility; an out-of-range index here is
    /// a defect in the declaration table, not a user error.
    pub fn substitute(&self, args: &[TypeIr]) -> TypeIr {
        match self {
            Self::Param(index) => match args.get(*index as usize) {
                Some(arg) => arg.clone(),
                None => panic!(
                    "type parameter index {index} out of range for {} supplied argument(s)",
                    args.len()
                ),
            },
            Self::Intrinsic(_) | Self::Literal(_) | Self::Instantiated { .. } | Self::Never => {
                self.clone()
            }
            Self::Ref { name, args: inner } => Self::Ref {
                name: name.clone(),
                args: inner.iter().map(|a| a.substitute(args)).collect(),
            },
            Self::Alias { params, body } => Self::Alias {
                params: *params,
                body: Box::new(body.substitute(args)),
            },
            Self::Interface { params, shape } => Self::Interface {
                params: *params,
                shape: substitute_shape(shape, args),
            },
            Self::Object(shape) => Self::Object(substitute_shape(shape, args)),
            Self::Builtin { kind, elements } => Self::Builtin {
                kind: *kind,
                elements: elements.iter().map(|e| e.substitute(args)).collect(),
            },
            Self::Tuple(tuple) => Self::Tuple(TupleShape {
                elements: tuple.elements.iter().map(|e| e.substitute(args)).collect(),
                rest: tuple.rest.as_ref().map(|r| Box::new(r.substitute(args))),
                first_optional: tuple.first_optional,
            }),
            Self::Union(operands) => {
                Self::Union(operands.iter().map(|o| o.substitute(args)).collect())
            }
            Self::Intersection(operands) => {
                Self::Intersection(operands.iter().map(|o| o.substitute(args)).collect())
            }
        }
    }
}

fn substitute_shape(shape: &ObjectShape, args: &[TypeIr]) -> ObjectShape {
    ObjectShape {
        properties: shape
            .properties
            .iter()
            .map(|p| PropertyInfo {
                name: p.name.clone(),
                optional: p.optional,
                ty: p.ty.substitute(args),
            })
            .collect(),
        string_index: shape
            .string_index
            .as_ref()
            .map(|t| Box::new(t.substitute(args))),
        number_index: shape
            .number_index
            .as_ref()
            .map(|t| Box::new(t.substitute(args))),
    }
}

// =============================================================================
// Canonical rendering
// =============================================================================

/// Deterministic canonical rendering. Memo keys are built from this, so two
/// structurally-equal IR values must always render identically.
impl fmt::Display for TypeIr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intrinsic(kind) => f.write_str(kind.as_str()),
            Self::Literal(value) => write!(f, "{value}"),
            Self::Ref { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    write_list(f, "<", args, ">")?;
                }
                Ok(())
            }
            Self::Instantiated { key } => f.write_str(key),
            Self::Param(index) => write!(f, "${index}"),
            Self::Alias { params, body } => write!(f, "alias/{params}={body}"),
            Self::Interface { params, shape } => {
                write!(f, "interface/{params}")?;
                write_shape(f, shape)
            }
            Self::Builtin { kind, elements } => {
                f.write_str(kind.name())?;
                write_list(f, "<", elements, ">")
            }
            Self::Object(shape) => write_shape(f, shape),
            Self::Tuple(tuple) => {
                f.write_str("[")?;
                for (i, element) in tuple.elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                    if i >= tuple.first_optional {
                        f.write_str("?")?;
                    }
                }
                if let Some(rest) = &tuple.rest {
                    if !tuple.elements.is_empty() {
                        f.write_str(", ")?;
                    }
                    write!(f, "...{rest}")?;
                }
                f.write_str("]")
            }
            Self::Union(operands) => write_operands(f, operands, " | "),
            Self::Intersection(operands) => write_operands(f, operands, " & "),
            Self::Never => f.write_str("never"),
        }
    }
}

fn write_list(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[TypeIr],
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

fn write_shape(f: &mut fmt::Formatter<'_>, shape: &ObjectShape) -> fmt::Result {
    f.write_str("{")?;
    let mut first = true;
    for property in &shape.properties {
        if !first {
            f.write_str(", ")?;
        }
        first = false;
        let marker = if property.optional { "?" } else { "" };
        write!(f, "{}{marker}: {}", property.name, property.ty)?;
    }
    if let Some(index) = &shape.string_index {
        if !first {
            f.write_str(", ")?;
        }
        first = false;
        write!(f, "[string]: {index}")?;
    }
    if let Some(index) = &shape.number_index {
        if !first {
            f.write_str(", ")?;
        }
        write!(f, "[number]: {index}")?;
    }
    f.write_str("}")
}

fn write_operands(f: &mut fmt::Formatter<'_>, operands: &[TypeIr], separator: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{operand}")?;
    }
    f.write_str(")")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_replaces_placeholders() {
        let body = TypeIr::Object(ObjectShape::new(vec![
            PropertyInfo::new("value", TypeIr::Param(0)),
            PropertyInfo::optional("next", TypeIr::applied("Node", vec![TypeIr::Param(0)])),
        ]));
        let substituted = body.substitute(&[TypeIr::Intrinsic(IntrinsicKind::Number)]);

        let TypeIr::Object(shape) = &substituted else {
            panic!("expected object, got {substituted:?}");
        };
        assert_eq!(
            shape.property("value").unwrap().ty,
            TypeIr::Intrinsic(IntrinsicKind::Number)
        );
        assert_eq!(
            shape.property("next").unwrap().ty,
            TypeIr::applied("Node", vec![TypeIr::Intrinsic(IntrinsicKind::Number)])
        );
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn substitute_out_of_range_is_a_defect() {
        let _ = TypeIr::Param(1).substitute(&[TypeIr::Intrinsic(IntrinsicKind::String)]);
    }

    #[test]
    fn canonical_rendering_is_deterministic() {
        let ty = TypeIr::map(
            TypeIr::Intrinsic(IntrinsicKind::String),
            TypeIr::array(TypeIr::number_lit(1.0)),
        );
        assert_eq!(ty.to_string(), "Map<string, Array<1>>");

        let tuple = TypeIr::Tuple(TupleShape {
            elements: vec![
                TypeIr::Intrinsic(IntrinsicKind::Number),
                TypeIr::Intrinsic(IntrinsicKind::String),
            ],
            rest: Some(Box::new(TypeIr::Intrinsic(IntrinsicKind::Boolean))),
            first_optional: 1,
        });
        assert_eq!(tuple.to_string(), "[number, string?, ...boolean]");
    }

    #[test]
    fn object_rendering_includes_index_signatures() {
        let mut shape = ObjectShape::new(vec![PropertyInfo::new(
            "a",
            TypeIr::Intrinsic(IntrinsicKind::String),
        )]);
        shape.number_index = Some(Box::new(TypeIr::Intrinsic(IntrinsicKind::Boolean)));
        assert_eq!(
            TypeIr::Object(shape).to_string(),
            "{a: string, [number]: boolean}"
        );
    }
}
