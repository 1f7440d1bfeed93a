//! The type registry: the ordered universe of type names, their runtime
//! predicates, the declared conversions, and the ignore list.
//!
//! Order is semantically significant in both lists. The position of a type
//! entry breaks parameter-ordering ties, and the position of a conversion
//! decides which of two applicable conversions wins. Registries are mutable
//! until a dispatcher is compiled; compilation takes a snapshot, so later
//! mutations never affect an existing dispatcher.

use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::error::{ConversionError, DefinitionError};
use crate::value::Value;

/// Runtime predicate deciding whether a value belongs to a type.
pub type TypeTest = Rc<dyn Fn(&Value) -> bool>;

/// Coercion applied to an argument so it can match a differently-typed
/// parameter.
pub type ConvertFn = Rc<dyn Fn(&Value) -> Value>;

/// A named type with its runtime predicate.
#[derive(Clone)]
pub struct TypeEntry {
    pub name: String,
    pub test: TypeTest,
}

impl std::fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeEntry").field("name", &self.name).finish()
    }
}

/// A declared conversion from one registered type to another.
#[derive(Clone)]
pub struct Conversion {
    pub from: String,
    pub to: String,
    pub convert: ConvertFn,
}

impl std::fmt::Debug for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversion")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Built-in type table, in registry order. `Object` is intentionally
/// permissive (it also accepts arrays); `type_of` defers it until every
/// other entry has been tried.
static BUILTIN_TYPES: Lazy<Vec<(&'static str, fn(&Value) -> bool)>> = Lazy::new(|| {
    vec![
        ("number", |v: &Value| v.is_number()),
        ("string", |v: &Value| v.is_str()),
        ("boolean", |v: &Value| v.is_bool()),
        ("Array", |v: &Value| v.is_array()),
        ("Object", |v: &Value| v.is_object() || v.is_array()),
        ("null", |v: &Value| v.is_null()),
    ]
});

/// Reserved wildcard type name. Not a registry entry; parameters treat it
/// specially and `add_type` rejects it.
pub const ANY_TYPE: &str = "any";

/// An ordered collection of type entries, conversions and ignored names.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeEntry>,
    conversions: Vec<Conversion>,
    ignored: Vec<String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry seeded with the built-in entries and no conversions.
    pub fn new() -> Self {
        let types = BUILTIN_TYPES
            .iter()
            .map(|&(name, test)| TypeEntry {
                name: name.to_string(),
                test: Rc::new(test),
            })
            .collect();
        TypeRegistry {
            types,
            conversions: Vec::new(),
            ignored: Vec::new(),
        }
    }

    /// Append a type entry. Names are case-sensitive and must be unique.
    pub fn add_type(
        &mut self,
        name: impl Into<String>,
        test: TypeTest,
    ) -> Result<(), DefinitionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DefinitionError::InvalidTypeEntry(
                "type name must not be empty".to_string(),
            ));
        }
        if name == ANY_TYPE {
            return Err(DefinitionError::InvalidTypeEntry(format!(
                "\"{ANY_TYPE}\" is reserved"
            )));
        }
        if name.contains([',', '|', '.']) || name.chars().any(char::is_whitespace) {
            return Err(DefinitionError::InvalidTypeEntry(format!(
                "type name \"{name}\" contains a delimiter character"
            )));
        }
        if self.type_index(&name).is_some() {
            return Err(DefinitionError::InvalidTypeEntry(format!(
                "type \"{name}\" is already registered"
            )));
        }
        self.types.push(TypeEntry { name, test });
        Ok(())
    }

    /// Append a conversion. Both endpoints must be registered and distinct.
    /// The same pair may be registered more than once; list order decides
    /// which applies first.
    pub fn add_conversion(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        convert: ConvertFn,
    ) -> Result<(), DefinitionError> {
        let from = from.into();
        let to = to.into();
        if from == to {
            return Err(DefinitionError::InvalidConversion(format!(
                "conversion from \"{from}\" to itself"
            )));
        }
        for name in [&from, &to] {
            if self.type_index(name).is_none() {
                return Err(DefinitionError::InvalidConversion(format!(
                    "type \"{name}\" is not registered"
                )));
            }
        }
        self.conversions.push(Conversion { from, to, convert });
        Ok(())
    }

    /// Mark a type name as ignored: signatures mentioning it are silently
    /// dropped at compile time.
    pub fn ignore_type(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.ignored.contains(&name) {
            self.ignored.push(name);
        }
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.iter().any(|n| n == name)
    }

    pub fn ignored_names(&self) -> &[String] {
        &self.ignored
    }

    /// Position of a type entry, or `None` for unregistered names.
    pub fn type_index(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|entry| entry.name == name)
    }

    /// Look up a type entry, suggesting a case-insensitive match on failure.
    pub fn lookup(&self, name: &str) -> Result<&TypeEntry, DefinitionError> {
        if let Some(index) = self.type_index(name) {
            return Ok(&self.types[index]);
        }
        let hint = self
            .types
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .map(|entry| entry.name.clone());
        Err(DefinitionError::UnknownType {
            name: name.to_string(),
            hint,
        })
    }

    /// The predicate for a registered type name.
    pub fn test_for(&self, name: &str) -> Option<&TypeTest> {
        self.type_index(name).map(|i| &self.types[i].test)
    }

    pub fn conversion(&self, index: usize) -> &Conversion {
        &self.conversions[index]
    }

    /// Conversions applicable to a parameter accepting `types`: every
    /// conversion whose `to` is in the set and whose `from` is not, in list
    /// order, with their indices.
    pub fn conversions_into<'a>(
        &'a self,
        types: &'a [String],
    ) -> impl Iterator<Item = (usize, &'a Conversion)> + 'a {
        self.conversions.iter().enumerate().filter(move |(_, c)| {
            types.iter().any(|t| *t == c.to) && !types.iter().any(|t| *t == c.from)
        })
    }

    /// Classify a value against the registry. The `Object` entry is deferred
    /// until all other entries have been tried, so finer container types take
    /// precedence over the permissive object test. Returns `unknown` when
    /// nothing matches.
    pub fn type_of(&self, value: &Value) -> &str {
        for entry in &self.types {
            if entry.name == "Object" {
                continue;
            }
            if (entry.test)(value) {
                return &entry.name;
            }
        }
        if let Some(object) = self.types.iter().find(|entry| entry.name == "Object") {
            if (object.test)(value) {
                return &object.name;
            }
        }
        "unknown"
    }

    /// One-shot conversion of a value to a target type: identity when the
    /// value already is of that type, otherwise the first applicable
    /// conversion in list order.
    pub fn convert(&self, value: &Value, to: &str) -> Result<Value, ConversionError> {
        let from = self.type_of(value);
        if from == to {
            return Ok(value.clone());
        }
        for conversion in &self.conversions {
            if conversion.from == from && conversion.to == to {
                return Ok((conversion.convert)(value));
            }
        }
        Err(ConversionError {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|entry| entry.name.as_str())
    }

    pub fn conversions(&self) -> impl Iterator<Item = &Conversion> {
        self.conversions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let registry = TypeRegistry::new();
        let names: Vec<_> = registry.type_names().collect();
        assert_eq!(
            names,
            vec!["number", "string", "boolean", "Array", "Object", "null"]
        );
    }

    #[test]
    fn test_type_of_defers_object() {
        let registry = TypeRegistry::new();
        // The permissive Object test accepts arrays, but Array wins.
        assert_eq!(registry.type_of(&Value::Array(vec![])), "Array");
        assert_eq!(
            registry.type_of(&Value::Object(Default::default())),
            "Object"
        );
        assert_eq!(registry.type_of(&Value::Number(1.0)), "number");
        assert_eq!(registry.type_of(&Value::Null), "null");
    }

    #[test]
    fn test_type_of_respects_entry_order() {
        let mut registry = TypeRegistry::new();
        registry
            .add_type("Anything", Rc::new(|_: &Value| true))
            .unwrap();
        // A catch-all entry sits after the builtins and only picks up what
        // they leave; the builtins classify first.
        assert_eq!(registry.type_of(&Value::Array(vec![])), "Array");
        assert_eq!(registry.type_of(&Value::Number(1.0)), "number");
    }

    #[test]
    fn test_lookup_hint() {
        let registry = TypeRegistry::new();
        let err = registry.lookup("Number").unwrap_err();
        match err {
            DefinitionError::UnknownType { name, hint } => {
                assert_eq!(name, "Number");
                assert_eq!(hint.as_deref(), Some("number"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let err = registry.lookup("Date").unwrap_err();
        match err {
            DefinitionError::UnknownType { hint, .. } => assert!(hint.is_none()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_add_type_validation() {
        let mut registry = TypeRegistry::new();
        assert!(registry.add_type("Date", Rc::new(|_: &Value| false)).is_ok());
        assert!(registry.add_type("Date", Rc::new(|_: &Value| false)).is_err());
        assert!(registry.add_type("any", Rc::new(|_: &Value| true)).is_err());
        assert!(registry.add_type("a|b", Rc::new(|_: &Value| true)).is_err());
        assert!(registry.add_type("", Rc::new(|_: &Value| true)).is_err());
    }

    #[test]
    fn test_add_conversion_validation() {
        let mut registry = TypeRegistry::new();
        assert!(registry
            .add_conversion("boolean", "number", Rc::new(|_: &Value| Value::Number(0.0)))
            .is_ok());
        assert!(registry
            .add_conversion("boolean", "boolean", Rc::new(|v: &Value| v.clone()))
            .is_err());
        assert!(registry
            .add_conversion("Date", "number", Rc::new(|_: &Value| Value::Number(0.0)))
            .is_err());
    }

    #[test]
    fn test_convert() {
        let mut registry = TypeRegistry::new();
        registry
            .add_conversion(
                "boolean",
                "number",
                Rc::new(|v: &Value| Value::Number(if v.as_bool() == Some(true) { 1.0 } else { 0.0 })),
            )
            .unwrap();
        assert_eq!(
            registry.convert(&Value::Bool(true), "number").unwrap(),
            Value::Number(1.0)
        );
        // Identity conversion.
        assert_eq!(
            registry.convert(&Value::Number(2.0), "number").unwrap(),
            Value::Number(2.0)
        );
        let err = registry.convert(&Value::Str("x".into()), "number").unwrap_err();
        assert_eq!(err.from, "string");
        assert_eq!(err.to, "number");
    }

    #[test]
    fn test_conversions_into() {
        let mut registry = TypeRegistry::new();
        registry
            .add_conversion("boolean", "number", Rc::new(|_: &Value| Value::Number(0.0)))
            .unwrap();
        registry
            .add_conversion("number", "string", Rc::new(|_: &Value| Value::Str(String::new())))
            .unwrap();
        let accepted = ["number".to_string()];
        let into_number: Vec<_> = registry
            .conversions_into(&accepted)
            .map(|(i, c)| (i, c.from.as_str()))
            .collect();
        assert_eq!(into_number, vec![(0, "boolean")]);
        // A conversion whose `from` is already accepted is not applicable.
        assert_eq!(
            registry
                .conversions_into(&["number".to_string(), "boolean".to_string()])
                .count(),
            0
        );
    }
}
