//! The public facade: an isolated dispatch system instance.
//!
//! A [`Composer`] owns one type registry (entries, conversions, ignore list)
//! and builds dispatchers against it. Registry mutations affect dispatchers
//! compiled afterwards, never existing ones: compilation snapshots the
//! registry.

use std::rc::Rc;

use crate::compiler::compile;
use crate::dispatcher::Dispatcher;
use crate::error::{ConversionError, DefinitionError};
use crate::registry::{ConvertFn, TypeRegistry, TypeTest};
use crate::signature::{Implementation, Signature};
use crate::value::Value;

/// An isolated dispatch system: its own registry, conversions and ignore
/// list. `Composer::new()` is the fresh-instance factory.
#[derive(Debug, Default)]
pub struct Composer {
    registry: TypeRegistry,
}

impl Composer {
    /// A fresh, isolated instance seeded with the built-in types.
    pub fn new() -> Self {
        Composer {
            registry: TypeRegistry::new(),
        }
    }

    /// Build an anonymous dispatcher from insertion-ordered bindings.
    pub fn compose<K, I>(&self, entries: I) -> Result<Dispatcher, DefinitionError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Implementation)>,
    {
        self.compose_named("", entries)
    }

    /// Build a named dispatcher; the name appears in dispatch errors.
    pub fn compose_named<K, I>(&self, name: &str, entries: I) -> Result<Dispatcher, DefinitionError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Implementation)>,
    {
        let entries: Vec<(String, Implementation)> = entries
            .into_iter()
            .map(|(k, f)| (k.into(), f))
            .collect();
        compile(name, &entries, &self.registry)
    }

    /// Merge already-composed dispatchers into one, by uniting their attached
    /// signature maps. A key shared with the same implementation collapses;
    /// with different implementations it is a conflict. The merged name is
    /// the first non-empty one; two distinct non-empty names conflict.
    pub fn merge(&self, dispatchers: &[&Dispatcher]) -> Result<Dispatcher, DefinitionError> {
        let mut name = String::new();
        for dispatcher in dispatchers {
            let other = dispatcher.name();
            if other.is_empty() {
                continue;
            }
            if name.is_empty() {
                name = other.to_string();
            } else if name != other {
                return Err(DefinitionError::NameConflict {
                    first: name,
                    second: other.to_string(),
                });
            }
        }

        let mut entries: Vec<(String, Implementation)> = Vec::new();
        for dispatcher in dispatchers {
            for (key, fn_ref) in dispatcher.signatures() {
                match entries.iter().position(|(k, _)| k == key) {
                    None => entries.push((key.to_string(), fn_ref.clone())),
                    Some(pos) => {
                        if !Rc::ptr_eq(&entries[pos].1, fn_ref) {
                            return Err(DefinitionError::MergeConflict(key.to_string()));
                        }
                    }
                }
            }
        }

        compile(&name, &entries, &self.registry)
    }

    /// Exact lookup of an implementation by signature text: the text is
    /// normalized through parsing, then matched against the dispatcher's
    /// attached conversion-free map. No coercion, no `any` matching.
    pub fn find<'d>(
        &self,
        dispatcher: &'d Dispatcher,
        signature: &str,
    ) -> Result<&'d Implementation, DefinitionError> {
        // Parse against the dispatcher's own snapshot so lookups keep working
        // if this composer's registry has since diverged.
        let placeholder: Implementation = Rc::new(|_: &[Value]| Value::Null);
        let parsed = Signature::parse(signature, placeholder, dispatcher.registry())?;
        let key = parsed.key();
        dispatcher
            .find_exact(&key)
            .ok_or(DefinitionError::SignatureNotFound(key))
    }

    /// One-shot conversion of a value to a named type.
    pub fn convert(&self, value: &Value, to: &str) -> Result<Value, ConversionError> {
        self.registry.convert(value, to)
    }

    /// Classify a value against the registry.
    pub fn type_of(&self, value: &Value) -> &str {
        self.registry.type_of(value)
    }

    /// Register a type entry. Affects dispatchers compiled afterwards.
    pub fn add_type(
        &mut self,
        name: impl Into<String>,
        test: TypeTest,
    ) -> Result<(), DefinitionError> {
        self.registry.add_type(name, test)
    }

    /// Register a conversion. List order is significant: earlier conversions
    /// win ties.
    pub fn add_conversion(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        convert: ConvertFn,
    ) -> Result<(), DefinitionError> {
        self.registry.add_conversion(from, to, convert)
    }

    /// Mark a type name as ignored: signatures mentioning it are dropped
    /// silently at compile time.
    pub fn ignore_type(&mut self, name: impl Into<String>) {
        self.registry.ignore_type(name)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}
