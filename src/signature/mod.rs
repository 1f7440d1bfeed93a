//! Signatures: a sequence of params bound to an implementation.
//!
//! # Module Organization
//!
//! - `param.rs`: the single parameter slot
//! - `comparison.rs`: total orders over params and signatures
//! - `tests.rs`: unit tests for parsing, ordering and expansion

mod comparison;
mod param;


pub use comparison::{compare_params, compare_signatures};
pub use param::{Param, ParamConversion};

use std::rc::Rc;

use crate::error::DefinitionError;
use crate::registry::TypeRegistry;
use crate::value::Value;

/// A user implementation. Receives the (converted) positional arguments;
/// a variadic signature receives its captured tail as one trailing
/// `Value::Array`.
pub type Implementation = Rc<dyn Fn(&[Value]) -> Value>;

/// Wrap a closure as a shared implementation reference.
pub fn implementation<F>(f: F) -> Implementation
where
    F: Fn(&[Value]) -> Value + 'static,
{
    Rc::new(f)
}

/// A parameter sequence plus the implementation it routes to.
#[derive(Clone)]
pub struct Signature {
    pub params: Vec<Param>,
    pub fn_ref: Implementation,
    pub any_type: bool,
    pub var_args: bool,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("params", &self.key())
            .field("any_type", &self.any_type)
            .field("var_args", &self.var_args)
            .finish()
    }
}

impl Signature {
    /// Parse a comma-delimited signature text. Empty text is an arity-0
    /// signature; an empty slot inside a non-empty text is an `any` param.
    /// A variadic param anywhere but last is an error.
    pub fn parse(
        text: &str,
        fn_ref: Implementation,
        registry: &TypeRegistry,
    ) -> Result<Signature, DefinitionError> {
        let params = if text.trim().is_empty() {
            Vec::new()
        } else {
            text.split(',')
                .map(|spec| Param::parse(spec, registry))
                .collect::<Result<Vec<_>, _>>()?
        };
        Signature::from_params(params, fn_ref)
    }

    /// Build a signature from already-constructed params, enforcing the
    /// trailing-variadic invariant.
    pub fn from_params(
        params: Vec<Param>,
        fn_ref: Implementation,
    ) -> Result<Signature, DefinitionError> {
        if let Some(misplaced) = params
            .iter()
            .take(params.len().saturating_sub(1))
            .find(|p| p.var_args)
        {
            return Err(DefinitionError::VariadicPosition(misplaced.to_string()));
        }
        let any_type = params.iter().any(|p| p.any_type);
        let var_args = params.last().is_some_and(|p| p.var_args);
        Ok(Signature {
            params,
            fn_ref,
            any_type,
            var_args,
        })
    }

    /// Canonical key: params joined by `,`, the variadic one carrying its
    /// `...` marker. Uses the raw (pre-conversion) type names.
    pub fn key(&self) -> String {
        self.params
            .iter()
            .map(|p| p.render(false))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The param governing argument position `index`, treating a trailing
    /// variadic param as repeatable.
    pub fn param_at(&self, index: usize) -> Option<&Param> {
        if index < self.params.len() {
            Some(&self.params[index])
        } else if self.var_args {
            self.params.last()
        } else {
            None
        }
    }

    /// Whether this signature could match a call whose first params walk the
    /// given path prefix.
    pub fn params_start_with(&self, prefix: &[Param]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(k, p)| self.param_at(k).is_some_and(|own| own.matches(p)))
    }

    pub fn has_conversions(&self) -> bool {
        self.params.iter().any(Param::has_conversions)
    }

    /// True when any param mentions an ignored type name; such signatures are
    /// silently dropped at compile time.
    pub fn ignore(&self, registry: &TypeRegistry) -> bool {
        self.params
            .iter()
            .any(|p| p.contains_any(registry.ignored_names()))
    }

    /// Position the variadic param captures from (its own index).
    pub fn var_pos(&self) -> usize {
        debug_assert!(self.var_args);
        self.params.len() - 1
    }

    /// Split unions and inject conversions, producing signatures whose
    /// non-variadic params each carry exactly one accepted type.
    ///
    /// Every non-variadic param becomes one branch per accepted type plus one
    /// branch per registered conversion reaching an accepted type from an
    /// unaccepted one. A variadic param is not split; it is cloned with its
    /// type list extended by the applicable conversions.
    pub fn expand(&self, registry: &TypeRegistry) -> Vec<Signature> {
        let mut out = Vec::new();
        let mut path: Vec<Param> = Vec::with_capacity(self.params.len());
        self.expand_into(registry, 0, &mut path, &mut out);
        out
    }

    fn expand_into(
        &self,
        registry: &TypeRegistry,
        depth: usize,
        path: &mut Vec<Param>,
        out: &mut Vec<Signature>,
    ) {
        if depth == self.params.len() {
            // Params on the path are already normalized, so the invariant
            // checks in from_params cannot fail here.
            if let Ok(signature) = Signature::from_params(path.clone(), self.fn_ref.clone()) {
                out.push(signature);
            }
            return;
        }

        let param = &self.params[depth];
        if param.var_args {
            let mut extended = param.clone();
            for (index, conversion) in registry.conversions_into(&param.types) {
                extended.types.push(conversion.from.clone());
                extended.conversions.push(Some(ParamConversion {
                    index,
                    to: conversion.to.clone(),
                }));
            }
            path.push(extended);
            self.expand_into(registry, depth + 1, path, out);
            path.pop();
        } else {
            for (i, ty) in param.types.iter().enumerate() {
                path.push(Param::single(ty.clone(), param.conversions[i].clone()));
                self.expand_into(registry, depth + 1, path, out);
                path.pop();
            }
            for (index, conversion) in registry.conversions_into(&param.types) {
                path.push(Param::single(
                    conversion.from.clone(),
                    Some(ParamConversion {
                        index,
                        to: conversion.to.clone(),
                    }),
                ));
                self.expand_into(registry, depth + 1, path, out);
                path.pop();
            }
        }
    }
}
