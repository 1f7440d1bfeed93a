//! The materialized dispatcher: a callable discrimination tree bound to its
//! reference pool and a registry snapshot.

use crate::compiler::node::{DispatchCtx, Node};
use crate::compiler::pool::RefPool;
use crate::error::ArgumentsError;
use crate::registry::TypeRegistry;
use crate::signature::Implementation;
use crate::value::Value;

/// Check if dispatch debug tracing is enabled via `TYPED_DISPATCH_DEBUG`.
/// Only available in debug builds to avoid overhead in release.
#[cfg(debug_assertions)]
fn dispatch_debug_enabled() -> bool {
    use std::sync::OnceLock;
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var("TYPED_DISPATCH_DEBUG").is_ok())
}

/// Emit dispatch trace lines in debug builds without relying on `eprintln!`.
#[cfg(debug_assertions)]
fn dispatch_debug_log(args: std::fmt::Arguments<'_>) {
    use std::io::Write;
    let _ = writeln!(std::io::stderr(), "{args}");
}

/// A composed multiple-dispatch callable.
///
/// Produced by the compiler; owns its reference pool and a compile-time
/// snapshot of the registry, so later registry mutations are not observable
/// through it. The only error it produces itself is [`ArgumentsError`].
pub struct Dispatcher {
    name: String,
    root: Node,
    pool: RefPool,
    registry: TypeRegistry,
    max_arity: usize,
    /// Conversion-free expanded signatures, in sorted order. Used by exact
    /// lookup and by the multi-dispatcher merge path.
    signatures: Vec<(String, Implementation)>,
}

impl Dispatcher {
    pub(crate) fn new(
        name: String,
        root: Node,
        pool: RefPool,
        registry: TypeRegistry,
        max_arity: usize,
        signatures: Vec<(String, Implementation)>,
    ) -> Self {
        Dispatcher {
            name,
            root,
            pool,
            registry,
            max_arity,
            signatures,
        }
    }

    /// Dispatch a call: route the arguments to the implementation whose
    /// signature matches their runtime types, applying declared conversions
    /// where the match requires them.
    pub fn call(&self, args: &[Value]) -> Result<Value, ArgumentsError> {
        #[cfg(debug_assertions)]
        if dispatch_debug_enabled() {
            let types: Vec<&str> = args.iter().map(|a| self.registry.type_of(a)).collect();
            dispatch_debug_log(format_args!(
                "[typed_dispatch] {}({})",
                if self.name.is_empty() { "unnamed" } else { &self.name },
                types.join(", ")
            ));
        }

        let ctx = DispatchCtx {
            name: &self.name,
            registry: &self.registry,
        };
        match self.root.eval(args, &self.pool, &ctx) {
            Some(result) => result,
            // The root reports its own mismatches; this arm only serves a
            // tree with no matching edge and suppressed reporting.
            None => Err(ArgumentsError::mismatch(
                &self.name,
                args.len(),
                0,
                args.first().cloned(),
                args.first().map(|v| self.registry.type_of(v).to_string()),
                self.root.expected_at_root(),
            )),
        }
    }

    /// Informational name, used in error messages. May be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Largest fixed arity across the compiled signatures.
    pub fn max_arity(&self) -> usize {
        self.max_arity
    }

    /// The attached map: conversion-free expanded signature keys and their
    /// implementations, in sorted order.
    pub fn signatures(&self) -> impl Iterator<Item = (&str, &Implementation)> {
        self.signatures.iter().map(|(k, f)| (k.as_str(), f))
    }

    /// Exact lookup against the attached map.
    pub(crate) fn find_exact(&self, key: &str) -> Option<&Implementation> {
        self.signatures
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, f)| f)
    }

    /// The registry snapshot this dispatcher was compiled against.
    pub(crate) fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("max_arity", &self.max_arity)
            .field(
                "signatures",
                &self.signatures.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("pool", &self.pool)
            .finish()
    }
}
