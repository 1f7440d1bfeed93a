//! The compiler: turns an ordered collection of `(signature text ->
//! implementation)` bindings into a materialized [`Dispatcher`].
//!
//! Stages: parse (dropping ignored signatures), expand, deduplicate with the
//! order tie-break, sort, prune redundant variadic conversions, build the
//! discrimination tree with fall-through analysis, and materialize the
//! dispatcher bound to its reference pool and a registry snapshot.
//!
//! # Module Organization
//!
//! - `pool.rs`: the reference pool of closed-over values
//! - `node.rs`: discrimination tree construction and dispatch semantics

pub(crate) mod node;
pub(crate) mod pool;

use std::cmp::Ordering;
use std::rc::Rc;

use crate::dispatcher::Dispatcher;
use crate::error::DefinitionError;
use crate::registry::TypeRegistry;
use crate::signature::{compare_signatures, Implementation, Signature};

use node::build_node;
use pool::RefPool;

/// Compile an insertion-ordered set of bindings into a dispatcher.
pub(crate) fn compile(
    name: &str,
    entries: &[(String, Implementation)],
    registry: &TypeRegistry,
) -> Result<Dispatcher, DefinitionError> {
    // (a) Parse, attach the ambient registry, drop ignored signatures.
    let mut parsed: Vec<Signature> = Vec::new();
    for (text, fn_ref) in entries {
        let signature = Signature::parse(text, fn_ref.clone(), registry)?;
        if !signature.ignore(registry) {
            parsed.push(signature);
        }
    }

    // (b) Expand and deduplicate by canonical key. On a collision the same
    // implementation silently collapses; otherwise the smaller signature in
    // the total order replaces and an exact tie is a hard error.
    let mut expanded: Vec<Signature> = Vec::new();
    for signature in &parsed {
        for candidate in signature.expand(registry) {
            let key = candidate.key();
            match expanded.iter().position(|s| s.key() == key) {
                None => expanded.push(candidate),
                Some(pos) => {
                    if Rc::ptr_eq(&expanded[pos].fn_ref, &candidate.fn_ref) {
                        continue;
                    }
                    match compare_signatures(&candidate, &expanded[pos], registry) {
                        Ordering::Less => expanded[pos] = candidate,
                        Ordering::Greater => {}
                        Ordering::Equal => {
                            return Err(DefinitionError::DuplicateSignature(key));
                        }
                    }
                }
            }
        }
    }

    if expanded.is_empty() {
        return Err(DefinitionError::EmptySignatureSet);
    }

    // (c) Sort. The sort is stable, so the remaining ties keep insertion order.
    expanded.sort_by(|a, b| compare_signatures(a, b, registry));

    // (d) Prune variadic conversion entries preempted by a direct match in
    // some other signature at the same position.
    prune_variadic_conversions(&mut expanded);

    // (e) The any-typed subset, in sorted order.
    let anys: Vec<Signature> = expanded.iter().filter(|s| s.any_type).cloned().collect();

    // (f) Build the tree.
    let mut pool = RefPool::new();
    let root = build_node(Vec::new(), expanded.clone(), &anys, &mut pool, registry)?;

    // (g) Materialize, attaching the conversion-free expanded signature map.
    let max_arity = expanded.iter().map(|s| s.params.len()).max().unwrap_or(0);
    let attached: Vec<(String, Implementation)> = expanded
        .iter()
        .filter(|s| !s.has_conversions())
        .map(|s| (s.key(), s.fn_ref.clone()))
        .collect();

    Ok(Dispatcher::new(
        name.to_string(),
        root,
        pool,
        registry.clone(),
        max_arity,
        attached,
    ))
}

/// Drop a conversion entry from a variadic trailing param when another
/// signature accepts the conversion's source type directly at the same
/// position; the direct edge would preempt the conversion at runtime anyway.
fn prune_variadic_conversions(signatures: &mut [Signature]) {
    let mut drops: Vec<(usize, Vec<usize>)> = Vec::new();

    for (si, signature) in signatures.iter().enumerate() {
        if !signature.var_args {
            continue;
        }
        let pos = signature.var_pos();
        let param = &signature.params[pos];
        let mut dead: Vec<usize> = Vec::new();
        for (i, conversion) in param.conversions.iter().enumerate() {
            if conversion.is_none() {
                continue;
            }
            let from = &param.types[i];
            let preempted = signatures.iter().enumerate().any(|(sj, other)| {
                if sj == si {
                    return false;
                }
                match other.params.get(pos) {
                    Some(other_param) if !other_param.var_args => other_param
                        .types
                        .iter()
                        .enumerate()
                        .any(|(k, ty)| ty == from && other_param.conversions[k].is_none()),
                    _ => false,
                }
            });
            if preempted {
                dead.push(i);
            }
        }
        if !dead.is_empty() {
            drops.push((si, dead));
        }
    }

    for (si, dead) in drops {
        let pos = signatures[si].var_pos();
        let param = &mut signatures[si].params[pos];
        for &i in dead.iter().rev() {
            param.types.remove(i);
            param.conversions.remove(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Param;
    use crate::value::Value;

    fn noop() -> Implementation {
        Rc::new(|_: &[Value]| Value::Null)
    }

    fn registry_with_bool_to_number() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .add_conversion("boolean", "number", Rc::new(|_: &Value| Value::Number(1.0)))
            .unwrap();
        registry
    }

    fn keys(signatures: &[Signature]) -> Vec<String> {
        signatures.iter().map(Signature::key).collect()
    }

    #[test]
    fn test_prune_drops_preempted_variadic_conversion() {
        let registry = registry_with_bool_to_number();
        let variadic = Signature::parse("...number", noop(), &registry)
            .unwrap()
            .expand(&registry)
            .remove(0);
        let direct = Signature::parse("boolean", noop(), &registry).unwrap();
        assert_eq!(variadic.params[0].types, vec!["number", "boolean"]);

        let mut signatures = vec![direct, variadic];
        prune_variadic_conversions(&mut signatures);
        assert_eq!(signatures[1].params[0].types, vec!["number"]);
        assert!(!signatures[1].params[0].has_conversions());
    }

    #[test]
    fn test_prune_keeps_conversion_without_direct_competitor() {
        let registry = registry_with_bool_to_number();
        let variadic = Signature::parse("...number", noop(), &registry)
            .unwrap()
            .expand(&registry)
            .remove(0);
        let mut signatures = vec![variadic];
        prune_variadic_conversions(&mut signatures);
        assert_eq!(signatures[0].params[0].types, vec!["number", "boolean"]);
    }

    #[test]
    fn test_prune_ignores_converting_competitor() {
        // A competitor that itself reaches boolean through a conversion does
        // not preempt the variadic conversion.
        let registry = registry_with_bool_to_number();
        let variadic = Signature::parse("...number", noop(), &registry)
            .unwrap()
            .expand(&registry)
            .remove(0);
        let converting = Signature::from_params(
            vec![Param::single(
                "boolean".to_string(),
                Some(crate::signature::ParamConversion {
                    index: 0,
                    to: "number".to_string(),
                }),
            )],
            noop(),
        )
        .unwrap();
        let mut signatures = vec![converting, variadic];
        prune_variadic_conversions(&mut signatures);
        assert_eq!(signatures[1].params[0].types, vec!["number", "boolean"]);
    }

    #[test]
    fn test_dedup_prefers_direct_over_conversion() {
        let registry = registry_with_bool_to_number();
        let f: Implementation = Rc::new(|_: &[Value]| Value::Str("f".into()));
        let g: Implementation = Rc::new(|_: &[Value]| Value::Str("g".into()));
        // "number" expands to number plus a converted boolean branch; the
        // explicit boolean binding must replace the converted branch.
        let entries = vec![
            ("number".to_string(), f),
            ("boolean".to_string(), g.clone()),
        ];
        let dispatcher = compile("", &entries, &registry).unwrap();
        let attached: Vec<_> = dispatcher.signatures().map(|(k, _)| k.to_string()).collect();
        assert_eq!(attached, vec!["number", "boolean"]);
        assert_eq!(
            dispatcher.call(&[Value::Bool(true)]).unwrap(),
            Value::Str("g".into())
        );
    }

    #[test]
    fn test_duplicate_signature_is_an_error() {
        let registry = TypeRegistry::new();
        let f: Implementation = Rc::new(|_: &[Value]| Value::Str("f".into()));
        let g: Implementation = Rc::new(|_: &[Value]| Value::Str("g".into()));
        let entries = vec![
            ("number|string".to_string(), f),
            ("number".to_string(), g),
        ];
        let err = compile("", &entries, &registry).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateSignature(key) if key == "number"));
    }

    #[test]
    fn test_same_implementation_collapses_silently() {
        let registry = TypeRegistry::new();
        let f: Implementation = Rc::new(|_: &[Value]| Value::Null);
        let entries = vec![
            ("number|string".to_string(), f.clone()),
            ("number".to_string(), f),
        ];
        let dispatcher = compile("", &entries, &registry).unwrap();
        let attached: Vec<_> = dispatcher.signatures().map(|(k, _)| k.to_string()).collect();
        assert_eq!(attached, vec!["number", "string"]);
    }

    #[test]
    fn test_empty_signature_set() {
        let registry = TypeRegistry::new();
        let err = compile("", &[], &registry).unwrap_err();
        assert!(matches!(err, DefinitionError::EmptySignatureSet));
    }

    #[test]
    fn test_sort_orders_by_arity_then_conversions() {
        let registry = registry_with_bool_to_number();
        let f: Implementation = Rc::new(|_: &[Value]| Value::Null);
        let mut signatures: Vec<Signature> = Vec::new();
        for text in ["number, number", "number"] {
            signatures.extend(Signature::parse(text, f.clone(), &registry).unwrap().expand(&registry));
        }
        signatures.sort_by(|a, b| compare_signatures(a, b, &registry));
        assert_eq!(
            keys(&signatures),
            vec!["number", "boolean", "number,number", "number,boolean", "boolean,number", "boolean,boolean"]
        );
    }
}
