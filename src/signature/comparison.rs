//! Total orders over params and signatures, relative to an ambient registry.
//!
//! The orders decide which candidate wins when several expanded signatures
//! could serve the same call, so every rule here is observable behavior:
//! `any` sorts last, the permissive `Object` second-to-last, conversion-free
//! params before converting ones, earlier conversions before later ones, and
//! finally registry position.

use std::cmp::Ordering;

use crate::registry::TypeRegistry;
use crate::signature::param::Param;
use crate::signature::Signature;

/// Registry position of a type name; unregistered names sort after all
/// registered ones.
fn registry_rank(registry: &TypeRegistry, name: &str) -> usize {
    registry.type_index(name).unwrap_or(usize::MAX)
}

/// Total order over params.
pub fn compare_params(a: &Param, b: &Param, registry: &TypeRegistry) -> Ordering {
    if a.any_type != b.any_type {
        return if a.any_type {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    let a_object = a.types.iter().any(|t| t == "Object");
    let b_object = b.types.iter().any(|t| t == "Object");
    if a_object != b_object {
        return if a_object {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    match (a.has_conversions(), b.has_conversions()) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => a.first_conversion_index().cmp(&b.first_conversion_index()),
        (false, false) => {
            registry_rank(registry, &a.types[0]).cmp(&registry_rank(registry, &b.types[0]))
        }
    }
}

/// Total order over signatures: by arity, then by the number of converting
/// params, then lexicographically by the param order.
pub fn compare_signatures(a: &Signature, b: &Signature, registry: &TypeRegistry) -> Ordering {
    let by_arity = a.params.len().cmp(&b.params.len());
    if by_arity != Ordering::Equal {
        return by_arity;
    }

    let a_converting = a.params.iter().filter(|p| p.has_conversions()).count();
    let b_converting = b.params.iter().filter(|p| p.has_conversions()).count();
    let by_conversions = a_converting.cmp(&b_converting);
    if by_conversions != Ordering::Equal {
        return by_conversions;
    }

    for (pa, pb) in a.params.iter().zip(b.params.iter()) {
        let by_param = compare_params(pa, pb, registry);
        if by_param != Ordering::Equal {
            return by_param;
        }
    }
    Ordering::Equal
}
