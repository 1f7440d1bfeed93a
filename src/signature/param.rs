//! A single parameter slot: accepted type names, optional parallel
//! conversions, and the variadic flag.

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;
use crate::registry::{TypeRegistry, ANY_TYPE};

/// A conversion attached to one accepted type of a [`Param`]: the index into
/// the registry's conversion list plus the target type name. The source type
/// is the parallel entry in `Param::types`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamConversion {
    pub index: usize,
    pub to: String,
}

/// One parameter slot of a signature.
///
/// `types` and `conversions` are parallel: `conversions[i]` is present when
/// `types[i]` is only accepted by coercion into some other accepted type.
/// A variadic param consumes its own position and every later one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub types: Vec<String>,
    pub conversions: Vec<Option<ParamConversion>>,
    pub var_args: bool,
    pub any_type: bool,
}

impl Param {
    /// Parse a raw parameter spec: a `|`-delimited list of type names,
    /// optionally prefixed with `...`. Whitespace around alternatives is
    /// trimmed, duplicates are elided, and an empty spec means `any`.
    /// Every name must be registered (or the literal `any`).
    pub fn parse(spec: &str, registry: &TypeRegistry) -> Result<Param, DefinitionError> {
        let trimmed = spec.trim();
        let (var_args, rest) = match trimmed.strip_prefix("...") {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };

        let mut types: Vec<String> = Vec::new();
        if rest.is_empty() {
            types.push(ANY_TYPE.to_string());
        } else {
            for alternative in rest.split('|') {
                let name = alternative.trim();
                if name.is_empty() {
                    return Err(DefinitionError::InvalidParam(spec.to_string()));
                }
                if name != ANY_TYPE {
                    registry.lookup(name)?;
                }
                if !types.iter().any(|t| t == name) {
                    types.push(name.to_string());
                }
            }
        }

        Ok(Param::from_types(types, var_args))
    }

    /// Build a param from an already-validated list of type names, with no
    /// conversions attached.
    pub fn from_types(types: Vec<String>, var_args: bool) -> Param {
        let any_type = types.iter().any(|t| t == ANY_TYPE);
        let conversions = vec![None; types.len()];
        Param {
            types,
            conversions,
            var_args,
            any_type,
        }
    }

    /// A single-type param, optionally reached through a conversion.
    pub fn single(type_name: String, conversion: Option<ParamConversion>) -> Param {
        let any_type = type_name == ANY_TYPE;
        Param {
            types: vec![type_name],
            conversions: vec![conversion],
            var_args: false,
            any_type,
        }
    }

    /// Whether the two params share at least one accepted type name.
    pub fn overlapping(&self, other: &Param) -> bool {
        self.types.iter().any(|t| other.types.iter().any(|o| o == t))
    }

    /// Whether an argument accepted by one param could be accepted by the
    /// other: true when either side is `any`-typed or they overlap.
    pub fn matches(&self, other: &Param) -> bool {
        self.any_type || other.any_type || self.overlapping(other)
    }

    /// Membership test against a set of type names.
    pub fn contains_any(&self, names: &[String]) -> bool {
        self.types.iter().any(|t| names.iter().any(|n| n == t))
    }

    pub fn has_conversions(&self) -> bool {
        self.conversions.iter().any(Option::is_some)
    }

    /// Index (into the registry conversion list) of the first attached
    /// conversion, in parameter order. Drives the ordering tie-break.
    pub fn first_conversion_index(&self) -> Option<usize> {
        self.conversions
            .iter()
            .find_map(|c| c.as_ref().map(|c| c.index))
    }

    /// Render the param. With `show_converted`, each type reached through a
    /// conversion is replaced by the conversion's target; duplicates after
    /// replacement are elided preserving first occurrence.
    pub fn render(&self, show_converted: bool) -> String {
        let mut names: Vec<&str> = Vec::with_capacity(self.types.len());
        for (i, ty) in self.types.iter().enumerate() {
            let name = match (show_converted, &self.conversions[i]) {
                (true, Some(conversion)) => conversion.to.as_str(),
                _ => ty.as_str(),
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let mut out = String::new();
        if self.var_args {
            out.push_str("...");
        }
        out.push_str(&names.join("|"));
        out
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render(false))
    }
}
