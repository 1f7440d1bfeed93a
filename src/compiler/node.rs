//! The discrimination tree: construction and dispatch semantics.
//!
//! The tree branches on one argument position per level. Each edge is a
//! param; walking an edge means the argument at that depth passed the edge's
//! guard. A node may terminate (argument count equals its depth), recurse
//! into children for deeper matching, or, for a variadic edge, capture and
//! validate the whole argument tail.
//!
//! A node in fall-through mode must not report a terminal mismatch, because
//! an `any`-typed signature outside its subtree might still accept the call;
//! control returns to the parent, which tries later siblings. A node whose
//! own edge is `any`-typed reports mismatches regardless, otherwise no error
//! would ever surface on that path.

use std::collections::HashSet;

use crate::compiler::pool::RefPool;
use crate::error::{ArgumentsError, DefinitionError};
use crate::registry::TypeRegistry;
use crate::signature::{compare_params, Param, Signature};
use crate::value::Value;

/// Per-call context: the dispatcher name and the registry snapshot used to
/// classify offending values in error messages.
pub(crate) struct DispatchCtx<'a> {
    pub name: &'a str,
    pub registry: &'a TypeRegistry,
}

impl DispatchCtx<'_> {
    fn mismatch(&self, args: &[Value], index: usize, expected: Vec<String>) -> ArgumentsError {
        let actual = args.get(index).cloned();
        let actual_type = actual.as_ref().map(|v| self.registry.type_of(v).to_string());
        ArgumentsError::mismatch(self.name, args.len(), index, actual, actual_type, expected)
    }
}

/// Entry guard of a non-variadic node.
enum Guard {
    /// Root: no argument is consumed here.
    Root,
    /// An `any`-typed edge accepts without testing.
    Any,
    /// Concrete edge: pool index of the type predicate for the argument at
    /// `depth - 1`.
    Test(usize),
}

/// The call made when a node terminates: one conversion slot per fixed
/// argument plus the implementation, all as pool indices.
struct Tail {
    conversions: Vec<Option<usize>>,
    fn_index: usize,
}

/// Compiled form of a variadic edge: the capture position (the variadic
/// param's index in its signature) and the accepted tail element checks.
struct VarSpec {
    pos: usize,
    /// An `any`-typed variadic accepts every tail element verbatim.
    any: bool,
    /// Directly accepted types: name (for error reporting) and test index.
    direct: Vec<(String, usize)>,
    /// Conversion-reached types: source test index and conversion index.
    converted: Vec<(usize, usize)>,
}

impl VarSpec {
    fn accepts(&self, value: &Value, pool: &RefPool) -> bool {
        self.any
            || self.direct.iter().any(|(_, t)| (pool.test(*t))(value))
            || self.converted.iter().any(|(t, _)| (pool.test(*t))(value))
    }

    /// Accept a tail element: direct types first, then conversions in
    /// declaration order.
    fn coerce(&self, value: &Value, pool: &RefPool) -> Option<Value> {
        for (_, test) in &self.direct {
            if (pool.test(*test))(value) {
                return Some(value.clone());
            }
        }
        for (test, convert) in &self.converted {
            if (pool.test(*test))(value) {
                return Some((pool.convert(*convert))(value));
            }
        }
        if self.any {
            return Some(value.clone());
        }
        None
    }

    fn expected(&self) -> Vec<String> {
        let mut names: Vec<String> = self.direct.iter().map(|(name, _)| name.clone()).collect();
        if self.any {
            names.push(crate::registry::ANY_TYPE.to_string());
        }
        names
    }
}

pub(crate) struct Node {
    path: Vec<Param>,
    param: Option<Param>,
    guard: Guard,
    variadic: Option<VarSpec>,
    terminal: Option<Tail>,
    childs: Vec<Node>,
    fall_through: bool,
    /// Union of the direct (conversion-free) types across children, used in
    /// the terminal mismatch report.
    expected: Vec<String>,
}

impl Node {
    pub(crate) fn depth(&self) -> usize {
        self.path.len()
    }

    pub(crate) fn expected_at_root(&self) -> Vec<String> {
        self.expected.clone()
    }

    fn any_param(&self) -> bool {
        self.param.as_ref().is_some_and(|p| p.any_type)
    }

    /// Walk the node against the call. `None` means this subtree does not
    /// match and control falls through to later siblings; `Some` carries the
    /// dispatch result, success or error.
    pub(crate) fn eval(
        &self,
        args: &[Value],
        pool: &RefPool,
        ctx: &DispatchCtx<'_>,
    ) -> Option<Result<Value, ArgumentsError>> {
        let depth = self.depth();

        match &self.guard {
            Guard::Root | Guard::Any => {}
            Guard::Test(test) => {
                let arg = args.get(depth - 1)?;
                if !(pool.test(*test))(arg) {
                    return None;
                }
            }
        }

        if let Some(var) = &self.variadic {
            return self.eval_variadic(var, args, pool, ctx);
        }

        if args.len() == depth {
            if let Some(tail) = &self.terminal {
                return Some(Ok(call_tail(tail, args, pool)));
            }
        }

        for child in &self.childs {
            if let Some(result) = child.eval(args, pool, ctx) {
                return Some(result);
            }
        }

        if self.fall_through && !self.any_param() {
            return None;
        }

        if self.childs.is_empty() {
            if args.len() > depth {
                return Some(Err(ArgumentsError::too_many(ctx.name, args.len(), depth)));
            }
            return None;
        }

        // Sound to report unconditionally: the guard for this node already
        // accepted the argument before this depth.
        Some(Err(ctx.mismatch(args, depth, self.expected.clone())))
    }

    fn eval_variadic(
        &self,
        var: &VarSpec,
        args: &[Value],
        pool: &RefPool,
        ctx: &DispatchCtx<'_>,
    ) -> Option<Result<Value, ArgumentsError>> {
        let tail = self.terminal.as_ref()?;

        // The first trailing argument is the guard: on mismatch the call may
        // still be served by a sibling. Later mismatches are hard errors.
        // An empty tail is accepted with an empty capture list.
        if args.len() > var.pos && !var.accepts(&args[var.pos], pool) {
            return None;
        }

        let mut captured = Vec::with_capacity(args.len().saturating_sub(var.pos));
        for (i, arg) in args.iter().enumerate().skip(var.pos) {
            match var.coerce(arg, pool) {
                Some(value) => captured.push(value),
                None => return Some(Err(ctx.mismatch(args, i, var.expected()))),
            }
        }

        let mut call_args = Vec::with_capacity(var.pos + 1);
        for (i, arg) in args.iter().take(var.pos).enumerate() {
            call_args.push(apply_conversion(tail.conversions.get(i), arg, pool));
        }
        call_args.push(Value::Array(captured));
        Some(Ok((pool.signature(tail.fn_index))(&call_args)))
    }
}

fn apply_conversion(slot: Option<&Option<usize>>, arg: &Value, pool: &RefPool) -> Value {
    match slot {
        Some(Some(convert)) => (pool.convert(*convert))(arg),
        _ => arg.clone(),
    }
}

fn call_tail(tail: &Tail, args: &[Value], pool: &RefPool) -> Value {
    let converted: Vec<Value> = args
        .iter()
        .enumerate()
        .map(|(i, arg)| apply_conversion(tail.conversions.get(i), arg, pool))
        .collect();
    (pool.signature(tail.fn_index))(&converted)
}

/// One partition bucket at a depth: the keying param and the signatures
/// routed through it.
struct PartitionEntry {
    param: Param,
    sigs: Vec<Signature>,
}

/// Recursively build the tree for `sigs` (already expanded, deduplicated and
/// sorted) below the given path. `anys` is the sorted subset of `any`-typed
/// signatures of the whole dispatcher.
pub(crate) fn build_node(
    path: Vec<Param>,
    sigs: Vec<Signature>,
    anys: &[Signature],
    pool: &mut RefPool,
    registry: &TypeRegistry,
) -> Result<Node, DefinitionError> {
    let depth = path.len();
    let node_keys: HashSet<String> = sigs.iter().map(Signature::key).collect();

    // Terminal: the first signature fully consumed at this depth. A variadic
    // signature is consumed at any depth at or past its own arity (its last
    // edge is the variadic param).
    let terminal_pos = sigs
        .iter()
        .position(|s| s.params.len() == depth || (s.var_args && s.params.len() <= depth));
    let mut rest: Vec<Signature> = Vec::with_capacity(sigs.len());
    let mut terminal_sig: Option<Signature> = None;
    for (i, sig) in sigs.iter().enumerate() {
        if Some(i) == terminal_pos {
            terminal_sig = Some(sig.clone());
        } else {
            rest.push(sig.clone());
        }
    }

    // Partition the rest by their param at this depth; overlapping params
    // share an entry. Growing an entry keyed by a variadic param would make
    // it name both the variadic and the non-variadic case at once.
    let mut entries: Vec<PartitionEntry> = Vec::new();
    for sig in rest {
        let Some(param) = sig.param_at(depth).cloned() else {
            continue;
        };
        match entries.iter_mut().find(|e| e.param.overlapping(&param)) {
            Some(entry) => {
                if entry.param.var_args {
                    return Err(DefinitionError::ConflictingParams {
                        variadic: entry.param.to_string(),
                        other: param.to_string(),
                        index: depth,
                    });
                }
                entry.sigs.push(sig);
            }
            None => entries.push(PartitionEntry {
                param,
                sigs: vec![sig],
            }),
        }
    }
    entries.sort_by(|a, b| compare_params(&a.param, &b.param, registry));

    // Fall-through: some any-typed signature still matching this path lives
    // outside this subtree.
    let matching_anys: Vec<Signature> = anys
        .iter()
        .filter(|a| a.params_start_with(&path))
        .cloned()
        .collect();
    let fall_through = matching_anys.iter().any(|a| !node_keys.contains(&a.key()));

    let mut expected: Vec<String> = Vec::new();
    for entry in &entries {
        for (i, ty) in entry.param.types.iter().enumerate() {
            if entry.param.conversions[i].is_none() && !expected.iter().any(|t| t == ty) {
                expected.push(ty.clone());
            }
        }
    }

    let mut childs = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut child_path = path.clone();
        child_path.push(entry.param);
        childs.push(build_node(
            child_path,
            entry.sigs,
            &matching_anys,
            pool,
            registry,
        )?);
    }

    let param = path.last().cloned();
    let guard = compile_guard(param.as_ref(), pool, registry)?;
    let variadic = match (&param, &terminal_sig) {
        (Some(p), Some(sig)) if p.var_args => Some(compile_var_spec(p, sig, pool, registry)?),
        _ => None,
    };
    let terminal = match &terminal_sig {
        Some(sig) => {
            let fixed = if sig.var_args {
                sig.var_pos()
            } else {
                sig.params.len()
            };
            Some(compile_tail(sig, fixed, pool, registry))
        }
        None => None,
    };

    Ok(Node {
        path,
        param,
        guard,
        variadic,
        terminal,
        childs,
        fall_through,
        expected,
    })
}

fn compile_guard(
    param: Option<&Param>,
    pool: &mut RefPool,
    registry: &TypeRegistry,
) -> Result<Guard, DefinitionError> {
    match param {
        None => Ok(Guard::Root),
        Some(p) if p.any_type || p.var_args => Ok(Guard::Any),
        Some(p) => {
            let entry = registry.lookup(&p.types[0])?;
            Ok(Guard::Test(pool.add_test(&entry.test)))
        }
    }
}

fn compile_var_spec(
    param: &Param,
    sig: &Signature,
    pool: &mut RefPool,
    registry: &TypeRegistry,
) -> Result<VarSpec, DefinitionError> {
    let mut direct = Vec::new();
    let mut converted = Vec::new();
    for (i, ty) in param.types.iter().enumerate() {
        if ty == crate::registry::ANY_TYPE {
            continue;
        }
        let entry = registry.lookup(ty)?;
        let test = pool.add_test(&entry.test);
        match &param.conversions[i] {
            None => direct.push((ty.clone(), test)),
            Some(pc) => {
                let convert = pool.add_convert(&registry.conversion(pc.index).convert);
                converted.push((test, convert));
            }
        }
    }
    Ok(VarSpec {
        pos: sig.var_pos(),
        any: param.any_type,
        direct,
        converted,
    })
}

fn compile_tail(
    sig: &Signature,
    fixed: usize,
    pool: &mut RefPool,
    registry: &TypeRegistry,
) -> Tail {
    let conversions = sig.params[..fixed]
        .iter()
        .map(|p| {
            p.conversions
                .first()
                .and_then(|c| c.as_ref())
                .map(|pc| pool.add_convert(&registry.conversion(pc.index).convert))
        })
        .collect();
    Tail {
        conversions,
        fn_index: pool.add_signature(&sig.fn_ref),
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field(
                "param",
                &self.param.as_ref().map(|p| p.render(false)).unwrap_or_default(),
            )
            .field(
                "terminal",
                &self
                    .terminal
                    .as_ref()
                    .map(|t| RefPool::handle("signature", t.fn_index)),
            )
            .field("fall_through", &self.fall_through)
            .field("childs", &self.childs)
            .finish()
    }
}
