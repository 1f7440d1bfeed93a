//! The reference pool: an append-only, category-indexed store of the values
//! a compiled dispatcher closes over.
//!
//! Compilation resolves every type predicate, conversion function and
//! implementation into a pool index, so dispatch never re-reads the registry.
//! Insertion deduplicates by identity within a category and the index is
//! stable; `handle` renders the textual name (`test3`, `convert0`,
//! `signature2`) used in `Debug` output.

use std::rc::Rc;

use crate::registry::{ConvertFn, TypeTest};
use crate::signature::Implementation;

#[derive(Default)]
pub(crate) struct RefPool {
    tests: Vec<TypeTest>,
    converts: Vec<ConvertFn>,
    signatures: Vec<Implementation>,
}

fn add_by_identity<T: ?Sized>(pool: &mut Vec<Rc<T>>, value: &Rc<T>) -> usize {
    match pool.iter().position(|existing| Rc::ptr_eq(existing, value)) {
        Some(index) => index,
        None => {
            pool.push(Rc::clone(value));
            pool.len() - 1
        }
    }
}

impl RefPool {
    pub fn new() -> Self {
        RefPool::default()
    }

    pub fn add_test(&mut self, test: &TypeTest) -> usize {
        add_by_identity(&mut self.tests, test)
    }

    pub fn add_convert(&mut self, convert: &ConvertFn) -> usize {
        add_by_identity(&mut self.converts, convert)
    }

    pub fn add_signature(&mut self, fn_ref: &Implementation) -> usize {
        add_by_identity(&mut self.signatures, fn_ref)
    }

    pub fn test(&self, index: usize) -> &TypeTest {
        &self.tests[index]
    }

    pub fn convert(&self, index: usize) -> &ConvertFn {
        &self.converts[index]
    }

    pub fn signature(&self, index: usize) -> &Implementation {
        &self.signatures[index]
    }

    /// Stable textual name of a pool entry.
    pub fn handle(category: &str, index: usize) -> String {
        format!("{category}{index}")
    }
}

impl std::fmt::Debug for RefPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |category: &str, len: usize| {
            (0..len)
                .map(|i| RefPool::handle(category, i))
                .collect::<Vec<_>>()
        };
        f.debug_struct("RefPool")
            .field("tests", &names("test", self.tests.len()))
            .field("converts", &names("convert", self.converts.len()))
            .field("signatures", &names("signature", self.signatures.len()))
            .finish()
    }
}
