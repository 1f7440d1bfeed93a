//! Runtime multiple dispatch for dynamically typed values.
//!
//! Given an ordered set of `(signature text -> implementation)` bindings,
//! [`Composer::compose`] builds a [`Dispatcher`]: a single callable that
//! inspects the runtime types of its positional arguments and routes the call
//! to the matching implementation. Signatures support union types (`a|b`),
//! variadics (`...a`), the `any` wildcard, a user-extensible type registry,
//! and user-declared conversions that let an argument match a parameter by
//! coercion.
//!
//! ```
//! use std::rc::Rc;
//! use typed_dispatch::{Composer, Value};
//!
//! let composer = Composer::new();
//! let fn_ref: typed_dispatch::Implementation = Rc::new(|args: &[Value]| {
//!     Value::Number(args[0].as_number().unwrap() + 1.0)
//! });
//! let dispatcher = composer.compose(vec![("number", fn_ref)]).unwrap();
//! assert_eq!(dispatcher.call(&[Value::Number(2.0)]).unwrap(), Value::Number(3.0));
//! assert!(dispatcher.call(&[Value::Bool(true)]).is_err());
//! ```

// Prevent accidental debug output in library code.
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

pub mod composer;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod signature;
pub mod value;

mod compiler;

pub use composer::Composer;
pub use dispatcher::Dispatcher;
pub use error::{ArgumentsError, ArgumentsErrorKind, ConversionError, DefinitionError};
pub use registry::{Conversion, ConvertFn, TypeEntry, TypeRegistry, TypeTest, ANY_TYPE};
pub use signature::{implementation, Implementation, Param, ParamConversion, Signature};
pub use value::Value;
