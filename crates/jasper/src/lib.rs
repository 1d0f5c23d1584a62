//! The Jasper type system core: metatype classification, declaration
//! scheduling, and Hindley-Milner style inference with structural records
//! and variants.
//!
//! The entry point is [`typecheck::check_program`], which takes a
//! symbol-resolved [`ast::Program`] and either returns a fully annotated
//! [`typecheck::TypedProgram`] or the first [`typecheck::TypeError`].

pub mod ast;
pub mod diagnostics;
pub mod typecheck;

pub use ast::{Program, ProgramBuilder};
pub use typecheck::{check_program, MetaType, TypeError, TypedProgram};
