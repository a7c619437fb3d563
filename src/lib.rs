//! A minimal class-file virtual machine.
//!
//! The crate splits into two tightly coupled halves: [`class`] deserializes
//! the big-endian class-file format into a [`class::Klass`] (constant pool,
//! field/method tables, code bodies), and [`runtime`] executes one class's
//! entry method on an explicit stack machine, resolving method and string
//! references back through the pool the parser produced.

pub mod class;
pub mod consts;
pub mod descriptor;
pub mod error;
pub mod runtime;

pub use error::{Result, VmError};
