//! Host-facing surface of the locator: the scalar-function trait, the C ABI
//! the host loads it through, and the `resolve_table_location` function.

pub mod abi;
pub mod ffi;
mod function;
mod resolve;
mod session;
mod state;

pub use crate::{
    function::{ScalarFunction, ScalarFunctionRef, into_ffi},
    resolve::{FUNCTION_NAME, ResolveTableLocation},
    session::{Extension, ExtensionSession, SessionContext},
    state::LocatorState,
};
