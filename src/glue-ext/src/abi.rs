//! C ABI shared with the host. Arrow data crosses it through the Arrow C Data
//! Interface.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

pub use arrow::ffi::{FFI_ArrowArray, FFI_ArrowSchema};

/// Bumped whenever a struct in this module changes layout.
pub const GLUE_ABI_VERSION: u32 = 1;

/// Vtable for one scalar function.
///
/// Every fallible entry point returns `0` on success. On failure it returns a
/// non-zero code and stores an error string in `*errmsg`, which the host
/// releases with [`FFI_Module::free_string`].
#[repr(C)]
pub struct FFI_ScalarFunction {
    pub ctx: *const c_void,
    pub name: unsafe extern "C" fn(ctx: *const c_void) -> *const c_char,
    pub get_return_field: unsafe extern "C" fn(
        ctx: *const c_void,
        args: *const FFI_ArrowSchema,
        args_count: usize,
        ret: *mut FFI_ArrowSchema,
        errmsg: *mut *mut c_char,
    ) -> c_int,
    /// Takes ownership of the `args` arrays; the schemas stay borrowed.
    pub call: unsafe extern "C" fn(
        ctx: *const c_void,
        args: *const FFI_ArrowArray,
        args_schemas: *const FFI_ArrowSchema,
        args_count: usize,
        ret_array: *mut FFI_ArrowArray,
        ret_schema: *mut FFI_ArrowSchema,
        errmsg: *mut *mut c_char,
    ) -> c_int,
    pub fini: unsafe extern "C" fn(ctx: *mut c_void),
}

// SAFETY: the context behind `ctx` is an `Arc<dyn ScalarFunction>`, which is Send + Sync.
unsafe impl Send for FFI_ScalarFunction {}
unsafe impl Sync for FFI_ScalarFunction {}

/// Registration surface the host hands to [`FFI_Module::init`].
#[repr(C)]
pub struct FFI_SessionContext {
    pub ctx: *mut c_void,
    /// Transfers ownership of `function` to the host, whether or not the
    /// registration succeeds.
    pub define_function:
        unsafe extern "C" fn(ctx: *mut c_void, function: FFI_ScalarFunction) -> c_int,
}

/// Module descriptor returned by the exported entry symbol.
#[repr(C)]
pub struct FFI_Module {
    pub abi_version: u32,
    pub name: *const c_char,
    /// Called once after the library is loaded.
    pub init: unsafe extern "C" fn(
        session: *mut FFI_SessionContext,
        errmsg: *mut *mut c_char,
    ) -> c_int,
    /// Called once before the library is unloaded.
    pub fini: unsafe extern "C" fn(),
    pub free_string: unsafe extern "C" fn(s: *mut c_char),
}

// SAFETY: `name` points at a static string.
unsafe impl Send for FFI_Module {}
unsafe impl Sync for FFI_Module {}
