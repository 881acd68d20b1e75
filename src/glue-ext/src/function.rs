use std::{
    ffi::{CStr, c_char, c_int, c_void},
    sync::Arc,
};

use arrow_array::ArrayRef;
use arrow_schema::Field;
use common_error::{LocatorError, LocatorResult};

use crate::{
    abi::{FFI_ArrowArray, FFI_ArrowSchema, FFI_ScalarFunction},
    ffi::{
        arrow::{export_arrow_result, import_arrow_args},
        trampoline::trampoline,
    },
};

/// A function the host evaluates over whole Arrow batches.
pub trait ScalarFunction: Send + Sync {
    /// Name the host registers the function under.
    fn name(&self) -> &CStr;

    /// Output field for the given argument fields, or a type error when the
    /// signature is not supported.
    fn return_field(&self, args: &[Field]) -> LocatorResult<Field>;

    /// Evaluates the function over one batch of argument arrays.
    fn call(&self, args: &[ArrayRef]) -> LocatorResult<ArrayRef>;
}

/// Shared handle to a [`ScalarFunction`], as carried by the vtable context.
pub type ScalarFunctionRef = Arc<dyn ScalarFunction>;

/// Convert a [`ScalarFunctionRef`] into a [`FFI_ScalarFunction`] vtable.
///
/// The `Arc` is moved into the vtable's opaque context and released
/// when the host calls `fini`.
pub fn into_ffi(func: ScalarFunctionRef) -> FFI_ScalarFunction {
    let ctx_ptr = Box::into_raw(Box::new(func));
    FFI_ScalarFunction {
        ctx: ctx_ptr.cast(),
        name: ffi_name,
        get_return_field: ffi_get_return_field,
        call: ffi_call,
        fini: ffi_fini,
    }
}

/// Borrowed null-terminated name, valid until `fini`.
unsafe extern "C" fn ffi_name(ctx: *const c_void) -> *const c_char {
    unsafe { &*ctx.cast::<ScalarFunctionRef>() }
        .name()
        .as_ptr()
}

/// Imports the argument schemas, asks the function for its output field and
/// exports it into `ret`.
#[rustfmt::skip]
unsafe extern "C" fn ffi_get_return_field(
    ctx:        *const c_void,
    args:       *const FFI_ArrowSchema,
    args_count: usize,
    ret:        *mut FFI_ArrowSchema,
    errmsg:     *mut *mut c_char,
) -> c_int {
    unsafe { trampoline(errmsg, "panic in get_return_field", || {
        let ctx = &*ctx.cast::<ScalarFunctionRef>();
        let mut fields = Vec::with_capacity(args_count);
        for i in 0..args_count {
            let schema = &*args.add(i);
            let field = Field::try_from(schema)
                .map_err(|e| LocatorError::TypeError(format!("arg {i}: {e}")))?;
            fields.push(field);
        }
        let result = ctx.return_field(&fields)?;
        let out_schema = FFI_ArrowSchema::try_from(&result)?;
        std::ptr::write(ret, out_schema);
        Ok(())
    })}
}

/// Takes ownership of the argument arrays, evaluates the batch and exports the
/// result through the out-pointers.
#[rustfmt::skip]
unsafe extern "C" fn ffi_call(
    ctx:          *const c_void,
    args:         *const FFI_ArrowArray,
    args_schemas: *const FFI_ArrowSchema,
    args_count:   usize,
    ret_array:    *mut FFI_ArrowArray,
    ret_schema:   *mut FFI_ArrowSchema,
    errmsg:       *mut *mut c_char,
) -> c_int {
    unsafe { trampoline(errmsg, "panic in call", || {
        let ctx = &*ctx.cast::<ScalarFunctionRef>();
        let arrays = import_arrow_args(args, args_schemas, args_count)?;
        let result = ctx.call(&arrays)?;
        export_arrow_result(result, ret_array, ret_schema)
    })}
}

/// Releases the `Arc` moved into the context by [`into_ffi`].
unsafe extern "C" fn ffi_fini(ctx: *mut c_void) {
    let released = std::panic::catch_unwind(|| unsafe {
        drop(Box::from_raw(ctx.cast::<ScalarFunctionRef>()));
    });
    if released.is_err() {
        log::warn!("Panic while releasing a scalar function, ignored at unload");
    }
}
