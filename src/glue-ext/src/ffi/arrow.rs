use arrow::ffi::{from_ffi, to_ffi};
use arrow_array::{ArrayRef, make_array};
use common_error::LocatorResult;

use crate::abi::{FFI_ArrowArray, FFI_ArrowSchema};

/// Import Arrow arrays from C Data Interface pointers.
///
/// # Safety
///
/// - `args` must point to `count` valid `FFI_ArrowArray` values (ownership taken).
/// - `schemas` must point to `count` valid `FFI_ArrowSchema` values (borrowed).
pub unsafe fn import_arrow_args(
    args: *const FFI_ArrowArray,
    schemas: *const FFI_ArrowSchema,
    count: usize,
) -> LocatorResult<Vec<ArrayRef>> {
    (0..count)
        .map(|i| {
            let array = unsafe { std::ptr::read(args.add(i)) };
            let schema = unsafe { &*schemas.add(i) };
            unsafe { import_arrow_array(array, schema) }
        })
        .collect()
}

/// # Safety
///
/// `array` must be a valid C Data Interface array described by `schema`.
pub unsafe fn import_arrow_array(
    array: FFI_ArrowArray,
    schema: &FFI_ArrowSchema,
) -> LocatorResult<ArrayRef> {
    let data = unsafe { from_ffi(array, schema) }?;
    Ok(make_array(data))
}

pub fn export_arrow_array(array: &ArrayRef) -> LocatorResult<(FFI_ArrowArray, FFI_ArrowSchema)> {
    Ok(to_ffi(&array.to_data())?)
}

/// Export an Arrow array through C Data Interface out-pointers.
///
/// # Safety
///
/// `ret_array` and `ret_schema` must be valid, writable pointers.
pub unsafe fn export_arrow_result(
    array: ArrayRef,
    ret_array: *mut FFI_ArrowArray,
    ret_schema: *mut FFI_ArrowSchema,
) -> LocatorResult<()> {
    let (out_array, out_schema) = export_arrow_array(&array)?;
    unsafe {
        std::ptr::write(ret_array, out_array);
        std::ptr::write(ret_schema, out_schema);
    }
    Ok(())
}
