use std::ffi::{CString, c_char};

/// Allocates a C string the host must hand back to [`free_string`].
///
/// Interior NUL bytes are dropped rather than failing the conversion.
pub fn new_cstr(s: String) -> *mut c_char {
    let c = CString::new(s).unwrap_or_else(|err| {
        let mut bytes = err.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c.into_raw()
}

/// Frees a string allocated by [`new_cstr`].
///
/// # Safety
///
/// `s` must be null or a pointer returned by [`new_cstr`] that has not been freed.
pub unsafe extern "C" fn free_string(s: *mut c_char) {
    if !s.is_null() {
        unsafe { drop(CString::from_raw(s)) };
    }
}
