use std::ffi::c_void;

use common_error::{LocatorError, LocatorResult};

use crate::{ScalarFunctionRef, abi::FFI_SessionContext, into_ffi};

/// Where an extension registers its functions during install.
pub trait ExtensionSession {
    fn define_function(&mut self, function: ScalarFunctionRef) -> LocatorResult<()>;
}

/// Lifecycle hooks of a loadable extension.
pub trait Extension {
    /// Runs once when the host loads the library.
    fn install(session: &mut dyn ExtensionSession) -> LocatorResult<()>;

    /// Runs once when the host unloads the library.
    fn uninstall() {}
}

/// [`ExtensionSession`] over the host's [`FFI_SessionContext`].
pub struct SessionContext<'a> {
    session: &'a mut FFI_SessionContext,
}

impl<'a> SessionContext<'a> {
    pub fn new(session: &'a mut FFI_SessionContext) -> Self {
        Self { session }
    }
}

impl ExtensionSession for SessionContext<'_> {
    fn define_function(&mut self, function: ScalarFunctionRef) -> LocatorResult<()> {
        let name = function.name().to_string_lossy().into_owned();
        let ctx: *mut c_void = self.session.ctx;
        let rc = unsafe { (self.session.define_function)(ctx, into_ffi(function)) };
        if rc != 0 {
            return Err(LocatorError::InternalError(format!(
                "host rejected registration of function {name}"
            )));
        }
        log::debug!("Registered function {name}");
        Ok(())
    }
}
