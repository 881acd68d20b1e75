//! Loadable extension that registers `resolve_table_location` with the host.
//!
//! The host resolves the exported `glue_locator_module` symbol, calls `init`
//! once after loading the library and `fini` once before unloading it. The
//! configuration, credential cache and catalog client live between the two.

use std::{
    ffi::{c_char, c_int},
    sync::Arc,
};

use common_error::{LocatorError, LocatorResult};
use common_glue_config::GlueConfig;
use glue_catalog::TableLocation;
use glue_ext::{
    Extension, ExtensionSession, LocatorState, ResolveTableLocation, SessionContext,
    abi::{FFI_Module, FFI_SessionContext, GLUE_ABI_VERSION},
    ffi::{strings::free_string, trampoline::trampoline},
};
use parking_lot::RwLock;

static STATE: RwLock<Option<Arc<LocatorState>>> = RwLock::new(None);

pub struct GlueLocatorExtension;

impl GlueLocatorExtension {
    /// Registers the scalar function over an already built state and makes
    /// that state the process-wide one.
    pub fn install_with_state(
        session: &mut dyn ExtensionSession,
        state: Arc<LocatorState>,
    ) -> LocatorResult<()> {
        session.define_function(Arc::new(ResolveTableLocation::new(state.clone())))?;
        if STATE.write().replace(state).is_some() {
            log::warn!("Glue locator was loaded twice, replacing the previous state");
        }
        Ok(())
    }

    /// Connects a fresh state for `config` and installs it.
    pub fn install_with_config(
        session: &mut dyn ExtensionSession,
        config: GlueConfig,
    ) -> LocatorResult<()> {
        log::info!("Loading glue locator with {config}");
        let state = Arc::new(LocatorState::connect(config)?);
        Self::install_with_state(session, state)
    }
}

impl Extension for GlueLocatorExtension {
    fn install(session: &mut dyn ExtensionSession) -> LocatorResult<()> {
        // the host may already own the logger
        let _ = env_logger::try_init();

        Self::install_with_config(session, GlueConfig::from_env()?)
    }

    fn uninstall() {
        if STATE.write().take().is_some() {
            log::info!("Glue locator unloaded");
        }
    }
}

/// The state installed by the last successful load.
pub fn locator_state() -> LocatorResult<Arc<LocatorState>> {
    STATE.read().clone().ok_or_else(|| {
        LocatorError::ConfigError("the glue locator extension is not loaded".to_string())
    })
}

/// Resolves a single pair through the loaded state, from synchronous code.
pub fn resolve_table_location(
    database_name: &str,
    table_name: &str,
) -> LocatorResult<TableLocation> {
    let state = locator_state()?;
    let locator = state.locator().clone();
    let (database_name, table_name) = (database_name.to_string(), table_name.to_string());
    let location = state
        .runtime()
        .block_on(async move { locator.resolve(&database_name, &table_name).await })??;
    Ok(location)
}

#[unsafe(no_mangle)]
pub extern "C" fn glue_locator_module() -> FFI_Module {
    FFI_Module {
        abi_version: GLUE_ABI_VERSION,
        name: c"glue_locator".as_ptr(),
        init: module_init,
        fini: module_fini,
        free_string,
    }
}

unsafe extern "C" fn module_init(
    session: *mut FFI_SessionContext,
    errmsg: *mut *mut c_char,
) -> c_int {
    unsafe { init_session(session, errmsg, GlueLocatorExtension::install) }
}

/// Runs `install` against the host's session behind the `init` calling
/// convention.
///
/// # Safety
///
/// `session` must be null or valid for the duration of the call, and
/// `errmsg` must be null or valid for writes.
unsafe fn init_session(
    session: *mut FFI_SessionContext,
    errmsg: *mut *mut c_char,
    install: impl FnOnce(&mut dyn ExtensionSession) -> LocatorResult<()>,
) -> c_int {
    unsafe {
        trampoline(errmsg, "panic while loading glue_locator", || {
            let session = session.as_mut().ok_or_else(|| {
                LocatorError::InternalError("host passed a null session".to_string())
            })?;
            install(&mut SessionContext::new(session))
        })
    }
}

unsafe extern "C" fn module_fini() {
    if std::panic::catch_unwind(GlueLocatorExtension::uninstall).is_err() {
        log::warn!("Panic while unloading glue_locator, ignored");
    }
}
