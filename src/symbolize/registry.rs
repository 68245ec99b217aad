use std::cell::RefCell;
use std::collections::HashMap;
use std::mem::take;

use crate::log;
use crate::Addr;
use crate::Error;
use crate::Result;
use crate::SessionHandle;
use crate::SymbolProvider;

use super::Reason;


/// The cached outcome of loading debug symbols for a module.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ModuleState {
    /// A debug symbol session has been loaded for the module.
    Loaded {
        /// The provider's session handle.
        session: SessionHandle,
        /// The absolute address the module is loaded at.
        base: Addr,
    },
    /// Debug symbols are permanently unavailable for the module.
    Unavailable(Reason),
}


/// A registry of modules for which symbol loading has been attempted.
///
/// Entries are only ever added. They are released all at once by
/// [`Registry::teardown`].
#[derive(Debug, Default)]
pub(crate) struct Registry {
    modules: RefCell<HashMap<String, ModuleState>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, module: &str) -> Option<ModuleState> {
        self.modules.borrow().get(module).copied()
    }

    fn insert(&self, module: &str, state: ModuleState) -> Result<()> {
        let mut modules = self.modules.borrow_mut();
        if modules.contains_key(module) {
            return Err(Error::with_already_exists(format!(
                "module `{module}` is already registered"
            )))
        }

        let _none = modules.insert(module.to_string(), state);
        Ok(())
    }

    /// Record a successfully loaded debug symbol session for `module`.
    pub fn record_success(&self, module: &str, session: SessionHandle, base: Addr) -> Result<()> {
        self.insert(module, ModuleState::Loaded { session, base })
    }

    /// Record that debug symbols for `module` are permanently
    /// unavailable.
    pub fn record_permanent_failure(&self, module: &str, reason: Reason) -> Result<()> {
        self.insert(module, ModuleState::Unavailable(reason))
    }

    /// Look up the state of `module`, invoking `load` and recording its
    /// outcome if the module is not yet known.
    ///
    /// `load` must not access the registry.
    pub fn get_or_load<F>(&self, module: &str, provider: &dyn SymbolProvider, load: F) -> ModuleState
    where
        F: FnOnce() -> ModuleState,
    {
        if let Some(state) = self.lookup(module) {
            log::trace!("module `{module}` found in registry: {state:?}");
            return state
        }

        let state = load();
        let result = match state {
            ModuleState::Loaded { session, base } => self.record_success(module, session, base),
            ModuleState::Unavailable(reason) => self.record_permanent_failure(module, reason),
        };

        if let Err(err) = result {
            // A module may only be registered once. Release whatever we
            // loaded to not leak the session and report the original
            // state instead.
            log::error!("failed to register module `{module}`: {err}");

            if let ModuleState::Loaded { session, .. } = state {
                let () = provider.unload_session(session);
            }
            return self.lookup(module).unwrap_or(state)
        }
        state
    }

    /// Unload all loaded sessions and forget about all modules.
    ///
    /// Calling this method multiple times is fine: only the first
    /// invocation after modules have been registered releases
    /// sessions.
    pub fn teardown(&self, provider: &dyn SymbolProvider) {
        let modules = take(&mut *self.modules.borrow_mut());
        for (module, state) in modules {
            if let ModuleState::Loaded { session, .. } = state {
                log::debug!("unloading debug symbols for module `{module}`");
                let () = provider.unload_session(session);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.modules.borrow().len()
    }
}
