use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use crate::log;
use crate::util::debug_file_path;
use crate::ModuleLocator;
use crate::SymbolProvider;

use super::registry::ModuleState;
use super::Reason;


/// The default extension of debug files.
pub(crate) const DEFAULT_DEBUG_FILE_EXT: &str = "pdb";


/// Loads the debug symbol database of a module.
#[derive(Debug)]
pub(crate) struct Loader {
    /// The directory to look for debug files in.
    symbol_dir: PathBuf,
    /// The extension of debug files.
    debug_file_ext: OsString,
}

impl Loader {
    pub fn new(symbol_dir: PathBuf, debug_file_ext: OsString) -> Self {
        Self {
            symbol_dir,
            debug_file_ext,
        }
    }

    /// Retrieve the path of the debug file for `module`.
    pub fn debug_file_path(&self, module: &str) -> PathBuf {
        debug_file_path(&self.symbol_dir, module, &self.debug_file_ext)
    }

    #[inline]
    pub fn symbol_dir(&self) -> &Path {
        &self.symbol_dir
    }

    /// Load the debug symbols for `module`.
    ///
    /// Failures are logged and reported as
    /// [`ModuleState::Unavailable`].
    pub fn load(
        &self,
        module: &str,
        locator: &dyn ModuleLocator,
        provider: &dyn SymbolProvider,
    ) -> ModuleState {
        let path = self.debug_file_path(module);

        let info = if let Some(info) = locator.find_module(module) {
            info
        } else {
            log::warn!(
                "unable to find module `{module}`; not loading debug file {}",
                path.display()
            );
            return ModuleState::Unavailable(Reason::ModuleNotFound)
        };

        match provider.load_session(&path, info.base, info.size) {
            Ok(session) => {
                log::debug!(
                    "loaded debug file {} for module `{module}` at {:#x} (size {:#x})",
                    path.display(),
                    info.base,
                    info.size
                );
                ModuleState::Loaded {
                    session,
                    base: info.base,
                }
            }
            Err(err) => {
                log::warn!(
                    "failed to load debug file {} for module `{module}`: {err:#}",
                    path.display()
                );
                ModuleState::Unavailable(Reason::MissingSyms)
            }
        }
    }
}
