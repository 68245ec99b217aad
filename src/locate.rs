use std::collections::hash_map;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::Addr;


/// The location of a module in the monitored process.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ModuleInfo {
    /// The absolute address the module is loaded at.
    pub base: Addr,
    /// The size of the module's image, in bytes.
    pub size: u64,
}


/// A source of information about the modules loaded in the monitored
/// process.
pub trait ModuleLocator
where
    Self: Debug,
{
    /// Look up the module with the given name.
    ///
    /// Names are matched exactly.
    fn find_module(&self, name: &str) -> Option<ModuleInfo>;
}

impl<L> ModuleLocator for Arc<L>
where
    L: ModuleLocator + ?Sized,
{
    #[inline]
    fn find_module(&self, name: &str) -> Option<ModuleInfo> {
        (**self).find_module(name)
    }
}


/// A [`ModuleLocator`] backed by a static table of modules.
#[derive(Clone, Debug, Default)]
pub struct ModuleMap {
    modules: HashMap<String, ModuleInfo>,
}

impl ModuleMap {
    /// Create a new, empty [`ModuleMap`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, returning the previously registered
    /// information for the same name, if any.
    pub fn insert<S>(&mut self, name: S, base: Addr, size: u64) -> Option<ModuleInfo>
    where
        S: Into<String>,
    {
        self.modules.insert(name.into(), ModuleInfo { base, size })
    }

    /// Retrieve the number of registered modules.
    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check whether no module has been registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterate over all registered modules, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleInfo)> {
        self.modules.iter().map(|(name, info)| (name.as_str(), info))
    }
}

impl ModuleLocator for ModuleMap {
    fn find_module(&self, name: &str) -> Option<ModuleInfo> {
        self.modules.get(name).copied()
    }
}

impl<S> FromIterator<(S, ModuleInfo)> for ModuleMap
where
    S: Into<String>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (S, ModuleInfo)>,
    {
        Self {
            modules: iter
                .into_iter()
                .map(|(name, info)| (name.into(), info))
                .collect(),
        }
    }
}

impl IntoIterator for ModuleMap {
    type Item = (String, ModuleInfo);
    type IntoIter = hash_map::IntoIter<String, ModuleInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.into_iter()
    }
}
