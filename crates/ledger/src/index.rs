//! Keyed world-state maps.

use crate::{Account, Address, DatabaseId, ProviderProfile, SqlChainProfile};
use std::collections::HashMap;

/// The three keyed maps backing the meta state.
///
/// A `None` value is a deletion marker left by the dirty overlay; the
/// committed (readonly) index never stores markers once a fold completes.
/// Iteration order is irrelevant: state reads are always keyed.
#[derive(Clone, Debug, Default)]
pub struct MetaIndex {
    pub(crate) accounts: HashMap<Address, Option<Account>>,
    pub(crate) databases: HashMap<DatabaseId, Option<SqlChainProfile>>,
    pub(crate) providers: HashMap<Address, Option<ProviderProfile>>,
}

impl MetaIndex {
    pub fn new() -> Self {
        MetaIndex::default()
    }

    /// Independent copy: all values are owned, so a structural clone already
    /// guarantees that later mutation of either side cannot alias.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.databases.is_empty() && self.providers.is_empty()
    }
}
