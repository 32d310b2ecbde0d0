//! Live permission grants.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use ferrocode_core::PermissionCategory;
use tracing::info;

/// The set of permission categories that run without confirmation.
///
/// Cheap to clone; every clone shares the same set, so a front-end can
/// change grants between turns while the engine holds its own handle.
#[derive(Debug, Clone, Default)]
pub struct PermissionGrants {
    inner: Arc<RwLock<HashSet<PermissionCategory>>>,
}

impl PermissionGrants {
    pub fn new(granted: impl IntoIterator<Item = PermissionCategory>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(granted.into_iter().collect())),
        }
    }

    /// Read-only by default.
    pub fn read_only() -> Self {
        Self::new([PermissionCategory::Read])
    }

    pub fn is_granted(&self, category: PermissionCategory) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&category)
    }

    pub fn grant(&self, category: PermissionCategory) {
        let added = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(category);
        if added {
            info!(%category, "Permission granted");
        }
    }

    pub fn revoke(&self, category: PermissionCategory) {
        let removed = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&category);
        if removed {
            info!(%category, "Permission revoked");
        }
    }

    /// Granted categories in a stable order.
    pub fn snapshot(&self) -> Vec<PermissionCategory> {
        let set = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        [
            PermissionCategory::Read,
            PermissionCategory::Write,
            PermissionCategory::Execute,
        ]
        .into_iter()
        .filter(|c| set.contains(c))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let grants = PermissionGrants::read_only();
        let handle = grants.clone();
        assert!(!grants.is_granted(PermissionCategory::Write));

        handle.grant(PermissionCategory::Write);
        assert!(grants.is_granted(PermissionCategory::Write));

        grants.revoke(PermissionCategory::Read);
        assert_eq!(handle.snapshot(), vec![PermissionCategory::Write]);
    }

    #[test]
    fn default_grants_nothing() {
        assert!(PermissionGrants::default().snapshot().is_empty());
    }
}
