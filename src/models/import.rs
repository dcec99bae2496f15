use super::{ProductField, Store};

/// Options handed to [`ProductPorter::import`](crate::services::porter::ProductPorter::import).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Store that new products are attached to and that lookups are confined to.
    pub scoped: Option<Store>,
    /// Field used to find an existing product to update instead of inserting.
    pub find_existing_by: Option<ProductField>,
}

impl ImportOptions {
    pub fn store_id(&self) -> Option<i64> {
        self.scoped.as_ref().map(|s| s.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub scoped: Option<Store>,
}

impl ExportOptions {
    pub fn store_id(&self) -> Option<i64> {
        self.scoped.as_ref().map(|s| s.id)
    }
}
