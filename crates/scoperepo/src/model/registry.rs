//! Process-wide descriptor cache keyed by model type

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::OrmResult;
use crate::model::{Constrainable, ModelDescriptor};

static DESCRIPTORS: Lazy<DashMap<TypeId, Arc<ModelDescriptor>>> = Lazy::new(DashMap::new);

/// The validated descriptor of `C`, described and checked on first use
pub fn descriptor_of<C: Constrainable>() -> OrmResult<Arc<ModelDescriptor>> {
    let type_id = TypeId::of::<C>();

    if let Some(found) = DESCRIPTORS.get(&type_id).map(|entry| Arc::clone(entry.value())) {
        return Ok(found);
    }

    let descriptor = C::describe();
    descriptor.validate()?;
    tracing::debug!(
        "Registered model descriptor for table {} ({} properties)",
        descriptor.table(),
        descriptor.properties().len()
    );

    let entry = DESCRIPTORS
        .entry(type_id)
        .or_insert_with(|| Arc::new(descriptor));
    Ok(Arc::clone(entry.value()))
}

/// Number of cached descriptors
pub fn registered_count() -> usize {
    DESCRIPTORS.len()
}
