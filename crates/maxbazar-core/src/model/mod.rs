//! Marketplace entities.

mod item;
mod site;
mod user;
mod watch;

pub use item::{
    InvoiceRecord, Item, ItemCounterRecord, ItemHistoryRecord, ItemImageRecord, ItemType,
};
pub use site::{MaxbazarVisitRecords, Ruian, RoadmapRecords, Setting};
pub use user::{User, UserFilterRecord, UserMessageRecord, UserReviewRecord};
pub use watch::{ItemAlarmRecord, ItemWatchlistRecord, WatchTarget, WatchlistType};

use crate::catalog::EntityRegistry;
use crate::error::SchemaError;
use crate::lifecycle::Entity;

/// Registry holding every marketplace entity.
///
/// Entities are defined so that foreign keys only point backwards.
pub fn marketplace_registry() -> Result<EntityRegistry, SchemaError> {
    EntityRegistry::new()
        .with(User::definition())?
        .with(ItemType::definition())?
        .with(WatchlistType::definition())?
        .with(Item::definition())?
        .with(UserReviewRecord::definition())?
        .with(UserMessageRecord::definition())?
        .with(UserFilterRecord::definition())?
        .with(InvoiceRecord::definition())?
        .with(ItemCounterRecord::definition())?
        .with(ItemImageRecord::definition())?
        .with(ItemHistoryRecord::definition())?
        .with(ItemAlarmRecord::definition())?
        .with(ItemWatchlistRecord::definition())?
        .with(Setting::definition())?
        .with(Ruian::definition())?
        .with(MaxbazarVisitRecords::definition())?
        .with(RoadmapRecords::definition())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defines_every_entity() {
        let registry = marketplace_registry().unwrap();
        assert_eq!(registry.len(), 17);
        assert!(registry.get("ItemWatchlistRecord").is_some());
    }

    #[test]
    fn test_item_type_parent_is_acyclic() {
        let def = ItemType::definition();
        let link = def.parent_link().unwrap();
        assert_eq!(link.field, "parent_item_type_id");
    }
}
