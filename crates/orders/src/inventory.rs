// In-process inventory
//
// Shared by the reserve and update activities. Clones share the same stock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::InventoryItem;

/// Item stocked by [`InventoryService::seeded`]
pub const SEED_ITEM: &str = "Car";

/// Quantity stocked by [`InventoryService::seeded`]
pub const SEED_QUANTITY: u32 = 50;

/// Thread-safe map of item name to stock level
#[derive(Debug, Clone, Default)]
pub struct InventoryService {
    items: Arc<RwLock<HashMap<String, InventoryItem>>>,
}

impl InventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inventory with the demo stock
    pub fn seeded() -> Self {
        Self::new().with_item(SEED_ITEM, SEED_QUANTITY)
    }

    pub fn with_item(self, name: &str, quantity: u32) -> Self {
        self.update_item(name, quantity);
        self
    }

    pub fn get_item(&self, name: &str) -> Option<InventoryItem> {
        self.items.read().get(name).cloned()
    }

    /// Set the stock level, adding the item if it is new
    pub fn update_item(&self, name: &str, quantity: u32) {
        self.items.write().insert(
            name.to_string(),
            InventoryItem {
                name: name.to_string(),
                quantity,
            },
        );
    }

    /// Add stock and return the new level
    pub fn restock(&self, name: &str, quantity: u32) -> u32 {
        let mut items = self.items.write();
        let item = items
            .entry(name.to_string())
            .or_insert_with(|| InventoryItem {
                name: name.to_string(),
                quantity: 0,
            });
        item.quantity = item.quantity.saturating_add(quantity);
        item.quantity
    }

    /// Snapshot of the item if at least `quantity` is in stock
    pub fn check_available(&self, name: &str, quantity: u32) -> Option<InventoryItem> {
        self.get_item(name).filter(|item| item.quantity >= quantity)
    }

    /// Remove `quantity` if enough is in stock
    ///
    /// Returns the item with its remaining stock, or `None` when the item is
    /// unknown or short. Check and decrement happen under one lock.
    pub fn try_decrement(&self, name: &str, quantity: u32) -> Option<InventoryItem> {
        let mut items = self.items.write();
        let item = items.get_mut(name)?;
        if item.quantity < quantity {
            return None;
        }
        item.quantity -= quantity;
        Some(item.clone())
    }

    /// All items sorted by name
    pub fn all_items(&self) -> Vec<InventoryItem> {
        let mut items: Vec<_> = self.items.read().values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_stock() {
        let inventory = InventoryService::seeded();
        assert_eq!(inventory.get_item("Car").map(|i| i.quantity), Some(50));
        assert_eq!(inventory.all_items().len(), 1);
    }

    #[test]
    fn test_try_decrement() {
        let inventory = InventoryService::new().with_item("Car", 5);

        assert_eq!(inventory.try_decrement("Car", 10), None);
        assert_eq!(inventory.get_item("Car").map(|i| i.quantity), Some(5));

        let remaining = inventory.try_decrement("Car", 3).unwrap();
        assert_eq!(remaining.quantity, 2);

        assert_eq!(inventory.try_decrement("Boat", 1), None);
    }

    #[test]
    fn test_check_available_does_not_mutate() {
        let inventory = InventoryService::new().with_item("Car", 5);

        assert!(inventory.check_available("Car", 5).is_some());
        assert!(inventory.check_available("Car", 6).is_none());
        assert!(inventory.check_available("Boat", 1).is_none());
        assert_eq!(inventory.get_item("Car").map(|i| i.quantity), Some(5));
    }

    #[test]
    fn test_restock_and_clones_share_state() {
        let inventory = InventoryService::new();
        let other = inventory.clone();

        assert_eq!(other.restock("Bike", 3), 3);
        assert_eq!(inventory.restock("Bike", 2), 5);

        let names: Vec<_> = inventory
            .with_item("Apple", 1)
            .all_items()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Apple", "Bike"]);
    }
}
