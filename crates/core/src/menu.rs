//! Menu categories, items and add-ons.

use serde::{Deserialize, Serialize};

use crate::{AddOnId, MenuItemId, Price};

/// A section of the menu (e.g. "Rice Bowls", "Bubble Tea").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuCategory {
    /// Stable URL-safe key, e.g. `rice-bowls`.
    pub slug: String,
    pub name: String,
    /// Lower sorts first.
    pub sort_order: i32,
}

/// An optional extra that can be added to a menu item for a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
    pub id: AddOnId,
    pub name: String,
    pub price: Price,
}

/// A dish or drink that can be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    /// Slug of the owning [`MenuCategory`].
    pub category: String,
    pub base_price: Price,
    pub image_url: Option<String>,
    /// Sold-out items stay visible but cannot be added to a cart.
    pub available: bool,
    pub add_ons: Vec<AddOn>,
    /// Ingredients the customer may ask to leave out.
    pub removable: Vec<String>,
}

impl MenuItem {
    /// Look up one of this item's add-ons.
    #[must_use]
    pub fn add_on(&self, id: AddOnId) -> Option<&AddOn> {
        self.add_ons.iter().find(|a| a.id == id)
    }

    /// Whether `ingredient` may be removed from this item.
    #[must_use]
    pub fn is_removable(&self, ingredient: &str) -> bool {
        self.removable
            .iter()
            .any(|r| r.eq_ignore_ascii_case(ingredient))
    }
}

/// A category together with its items, as shown on the menu screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSection {
    #[serde(flatten)]
    pub category: MenuCategory,
    pub items: Vec<MenuItem>,
}

/// The full menu grouped into sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub sections: Vec<MenuSection>,
}

impl Menu {
    /// Group items under their categories, ordered by `sort_order` then name.
    ///
    /// Items whose category is unknown are dropped; empty categories are kept
    /// so the client can render a "coming soon" header.
    #[must_use]
    pub fn group(mut categories: Vec<MenuCategory>, items: Vec<MenuItem>) -> Self {
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));

        let mut sections: Vec<MenuSection> = categories
            .into_iter()
            .map(|category| MenuSection {
                category,
                items: Vec::new(),
            })
            .collect();

        for item in items {
            if let Some(section) = sections
                .iter_mut()
                .find(|s| s.category.slug == item.category)
            {
                section.items.push(item);
            }
        }

        for section in &mut sections {
            section.items.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Self { sections }
    }

    /// Find an item anywhere on the menu.
    #[must_use]
    pub fn item(&self, id: MenuItemId) -> Option<&MenuItem> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter())
            .find(|i| i.id == id)
    }
}

/// Errors found when validating a menu definition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MenuError {
    #[error("menu item {0} has an empty name")]
    EmptyName(MenuItemId),
    #[error("menu item {0} has a negative price")]
    NegativePrice(MenuItemId),
    #[error("menu item {item} refers to unknown category '{category}'")]
    UnknownCategory { item: MenuItemId, category: String },
    #[error("menu item {item} lists add-on {add_on} more than once")]
    DuplicateAddOn { item: MenuItemId, add_on: AddOnId },
    #[error("duplicate menu item id {0}")]
    DuplicateItem(MenuItemId),
}

/// Validate a whole menu definition before it is stored.
///
/// Returns every problem found rather than stopping at the first.
#[must_use]
pub fn validate_menu(categories: &[MenuCategory], items: &[MenuItem]) -> Vec<MenuError> {
    let mut errors = Vec::new();
    let mut seen_items = std::collections::HashSet::new();

    for item in items {
        if !seen_items.insert(item.id) {
            errors.push(MenuError::DuplicateItem(item.id));
        }
        if item.name.trim().is_empty() {
            errors.push(MenuError::EmptyName(item.id));
        }
        if item.base_price.is_negative() || item.add_ons.iter().any(|a| a.price.is_negative()) {
            errors.push(MenuError::NegativePrice(item.id));
        }
        if !categories.iter().any(|c| c.slug == item.category) {
            errors.push(MenuError::UnknownCategory {
                item: item.id,
                category: item.category.clone(),
            });
        }
        let mut seen_add_ons = std::collections::HashSet::new();
        for add_on in &item.add_ons {
            if !seen_add_ons.insert(add_on.id) {
                errors.push(MenuError::DuplicateAddOn {
                    item: item.id,
                    add_on: add_on.id,
                });
            }
        }
    }

    errors
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn category(slug: &str, sort_order: i32) -> MenuCategory {
        MenuCategory {
            slug: slug.to_string(),
            name: slug.replace('-', " "),
            sort_order,
        }
    }

    /// Braised pork rice, RM 12.90, with an egg (RM 2.00) and extra pork
    /// (RM 4.50) add-on; scallion and pickles can be removed.
    pub fn lu_rou_fan() -> MenuItem {
        MenuItem {
            id: MenuItemId::new(1),
            name: "Lu Rou Fan".to_string(),
            description: "Braised pork belly over rice".to_string(),
            category: "rice-bowls".to_string(),
            base_price: Price::from_sen(1290),
            image_url: None,
            available: true,
            add_ons: vec![
                AddOn {
                    id: AddOnId::new(10),
                    name: "Braised Egg".to_string(),
                    price: Price::from_sen(200),
                },
                AddOn {
                    id: AddOnId::new(11),
                    name: "Extra Pork".to_string(),
                    price: Price::from_sen(450),
                },
            ],
            removable: vec!["scallion".to_string(), "pickles".to_string()],
        }
    }

    /// Pearl milk tea, RM 8.50, no add-ons.
    pub fn milk_tea() -> MenuItem {
        MenuItem {
            id: MenuItemId::new(2),
            name: "Pearl Milk Tea".to_string(),
            description: "Black tea, milk, tapioca pearls".to_string(),
            category: "drinks".to_string(),
            base_price: Price::from_sen(850),
            image_url: None,
            available: true,
            add_ons: Vec::new(),
            removable: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_group_orders_sections_and_items() {
        let menu = Menu::group(
            vec![category("drinks", 2), category("rice-bowls", 1)],
            vec![milk_tea(), lu_rou_fan()],
        );
        let slugs: Vec<_> = menu.sections.iter().map(|s| s.category.slug.as_str()).collect();
        assert_eq!(slugs, ["rice-bowls", "drinks"]);
        assert_eq!(menu.sections.first().map(|s| s.items.len()), Some(1));
        assert!(menu.item(MenuItemId::new(2)).is_some());
    }

    #[test]
    fn test_group_drops_orphans_and_keeps_empty_sections() {
        let menu = Menu::group(vec![category("desserts", 1)], vec![milk_tea()]);
        assert_eq!(menu.sections.len(), 1);
        assert!(menu.sections.iter().all(|s| s.items.is_empty()));
    }

    #[test]
    fn test_removable_is_case_insensitive() {
        assert!(lu_rou_fan().is_removable("Scallion"));
        assert!(!lu_rou_fan().is_removable("rice"));
    }

    #[test]
    fn test_validate_menu_reports_all_problems() {
        let mut broken = lu_rou_fan();
        broken.name = "  ".to_string();
        broken.category = "mains".to_string();
        broken.add_ons.push(AddOn {
            id: AddOnId::new(10),
            name: "Again".to_string(),
            price: Price::from_sen(-100),
        });

        let errors = validate_menu(&[category("rice-bowls", 1)], &[broken]);
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_validate_menu_ok() {
        let errors = validate_menu(
            &[category("rice-bowls", 1), category("drinks", 2)],
            &[lu_rou_fan(), milk_tea()],
        );
        assert!(errors.is_empty());
    }
}
