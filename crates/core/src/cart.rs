//! Cart lines and selection validation.
//!
//! A [`CartSelection`] is what the client asks for; [`CartLine::resolve`]
//! checks it against the menu and snapshots names and prices so later menu
//! edits don't change what is already in someone's cart.

use serde::{Deserialize, Serialize};

use crate::menu::MenuItem;
use crate::{AddOnId, CartItemId, MenuItemId, Price};

/// Largest quantity of a single line.
pub const MAX_QUANTITY: u32 = 99;

/// Longest kitchen note, in characters.
pub const MAX_NOTE_LENGTH: usize = 200;

/// Errors raised while building or editing a cart line.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("menu item {0} does not exist")]
    UnknownItem(MenuItemId),
    #[error("{0} is sold out")]
    Unavailable(String),
    #[error("quantity must be between 1 and {MAX_QUANTITY}")]
    InvalidQuantity,
    #[error("add-on {0} is not offered for this item")]
    UnknownAddOn(AddOnId),
    #[error("add-on {0} was selected more than once")]
    DuplicateAddOn(AddOnId),
    #[error("'{0}' cannot be removed from this item")]
    NotRemovable(String),
    #[error("note must be at most {MAX_NOTE_LENGTH} characters")]
    NoteTooLong,
    #[error("cart line {0} not found")]
    LineNotFound(CartItemId),
    #[error("cart is empty")]
    Empty,
}

/// A request to put a menu item in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSelection {
    pub menu_item_id: MenuItemId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub add_on_ids: Vec<AddOnId>,
    #[serde(default)]
    pub removals: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

/// An add-on as it was priced when added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChosenAddOn {
    pub id: AddOnId,
    pub name: String,
    pub price: Price,
}

/// The contents of a cart line, independent of where it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub base_price: Price,
    pub quantity: u32,
    /// Sorted by id.
    pub add_ons: Vec<ChosenAddOn>,
    /// Lowercased and sorted.
    pub removals: Vec<String>,
    pub note: Option<String>,
}

impl CartLine {
    /// Validate a selection against its menu item and snapshot the result.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the item is sold out, the quantity is out
    /// of range, an add-on or removal is not offered, or the note is too long.
    pub fn resolve(item: &MenuItem, selection: &CartSelection) -> Result<Self, CartError> {
        if item.id != selection.menu_item_id {
            return Err(CartError::UnknownItem(selection.menu_item_id));
        }
        if !item.available {
            return Err(CartError::Unavailable(item.name.clone()));
        }
        validate_quantity(selection.quantity)?;

        let mut add_ons = Vec::with_capacity(selection.add_on_ids.len());
        for &id in &selection.add_on_ids {
            if add_ons.iter().any(|a: &ChosenAddOn| a.id == id) {
                return Err(CartError::DuplicateAddOn(id));
            }
            let add_on = item.add_on(id).ok_or(CartError::UnknownAddOn(id))?;
            add_ons.push(ChosenAddOn {
                id,
                name: add_on.name.clone(),
                price: add_on.price,
            });
        }
        add_ons.sort_by_key(|a| a.id);

        let mut removals = Vec::with_capacity(selection.removals.len());
        for removal in &selection.removals {
            let removal = removal.trim().to_lowercase();
            if !item.is_removable(&removal) {
                return Err(CartError::NotRemovable(removal));
            }
            if !removals.contains(&removal) {
                removals.push(removal);
            }
        }
        removals.sort();

        let note = normalize_note(selection.note.as_deref())?;

        Ok(Self {
            menu_item_id: item.id,
            name: item.name.clone(),
            base_price: item.base_price,
            quantity: selection.quantity,
            add_ons,
            removals,
            note,
        })
    }

    /// Price of one unit including add-ons.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.base_price + self.add_ons.iter().map(|a| a.price).sum::<Price>()
    }

    /// `(base price + add-ons) × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price() * self.quantity
    }

    /// Whether two lines describe the same dish prepared the same way, so
    /// adding one to a cart that already has the other merges quantities.
    #[must_use]
    pub fn same_configuration(&self, other: &Self) -> bool {
        self.menu_item_id == other.menu_item_id
            && self.add_ons.iter().map(|a| a.id).eq(other.add_ons.iter().map(|a| a.id))
            && self.removals == other.removals
            && self.note == other.note
    }
}

/// A stored cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    #[serde(flatten)]
    pub line: CartLine,
}

impl CartItem {
    /// `(base price + add-ons) × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.line.line_total()
    }
}

/// Check a quantity is within `1..=MAX_QUANTITY`.
///
/// # Errors
///
/// Returns [`CartError::InvalidQuantity`] otherwise.
pub const fn validate_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 || quantity > MAX_QUANTITY {
        return Err(CartError::InvalidQuantity);
    }
    Ok(())
}

/// Quantity after merging an identical line, capped at [`MAX_QUANTITY`].
#[must_use]
pub fn merged_quantity(existing: u32, added: u32) -> u32 {
    existing.saturating_add(added).min(MAX_QUANTITY)
}

fn normalize_note(note: Option<&str>) -> Result<Option<String>, CartError> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if note.chars().count() > MAX_NOTE_LENGTH {
        return Err(CartError::NoteTooLong);
    }
    Ok(Some(note.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::menu::fixtures::{lu_rou_fan, milk_tea};

    fn selection(quantity: u32, add_ons: &[i32], removals: &[&str]) -> CartSelection {
        CartSelection {
            menu_item_id: MenuItemId::new(1),
            quantity,
            add_on_ids: add_ons.iter().copied().map(AddOnId::new).collect(),
            removals: removals.iter().map(ToString::to_string).collect(),
            note: None,
        }
    }

    #[test]
    fn test_line_total_includes_add_ons_times_quantity() {
        let line = CartLine::resolve(&lu_rou_fan(), &selection(2, &[10, 11], &[])).unwrap();
        // (12.90 + 2.00 + 4.50) × 2
        assert_eq!(line.unit_price(), Price::from_sen(1940));
        assert_eq!(line.line_total(), Price::from_sen(3880));
    }

    #[test]
    fn test_resolve_snapshots_names_and_sorts() {
        let line =
            CartLine::resolve(&lu_rou_fan(), &selection(1, &[11, 10], &["Pickles", "scallion"]))
                .unwrap();
        let ids: Vec<_> = line.add_ons.iter().map(|a| a.id.as_i32()).collect();
        assert_eq!(ids, [10, 11]);
        assert_eq!(line.removals, ["pickles", "scallion"]);
        assert_eq!(line.name, "Lu Rou Fan");
    }

    #[test]
    fn test_resolve_rejects_unknown_add_on() {
        assert_eq!(
            CartLine::resolve(&lu_rou_fan(), &selection(1, &[99], &[])),
            Err(CartError::UnknownAddOn(AddOnId::new(99)))
        );
    }

    #[test]
    fn test_resolve_rejects_duplicate_add_on() {
        assert_eq!(
            CartLine::resolve(&lu_rou_fan(), &selection(1, &[10, 10], &[])),
            Err(CartError::DuplicateAddOn(AddOnId::new(10)))
        );
    }

    #[test]
    fn test_resolve_rejects_unlisted_removal() {
        assert_eq!(
            CartLine::resolve(&lu_rou_fan(), &selection(1, &[], &["rice"])),
            Err(CartError::NotRemovable("rice".to_string()))
        );
    }

    #[test]
    fn test_resolve_rejects_bad_quantity() {
        assert_eq!(
            CartLine::resolve(&lu_rou_fan(), &selection(0, &[], &[])),
            Err(CartError::InvalidQuantity)
        );
        assert_eq!(
            CartLine::resolve(&lu_rou_fan(), &selection(100, &[], &[])),
            Err(CartError::InvalidQuantity)
        );
    }

    #[test]
    fn test_resolve_rejects_sold_out() {
        let mut item = lu_rou_fan();
        item.available = false;
        assert!(matches!(
            CartLine::resolve(&item, &selection(1, &[], &[])),
            Err(CartError::Unavailable(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_mismatched_item() {
        assert_eq!(
            CartLine::resolve(&milk_tea(), &selection(1, &[], &[])),
            Err(CartError::UnknownItem(MenuItemId::new(1)))
        );
    }

    #[test]
    fn test_note_is_trimmed_and_bounded() {
        let mut sel = selection(1, &[], &[]);
        sel.note = Some("   ".to_string());
        assert_eq!(CartLine::resolve(&lu_rou_fan(), &sel).unwrap().note, None);

        sel.note = Some("x".repeat(MAX_NOTE_LENGTH + 1));
        assert_eq!(
            CartLine::resolve(&lu_rou_fan(), &sel),
            Err(CartError::NoteTooLong)
        );
    }

    #[test]
    fn test_same_configuration() {
        let a = CartLine::resolve(&lu_rou_fan(), &selection(1, &[10], &["scallion"])).unwrap();
        let b = CartLine::resolve(&lu_rou_fan(), &selection(3, &[10], &["Scallion"])).unwrap();
        let c = CartLine::resolve(&lu_rou_fan(), &selection(1, &[11], &["scallion"])).unwrap();
        assert!(a.same_configuration(&b));
        assert!(!a.same_configuration(&c));
    }

    #[test]
    fn test_merged_quantity_caps() {
        assert_eq!(merged_quantity(2, 3), 5);
        assert_eq!(merged_quantity(98, 5), MAX_QUANTITY);
    }

    #[test]
    fn test_selection_defaults() {
        let sel: CartSelection = serde_json::from_str(r#"{"menu_item_id": 2}"#).unwrap();
        assert_eq!(sel.quantity, 1);
        assert!(sel.add_on_ids.is_empty());
    }
}
