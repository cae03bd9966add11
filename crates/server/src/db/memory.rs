//! In-memory store.
//!
//! All state sits behind one `RwLock`, so every trait method (including
//! `place_order`) is atomic. Data is lost on restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use taiwanese_house_core::account::{Feedback, NewFeedback, ProfileUpdate, UserProfile};
use taiwanese_house_core::cart::{CartItem, CartLine, merged_quantity};
use taiwanese_house_core::flow::StoredCode;
use taiwanese_house_core::menu::{MenuCategory, MenuItem};
use taiwanese_house_core::order::{NewOrder, Order, Payment};
use taiwanese_house_core::{
    CartItemId, CodePurpose, Coins, Email, FeedbackId, MenuItemId, OrderId, OrderStatus, PaymentId,
    PhoneNumber, UserId,
};

use super::{
    CartStore, CodeStore, FeedbackStore, MenuStore, OrderStore, RepositoryError, Store, UserStore,
};
use crate::models::user::NewUser;

struct UserRecord {
    profile: UserProfile,
    password_hash: String,
}

#[derive(Default)]
struct State {
    users: BTreeMap<UserId, UserRecord>,
    categories: Vec<MenuCategory>,
    items: BTreeMap<MenuItemId, MenuItem>,
    carts: HashMap<UserId, Vec<CartItem>>,
    orders: Vec<Order>,
    feedback: Vec<Feedback>,
    codes: HashMap<(String, CodePurpose), StoredCode>,
}

impl State {
    fn email_taken(&self, email: &Email, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| &u.profile.email == email && Some(u.profile.id) != except)
    }

    fn phone_taken(&self, phone: &PhoneNumber, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| &u.profile.phone == phone && Some(u.profile.id) != except)
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut UserRecord, RepositoryError> {
        self.users.get_mut(&id).ok_or(RepositoryError::NotFound)
    }
}

/// Store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    next_id: AtomicI32,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn apply_delta(balance: Coins, delta: i64) -> Result<Coins, RepositoryError> {
    let updated = i64::from(balance.count()) + delta;
    u32::try_from(updated)
        .map(Coins::new)
        .map_err(|_| RepositoryError::Conflict("insufficient coins".to_owned()))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<UserProfile, RepositoryError> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email, None) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        if state.phone_taken(&user.phone, None) {
            return Err(RepositoryError::Conflict("phone already exists".to_owned()));
        }

        let now = Utc::now();
        let profile = UserProfile {
            id: UserId::new(self.next_id()),
            name: user.name,
            email: user.email,
            phone: user.phone,
            coins: Coins::ZERO,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(
            profile.id,
            UserRecord {
                profile: profile.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(profile)
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|u| u.profile.clone()))
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<UserProfile>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| &u.profile.email == email)
            .map(|u| u.profile.clone()))
    }

    async fn user_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| &u.profile.phone == phone)
            .map(|u| u.profile.clone()))
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|u| u.password_hash.clone()))
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        hash.clone_into(&mut user.password_hash);
        user.profile.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, RepositoryError> {
        let mut state = self.state.write().await;
        if update
            .email
            .as_ref()
            .is_some_and(|e| state.email_taken(e, Some(id)))
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        if update
            .phone
            .as_ref()
            .is_some_and(|p| state.phone_taken(p, Some(id)))
        {
            return Err(RepositoryError::Conflict("phone already exists".to_owned()));
        }

        let user = state.user_mut(id)?;
        update.apply_to(&mut user.profile);
        user.profile.updated_at = Utc::now();
        Ok(user.profile.clone())
    }

    async fn adjust_coins(&self, id: UserId, delta: i64) -> Result<Coins, RepositoryError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.profile.coins = apply_delta(user.profile.coins, delta)?;
        Ok(user.profile.coins)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.users.remove(&id).ok_or(RepositoryError::NotFound)?;
        state.carts.remove(&id);
        state.orders.retain(|o| o.user_id != id);
        state.feedback.retain(|f| f.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl MenuStore for MemoryStore {
    async fn categories(&self) -> Result<Vec<MenuCategory>, RepositoryError> {
        Ok(self.state.read().await.categories.clone())
    }

    async fn menu_items(&self) -> Result<Vec<MenuItem>, RepositoryError> {
        Ok(self.state.read().await.items.values().cloned().collect())
    }

    async fn menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, RepositoryError> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn upsert_category(&self, category: &MenuCategory) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        match state
            .categories
            .iter_mut()
            .find(|c| c.slug == category.slug)
        {
            Some(existing) => existing.clone_from(category),
            None => state.categories.push(category.clone()),
        }
        Ok(())
    }

    async fn upsert_menu_item(&self, item: &MenuItem) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.categories.iter().any(|c| c.slug == item.category) {
            return Err(RepositoryError::Conflict(format!(
                "unknown category '{}'",
                item.category
            )));
        }
        state.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn clear_menu(&self) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.items.clear();
        state.categories.clear();
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_items(&self, user: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.carts.get(&user).cloned().unwrap_or_default())
    }

    async fn add_cart_line(
        &self,
        user: UserId,
        line: CartLine,
    ) -> Result<CartItem, RepositoryError> {
        let mut state = self.state.write().await;
        let cart = state.carts.entry(user).or_default();

        if let Some(existing) = cart
            .iter_mut()
            .find(|i| i.line.same_configuration(&line))
        {
            existing.line.quantity = merged_quantity(existing.line.quantity, line.quantity);
            return Ok(existing.clone());
        }

        let item = CartItem {
            id: CartItemId::new(self.next_id()),
            line,
        };
        cart.push(item.clone());
        Ok(item)
    }

    async fn set_cart_quantity(
        &self,
        user: UserId,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError> {
        let mut state = self.state.write().await;
        let item = state
            .carts
            .get_mut(&user)
            .and_then(|cart| cart.iter_mut().find(|i| i.id == id))
            .ok_or(RepositoryError::NotFound)?;
        item.line.quantity = quantity;
        Ok(item.clone())
    }

    async fn remove_cart_item(&self, user: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let cart = state.carts.get_mut(&user).ok_or(RepositoryError::NotFound)?;
        let before = cart.len();
        cart.retain(|i| i.id != id);
        if cart.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError> {
        self.state.write().await.carts.remove(&user);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(order.user_id)?;

        let spent = -i64::from(order.quote.coins_applied.count());
        let earned = i64::from(order.quote.coins_earned.count());
        let after_spend = apply_delta(user.profile.coins, spent)?;
        user.profile.coins = apply_delta(after_spend, earned)?;

        let placed = Order {
            id: OrderId::new(self.next_id()),
            user_id: order.user_id,
            lines: order.lines,
            quote: order.quote,
            status: OrderStatus::Placed,
            payment: Payment {
                id: PaymentId::new(self.next_id()),
                method: order.payment.method,
                status: order.payment_status,
                amount: order.quote.total,
                card: order.payment.card,
                provider: order.payment.provider,
            },
            created_at: Utc::now(),
        };

        if let Some(cart) = state.carts.get_mut(&order.user_id) {
            cart.retain(|item| !order.cart_item_ids.contains(&item.id));
        }
        state.orders.push(placed.clone());
        Ok(placed)
    }

    async fn orders_for(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect())
    }

    async fn order(&self, user: UserId, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == id && o.user_id == user)
            .cloned())
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn create_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&feedback.user_id) {
            return Err(RepositoryError::NotFound);
        }
        let stored = Feedback {
            id: FeedbackId::new(self.next_id()),
            user_id: feedback.user_id,
            rating: feedback.rating,
            message: feedback.message,
            created_at: Utc::now(),
        };
        state.feedback.push(stored.clone());
        Ok(stored)
    }

    async fn feedback_for(&self, user: UserId) -> Result<Vec<Feedback>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .feedback
            .iter()
            .rev()
            .filter(|f| f.user_id == user)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CodeStore for MemoryStore {
    async fn put_code(&self, code: StoredCode) -> Result<(), RepositoryError> {
        let key = (code.destination.clone(), code.purpose);
        self.state.write().await.codes.insert(key, code);
        Ok(())
    }

    async fn code(
        &self,
        destination: &str,
        purpose: CodePurpose,
    ) -> Result<Option<StoredCode>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .codes
            .get(&(destination.to_owned(), purpose))
            .cloned())
    }

    async fn claim_attempt(
        &self,
        destination: &str,
        purpose: CodePurpose,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredCode>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(code) = state.codes.get_mut(&(destination.to_owned(), purpose)) else {
            return Ok(None);
        };
        if code.attempts >= max_attempts || now >= code.expires_at {
            return Ok(None);
        }
        code.attempts += 1;
        Ok(Some(code.clone()))
    }

    async fn consume_code(
        &self,
        destination: &str,
        purpose: CodePurpose,
        code_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let key = (destination.to_owned(), purpose);
        if state.codes.get(&key).is_some_and(|c| c.code_hash == code_hash) {
            state.codes.remove(&key);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use taiwanese_house_core::account::DisplayName;
    use taiwanese_house_core::payment::PaymentDetails;
    use taiwanese_house_core::pricing::quote;
    use taiwanese_house_core::{PaymentStatus, Price};

    fn new_user(email: &str, phone: &str) -> NewUser {
        NewUser {
            name: DisplayName::parse("Mei Lin").unwrap(),
            email: Email::parse(email).unwrap(),
            phone: PhoneNumber::parse(phone).unwrap(),
            password_hash: "hash".to_string(),
        }
    }

    fn line(id: i32, quantity: u32) -> CartLine {
        CartLine {
            menu_item_id: MenuItemId::new(id),
            name: "Milk Tea".to_string(),
            base_price: Price::from_sen(850),
            quantity,
            add_ons: Vec::new(),
            removals: Vec::new(),
            note: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let store = MemoryStore::new();
        store
            .create_user(new_user("mei@example.com", "0123456789"))
            .await
            .unwrap();

        let dup_email = store
            .create_user(new_user("MEI@example.com", "0198765432"))
            .await;
        assert!(matches!(dup_email, Err(RepositoryError::Conflict(_))));

        let dup_phone = store
            .create_user(new_user("ah.ming@example.com", "+60 12-345 6789"))
            .await;
        assert!(matches!(dup_phone, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_adjust_coins_never_negative() {
        let store = MemoryStore::new();
        let user = store
            .create_user(new_user("mei@example.com", "0123456789"))
            .await
            .unwrap();

        assert_eq!(store.adjust_coins(user.id, 100).await.unwrap(), Coins::new(100));
        assert!(matches!(
            store.adjust_coins(user.id, -101).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(store.adjust_coins(user.id, -100).await.unwrap(), Coins::ZERO);
    }

    #[tokio::test]
    async fn test_add_cart_line_merges_identical_lines() {
        let store = MemoryStore::new();
        let user = UserId::new(1);

        let first = store.add_cart_line(user, line(2, 2)).await.unwrap();
        let merged = store.add_cart_line(user, line(2, 98)).await.unwrap();
        assert_eq!(first.id, merged.id);
        assert_eq!(merged.line.quantity, 99);

        store.add_cart_line(user, line(3, 1)).await.unwrap();
        assert_eq!(store.cart_items(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cart_is_scoped_by_user() {
        let store = MemoryStore::new();
        let item = store.add_cart_line(UserId::new(1), line(2, 1)).await.unwrap();

        assert!(matches!(
            store.remove_cart_item(UserId::new(2), item.id).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            store.set_cart_quantity(UserId::new(2), item.id, 3).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_place_order_moves_coins_and_clears_cart() {
        let store = MemoryStore::new();
        let user = store
            .create_user(new_user("mei@example.com", "0123456789"))
            .await
            .unwrap();
        store.adjust_coins(user.id, 300).await.unwrap();
        store.add_cart_line(user.id, line(2, 2)).await.unwrap();

        let items = store.cart_items(user.id).await.unwrap();
        let cart_item_ids = items.iter().map(|i| i.id).collect();
        let lines: Vec<CartLine> = items.into_iter().map(|i| i.line).collect();
        // 17.00 - 3.00 = 14.00, earns 14
        let q = quote(&lines, Coins::new(300), Coins::new(300));
        let today = Utc::now().date_naive();
        let order = store
            .place_order(NewOrder {
                user_id: user.id,
                cart_item_ids,
                lines,
                quote: q,
                payment: PaymentDetails::Cash.validate(today).unwrap(),
                payment_status: PaymentStatus::Pending,
            })
            .await
            .unwrap();

        assert_eq!(order.payment.amount, Price::from_sen(1400));
        assert!(store.cart_items(user.id).await.unwrap().is_empty());
        let profile = store.user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(profile.coins, Coins::new(14));
        assert_eq!(store.orders_for(user.id).await.unwrap().len(), 1);
        assert!(store.order(UserId::new(999), order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_place_order_keeps_lines_added_after_quote() {
        let store = MemoryStore::new();
        let user = store
            .create_user(new_user("mei@example.com", "0123456789"))
            .await
            .unwrap();
        store.add_cart_line(user.id, line(2, 1)).await.unwrap();

        let items = store.cart_items(user.id).await.unwrap();
        // Another session adds a line while this one is paying.
        let late = store.add_cart_line(user.id, line(3, 2)).await.unwrap();

        let cart_item_ids = items.iter().map(|i| i.id).collect();
        let lines: Vec<CartLine> = items.into_iter().map(|i| i.line).collect();
        let q = quote(&lines, Coins::ZERO, Coins::ZERO);
        let order = store
            .place_order(NewOrder {
                user_id: user.id,
                cart_item_ids,
                lines,
                quote: q,
                payment: PaymentDetails::Cash.validate(Utc::now().date_naive()).unwrap(),
                payment_status: PaymentStatus::Pending,
            })
            .await
            .unwrap();

        assert_eq!(order.lines.len(), 1);
        let left = store.cart_items(user.id).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, late.id);
    }

    #[tokio::test]
    async fn test_code_attempts_and_consume() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .put_code(StoredCode {
                destination: "+60123456789".to_string(),
                purpose: CodePurpose::PhoneLogin,
                code_hash: "abc".to_string(),
                attempts: 0,
                expires_at: now + chrono::Duration::minutes(5),
            })
            .await
            .unwrap();

        let claimed = store
            .claim_attempt("+60123456789", CodePurpose::PhoneLogin, 2, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.attempts, 1);
        assert!(
            store
                .claim_attempt("+60123456789", CodePurpose::PasswordReset, 2, now)
                .await
                .unwrap()
                .is_none()
        );

        // Past the limit, and once expired, nothing is claimed.
        store
            .claim_attempt("+60123456789", CodePurpose::PhoneLogin, 2, now)
            .await
            .unwrap()
            .unwrap();
        assert!(
            store
                .claim_attempt("+60123456789", CodePurpose::PhoneLogin, 2, now)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .claim_attempt(
                    "+60123456789",
                    CodePurpose::PhoneLogin,
                    5,
                    now + chrono::Duration::minutes(5)
                )
                .await
                .unwrap()
                .is_none()
        );

        assert!(
            !store
                .consume_code("+60123456789", CodePurpose::PhoneLogin, "other")
                .await
                .unwrap()
        );
        assert!(
            store
                .consume_code("+60123456789", CodePurpose::PhoneLogin, "abc")
                .await
                .unwrap()
        );
        assert!(
            store
                .code("+60123456789", CodePurpose::PhoneLogin)
                .await
                .unwrap()
                .is_none()
        );
    }
}
