//! Authentication service.
//!
//! Password login by email or phone, phone-code login, password recovery
//! and account management. Session state is kept by the caller; this service
//! only validates transitions and touches storage.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use taiwanese_house_core::account::{
    DisplayName, ProfileUpdate, UserProfile, ValidationError, validate_password,
};
use taiwanese_house_core::flow::{LoginMethod, RecoveryStep};
use taiwanese_house_core::{CodePurpose, Email, Identifier, PhoneNumber, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::user::NewUser;
use crate::services::notify::Notifier;
use crate::services::verification::VerificationService;

/// Raw signup form.
#[derive(Debug, Clone, Default)]
pub struct Signup<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub password: &'a str,
    pub confirm_password: Option<&'a str>,
}

/// Raw profile edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    codes: VerificationService,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            codes: VerificationService::new(store.clone(), notifier),
            store,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad name, email, phone or password,
    /// and `AuthError::UserAlreadyExists` if the email or phone is taken.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn signup(&self, form: &Signup<'_>) -> Result<UserProfile, AuthError> {
        let name = DisplayName::parse(form.name)?;
        let email = Email::parse(form.email)?;
        let phone = PhoneNumber::parse(form.phone)?;
        validate_password(form.password, form.confirm_password)?;

        let password_hash = hash_password(form.password)?;

        let user = self
            .store
            .create_user(NewUser {
                name,
                email,
                phone,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    /// Login with an email address or phone number and a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the account does not exist
    /// or the password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<(UserProfile, LoginMethod), AuthError> {
        let identifier = Identifier::parse(identifier)?;

        let user = self
            .find_user(&identifier)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = self
            .store
            .password_hash(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &hash)?;

        Ok((user, LoginMethod::password_for(&identifier)))
    }

    // =========================================================================
    // Phone Code Login
    // =========================================================================

    /// Send a login code to a registered phone number.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account uses this number.
    #[instrument(skip(self))]
    pub async fn start_phone_login(&self, phone: &str) -> Result<PhoneNumber, AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        if self.store.user_by_phone(&phone).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        self.codes
            .issue(&Identifier::Phone(phone.clone()), CodePurpose::PhoneLogin)
            .await?;
        Ok(phone)
    }

    /// Check a phone login code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Flow` for a wrong, expired or exhausted code.
    #[instrument(skip(self, code))]
    pub async fn verify_phone_login(&self, phone: &str, code: &str) -> Result<UserProfile, AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        self.codes
            .verify(&Identifier::Phone(phone.clone()), CodePurpose::PhoneLogin, code)
            .await?;

        self.store
            .user_by_phone(&phone)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Password Recovery
    // =========================================================================

    /// Start recovery and return the first step to keep in the session.
    ///
    /// A code is only sent when an account exists, but the result is the same
    /// either way so the endpoint does not reveal who is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is malformed or sending fails.
    #[instrument(skip(self))]
    pub async fn start_recovery(&self, identifier: &str) -> Result<RecoveryStep, AuthError> {
        let identifier = Identifier::parse(identifier)?;

        if self.find_user(&identifier).await?.is_some() {
            self.codes
                .issue(&identifier, CodePurpose::PasswordReset)
                .await?;
        } else {
            tracing::info!(to = %identifier.masked(), "Recovery requested for unknown account");
        }

        Ok(RecoveryStep::request(identifier))
    }

    /// Check the recovery code and advance to [`RecoveryStep::Verified`].
    ///
    /// # Errors
    ///
    /// Returns `FlowError::OutOfOrder` if recovery was not started, and
    /// `AuthError::Flow` for a bad code.
    #[instrument(skip(self, step, code))]
    pub async fn verify_recovery(
        &self,
        step: Option<&RecoveryStep>,
        code: &str,
    ) -> Result<RecoveryStep, AuthError> {
        let identifier = RecoveryStep::pending_identifier(step)?;
        self.codes
            .verify(identifier, CodePurpose::PasswordReset, code)
            .await?;

        let user = self
            .find_user(identifier)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(RecoveryStep::verify(step, user.id)?)
    }

    /// Set a new password once recovery is verified.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::OutOfOrder` unless the code was verified first.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        step: Option<&RecoveryStep>,
        password: &str,
        confirmation: Option<&str>,
    ) -> Result<UserId, AuthError> {
        let user_id = RecoveryStep::reset(step)?;
        validate_password(password, confirmation)?;

        self.store
            .set_password_hash(user_id, &hash_password(password)?)
            .await
            .map_err(not_found_as_user)?;

        tracing::info!(user_id = %user_id, "Password reset");
        Ok(user_id)
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Get a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account is gone.
    pub async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError> {
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Change the password, given the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    #[instrument(skip(self, current, new, confirmation))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
        confirmation: Option<&str>,
    ) -> Result<(), AuthError> {
        self.check_password(user_id, current).await?;
        validate_password(new, confirmation)?;

        self.store
            .set_password_hash(user_id, &hash_password(new)?)
            .await
            .map_err(not_found_as_user)
    }

    /// Edit name, email or phone.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NoChanges` if nothing was given, and
    /// `AuthError::UserAlreadyExists` if the new email or phone is taken.
    #[instrument(skip(self, edit))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        edit: &ProfileEdit<'_>,
    ) -> Result<UserProfile, AuthError> {
        let update = ProfileUpdate {
            name: edit.name.map(DisplayName::parse).transpose()?,
            email: edit.email.map(Email::parse).transpose()?,
            phone: edit.phone.map(PhoneNumber::parse).transpose()?,
        };
        if update.is_empty() {
            return Err(ValidationError::NoChanges.into());
        }

        self.store
            .update_profile(user_id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => not_found_as_user(other),
            })
    }

    /// Delete the account after re-checking the password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the password is wrong.
    #[instrument(skip(self, password))]
    pub async fn delete_account(&self, user_id: UserId, password: &str) -> Result<(), AuthError> {
        self.check_password(user_id, password).await?;
        self.store
            .delete_user(user_id)
            .await
            .map_err(not_found_as_user)?;

        tracing::info!(user_id = %user_id, "Account deleted");
        Ok(())
    }

    async fn find_user(&self, identifier: &Identifier) -> Result<Option<UserProfile>, AuthError> {
        Ok(match identifier {
            Identifier::Email(email) => self.store.user_by_email(email).await?,
            Identifier::Phone(phone) => self.store.user_by_phone(phone).await?,
        })
    }

    async fn check_password(&self, user_id: UserId, password: &str) -> Result<(), AuthError> {
        let hash = self
            .store
            .password_hash(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        verify_password(password, &hash)
    }
}

fn not_found_as_user(e: RepositoryError) -> AuthError {
    match e {
        RepositoryError::NotFound => AuthError::UserNotFound,
        other => AuthError::Repository(other),
    }
}

// =============================================================================
// Password Helpers
// =============================================================================

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use taiwanese_house_core::flow::FlowError;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::notify::NotifyError;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, CodePurpose, String)>>);

    impl Outbox {
        fn last_code(&self) -> Option<String> {
            self.0.lock().unwrap().last().map(|(_, _, code)| code.clone())
        }

        fn sent(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for Outbox {
        async fn send_code(
            &self,
            to: &Identifier,
            purpose: CodePurpose,
            code: &str,
        ) -> Result<(), NotifyError> {
            self.0
                .lock()
                .unwrap()
                .push((to.as_str().to_string(), purpose, code.to_string()));
            Ok(())
        }
    }

    fn service() -> (AuthService, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        (
            AuthService::new(Arc::new(MemoryStore::new()), outbox.clone()),
            outbox,
        )
    }

    fn mei() -> Signup<'static> {
        Signup {
            name: "Mei Lin",
            email: "mei@example.com",
            phone: "012-345 6789",
            password: "bubbletea42",
            confirm_password: Some("bubbletea42"),
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("bubbletea42").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("bubbletea42", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_signup_then_login_by_email_or_phone() {
        let (auth, _) = service();
        let user = auth.signup(&mei()).await.unwrap();
        assert_eq!(user.phone.as_str(), "+60123456789");
        assert_eq!(user.coins.count(), 0);

        let (by_email, method) = auth.login("MEI@example.com", "bubbletea42").await.unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(method, LoginMethod::EmailPassword);

        let (by_phone, method) = auth.login("+60123456789", "bubbletea42").await.unwrap();
        assert_eq!(by_phone.id, user.id);
        assert_eq!(method, LoginMethod::PhonePassword);
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicates_and_weak_passwords() {
        let (auth, _) = service();
        auth.signup(&mei()).await.unwrap();

        let same_phone = Signup {
            email: "other@example.com",
            ..mei()
        };
        assert!(matches!(
            auth.signup(&same_phone).await,
            Err(AuthError::UserAlreadyExists)
        ));

        let weak = Signup {
            email: "weak@example.com",
            phone: "0198765432",
            password: "password",
            confirm_password: None,
            ..mei()
        };
        assert!(matches!(
            auth.signup(&weak).await,
            Err(AuthError::Validation(ValidationError::PasswordTooSimple))
        ));
    }

    #[tokio::test]
    async fn test_login_wrong_password_or_unknown_user() {
        let (auth, _) = service();
        auth.signup(&mei()).await.unwrap();

        assert!(matches!(
            auth.login("mei@example.com", "nope12345").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "bubbletea42").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("not an id", "bubbletea42").await,
            Err(AuthError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_phone_code_login() {
        let (auth, outbox) = service();
        let user = auth.signup(&mei()).await.unwrap();

        assert!(matches!(
            auth.start_phone_login("0111111111").await,
            Err(AuthError::UserNotFound)
        ));

        auth.start_phone_login("0123456789").await.unwrap();
        let code = outbox.last_code().unwrap();
        let logged_in = auth.verify_phone_login("+60123456789", &code).await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            auth.verify_phone_login("+60123456789", &code).await,
            Err(AuthError::Flow(FlowError::CodeMissing))
        ));
    }

    #[tokio::test]
    async fn test_recovery_steps_in_order() {
        let (auth, outbox) = service();
        auth.signup(&mei()).await.unwrap();

        assert!(matches!(
            auth.reset_password(None, "newpass123", None).await,
            Err(AuthError::Flow(FlowError::OutOfOrder))
        ));

        let step = auth.start_recovery("mei@example.com").await.unwrap();
        assert!(matches!(
            auth.reset_password(Some(&step), "newpass123", None).await,
            Err(AuthError::Flow(FlowError::OutOfOrder))
        ));

        let code = outbox.last_code().unwrap();
        let step = auth.verify_recovery(Some(&step), &code).await.unwrap();
        auth.reset_password(Some(&step), "newpass123", Some("newpass123"))
            .await
            .unwrap();

        assert!(auth.login("mei@example.com", "newpass123").await.is_ok());
        assert!(matches!(
            auth.login("mei@example.com", "bubbletea42").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_recovery_for_unknown_account_sends_nothing() {
        let (auth, outbox) = service();

        let step = auth.start_recovery("ghost@example.com").await.unwrap();
        assert_eq!(outbox.sent(), 0);
        assert!(matches!(
            auth.verify_recovery(Some(&step), "123456").await,
            Err(AuthError::Flow(FlowError::CodeMissing))
        ));
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let (auth, _) = service();
        let user = auth.signup(&mei()).await.unwrap();

        assert!(matches!(
            auth.change_password(user.id, "wrong", "tea4two22", None).await,
            Err(AuthError::InvalidCredentials)
        ));
        auth.change_password(user.id, "bubbletea42", "tea4two22", Some("tea4two22"))
            .await
            .unwrap();
        assert!(auth.login("mei@example.com", "tea4two22").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (auth, _) = service();
        let user = auth.signup(&mei()).await.unwrap();

        assert!(matches!(
            auth.update_profile(user.id, &ProfileEdit::default()).await,
            Err(AuthError::Validation(ValidationError::NoChanges))
        ));

        let updated = auth
            .update_profile(
                user.id,
                &ProfileEdit {
                    name: Some("Mei"),
                    ..ProfileEdit::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_str(), "Mei");
        assert_eq!(updated.email, user.email);
    }

    #[tokio::test]
    async fn test_delete_account() {
        let (auth, _) = service();
        let user = auth.signup(&mei()).await.unwrap();

        assert!(matches!(
            auth.delete_account(user.id, "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        auth.delete_account(user.id, "bubbletea42").await.unwrap();
        assert!(matches!(
            auth.profile(user.id).await,
            Err(AuthError::UserNotFound)
        ));
    }
}
