use crate::core::IdentityProvider;
use crate::domain::model::{CurrentUser, Registration, Role};
use crate::utils::error::{AtlasError, Result};
use crate::utils::validation::validate_non_empty_string;
use std::sync::Arc;

/// 目前登入者的狀態
///
/// 啟動時 `initialize`，需要時 `refresh`，登出時 `logout`。
/// 由呼叫端持有並以參考傳給需要身分資訊的元件。
pub struct AuthSession<I: IdentityProvider> {
    provider: Arc<I>,
    user: Option<CurrentUser>,
    initialized: bool,
}

impl<I: IdentityProvider> AuthSession<I> {
    pub fn new(provider: Arc<I>) -> Self {
        Self {
            provider,
            user: None,
            initialized: false,
        }
    }

    pub async fn initialize(&mut self) -> Option<&CurrentUser> {
        self.refresh().await;
        self.initialized = true;
        self.user.as_ref()
    }

    /// 重新向後端確認身分；任何錯誤都視為未登入
    pub async fn refresh(&mut self) -> Option<&CurrentUser> {
        self.user = match self.provider.current_user().await {
            Ok(user) => {
                tracing::debug!("Authenticated as {} ({})", user.username, user.role_name);
                Some(user)
            }
            Err(e) => {
                if !e.is_auth_failure() {
                    tracing::warn!("Could not check current user: {}", e);
                }
                None
            }
        };
        self.user.as_ref()
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&CurrentUser> {
        validate_non_empty_string("username", username)?;
        validate_non_empty_string("password", password)?;

        self.provider.login(username, password).await?;
        self.refresh().await;
        match &self.user {
            Some(user) => {
                tracing::info!("✅ Logged in as {}", user.username);
                Ok(user)
            }
            None => Err(AtlasError::Unauthenticated),
        }
    }

    pub async fn register(&self, registration: &Registration) -> Result<()> {
        validate_non_empty_string("username", &registration.username)?;
        validate_non_empty_string("email", &registration.email)?;
        validate_non_empty_string("password", &registration.password)?;
        self.provider.register(registration).await?;
        tracing::info!("Registered user {}", registration.username);
        Ok(())
    }

    pub fn logout(&mut self) {
        self.provider.clear_credentials();
        if let Some(user) = self.user.take() {
            tracing::info!("Logged out {}", user.username);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(CurrentUser::role)
    }

    pub fn require_user(&self) -> Result<&CurrentUser> {
        self.user.as_ref().ok_or(AtlasError::Unauthenticated)
    }
}
