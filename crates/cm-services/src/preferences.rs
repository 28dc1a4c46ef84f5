//! Per-user UI preferences and terms acceptance
//!
//! Preferences are mirrored into both cache tiers so the active tab, view
//! mode and terms acceptance survive a database outage.

use std::sync::Arc;

use cm_auth::CurrentUser;
use cm_contracts::validate_input;
use cm_core::CmResult;
use cm_db::PreferenceStore;
use cm_models::{UpdatePreferences, UserPreferences};
use tracing::{info, warn};

use crate::cache::{CacheKey, TieredCache};
use crate::result::ServiceResult;

pub const SAVED_LOCALLY_MESSAGE: &str =
    "The database is unreachable; preferences were saved locally";

pub struct PreferenceService {
    store: Arc<dyn PreferenceStore>,
    cache: TieredCache,
    terms_version: String,
}

impl PreferenceService {
    pub fn new(store: Arc<dyn PreferenceStore>, cache: TieredCache, terms_version: impl Into<String>) -> Self {
        Self {
            store,
            cache,
            terms_version: terms_version.into(),
        }
    }

    /// The terms version users must accept
    pub fn terms_version(&self) -> &str {
        &self.terms_version
    }

    pub fn has_accepted_terms(&self, preferences: &UserPreferences) -> bool {
        preferences.has_accepted(&self.terms_version)
    }

    pub async fn get(&self, user: &CurrentUser) -> CmResult<UserPreferences> {
        let key = CacheKey::Preferences { user_id: user.id };
        match self.store.get(user.id).await {
            Ok(Some(preferences)) => {
                self.cache.put(&key, &preferences).await;
                Ok(preferences)
            }
            Ok(None) => Ok(self
                .cached(user)
                .await
                .unwrap_or_else(|| UserPreferences::defaults_for(user.id))),
            Err(e) if e.is_unavailable() => {
                warn!(user_id = user.id, error = %e, "Preferences unavailable, using cache");
                Ok(self
                    .cached(user)
                    .await
                    .unwrap_or_else(|| UserPreferences::defaults_for(user.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(
        &self,
        user: &CurrentUser,
        changes: UpdatePreferences,
    ) -> CmResult<ServiceResult<UserPreferences>> {
        if let Err(errors) = validate_input(&changes) {
            return Ok(ServiceResult::failure(errors));
        }

        let mut preferences = self.get(user).await?;
        changes.apply_to(&mut preferences);
        self.save(user, preferences).await
    }

    /// Record acceptance of the current terms version
    pub async fn accept_terms(&self, user: &CurrentUser) -> CmResult<ServiceResult<UserPreferences>> {
        let mut preferences = self.get(user).await?;
        preferences.accept_terms(&self.terms_version);
        info!(user_id = user.id, version = %self.terms_version, "Terms accepted");
        self.save(user, preferences).await
    }

    async fn save(
        &self,
        user: &CurrentUser,
        preferences: UserPreferences,
    ) -> CmResult<ServiceResult<UserPreferences>> {
        let key = CacheKey::Preferences { user_id: user.id };
        match self.store.save(&preferences).await {
            Ok(saved) => {
                self.cache.put(&key, &saved).await;
                Ok(ServiceResult::success(saved))
            }
            Err(e) if e.is_unavailable() => {
                warn!(user_id = user.id, error = %e, "Saving preferences locally");
                self.cache.put(&key, &preferences).await;
                Ok(ServiceResult::success(preferences).with_message(SAVED_LOCALLY_MESSAGE))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn cached(&self, user: &CurrentUser) -> Option<UserPreferences> {
        let key = CacheKey::Preferences { user_id: user.id };
        for cache in [&self.cache.session, &self.cache.local] {
            if let Ok(Some(cached)) = cache.get::<UserPreferences>(&key).await {
                return Some(cached.value);
            }
        }
        None
    }
}
