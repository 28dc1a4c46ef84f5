//! Per-user UI preferences and terms acceptance
//!
//! Table: user_preferences

use chrono::{DateTime, Utc};
use cm_core::traits::Id;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Table,
    Cards,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Table => "table",
            ViewMode::Cards => "cards",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "table" => Some(ViewMode::Table),
            "cards" => Some(ViewMode::Cards),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub user_id: Id,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub terms_version: Option<String>,
    pub active_tab: String,
    pub view_mode: ViewMode,
    pub updated_at: DateTime<Utc>,
}

impl UserPreferences {
    pub const DEFAULT_TAB: &'static str = "contacts";

    pub fn defaults_for(user_id: Id) -> Self {
        Self {
            user_id,
            terms_accepted_at: None,
            terms_version: None,
            active_tab: Self::DEFAULT_TAB.to_string(),
            view_mode: ViewMode::default(),
            updated_at: Utc::now(),
        }
    }

    /// Whether the given terms version has been accepted
    pub fn has_accepted(&self, version: &str) -> bool {
        self.terms_accepted_at.is_some() && self.terms_version.as_deref() == Some(version)
    }

    pub fn accept_terms(&mut self, version: &str) {
        let now = Utc::now();
        self.terms_accepted_at = Some(now);
        self.terms_version = Some(version.to_string());
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferences {
    #[validate(length(min = 1, max = 50))]
    pub active_tab: Option<String>,
    pub view_mode: Option<ViewMode>,
}

impl UpdatePreferences {
    pub fn apply_to(&self, prefs: &mut UserPreferences) {
        if let Some(tab) = &self.active_tab {
            prefs.active_tab = tab.clone();
        }
        if let Some(mode) = self.view_mode {
            prefs.view_mode = mode;
        }
        prefs.updated_at = Utc::now();
    }
}
