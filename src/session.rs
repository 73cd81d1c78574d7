use std::time::Duration;
use tokio::time::Instant;

use crate::model::{Gallery, Profile};

/// Who is using the app. Passed explicitly to anything that makes
/// authorization decisions.
#[derive(Debug, Clone, Default)]
pub struct Session {
  pub user_id: Option<String>,
  pub access_token: Option<String>,
  pub profile: Option<Profile>,
  last_profile_refresh: Option<Instant>,
}

impl Session {
  pub fn anonymous() -> Self {
    Self::default()
  }

  pub fn signed_in(user_id: impl Into<String>, access_token: Option<String>) -> Self {
    Self { user_id: Some(user_id.into()), access_token, ..Self::default() }
  }

  pub fn is_signed_in(&self) -> bool {
    self.user_id.is_some()
  }

  pub fn owns(&self, gallery: &Gallery) -> bool {
    self.user_id.as_deref() == Some(gallery.user_id.as_str())
  }

  pub fn can_view(&self, gallery: &Gallery) -> bool {
    gallery.visibility.readable_by(&gallery.user_id, self.user_id.as_deref())
  }

  /// Label for the header: username when known, else the raw id.
  pub fn display_name(&self) -> Option<&str> {
    self.profile.as_ref().map(|p| p.username.as_str()).or(self.user_id.as_deref())
  }

  /// Whether a profile refresh is allowed at `now` under `interval`.
  pub fn profile_refresh_due(&self, now: Instant, interval: Duration) -> bool {
    self.is_signed_in() && self.last_profile_refresh.is_none_or(|last| now.duration_since(last) >= interval)
  }

  /// Mark a refresh attempt; `profile` is kept only when the store returned one.
  pub fn record_profile(&mut self, profile: Option<Profile>, now: Instant) {
    self.last_profile_refresh = Some(now);
    if profile.is_some() {
      self.profile = profile;
    }
  }
}
