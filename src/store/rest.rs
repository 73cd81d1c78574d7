//! PostgREST-compatible record store (the hosted backend's `/rest/v1` API).
//!
//! Row-level filtering is enforced by the backend; the bearer token decides what
//! the caller may see. Single-row operations ask for `return=representation`
//! and take the first row of the returned array.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{GalleryFilter, RecordStore, StoreError, StoreResult};
use crate::model::{
  Gallery, NewGallery, NewTagGroup, NewVideo, Profile, TagGroup, TagGroupPatch, Video, VideoPatch,
};

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct RestConfig {
  /// Project base URL, e.g. `https://xyz.supabase.co`.
  pub base_url: String,
  /// Public (anon) API key sent on every request.
  pub anon_key: String,
  /// User access token; falls back to the anon key when signed out.
  pub access_token: Option<String>,
}

pub struct RestStore {
  client: Client,
  config: RestConfig,
}

/// Body wrapper that stamps `updated_at` on every patch.
#[derive(Serialize)]
struct Stamped<T: Serialize> {
  #[serde(flatten)]
  inner: T,
  updated_at: chrono::DateTime<Utc>,
}

fn stamped<T: Serialize>(inner: T) -> Stamped<T> {
  Stamped { inner, updated_at: Utc::now() }
}

/// Build `{base}/rest/v1/{table}?{params}`.
fn table_url(base: &str, table: &str, params: &[(&str, String)]) -> StoreResult<Url> {
  let mut url = Url::parse(&format!("{}/rest/v1/{}", base.trim_end_matches('/'), table))
    .map_err(|e| StoreError::Unexpected(anyhow::anyhow!("invalid backend URL '{}': {}", base, e)))?;
  if !params.is_empty() {
    let mut pairs = url.query_pairs_mut();
    for (key, value) in params {
      pairs.append_pair(key, value);
    }
  }
  Ok(url)
}

fn eq(value: &str) -> String {
  format!("eq.{value}")
}

/// PostgREST filter params reproducing `GalleryFilter::admits`. None when the
/// filter admits nothing (own galleries of a signed-out viewer).
fn gallery_filter_params(filter: &GalleryFilter) -> Option<Vec<(&'static str, String)>> {
  let mut params = vec![("select", "*".to_string())];
  match (&filter.viewer, filter.only_owned) {
    (None, true) => return None,
    (Some(viewer), true) => params.push(("user_id", eq(viewer))),
    (Some(viewer), false) => params.push((
      "or",
      format!("(visibility.eq.public,visibility.eq.authenticated,and(visibility.eq.private,user_id.eq.{viewer}))"),
    )),
    (None, false) => params.push(("visibility", eq("public"))),
  }
  params.push(("order", "created_at.desc".to_string()));
  Some(params)
}

impl RestStore {
  pub fn new(config: RestConfig) -> Self {
    Self { client: Client::new(), config }
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let token = self.config.access_token.as_deref().unwrap_or(&self.config.anon_key);
    self
      .client
      .request(method, url)
      .header("apikey", &self.config.anon_key)
      .header("Authorization", format!("Bearer {token}"))
  }

  async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> StoreResult<T> {
    let response = builder.send().await.map_err(|e| StoreError::Transport(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      warn!(status = status.as_u16(), body = %message, "rest: request rejected");
      return Err(StoreError::Rejected { status: status.as_u16(), message });
    }
    response.json::<T>().await.map_err(|e| StoreError::Decode(e.to_string()))
  }

  async fn select<T: DeserializeOwned>(&self, table: &str, params: &[(&str, String)]) -> StoreResult<Vec<T>> {
    let url = table_url(&self.config.base_url, table, params)?;
    debug!(%url, "rest: select");
    self.send(self.request(Method::GET, url)).await
  }

  async fn select_one<T: DeserializeOwned>(&self, table: &str, id: &str) -> StoreResult<Option<T>> {
    let rows: Vec<T> = self.select(table, &[("select", "*".to_string()), ("id", eq(id))]).await?;
    Ok(rows.into_iter().next())
  }

  async fn write_one<B: Serialize + Sync, T: DeserializeOwned>(
    &self,
    method: Method,
    table: &str,
    id: Option<&str>,
    body: &B,
  ) -> StoreResult<T> {
    let params: Vec<(&str, String)> = id.map(|id| vec![("id", eq(id))]).unwrap_or_default();
    let url = table_url(&self.config.base_url, table, &params)?;
    debug!(%url, %method, "rest: write");
    let rows: Vec<T> =
      self.send(self.request(method, url).header("Prefer", "return=representation").json(body)).await?;
    rows.into_iter().next().ok_or_else(|| StoreError::NotFound(format!("{table} {}", id.unwrap_or("(new)"))))
  }

  async fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
    let url = table_url(&self.config.base_url, table, &[("id", eq(id))])?;
    debug!(%url, "rest: delete");
    let response =
      self.request(Method::DELETE, url).send().await.map_err(|e| StoreError::Transport(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(StoreError::Rejected { status: status.as_u16(), message });
    }
    Ok(())
  }
}

#[async_trait]
impl RecordStore for RestStore {
  async fn list_videos(&self, gallery_id: &str) -> StoreResult<Vec<Video>> {
    self
      .select(
        "videos",
        &[("select", "*".to_string()), ("gallery_id", eq(gallery_id)), ("order", "created_at.desc".to_string())],
      )
      .await
  }

  async fn get_video(&self, id: &str) -> StoreResult<Video> {
    self.select_one("videos", id).await?.ok_or_else(|| StoreError::NotFound(format!("video {id}")))
  }

  async fn insert_video(&self, video: NewVideo) -> StoreResult<Video> {
    self.write_one(Method::POST, "videos", None, &video).await
  }

  async fn update_video(&self, id: &str, patch: VideoPatch) -> StoreResult<Video> {
    self.write_one(Method::PATCH, "videos", Some(id), &stamped(patch)).await
  }

  async fn delete_video(&self, id: &str) -> StoreResult<()> {
    self.delete("videos", id).await
  }

  async fn list_tag_groups(&self, gallery_id: &str) -> StoreResult<Vec<TagGroup>> {
    self
      .select(
        "tag_groups",
        &[("select", "*".to_string()), ("gallery_id", eq(gallery_id)), ("order", "name.asc".to_string())],
      )
      .await
  }

  async fn get_tag_group(&self, id: &str) -> StoreResult<TagGroup> {
    self.select_one("tag_groups", id).await?.ok_or_else(|| StoreError::NotFound(format!("tag group {id}")))
  }

  async fn insert_tag_group(&self, group: NewTagGroup) -> StoreResult<TagGroup> {
    self.write_one(Method::POST, "tag_groups", None, &group).await
  }

  async fn update_tag_group(&self, id: &str, patch: TagGroupPatch) -> StoreResult<TagGroup> {
    self.write_one(Method::PATCH, "tag_groups", Some(id), &stamped(patch)).await
  }

  async fn delete_tag_group(&self, id: &str) -> StoreResult<()> {
    self.delete("tag_groups", id).await
  }

  async fn get_gallery(&self, id: &str) -> StoreResult<Option<Gallery>> {
    self.select_one("galleries", id).await
  }

  async fn list_galleries(&self, filter: &GalleryFilter) -> StoreResult<Vec<Gallery>> {
    let Some(params) = gallery_filter_params(filter) else {
      debug!("rest: owned galleries requested without a viewer");
      return Ok(Vec::new());
    };
    self.select("galleries", &params).await
  }

  async fn insert_gallery(&self, gallery: NewGallery) -> StoreResult<Gallery> {
    self.write_one(Method::POST, "galleries", None, &gallery).await
  }

  async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
    self.select_one("profiles", user_id).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_url_encodes_filters() {
    let url = table_url(
      "https://demo.example.co/",
      "videos",
      &[("gallery_id", eq("g 1")), ("order", "created_at.desc".to_string())],
    )
    .unwrap();
    assert_eq!(url.path(), "/rest/v1/videos");
    let pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    assert_eq!(pairs[0], ("gallery_id".to_string(), "eq.g 1".to_string()));
    assert_eq!(pairs[1], ("order".to_string(), "created_at.desc".to_string()));
  }

  #[test]
  fn table_url_rejects_garbage_base() {
    assert!(table_url("not a url", "videos", &[]).is_err());
  }

  #[test]
  fn anonymous_gallery_params_public_only() {
    let params = gallery_filter_params(&GalleryFilter::default()).unwrap();
    assert!(params.contains(&("visibility", "eq.public".to_string())));
    assert!(!params.iter().any(|(k, _)| *k == "or"));
  }

  #[test]
  fn viewer_gallery_params_include_own_private() {
    let params = gallery_filter_params(&GalleryFilter { viewer: Some("u1".into()), only_owned: false }).unwrap();
    let (_, or) = params.iter().find(|(k, _)| *k == "or").unwrap();
    assert!(or.contains("and(visibility.eq.private,user_id.eq.u1)"));
  }

  #[test]
  fn owned_gallery_params_filter_by_user() {
    let params = gallery_filter_params(&GalleryFilter { viewer: Some("u1".into()), only_owned: true }).unwrap();
    assert!(params.contains(&("user_id", "eq.u1".to_string())));
  }

  #[tokio::test]
  async fn owned_galleries_without_viewer_skip_the_backend() {
    let filter = GalleryFilter { viewer: None, only_owned: true };
    assert!(gallery_filter_params(&filter).is_none());
    // Nothing listens on this port, so any request would fail.
    let store = RestStore::new(RestConfig {
      base_url: "http://127.0.0.1:9".into(),
      anon_key: "anon".into(),
      access_token: None,
    });
    assert!(store.list_galleries(&filter).await.unwrap().is_empty());
  }

  #[test]
  fn stamped_patch_flattens() {
    let body = serde_json::to_value(stamped(TagGroupPatch { tags: Some(vec!["x".into()]), name: None })).unwrap();
    assert_eq!(body["tags"], serde_json::json!(["x"]));
    assert!(body.get("updated_at").is_some());
    assert!(body.get("name").is_none());
  }
}
