//! Shareable `vg://` links and in-app navigation history.
//!
//! A gallery link carries the current filter so that opening it reproduces the
//! same view: `vg://gallery/<id>?search=<term>&tags=<percent-encoded JSON>`.
//! Both keys are omitted when empty.

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use tracing::warn;

use crate::constants::constants;
use crate::tags::ActiveTags;

/// Filter state persisted in a gallery link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
  pub search: String,
  pub tags: ActiveTags,
}

impl FilterQuery {
  pub fn is_empty(&self) -> bool {
    self.search.is_empty() && self.tags.is_empty()
  }

  /// Append `search`/`tags` pairs to `url`, leaving out empty ones.
  fn write_to(&self, url: &mut Url) {
    if self.is_empty() {
      return;
    }
    let mut pairs = url.query_pairs_mut();
    if !self.search.is_empty() {
      pairs.append_pair("search", &self.search);
    }
    if !self.tags.is_empty() {
      // Serializing a map of string sets cannot fail.
      let json = serde_json::to_string(&self.tags).unwrap_or_default();
      pairs.append_pair("tags", &urlencoding::encode(&json));
    }
  }

  fn read_from(url: &Url) -> Self {
    let mut query = Self::default();
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "search" => query.search = value.into_owned(),
        "tags" => query.tags = parse_tags(&value),
        _ => {}
      }
    }
    query
  }
}

/// Decode the `tags` value. Anything unreadable becomes an empty selection.
fn parse_tags(value: &str) -> ActiveTags {
  let decoded = urlencoding::decode(value).map(|s| s.into_owned()).unwrap_or_else(|_| value.to_string());
  serde_json::from_str::<ActiveTags>(&decoded)
    .or_else(|_| serde_json::from_str::<ActiveTags>(value))
    .map(ActiveTags::pruned)
    .unwrap_or_else(|e| {
      warn!(err = %e, "link: ignoring malformed tags parameter");
      ActiveTags::new()
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  Galleries,
  Gallery { id: String, query: FilterQuery },
  Video { gallery_id: String, video_id: String },
  ManageTags { id: String },
}

impl Route {
  pub fn gallery(id: impl Into<String>) -> Self {
    Route::Gallery { id: id.into(), query: FilterQuery::default() }
  }

  pub fn to_link(&self) -> String {
    let scheme = &constants().link_scheme;
    let base = match self {
      Route::Galleries => format!("{scheme}://galleries"),
      Route::Gallery { id, .. } => format!("{scheme}://gallery/{}", urlencoding::encode(id)),
      Route::Video { gallery_id, video_id } => {
        format!("{scheme}://gallery/{}/video/{}", urlencoding::encode(gallery_id), urlencoding::encode(video_id))
      }
      Route::ManageTags { id } => format!("{scheme}://gallery/{}/tags", urlencoding::encode(id)),
    };
    let Route::Gallery { query, .. } = self else { return base };
    match Url::parse(&base) {
      Ok(mut url) => {
        query.write_to(&mut url);
        url.to_string()
      }
      Err(_) => base,
    }
  }

  pub fn parse(link: &str) -> Result<Self> {
    let url = Url::parse(link.trim()).with_context(|| format!("Not a valid link: {link}"))?;
    if url.scheme() != constants().link_scheme {
      return Err(anyhow!("Unsupported link scheme '{}'", url.scheme()));
    }
    let segments: Vec<String> = url
      .path_segments()
      .map(|s| {
        s.filter(|p| !p.is_empty())
          .map(|p| urlencoding::decode(p).map(|d| d.into_owned()))
          .collect::<Result<Vec<String>, _>>()
      })
      .transpose()
      .context("Link path is not valid UTF-8")?
      .unwrap_or_default();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    match (url.host_str(), segments.as_slice()) {
      (Some("galleries"), []) => Ok(Route::Galleries),
      (Some("gallery"), [id]) => Ok(Route::Gallery { id: id.to_string(), query: FilterQuery::read_from(&url) }),
      (Some("gallery"), [id, "video", video_id]) => {
        Ok(Route::Video { gallery_id: id.to_string(), video_id: video_id.to_string() })
      }
      (Some("gallery"), [id, "tags"]) => Ok(Route::ManageTags { id: id.to_string() }),
      _ => Err(anyhow!("Unrecognized link: {link}")),
    }
  }
}

/// Navigation stack. `push` for moves the user can step back from, `replace` for
/// state changes (filter edits) that should not pile up history entries.
#[derive(Debug, Clone)]
pub struct History {
  entries: Vec<Route>,
}

impl History {
  pub fn new(start: Route) -> Self {
    Self { entries: vec![start] }
  }

  pub fn current(&self) -> &Route {
    // Never empty: `back` refuses to pop the last entry.
    &self.entries[self.entries.len() - 1]
  }

  pub fn push(&mut self, route: Route) {
    if self.current() != &route {
      self.entries.push(route);
    }
  }

  pub fn replace(&mut self, route: Route) {
    let last = self.entries.len() - 1;
    self.entries[last] = route;
  }

  /// Step back one entry. Returns false when already at the start.
  pub fn back(&mut self) -> bool {
    if self.entries.len() > 1 {
      self.entries.pop();
      true
    } else {
      false
    }
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.entries.len()
  }
}
