use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Tag assignment on a video: group name -> tag names.
pub type VideoTags = BTreeMap<String, Vec<String>>;

/// Who may read a gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
  Public,
  Private,
  Authenticated,
}

impl Visibility {
  pub const ALL: [Visibility; 3] = [Visibility::Public, Visibility::Authenticated, Visibility::Private];

  pub fn label(self) -> &'static str {
    match self {
      Visibility::Public => "public",
      Visibility::Private => "private",
      Visibility::Authenticated => "authenticated",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|v| v.label().eq_ignore_ascii_case(s.trim()))
  }

  /// Read access for `viewer` (None when signed out) on a gallery owned by `owner`.
  pub fn readable_by(self, owner: &str, viewer: Option<&str>) -> bool {
    match self {
      Visibility::Public => true,
      Visibility::Authenticated => viewer.is_some(),
      Visibility::Private => viewer == Some(owner),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  Gaming,
  Music,
  Education,
  Entertainment,
  Other,
}

impl Category {
  pub const ALL: [Category; 5] =
    [Category::Gaming, Category::Music, Category::Education, Category::Entertainment, Category::Other];

  pub fn label(self) -> &'static str {
    match self {
      Category::Gaming => "gaming",
      Category::Music => "music",
      Category::Education => "education",
      Category::Entertainment => "entertainment",
      Category::Other => "other",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|c| c.label().eq_ignore_ascii_case(s.trim()))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gallery {
  pub id: String,
  pub user_id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub visibility: Visibility,
  pub category: Category,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
  pub id: String,
  pub gallery_id: String,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  pub youtube_id: String,
  #[serde(default, deserialize_with = "lenient_tags")]
  pub tags: Option<VideoTags>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Video {
  /// Tags stored for `group`, if the video has that group at all.
  pub fn tags_in(&self, group: &str) -> Option<&[String]> {
    self.tags.as_ref()?.get(group).map(Vec::as_slice)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagGroup {
  pub id: String,
  pub gallery_id: String,
  pub name: String,
  #[serde(default)]
  pub tags: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub id: String,
  pub username: String,
}

// --- Write payloads ---

#[derive(Debug, Clone, Serialize)]
pub struct NewVideo {
  pub gallery_id: String,
  pub title: String,
  pub description: Option<String>,
  pub youtube_id: String,
  pub tags: VideoTags,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub youtube_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tags: Option<VideoTags>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTagGroup {
  pub gallery_id: String,
  pub name: String,
  pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TagGroupPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGallery {
  pub user_id: String,
  pub name: String,
  pub description: String,
  pub visibility: Visibility,
  pub category: Category,
}

/// Accept any JSON object for `tags`, keeping only entries whose value is an array of strings.
/// Rows written by older clients occasionally carry scalars or nested objects here.
fn lenient_tags<'de, D>(deserializer: D) -> Result<Option<VideoTags>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
  let Some(serde_json::Value::Object(map)) = raw else {
    return Ok(None);
  };
  let tags = map
    .into_iter()
    .filter_map(|(group, value)| {
      let serde_json::Value::Array(items) = value else { return None };
      let names: Option<Vec<String>> = items.into_iter().map(|v| v.as_str().map(str::to_string)).collect();
      names.map(|names| (group, names))
    })
    .collect();
  Ok(Some(tags))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn video_json(tags: serde_json::Value) -> serde_json::Value {
    json!({
      "id": "v1",
      "gallery_id": "g1",
      "title": "Intro",
      "youtube_id": "dQw4w9WgXcQ",
      "tags": tags,
      "created_at": "2024-03-01T10:00:00Z",
      "updated_at": "2024-03-01T10:00:00Z"
    })
  }

  #[test]
  fn visibility_read_access() {
    assert!(Visibility::Public.readable_by("owner", None));
    assert!(!Visibility::Authenticated.readable_by("owner", None));
    assert!(Visibility::Authenticated.readable_by("owner", Some("someone")));
    assert!(!Visibility::Private.readable_by("owner", Some("someone")));
    assert!(Visibility::Private.readable_by("owner", Some("owner")));
  }

  #[test]
  fn visibility_and_category_parse() {
    assert_eq!(Visibility::parse(" Private "), Some(Visibility::Private));
    assert_eq!(Visibility::parse("secret"), None);
    assert_eq!(Category::parse("MUSIC"), Some(Category::Music));
    assert_eq!(Category::parse("movies"), None);
  }

  #[test]
  fn video_tags_deserialize() {
    let v: Video = serde_json::from_value(video_json(json!({"skill": ["passing", "shooting"]}))).unwrap();
    assert_eq!(v.tags_in("skill"), Some(&["passing".to_string(), "shooting".to_string()][..]));
    assert_eq!(v.tags_in("level"), None);
  }

  #[test]
  fn video_tags_drop_malformed_groups() {
    let v: Video =
      serde_json::from_value(video_json(json!({"skill": ["passing"], "level": "easy", "x": [1, 2], "y": {"a": []}})))
        .unwrap();
    let tags = v.tags.unwrap();
    assert_eq!(tags.len(), 1);
    assert!(tags.contains_key("skill"));
  }

  #[test]
  fn video_tags_null_or_missing() {
    let v: Video = serde_json::from_value(video_json(serde_json::Value::Null)).unwrap();
    assert!(v.tags.is_none());

    let mut raw = video_json(json!({}));
    raw.as_object_mut().unwrap().remove("tags");
    let v: Video = serde_json::from_value(raw).unwrap();
    assert!(v.tags.is_none());
  }

  #[test]
  fn patch_skips_unset_fields() {
    let patch = TagGroupPatch { tags: Some(vec!["a".into()]), ..Default::default() };
    assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"tags": ["a"]}));
  }
}
