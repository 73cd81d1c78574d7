//! Parsing of the single-line prompts used to create records.
//!
//! Fields are separated by `|`, e.g. a video:
//! `Passing drill | https://youtu.be/dQw4w9WgXcQ | skill:passing,first touch; level:u10`

use anyhow::{Result, anyhow};

use crate::model::{Category, Visibility, VideoTags};
use crate::youtube::parse_video_id;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoForm {
  pub title: String,
  pub youtube_id: String,
  pub description: Option<String>,
  pub tags: VideoTags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryForm {
  pub name: String,
  pub visibility: Visibility,
  pub category: Category,
  pub description: String,
}

fn fields(line: &str) -> Vec<&str> {
  line.split('|').map(str::trim).collect()
}

/// Parse `group:tag,tag; group:tag`. Duplicate tags within a group are dropped.
pub fn parse_tag_list(text: &str) -> Result<VideoTags> {
  let mut tags = VideoTags::new();
  for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
    let (group, names) = part.split_once(':').ok_or_else(|| anyhow!("Tag entry '{}' needs the form group:tag", part))?;
    let group = group.trim();
    if group.is_empty() {
      return Err(anyhow!("Tag entry '{}' has no group name", part));
    }
    let entry = tags.entry(group.to_string()).or_default();
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
      if !entry.iter().any(|t| t == name) {
        entry.push(name.to_string());
      }
    }
  }
  tags.retain(|_, names| !names.is_empty());
  Ok(tags)
}

/// `title | youtube url or id [| tags [| description]]`
pub fn parse_video_form(line: &str) -> Result<VideoForm> {
  let parts = fields(line);
  let title = parts.first().copied().unwrap_or_default();
  if title.is_empty() {
    return Err(anyhow!("Title is required"));
  }
  let source = parts.get(1).copied().unwrap_or_default();
  let youtube_id = parse_video_id(source).ok_or_else(|| anyhow!("'{}' is not a YouTube link or video id", source))?;
  let tags = parts.get(2).map(|s| parse_tag_list(s)).transpose()?.unwrap_or_default();
  let description = parts.get(3).filter(|s| !s.is_empty()).map(|s| s.to_string());
  Ok(VideoForm { title: title.to_string(), youtube_id, description, tags })
}

/// `name [| visibility [| category [| description]]]`, defaulting to public/other.
pub fn parse_gallery_form(line: &str) -> Result<GalleryForm> {
  let parts = fields(line);
  let name = parts.first().copied().unwrap_or_default();
  if name.is_empty() {
    return Err(anyhow!("Gallery name is required"));
  }
  let visibility = match parts.get(1).filter(|s| !s.is_empty()) {
    Some(s) => Visibility::parse(s).ok_or_else(|| anyhow!("Visibility must be public, authenticated or private"))?,
    None => Visibility::Public,
  };
  let category = match parts.get(2).filter(|s| !s.is_empty()) {
    Some(s) => Category::parse(s).ok_or_else(|| {
      let names: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
      anyhow!("Category must be one of: {}", names.join(", "))
    })?,
    None => Category::Other,
  };
  let description = parts.get(3).copied().unwrap_or_default().to_string();
  Ok(GalleryForm { name: name.to_string(), visibility, category, description })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tag_spec_groups_and_dedup() {
    let tags = parse_tag_list("skill: passing, first touch ,passing; level:u10;").unwrap();
    assert_eq!(tags["skill"], vec!["passing", "first touch"]);
    assert_eq!(tags["level"], vec!["u10"]);
  }

  #[test]
  fn tag_spec_errors() {
    assert!(parse_tag_list("passing").is_err());
    assert!(parse_tag_list(":passing").is_err());
    assert!(parse_tag_list("").unwrap().is_empty());
    assert!(parse_tag_list("skill:").unwrap().is_empty());
  }

  #[test]
  fn full_video_form() {
    let form = parse_video_form("Passing drill | https://youtu.be/dQw4w9WgXcQ | skill:passing | Warm-up").unwrap();
    assert_eq!(form.title, "Passing drill");
    assert_eq!(form.youtube_id, "dQw4w9WgXcQ");
    assert_eq!(form.tags["skill"], vec!["passing"]);
    assert_eq!(form.description.as_deref(), Some("Warm-up"));
  }

  #[test]
  fn minimal_video_form() {
    let form = parse_video_form("Intro | dQw4w9WgXcQ").unwrap();
    assert!(form.tags.is_empty());
    assert_eq!(form.description, None);
  }

  #[test]
  fn video_form_requires_title_and_id() {
    assert!(parse_video_form(" | dQw4w9WgXcQ").is_err());
    assert!(parse_video_form("Intro").is_err());
    assert!(parse_video_form("Intro | https://vimeo.com/1").is_err());
  }

  #[test]
  fn gallery_form_defaults() {
    let form = parse_gallery_form("Football drills").unwrap();
    assert_eq!(form.visibility, Visibility::Public);
    assert_eq!(form.category, Category::Other);

    let form = parse_gallery_form("Mine | private | education | only for me").unwrap();
    assert_eq!(form.visibility, Visibility::Private);
    assert_eq!(form.category, Category::Education);
    assert_eq!(form.description, "only for me");
  }

  #[test]
  fn gallery_form_rejects_unknown_values() {
    assert!(parse_gallery_form("").is_err());
    assert!(parse_gallery_form("x | hidden").is_err());
    assert!(parse_gallery_form("x | public | movies").is_err());
  }
}
