use crate::model::Video;
use crate::tags::ActiveTags;

/// Combined tag and title predicate over videos.
pub struct VideoFilter<'a> {
  active: &'a ActiveTags,
  needle: String,
}

impl<'a> VideoFilter<'a> {
  pub fn new(active: &'a ActiveTags, search: &str) -> Self {
    Self { active, needle: search.to_lowercase() }
  }

  /// Every selected tag of every active group must be on the video.
  /// A video without the group, or without any tag mapping, fails an active group.
  pub fn matches_tags(&self, video: &Video) -> bool {
    self.active.iter().all(|(group, selected)| {
      if selected.is_empty() {
        return true;
      }
      match video.tags_in(group) {
        Some(tags) => selected.iter().all(|tag| tags.contains(tag)),
        None => false,
      }
    })
  }

  /// Case-insensitive substring match on the title; an empty search matches everything.
  pub fn matches_text(&self, video: &Video) -> bool {
    self.needle.is_empty() || video.title.to_lowercase().contains(&self.needle)
  }

  pub fn matches(&self, video: &Video) -> bool {
    self.matches_tags(video) && self.matches_text(video)
  }

  /// Matching videos in their original order.
  pub fn apply<'v>(&self, videos: &'v [Video]) -> Vec<&'v Video> {
    videos.iter().filter(|v| self.matches(v)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::VideoTags;
  use chrono::Utc;

  fn video(title: &str, tags: Option<&[(&str, &[&str])]>) -> Video {
    let tags = tags.map(|groups| {
      groups
        .iter()
        .map(|(g, ts)| (g.to_string(), ts.iter().map(|t| t.to_string()).collect()))
        .collect::<VideoTags>()
    });
    Video {
      id: title.to_lowercase().replace(' ', "-"),
      gallery_id: "g1".into(),
      title: title.into(),
      description: None,
      youtube_id: "yt".into(),
      tags,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn titles(matched: Vec<&Video>) -> Vec<&str> {
    matched.into_iter().map(|v| v.title.as_str()).collect()
  }

  #[test]
  fn single_group_selection() {
    let videos =
      vec![video("Intro", Some(&[("skill", &["passing"])])), video("Drill A", Some(&[("skill", &["shooting"])]))];
    let mut active = ActiveTags::new();
    active.toggle("skill", "passing");
    assert_eq!(titles(VideoFilter::new(&active, "").apply(&videos)), vec!["Intro"]);
  }

  #[test]
  fn intra_group_requires_all_selected() {
    let both = video("Both", Some(&[("skill", &["passing", "shooting"])]));
    let one = video("One", Some(&[("skill", &["passing"])]));
    let mut active = ActiveTags::new();
    active.toggle("skill", "passing");
    active.toggle("skill", "shooting");
    let filter = VideoFilter::new(&active, "");
    assert!(filter.matches(&both));
    assert!(!filter.matches(&one));
  }

  #[test]
  fn inter_group_requires_all_groups() {
    let v = video("V", Some(&[("skill", &["passing"]), ("level", &["u10"])]));
    let mut active = ActiveTags::new();
    active.toggle("skill", "passing");
    active.toggle("level", "u12");
    assert!(!VideoFilter::new(&active, "").matches(&v));
    active.toggle("level", "u12");
    active.toggle("level", "u10");
    assert!(VideoFilter::new(&active, "").matches(&v));
  }

  #[test]
  fn missing_group_excludes() {
    let v = video("V", Some(&[("skill", &["passing"])]));
    let mut active = ActiveTags::new();
    active.toggle("level", "u10");
    assert!(!VideoFilter::new(&active, "").matches(&v));
  }

  #[test]
  fn missing_mapping_only_matches_without_tag_filter() {
    let v = video("Untagged", None);
    assert!(VideoFilter::new(&ActiveTags::new(), "").matches(&v));
    assert!(VideoFilter::new(&ActiveTags::new(), "untag").matches(&v));
    let mut active = ActiveTags::new();
    active.toggle("skill", "passing");
    assert!(!VideoFilter::new(&active, "").matches(&v));
  }

  #[test]
  fn empty_selection_imposes_nothing() {
    let active: ActiveTags = serde_json::from_str(r#"{"skill":[]}"#).unwrap();
    assert!(VideoFilter::new(&active, "").matches(&video("V", None)));
  }

  #[test]
  fn search_is_case_insensitive_substring() {
    let videos = vec![video("Drill A", None), video("intro DRILLs", None), video("passing basics", None)];
    for term in ["drill", "DRILL", "DrIlL"] {
      assert_eq!(titles(VideoFilter::new(&ActiveTags::new(), term).apply(&videos)), vec!["Drill A", "intro DRILLs"]);
    }
  }

  #[test]
  fn tags_and_text_combine() {
    let videos = vec![video("Passing drill", Some(&[("skill", &["passing"])])), video("Passing game", None)];
    let mut active = ActiveTags::new();
    active.toggle("skill", "passing");
    assert_eq!(titles(VideoFilter::new(&active, "game").apply(&videos)), Vec::<&str>::new());
    assert_eq!(titles(VideoFilter::new(&active, "drill").apply(&videos)), vec!["Passing drill"]);
  }
}
