use tokio::sync::broadcast;
use tracing::debug;

use crate::model::{Gallery, Video};

/// Changes published by the service after the store confirms a write.
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryEvent {
  VideoAdded { gallery_id: String, video: Video },
  VideoUpdated { gallery_id: String, video: Video },
  VideoDeleted { gallery_id: String, video_id: String },
  TagGroupsChanged { gallery_id: String },
  GalleryCreated { gallery: Gallery },
}

impl GalleryEvent {
  pub fn gallery_id(&self) -> &str {
    match self {
      GalleryEvent::VideoAdded { gallery_id, .. }
      | GalleryEvent::VideoUpdated { gallery_id, .. }
      | GalleryEvent::VideoDeleted { gallery_id, .. }
      | GalleryEvent::TagGroupsChanged { gallery_id } => gallery_id,
      GalleryEvent::GalleryCreated { gallery } => &gallery.id,
    }
  }
}

/// Publish/subscribe channel owned by the service container.
#[derive(Clone)]
pub struct EventBus {
  tx: broadcast::Sender<GalleryEvent>,
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<GalleryEvent> {
    self.tx.subscribe()
  }

  /// Send to current subscribers. Having none is not an error.
  pub fn publish(&self, event: GalleryEvent) {
    let gallery_id = event.gallery_id().to_string();
    match self.tx.send(event) {
      Ok(receivers) => debug!(gallery = %gallery_id, receivers, "event published"),
      Err(_) => debug!(gallery = %gallery_id, "event dropped: no subscribers"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_receive_published_events() {
    let bus = EventBus::new(8);
    let mut rx = bus.subscribe();
    bus.publish(GalleryEvent::TagGroupsChanged { gallery_id: "g1".into() });
    let event = rx.recv().await.unwrap();
    assert_eq!(event.gallery_id(), "g1");
  }

  #[test]
  fn publish_without_subscribers_is_silent() {
    let bus = EventBus::new(8);
    bus.publish(GalleryEvent::VideoDeleted { gallery_id: "g1".into(), video_id: "v1".into() });
  }
}
