//! Change notifications and the bucket that collects them between updates.
//!
//! Collaborators fire a [`ChangeEvent`] whenever something the renderer
//! depends on changes. Events accumulate in an [`EventBucket`] until the next
//! update pass, which inspects the bucket, runs the affected stages and clears it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A category of change the renderer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// Layers were added, removed or replaced.
    LayersChanged,
    /// The tiling configuration or per-cell layer assignment changed.
    LayoutChanged,
    /// Background color, line styling, interpolation or overall visibility changed.
    AppearanceChanged,
    /// A layer's display mapping (opacity, color map) changed.
    DisplayMappingChanged,
    /// The global segmentation opacity changed.
    SegmentationOpacityChanged,
    /// Zoom factor or pan position changed.
    ZoomPanChanged,
    /// The drawing surface was resized or its pixel ratio changed.
    SurfaceResized,
    /// Selection or hover state changed (thumbnail decoration only).
    SelectionChanged,
}

impl ChangeEvent {
    pub const ALL: [ChangeEvent; 8] = [
        ChangeEvent::LayersChanged,
        ChangeEvent::LayoutChanged,
        ChangeEvent::AppearanceChanged,
        ChangeEvent::DisplayMappingChanged,
        ChangeEvent::SegmentationOpacityChanged,
        ChangeEvent::ZoomPanChanged,
        ChangeEvent::SurfaceResized,
        ChangeEvent::SelectionChanged,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// The set of events fired since the last update pass.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct EventBucket {
    bits: u16,
}

impl EventBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bucket with every event set, used to force a full update.
    pub fn all() -> Self {
        let mut bucket = Self::new();
        for event in ChangeEvent::ALL {
            bucket.fire(event);
        }
        bucket
    }

    pub fn fire(&mut self, event: ChangeEvent) {
        self.bits |= event.bit();
    }

    pub fn has(&self, event: ChangeEvent) -> bool {
        self.bits & event.bit() != 0
    }

    pub fn has_any(&self, events: &[ChangeEvent]) -> bool {
        events.iter().any(|e| self.has(*e))
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn merge(&mut self, other: EventBucket) {
        self.bits |= other.bits;
    }

    pub fn clear(&mut self) {
        self.bits = 0;
    }

    /// Returns the current contents and leaves the bucket empty.
    pub fn take(&mut self) -> EventBucket {
        std::mem::take(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = ChangeEvent> + '_ {
        ChangeEvent::ALL.into_iter().filter(move |e| self.has(*e))
    }
}

impl fmt::Debug for EventBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_and_take() {
        let mut bucket = EventBucket::new();
        assert!(bucket.is_empty());
        bucket.fire(ChangeEvent::ZoomPanChanged);
        bucket.fire(ChangeEvent::ZoomPanChanged);
        assert!(bucket.has(ChangeEvent::ZoomPanChanged));
        assert!(!bucket.has(ChangeEvent::LayersChanged));

        let taken = bucket.take();
        assert!(bucket.is_empty());
        assert_eq!(taken.iter().count(), 1);
    }

    #[test]
    fn test_all_and_merge() {
        let all = EventBucket::all();
        for event in ChangeEvent::ALL {
            assert!(all.has(event));
        }
        let mut a = EventBucket::new();
        let mut b = EventBucket::new();
        a.fire(ChangeEvent::LayersChanged);
        b.fire(ChangeEvent::SurfaceResized);
        a.merge(b);
        assert!(a.has_any(&[ChangeEvent::SurfaceResized]));
        assert!(a.has(ChangeEvent::LayersChanged));
    }
}
