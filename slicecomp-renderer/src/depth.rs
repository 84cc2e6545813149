//! Draw-order depths for the layers of a slice view.
//!
//! Base layers sit at 0. Sticky layers are stacked above the base in layer
//! order, one step apart. Segmentation layers share a depth above every
//! overlay. Depths are only used to sort draw calls.

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use slicecomp_core::{Layer, LayerId, LayerRole};

/// Depth band configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthPolicy {
    pub overlay_start: f64,
    pub step: f64,
    /// Nominal segmentation depth; raised if overlays reach it.
    pub segmentation_start: f64,
}

impl Default for DepthPolicy {
    fn default() -> Self {
        Self {
            overlay_start: 0.1,
            step: 0.01,
            segmentation_start: 0.5,
        }
    }
}

impl DepthPolicy {
    /// How many overlays fit below the segmentation depth.
    pub fn overlay_capacity(&self) -> usize {
        if self.step <= 0.0 || self.segmentation_start <= self.overlay_start {
            return 0;
        }
        ((self.segmentation_start - self.overlay_start) / self.step).ceil() as usize
    }
}

/// The result of one depth assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthOrder {
    depths: HashMap<LayerId, f64>,
    /// Layers above the base, ascending depth; ties keep layer order.
    overlays: Vec<LayerId>,
    segmentation_depth: Option<f64>,
    degraded: bool,
}

impl DepthOrder {
    pub fn depth(&self, id: LayerId) -> Option<f64> {
        self.depths.get(&id).copied()
    }

    /// Layers drawn over the base layer, back to front.
    pub fn overlays(&self) -> &[LayerId] {
        &self.overlays
    }

    pub fn segmentation_depth(&self) -> Option<f64> {
        self.segmentation_depth
    }

    /// More overlays than the nominal band holds; the segmentation depth was raised.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

/// The smallest depth above `prev` that is at least `step` away, when `step`
/// is usable. A zero, negative or non-finite step, or one too small to change
/// `prev`, falls back to the next representable value.
fn step_above(prev: f64, step: f64) -> f64 {
    let next = if step.is_finite() && step > 0.0 { prev + step } else { prev };
    if next > prev {
        return next;
    }
    let bits = prev.to_bits();
    if prev == 0.0 {
        f64::from_bits(1)
    } else if prev > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Compute depths for `layers` in a single pass over the list.
///
/// Sticky depths are strictly increasing and above the base whatever the
/// policy holds.
pub fn assign_depths(policy: &DepthPolicy, layers: &[&Layer]) -> DepthOrder {
    let mut order = DepthOrder::default();
    let mut next_overlay = if policy.overlay_start.is_finite() && policy.overlay_start > 0.0 {
        policy.overlay_start
    } else {
        step_above(0.0, policy.step)
    };
    let mut last_overlay: Option<f64> = None;
    let mut labels = Vec::new();

    for layer in layers {
        let depth = match layer.role {
            LayerRole::Label => {
                labels.push(layer.id);
                continue;
            }
            LayerRole::Main => 0.0,
            LayerRole::Overlay | LayerRole::Auxiliary if layer.is_sticky() => {
                let depth = next_overlay;
                next_overlay = step_above(depth, policy.step);
                last_overlay = Some(depth);
                order.overlays.push(layer.id);
                depth
            }
            LayerRole::Overlay | LayerRole::Auxiliary => 0.0,
        };
        order.depths.insert(layer.id, depth);
    }

    if !labels.is_empty() {
        let mut seg = if policy.segmentation_start.is_finite() && policy.segmentation_start > 0.0 {
            policy.segmentation_start
        } else {
            step_above(0.0, policy.step)
        };
        if let Some(last) = last_overlay {
            if last >= seg {
                seg = step_above(last, policy.step);
                order.degraded = true;
                warn!(
                    "{} overlays exceed the depth band (capacity {}), segmentation raised to {}",
                    order.overlays.len(),
                    policy.overlay_capacity(),
                    seg
                );
            }
        }
        for id in labels {
            order.depths.insert(id, seg);
            order.overlays.push(id);
        }
        order.segmentation_depth = Some(seg);
    }

    order
}

/// Caches the last assignment and recomputes only when membership changes.
#[derive(Debug, Default)]
pub struct DepthAssigner {
    policy: DepthPolicy,
    membership: Vec<(LayerId, LayerRole, bool)>,
    order: DepthOrder,
}

impl DepthAssigner {
    pub fn new(policy: DepthPolicy) -> Self {
        Self {
            policy,
            membership: Vec::new(),
            order: DepthOrder::default(),
        }
    }

    /// Returns true if the depths were recomputed.
    pub fn assign(&mut self, layers: &[&Layer]) -> bool {
        let membership: Vec<_> = layers.iter().map(|l| (l.id, l.role, l.is_sticky())).collect();
        if membership == self.membership && !self.order.is_empty() {
            return false;
        }
        self.order = assign_depths(&self.policy, layers);
        self.membership = membership;
        debug!("assigned depths to {} layers", self.order.len());
        true
    }

    pub fn order(&self) -> &DepthOrder {
        &self.order
    }

    pub fn policy(&self) -> &DepthPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers() -> Vec<Layer> {
        vec![
            Layer::new(LayerId(1), "main", LayerRole::Main),
            Layer::new(LayerId(2), "ovl_a", LayerRole::Overlay).with_sticky(true),
            Layer::new(LayerId(3), "seg", LayerRole::Label),
            Layer::new(LayerId(4), "ovl_b", LayerRole::Overlay).with_sticky(true),
            Layer::new(LayerId(5), "ovl_c", LayerRole::Overlay),
        ]
    }

    #[test]
    fn test_depth_monotonicity() {
        let layers = layers();
        let refs: Vec<&Layer> = layers.iter().collect();
        let order = assign_depths(&DepthPolicy::default(), &refs);

        let base = order.depth(LayerId(1)).unwrap();
        let a = order.depth(LayerId(2)).unwrap();
        let b = order.depth(LayerId(4)).unwrap();
        let seg = order.depth(LayerId(3)).unwrap();
        assert!(base < a && a < b && b < seg);
        assert_eq!(order.depth(LayerId(5)), Some(0.0), "non-sticky overlay is a base");
        assert_eq!(order.overlays(), &[LayerId(2), LayerId(4), LayerId(3)]);
        assert!(!order.is_degraded());
    }

    #[test]
    fn test_overflow_stays_strictly_increasing() {
        let policy = DepthPolicy {
            overlay_start: 0.1,
            step: 0.1,
            segmentation_start: 0.3,
        };
        assert_eq!(policy.overlay_capacity(), 2);

        let mut layers = vec![Layer::new(LayerId(0), "main", LayerRole::Main)];
        for i in 1..=6 {
            layers.push(Layer::new(LayerId(i), "ovl", LayerRole::Overlay).with_sticky(true));
        }
        layers.push(Layer::new(LayerId(99), "seg", LayerRole::Label));
        let refs: Vec<&Layer> = layers.iter().collect();
        let order = assign_depths(&policy, &refs);

        let depths: Vec<f64> = order.overlays().iter().map(|id| order.depth(*id).unwrap()).collect();
        assert!(depths.windows(2).all(|w| w[0] < w[1]), "depths {:?}", depths);
        assert!(order.is_degraded());
        assert!(order.segmentation_depth().unwrap() > 0.3);
    }

    #[test]
    fn test_degenerate_step_keeps_depths_distinct() {
        let mut layers = vec![Layer::new(LayerId(0), "main", LayerRole::Main)];
        for i in 1..=3 {
            layers.push(Layer::new(LayerId(i), "ovl", LayerRole::Overlay).with_sticky(true));
        }
        layers.push(Layer::new(LayerId(99), "seg", LayerRole::Label));
        let refs: Vec<&Layer> = layers.iter().collect();

        for step in [0.0, -0.01, f64::NAN, f64::INFINITY, 1e-300] {
            for overlay_start in [0.1, 0.0, f64::NAN] {
                let policy = DepthPolicy {
                    overlay_start,
                    step,
                    segmentation_start: 0.5,
                };
                let order = assign_depths(&policy, &refs);
                let depths: Vec<f64> = order.overlays().iter().map(|id| order.depth(*id).unwrap()).collect();
                assert_eq!(depths.len(), 4);
                assert!(depths[0] > 0.0, "step {} start {}: {:?}", step, overlay_start, depths);
                assert!(
                    depths.windows(2).all(|w| w[0] < w[1]),
                    "step {} start {}: {:?}",
                    step,
                    overlay_start,
                    depths
                );
            }
        }
    }

    #[test]
    fn test_step_above() {
        assert!((step_above(0.1, 0.01) - 0.11).abs() < 1e-10);
        assert!(step_above(0.1, 0.0) > 0.1);
        assert!(step_above(0.0, f64::NAN) > 0.0);
        assert!(step_above(-1.0, 0.0) > -1.0);
    }

    #[test]
    fn test_labels_share_depth() {
        let layers = vec![
            Layer::new(LayerId(1), "main", LayerRole::Main),
            Layer::new(LayerId(2), "seg1", LayerRole::Label),
            Layer::new(LayerId(3), "seg2", LayerRole::Label),
        ];
        let refs: Vec<&Layer> = layers.iter().collect();
        let order = assign_depths(&DepthPolicy::default(), &refs);
        assert_eq!(order.depth(LayerId(2)), order.depth(LayerId(3)));
        assert_eq!(order.segmentation_depth(), Some(0.5));
    }

    #[test]
    fn test_assigner_skips_unchanged_membership() {
        let mut layers = layers();
        let mut assigner = DepthAssigner::new(DepthPolicy::default());
        {
            let refs: Vec<&Layer> = layers.iter().collect();
            assert!(assigner.assign(&refs));
        }
        // Opacity is not part of membership.
        layers[1].set_alpha(0.2);
        {
            let refs: Vec<&Layer> = layers.iter().collect();
            assert!(!assigner.assign(&refs));
        }
        layers.swap(1, 3);
        let refs: Vec<&Layer> = layers.iter().collect();
        assert!(assigner.assign(&refs));
        assert_eq!(assigner.order().overlays()[0], LayerId(4));
    }
}
