use rstar::{RTree, RTreeObject, AABB};

use slicecomp_core::PixelRect;

/// An entry in the R-tree, referencing a viewport by its position in the layout.
#[derive(Debug, Clone)]
pub struct ViewportEntry {
    /// Index into the layout's viewport list.
    pub index: usize,
    pub rect: PixelRect,
    pub thumbnail: bool,
}

impl RTreeObject for ViewportEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.x as f64, self.rect.y as f64],
            [self.rect.right() as f64, self.rect.top() as f64],
        )
    }
}

/// Spatial index for mapping a pointer position to the viewport under it.
#[derive(Default)]
pub struct ViewportIndex {
    tree: RTree<ViewportEntry>,
}

impl std::fmt::Debug for ViewportIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportIndex")
            .field("len", &self.tree.size())
            .finish()
    }
}

impl ViewportIndex {
    pub fn build(entries: Vec<ViewportEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// The viewport containing the point. Thumbnails are drawn on top and win;
    /// shared edges belong to the right/upper viewport.
    pub fn query_point(&self, x: f64, y: f64) -> Option<&ViewportEntry> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .filter(|e| e.rect.contains(x, y))
            .min_by_key(|e| (!e.thumbnail, e.index))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> ViewportIndex {
        ViewportIndex::build(vec![
            ViewportEntry {
                index: 0,
                rect: PixelRect::new(0, 0, 100, 100),
                thumbnail: false,
            },
            ViewportEntry {
                index: 1,
                rect: PixelRect::new(100, 0, 100, 100),
                thumbnail: false,
            },
            ViewportEntry {
                index: 2,
                rect: PixelRect::new(170, 70, 25, 25),
                thumbnail: true,
            },
        ])
    }

    #[test]
    fn test_point_query() {
        let index = index();
        assert_eq!(index.query_point(50.0, 50.0).unwrap().index, 0);
        // Shared edge belongs to the right-hand cell.
        assert_eq!(index.query_point(100.0, 50.0).unwrap().index, 1);
        // Thumbnail wins over the cell underneath.
        assert_eq!(index.query_point(180.0, 80.0).unwrap().index, 2);
        assert!(index.query_point(250.0, 50.0).is_none());
        assert_eq!(index.len(), 3);
        assert!(ViewportIndex::default().query_point(0.0, 0.0).is_none());
    }
}
