use super::point::{Point, point};

const QUADTREE_LEAF_CAPACITY: usize = 12;
const QUADTREE_MAX_DEPTH: usize = 10;

#[derive(Clone, Copy)]
pub(super) struct QuadBounds {
    pub(super) center: Point,
    pub(super) half_extent: f32,
}

impl QuadBounds {
    fn from_points(points: &[Point], indices: &[usize]) -> Option<Self> {
        let mut min = point(f32::INFINITY, f32::INFINITY);
        let mut max = point(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for &index in indices {
            let position = points[index];
            min.x = min.x.min(position.x);
            min.y = min.y.min(position.y);
            max.x = max.x.max(position.x);
            max.y = max.y.max(position.y);
        }

        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        let center = (min + max) * 0.5;
        let span_x = (max.x - min.x).max(1.0);
        let span_y = (max.y - min.y).max(1.0);
        let half_extent = (span_x.max(span_y) * 0.5) + 1.0;

        Some(Self {
            center,
            half_extent,
        })
    }

    pub(super) fn contains(self, position: Point) -> bool {
        (position.x - self.center.x).abs() <= self.half_extent
            && (position.y - self.center.y).abs() <= self.half_extent
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let offset = match quadrant {
            0 => point(-quarter, -quarter),
            1 => point(quarter, -quarter),
            2 => point(-quarter, quarter),
            _ => point(quarter, quarter),
        };

        Self {
            center: self.center + offset,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, position: Point) -> usize {
        let right = position.x >= self.center.x;
        let upper = position.y >= self.center.y;
        match (right, upper) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    pub(super) fn side_length(self) -> f32 {
        self.half_extent * 2.0
    }

    pub(super) fn distance_sq_to(self, position: Point) -> f32 {
        let dx = ((position.x - self.center.x).abs() - self.half_extent).max(0.0);
        let dy = ((position.y - self.center.y).abs() - self.half_extent).max(0.0);
        (dx * dx) + (dy * dy)
    }
}

/// Barnes-Hut cell over a subset of positions.
pub(super) struct QuadNode {
    pub(super) bounds: QuadBounds,
    pub(super) center_of_mass: Point,
    pub(super) mass: f32,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    /// Builds over `indices` only; callers filter out non-finite positions.
    pub(super) fn build(positions: &[Point], indices: Vec<usize>) -> Option<Self> {
        let bounds = QuadBounds::from_points(positions, &indices)?;
        Some(Self::build_node(bounds, indices, positions, 0))
    }

    fn build_node(
        bounds: QuadBounds,
        indices: Vec<usize>,
        positions: &[Point],
        depth: usize,
    ) -> Self {
        let mut center_of_mass = Point::ZERO;
        for &index in &indices {
            center_of_mass += positions[index];
        }

        let mass = indices.len() as f32;
        if mass > 0.0 {
            center_of_mass = center_of_mass / mass;
        }

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= QUADTREE_MAX_DEPTH || node.indices.len() <= QUADTREE_LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            let quadrant = bounds.quadrant_for(positions[index]);
            buckets[quadrant].push(index);
        }

        let non_empty = buckets.iter().filter(|bucket| !bucket.is_empty()).count();
        if non_empty <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }

            node.children[quadrant] = Some(Box::new(Self::build_node(
                bounds.child(quadrant),
                bucket,
                positions,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_and_center_cover_all_points() {
        let positions = (0..50)
            .map(|index| point((index % 10) as f32 * 10.0, (index / 10) as f32 * 10.0))
            .collect::<Vec<_>>();
        let tree = QuadNode::build(&positions, (0..positions.len()).collect()).unwrap();

        assert_eq!(tree.mass, 50.0);
        assert!(!tree.is_leaf());
        assert!((tree.center_of_mass.x - 45.0).abs() < 1e-3);
        assert!((tree.center_of_mass.y - 20.0).abs() < 1e-3);
    }

    #[test]
    fn distance_to_bounds_is_zero_inside() {
        let bounds = QuadBounds {
            center: Point::ZERO,
            half_extent: 10.0,
        };
        assert_eq!(bounds.distance_sq_to(point(5.0, -5.0)), 0.0);
        assert_eq!(bounds.distance_sq_to(point(13.0, 14.0)), 9.0 + 16.0);
    }

    #[test]
    fn empty_index_set_has_no_tree() {
        assert!(QuadNode::build(&[point(1.0, 1.0)], Vec::new()).is_none());
    }
}
