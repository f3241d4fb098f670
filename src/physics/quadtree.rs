use emath::{Vec2, vec2};

const QUADTREE_LEAF_CAPACITY: usize = 12;
const QUADTREE_MAX_DEPTH: usize = 10;
const MIN_HALF_EXTENT: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
pub(super) struct QuadBounds {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl QuadBounds {
    fn from_points(points: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for point in points {
            if !point.x.is_finite() || !point.y.is_finite() {
                continue;
            }
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        let center = (min + max) * 0.5;
        let span = (max.x - min.x).max(max.y - min.y);
        let half_extent = (span * 0.5).max(MIN_HALF_EXTENT) + MIN_HALF_EXTENT;

        Some(Self {
            center,
            half_extent,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        (point.x - self.center.x).abs() <= self.half_extent
            && (point.y - self.center.y).abs() <= self.half_extent
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let offset = match quadrant {
            0 => vec2(-quarter, -quarter),
            1 => vec2(quarter, -quarter),
            2 => vec2(-quarter, quarter),
            _ => vec2(quarter, quarter),
        };

        Self {
            center: self.center + offset,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, point: Vec2) -> usize {
        let right = point.x >= self.center.x;
        let lower = point.y >= self.center.y;
        match (right, lower) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    pub(super) fn side_length(self) -> f32 {
        self.half_extent * 2.0
    }

    /// Squared gap between two cells, zero when they touch or overlap.
    pub(super) fn distance_sq_to(self, other: Self) -> f32 {
        let reach = self.half_extent + other.half_extent;
        let dx = ((self.center.x - other.center.x).abs() - reach).max(0.0);
        let dy = ((self.center.y - other.center.y).abs() - reach).max(0.0);
        (dx * dx) + (dy * dy)
    }
}

pub(super) struct QuadNode {
    pub(super) bounds: QuadBounds,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    fn build_node(
        bounds: QuadBounds,
        indices: Vec<usize>,
        positions: &[Vec2],
        depth: usize,
    ) -> Self {
        let mut center_of_mass = Vec2::ZERO;
        for &index in &indices {
            center_of_mass += positions[index];
        }

        let mass = indices.len() as f32;
        if mass > 0.0 {
            center_of_mass /= mass;
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

        // Coincident points can never be separated by splitting.
        let first = positions[node.indices[0]];
        if node.indices.iter().all(|&index| positions[index] == first) {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            let quadrant = bounds.quadrant_for(positions[index]);
            buckets[quadrant].push(index);
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

    pub(super) fn children(&self) -> impl Iterator<Item = &QuadNode> {
        self.children.iter().filter_map(|child| child.as_deref())
    }
}

/// Quadtree over one tick's node positions.
///
/// Rebuilt from scratch every step since every position moves. Non-finite
/// positions are left out of the tree.
pub struct SpatialIndex {
    pub(super) root: Option<QuadNode>,
}

impl SpatialIndex {
    pub fn build(positions: &[Vec2]) -> Self {
        let root = QuadBounds::from_points(positions).map(|bounds| {
            let indices = (0..positions.len())
                .filter(|&index| positions[index].x.is_finite() && positions[index].y.is_finite())
                .collect::<Vec<_>>();
            QuadNode::build_node(bounds, indices, positions, 0)
        });
        Self { root }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &QuadNode) -> usize {
            1 + node.children().map(depth_of).max().unwrap_or(0)
        }
        self.root.as_ref().map(depth_of).unwrap_or(0)
    }

    /// Total mass under the root. Equals the number of indexed positions.
    pub fn mass(&self) -> f32 {
        self.root.as_ref().map(|root| root.mass).unwrap_or(0.0)
    }
}
