use emath::Vec2;

use crate::graph::{SimEdge, SimNode};
use crate::layout::fallback_direction;

use super::quadtree::{QuadNode, SpatialIndex};

/// Floor on squared distances so coincident bodies never divide by zero.
const MIN_DISTANCE_SQ: f32 = 1.0;
const MIN_LINK_LENGTH: f32 = 1e-3;

impl SpatialIndex {
    /// Charge acceleration on the node at `index`, before alpha scaling.
    ///
    /// A subtree is collapsed into its centre of mass when the query point
    /// lies outside it and `side / distance < theta`. A theta of zero never
    /// collapses anything and yields the exact pairwise sum.
    pub fn approximate_force_on(
        &self,
        index: usize,
        positions: &[Vec2],
        strength: f32,
        theta: f32,
    ) -> Vec2 {
        let mut force = Vec2::ZERO;
        let Some(point) = positions.get(index).copied() else {
            return force;
        };
        if !point.x.is_finite() || !point.y.is_finite() {
            return force;
        }

        if let Some(root) = self.root.as_ref() {
            accumulate_charge_for_node(root, index, point, positions, strength, theta, &mut force);
        }
        force
    }

    /// Every unordered pair whose cells lie within `max_distance` of each
    /// other. Callers still check the real distance of each pair.
    pub fn close_pairs(&self, max_distance: f32) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        if let Some(root) = self.root.as_ref()
            && max_distance > 0.0
        {
            collect_close_pairs(root, root, true, max_distance * max_distance, &mut pairs);
        }
        pairs
    }
}

fn charge_between(point: Vec2, other: Vec2, from: usize, to: usize, strength: f32) -> Vec2 {
    let delta = other - point;
    let distance_sq = delta.length_sq();
    if distance_sq <= f32::EPSILON {
        // Coincident bodies push apart along a stable, index-derived direction.
        return fallback_direction(from, to) * (strength / MIN_DISTANCE_SQ);
    }
    delta * (strength / distance_sq.max(MIN_DISTANCE_SQ))
}

fn accumulate_charge_for_node(
    node: &QuadNode,
    index: usize,
    point: Vec2,
    positions: &[Vec2],
    strength: f32,
    theta: f32,
    force: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    if node.is_leaf() {
        for &other_index in &node.indices {
            if other_index == index {
                continue;
            }
            *force += charge_between(point, positions[other_index], index, other_index, strength);
        }
        return;
    }

    let delta = node.center_of_mass - point;
    let distance_sq = delta.length_sq().max(MIN_DISTANCE_SQ);
    let distance = distance_sq.sqrt();
    let can_approximate = !node.bounds.contains(point)
        && (node.bounds.side_length() / distance) < theta
        && node.mass > 1.0;

    if can_approximate {
        *force += delta * (strength * node.mass / distance_sq);
        return;
    }

    for child in node.children() {
        accumulate_charge_for_node(child, index, point, positions, strength, theta, force);
    }
}

fn collect_close_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    max_distance_sq: f32,
    pairs: &mut Vec<(usize, usize)>,
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > max_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    pairs.push((from, to));
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    pairs.push((from, to));
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_deref() else {
                continue;
            };

            collect_close_pairs(child_a, child_a, true, max_distance_sq, pairs);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_deref() else {
                    continue;
                };
                collect_close_pairs(child_a, child_b, false, max_distance_sq, pairs);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children() {
            collect_close_pairs(child, node_b, false, max_distance_sq, pairs);
        }
    } else {
        for child in node_b.children() {
            collect_close_pairs(node_a, child, false, max_distance_sq, pairs);
        }
    }
}

/// Spring pull for every edge, scaled by alpha. Uses each endpoint's
/// position advanced by its current velocity, and splits the correction so
/// that the endpoint with more edges moves less.
pub(super) fn accumulate_links(
    nodes: &[SimNode],
    edges: &[SimEdge],
    degree: &[usize],
    rest_length: f32,
    alpha: f32,
    accelerations: &mut [Vec2],
) {
    for edge in edges {
        let (source, target) = (edge.source, edge.target);
        if source == target || source >= nodes.len() || target >= nodes.len() {
            continue;
        }

        let source_degree = degree[source].max(1) as f32;
        let target_degree = degree[target].max(1) as f32;
        let strength = 1.0 / source_degree.min(target_degree);
        let bias = source_degree / (source_degree + target_degree);

        let mut delta = (nodes[target].position + nodes[target].velocity)
            - (nodes[source].position + nodes[source].velocity);
        if delta.length_sq() <= MIN_LINK_LENGTH * MIN_LINK_LENGTH {
            delta = fallback_direction(source, target) * MIN_LINK_LENGTH;
        }
        let length = delta.length();
        let correction = delta * ((length - rest_length) / length * alpha * strength);

        accelerations[target] -= correction * bias;
        accelerations[source] += correction * (1.0 - bias);
    }
}

/// Uniform pull moving the centroid toward `target`. Non-finite positions
/// are left out of the centroid.
pub(super) fn accumulate_center(
    nodes: &[SimNode],
    target: Vec2,
    strength: f32,
    accelerations: &mut [Vec2],
) {
    let (sum, count) = nodes
        .iter()
        .map(|node| node.position)
        .filter(|position| position.x.is_finite() && position.y.is_finite())
        .fold((Vec2::ZERO, 0usize), |(sum, count), position| {
            (sum + position, count + 1)
        });
    if count == 0 {
        return;
    }

    let pull = (target - sum / count as f32) * strength;
    for acceleration in accelerations.iter_mut() {
        *acceleration += pull;
    }
}

/// One relaxation sweep over the candidate pairs. Overlapping circles are
/// pushed apart by position only; a pinned node never moves and leaves the
/// whole correction to its partner.
pub(super) fn relax_collision_pairs(
    nodes: &mut [SimNode],
    pairs: &[(usize, usize)],
    margin: f32,
    strength: f32,
) -> usize {
    let mut resolved = 0;
    for &(i, j) in pairs {
        let radius_i = nodes[i].size + margin;
        let radius_j = nodes[j].size + margin;
        let min_distance = radius_i + radius_j;

        let delta = nodes[i].position - nodes[j].position;
        let distance_sq = delta.length_sq();
        if distance_sq >= min_distance * min_distance {
            continue;
        }

        let (direction, distance) = if distance_sq <= f32::EPSILON {
            (fallback_direction(i, j), 0.0)
        } else {
            let distance = distance_sq.sqrt();
            (delta / distance, distance)
        };
        let push = direction * ((min_distance - distance) * strength);

        let pinned_i = nodes[i].is_pinned();
        let pinned_j = nodes[j].is_pinned();
        let share_i = match (pinned_i, pinned_j) {
            (true, true) => continue,
            (true, false) => 0.0,
            (false, true) => 1.0,
            (false, false) => {
                let weight_i = radius_i * radius_i;
                let weight_j = radius_j * radius_j;
                weight_j / (weight_i + weight_j)
            }
        };

        nodes[i].position += push * share_i;
        nodes[j].position -= push * (1.0 - share_i);
        resolved += 1;
    }
    resolved
}

#[cfg(test)]
mod tests {
    use emath::vec2;
    use serde_json::Map;

    use super::*;
    use crate::graph::NodeType;

    fn sim_node(x: f32, y: f32, size: f32) -> SimNode {
        SimNode {
            id: format!("{x}:{y}").into(),
            label: String::new(),
            node_type: NodeType::Person,
            size,
            confidence: 0.5,
            properties: Map::new(),
            position: vec2(x, y),
            velocity: Vec2::ZERO,
            fx: None,
            fy: None,
        }
    }

    fn brute_force(index: usize, positions: &[Vec2], strength: f32) -> Vec2 {
        let mut force = Vec2::ZERO;
        for (other, position) in positions.iter().enumerate() {
            if other != index {
                force += charge_between(positions[index], *position, index, other, strength);
            }
        }
        force
    }

    #[test]
    fn exact_mode_matches_pairwise_sum() {
        let positions = (0..150)
            .map(|i| {
                let angle = i as f32 * 2.399_963;
                vec2(angle.cos(), angle.sin()) * (i as f32).sqrt() * 20.0
            })
            .collect::<Vec<_>>();
        let index = SpatialIndex::build(&positions);

        for node in [0, 17, 149] {
            let exact = index.approximate_force_on(node, &positions, -300.0, 0.0);
            let expected = brute_force(node, &positions, -300.0);
            assert!((exact - expected).length() <= expected.length() * 1e-4 + 1e-4);
        }
    }

    #[test]
    fn repulsion_points_away_from_neighbors() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let index = SpatialIndex::build(&positions);
        let force = index.approximate_force_on(0, &positions, -300.0, 0.9);
        assert!(force.x < 0.0);
        assert!(force.y.abs() < 1e-4);
    }

    #[test]
    fn coincident_bodies_get_finite_forces() {
        let positions = vec![vec2(3.0, 3.0); 20];
        let index = SpatialIndex::build(&positions);
        for node in 0..positions.len() {
            let force = index.approximate_force_on(node, &positions, -300.0, 0.9);
            assert!(force.x.is_finite() && force.y.is_finite());
            assert!(force.length() > 0.0);
        }
    }

    #[test]
    fn coincident_pair_is_pushed_apart() {
        let positions = vec![vec2(5.0, 5.0), vec2(5.0, 5.0)];
        let index = SpatialIndex::build(&positions);
        let first = index.approximate_force_on(0, &positions, -300.0, 0.0);
        let second = index.approximate_force_on(1, &positions, -300.0, 0.0);
        assert!(first.length() > 1.0);
        assert!((first + second).length() < 1e-3);
    }

    #[test]
    fn center_ignores_non_finite_positions() {
        let nodes = vec![
            sim_node(0.0, 0.0, 10.0),
            sim_node(20.0, 0.0, 10.0),
            sim_node(f32::NAN, 0.0, 10.0),
        ];
        let mut accelerations = vec![Vec2::ZERO; 3];
        accumulate_center(&nodes, vec2(10.0, 10.0), 0.1, &mut accelerations);
        for acceleration in &accelerations {
            assert!((*acceleration - vec2(0.0, 1.0)).length() < 1e-5);
        }
    }

    #[test]
    fn close_pairs_cover_every_overlap() {
        let positions = (0..200)
            .map(|i| vec2((i % 20) as f32 * 12.0, (i / 20) as f32 * 12.0))
            .collect::<Vec<_>>();
        let index = SpatialIndex::build(&positions);
        let mut pairs = index.close_pairs(13.0);
        for pair in &mut pairs {
            if pair.0 > pair.1 {
                *pair = (pair.1, pair.0);
            }
        }
        pairs.sort_unstable();

        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                if (positions[i] - positions[j]).length() < 13.0 {
                    assert!(pairs.binary_search(&(i, j)).is_ok(), "missing pair {i},{j}");
                }
            }
        }
        assert!(pairs.len() < positions.len() * (positions.len() - 1) / 2);
    }

    #[test]
    fn link_pulls_distant_endpoints_together() {
        let nodes = vec![sim_node(0.0, 0.0, 10.0), sim_node(300.0, 0.0, 10.0)];
        let edges = vec![SimEdge {
            source: 0,
            target: 1,
            relation: "knows".to_owned(),
            width: 1.0,
            confidence: 1.0,
            properties: Map::new(),
        }];
        let mut accelerations = vec![Vec2::ZERO; 2];
        accumulate_links(&nodes, &edges, &[1, 1], 100.0, 1.0, &mut accelerations);

        assert!((accelerations[0].x - 100.0).abs() < 1e-3);
        assert!((accelerations[1].x + 100.0).abs() < 1e-3);
    }

    #[test]
    fn collision_separates_overlapping_nodes() {
        let mut nodes = vec![sim_node(0.0, 0.0, 10.0), sim_node(4.0, 0.0, 10.0)];
        let resolved = relax_collision_pairs(&mut nodes, &[(0, 1)], 5.0, 1.0);
        assert_eq!(resolved, 1);
        let distance = (nodes[0].position - nodes[1].position).length();
        assert!((distance - 30.0).abs() < 1e-3);
        assert_eq!(nodes[0].velocity, Vec2::ZERO);
    }

    #[test]
    fn pinned_nodes_hold_during_collision() {
        let mut nodes = vec![sim_node(0.0, 0.0, 10.0), sim_node(4.0, 0.0, 10.0)];
        nodes[0].fx = Some(0.0);
        nodes[0].fy = Some(0.0);
        relax_collision_pairs(&mut nodes, &[(0, 1)], 5.0, 1.0);
        assert_eq!(nodes[0].position, Vec2::ZERO);
        assert!((nodes[1].position.x - 30.0).abs() < 1e-3);
    }
}
