use super::point::Point;

const PASS_STRENGTHS: [f32; 3] = [0.6, 0.9, 1.2];
const MAX_ITERATIONS_PER_PASS: usize = 8;
const SEPARATION_FACTOR: f32 = 3.2;

/// Per-node radius shrinks as the graph gets denser.
pub fn node_radius(node_count: usize) -> f32 {
    if node_count > 500 {
        3.0
    } else if node_count > 200 {
        4.0
    } else if node_count > 100 {
        5.0
    } else {
        6.0
    }
}

pub fn min_distance(node_count: usize) -> f32 {
    node_radius(node_count) * SEPARATION_FACTOR
}

pub fn iterations_per_pass(node_count: usize) -> usize {
    node_count.div_ceil(50).clamp(1, MAX_ITERATIONS_PER_PASS)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CollisionReport {
    pub min_distance: f32,
    pub passes: usize,
    pub iterations: usize,
    pub adjustments: usize,
}

fn separate_pairs(
    positions: &mut [Point],
    indices: &[usize],
    min_distance: f32,
    strength: f32,
) -> usize {
    let mut collisions = 0;
    for (offset, &i) in indices.iter().enumerate() {
        for &j in &indices[offset + 1..] {
            let delta = positions[i] - positions[j];
            let distance = delta.length();
            if distance >= min_distance {
                continue;
            }

            let direction = if distance > 0.0001 {
                delta / distance
            } else {
                Point::fallback_direction(i, j)
            };
            let shift = direction * ((min_distance - distance) * 0.5 * strength);
            positions[i] += shift;
            positions[j] -= shift;
            collisions += 1;
        }
    }
    collisions
}

/// Pushes apart every pair of `indices` closer than the density-derived
/// minimum distance. `indices` must only reference finite positions.
pub fn resolve_collisions(positions: &mut [Point], indices: &[usize]) -> CollisionReport {
    let node_count = indices.len();
    let mut report = CollisionReport {
        min_distance: min_distance(node_count),
        ..CollisionReport::default()
    };
    if node_count < 2 {
        return report;
    }

    let iterations = iterations_per_pass(node_count);
    for strength in PASS_STRENGTHS {
        report.passes += 1;
        let mut pass_adjustments = 0;

        for _ in 0..iterations {
            report.iterations += 1;
            let collisions = separate_pairs(positions, indices, report.min_distance, strength);
            pass_adjustments += collisions;
            if collisions == 0 {
                break;
            }
        }

        report.adjustments += pass_adjustments;
        if pass_adjustments == 0 {
            break;
        }
    }

    report
}

pub fn centroid(positions: &[Point], indices: &[usize]) -> Option<Point> {
    if indices.is_empty() {
        return None;
    }
    let mut sum = Point::ZERO;
    for &index in indices {
        sum += positions[index];
    }
    Some(sum / indices.len() as f32)
}

/// Radial push for nodes crowding the centroid. Returns the number moved.
pub fn center_cleanup(positions: &mut [Point], indices: &[usize], min_distance: f32) -> usize {
    let Some(center) = centroid(positions, indices) else {
        return 0;
    };

    let center_radius = min_distance * (indices.len() as f32).sqrt() * 0.35;
    if center_radius <= 0.0 {
        return 0;
    }

    let mut moved = 0;
    for &index in indices {
        let offset = positions[index] - center;
        let distance = offset.length();
        if distance >= center_radius {
            continue;
        }

        let direction = if distance > 0.0001 {
            offset / distance
        } else {
            Point::fallback_direction(index, indices.len())
        };
        let depth = (center_radius - distance) / center_radius;
        positions[index] += direction * (depth * min_distance * 0.5);
        moved += 1;
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::super::point::point;
    use super::*;

    #[test]
    fn radius_steps_down_with_density() {
        assert_eq!(node_radius(50), 6.0);
        assert_eq!(node_radius(100), 6.0);
        assert_eq!(node_radius(101), 5.0);
        assert_eq!(node_radius(201), 4.0);
        assert_eq!(node_radius(501), 3.0);
        assert!((min_distance(10) - 19.2).abs() < 1e-5);
    }

    #[test]
    fn iteration_budget_scales_with_count() {
        assert_eq!(iterations_per_pass(2), 1);
        assert_eq!(iterations_per_pass(120), 3);
        assert_eq!(iterations_per_pass(5000), 8);
    }

    #[test]
    fn coincident_nodes_are_separated_over_three_passes() {
        let mut positions = vec![point(10.0, 10.0), point(10.0, 10.0)];
        let report = resolve_collisions(&mut positions, &[0, 1]);

        assert_eq!(report.passes, 3);
        assert_eq!(report.adjustments, 3);
        assert!(positions[0].distance(positions[1]) >= report.min_distance);
    }

    #[test]
    fn separated_layout_stops_after_first_pass() {
        let mut positions = (0..5)
            .map(|index| point(index as f32 * 50.0, 0.0))
            .collect::<Vec<_>>();
        let before = positions.clone();
        let report = resolve_collisions(&mut positions, &[0, 1, 2, 3, 4]);

        assert_eq!(report.passes, 1);
        assert_eq!(report.adjustments, 0);
        assert_eq!(positions, before);
    }

    #[test]
    fn only_listed_indices_move() {
        let mut positions = vec![point(0.0, 0.0), point(1.0, 0.0), point(0.5, 0.0)];
        resolve_collisions(&mut positions, &[0, 1]);
        assert_eq!(positions[2], point(0.5, 0.0));
        assert!(positions[0].x < 0.0 && positions[1].x > 1.0);
    }

    #[test]
    fn center_cleanup_pushes_outward_from_centroid() {
        let mut positions = vec![
            point(-100.0, 0.0),
            point(100.0, 0.0),
            point(0.0, 100.0),
            point(0.0, -100.0),
            point(2.0, 0.0),
        ];
        let moved = center_cleanup(&mut positions, &[0, 1, 2, 3, 4], 19.2);
        assert_eq!(moved, 1);
        assert!(positions[4].x > 2.0);
        assert_eq!(positions[0], point(-100.0, 0.0));
    }
}
