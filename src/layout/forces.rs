use std::f32::consts::TAU;

use crate::build::{BuildError, CancelToken};
use crate::util::stable_pair;

use super::point::{Point, point};
use super::quadtree::QuadNode;

const BARNES_HUT_THETA: f32 = 0.72;
const CANCEL_CHECK_INTERVAL: usize = 25;
const GRAVITY: f32 = 0.02;

/// Weighted edge between two indices into the simulated position slice.
#[derive(Clone, Copy, Debug)]
pub(super) struct Spring {
    pub(super) from: usize,
    pub(super) to: usize,
    pub(super) weight: f32,
}

pub(super) struct SimulationParams {
    pub(super) iterations: usize,
    pub(super) spread: f32,
    pub(super) min_distance: f32,
}

pub(super) fn initial_positions(ids: &[&str], spread: f32) -> Vec<Point> {
    let n = ids.len();
    let base_radius = (n as f32).sqrt() * spread;
    ids.iter()
        .enumerate()
        .map(|(index, id)| {
            let angle = (index as f32 / n.max(1) as f32) * TAU;
            let (jx, jy) = stable_pair(id);
            let jitter = point(jx, jy) * (spread * 0.45);
            point(angle.cos(), angle.sin()) * base_radius + jitter
        })
        .collect()
}

struct Repulsion {
    strength: f32,
    cutoff_sq: f32,
}

fn accumulate_repulsion(
    node: &QuadNode,
    index: usize,
    positions: &[Point],
    repulsion: &Repulsion,
    force: &mut Point,
) {
    let position = positions[index];
    if node.mass <= 0.0 || node.bounds.distance_sq_to(position) > repulsion.cutoff_sq {
        return;
    }

    if node.is_leaf() {
        for &other in &node.indices {
            if other == index {
                continue;
            }
            let delta = position - positions[other];
            if delta.length_sq() > repulsion.cutoff_sq {
                continue;
            }
            let distance = delta.length().max(0.5);
            let direction = if delta.length_sq() > 0.0001 {
                delta / distance
            } else {
                Point::fallback_direction(index, other)
            };
            *force += direction * (repulsion.strength / distance);
        }
        return;
    }

    let delta = position - node.center_of_mass;
    let distance = delta.length().max(0.5);
    let can_approximate = !node.bounds.contains(position)
        && (node.bounds.side_length() / distance) < BARNES_HUT_THETA
        && node.mass > 1.0;

    if can_approximate {
        *force += (delta / distance) * (repulsion.strength * node.mass / distance);
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_repulsion(child, index, positions, repulsion, force);
    }
}

/// Cooling force-directed placement; higher spring weight means a shorter,
/// stiffer spring. Repulsion is ignored beyond three ideal edge lengths.
pub(super) fn simulate(
    positions: &mut [Point],
    springs: &[Spring],
    params: &SimulationParams,
    token: &CancelToken,
) -> Result<usize, BuildError> {
    let n = positions.len();
    if n < 2 {
        return Ok(0);
    }

    let base_radius = (n as f32).sqrt() * params.spread;
    let area = (base_radius * 2.4).powi(2);
    let k = (area / n as f32).sqrt().max(24.0);
    let repulsion = Repulsion {
        strength: k * k,
        cutoff_sq: (k * 3.0).powi(2),
    };
    let mut temperature = (k * 5.5).max(140.0);
    let mut displacement = vec![Point::ZERO; n];
    let mut completed = 0;

    for iteration in 0..params.iterations {
        if iteration % CANCEL_CHECK_INTERVAL == 0 {
            token.check()?;
        }

        displacement.fill(Point::ZERO);
        let valid = (0..n)
            .filter(|&index| positions[index].is_finite())
            .collect::<Vec<_>>();
        let Some(tree) = QuadNode::build(positions, valid.clone()) else {
            break;
        };

        for &index in &valid {
            accumulate_repulsion(&tree, index, positions, &repulsion, &mut displacement[index]);
        }

        for spring in springs {
            if spring.from >= n || spring.to >= n || spring.from == spring.to {
                continue;
            }
            let (a, b) = (positions[spring.from], positions[spring.to]);
            if !a.is_finite() || !b.is_finite() {
                continue;
            }

            let delta = a - b;
            let distance = delta.length().max(0.5);
            let direction = delta / distance;
            let weight = spring.weight.clamp(0.0, 1.0);
            let ideal_length = (k * (1.25 - (weight * 0.75))).max(params.min_distance * 1.5);
            let pull = (distance - ideal_length) * 0.18 * (0.5 + weight);

            displacement[spring.from] -= direction * pull;
            displacement[spring.to] += direction * pull;
        }

        for &index in &valid {
            displacement[index] -= positions[index] * GRAVITY;

            let step = displacement[index];
            let length = step.length();
            if length > 0.0 && length.is_finite() {
                positions[index] += step / length * length.min(temperature) * 0.92;
            }
        }

        completed = iteration + 1;
        temperature *= 0.965;
        if temperature < 0.55 {
            break;
        }
    }

    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SimulationParams {
        SimulationParams {
            iterations: 200,
            spread: 120.0,
            min_distance: 19.2,
        }
    }

    #[test]
    fn initial_positions_are_deterministic() {
        let ids = ["a", "b", "c"];
        assert_eq!(initial_positions(&ids, 120.0), initial_positions(&ids, 120.0));
    }

    #[test]
    fn stronger_springs_sit_closer() {
        let ids = ["a", "b", "c", "d"];
        let mut positions = initial_positions(&ids, 120.0);
        let springs = [
            Spring { from: 0, to: 1, weight: 1.0 },
            Spring { from: 2, to: 3, weight: 0.2 },
        ];

        simulate(&mut positions, &springs, &params(), &CancelToken::detached()).unwrap();
        let strong = positions[0].distance(positions[1]);
        let weak = positions[2].distance(positions[3]);
        assert!(strong < weak, "strong {strong} weak {weak}");
    }

    #[test]
    fn non_finite_positions_are_left_alone() {
        let ids = ["a", "b", "c"];
        let mut positions = initial_positions(&ids, 120.0);
        positions[1] = point(f32::NAN, 0.0);

        simulate(&mut positions, &[], &params(), &CancelToken::detached()).unwrap();
        assert!(positions[0].is_finite());
        assert!(positions[2].is_finite());
        assert!(positions[1].x.is_nan());
    }
}
