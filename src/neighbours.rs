use std::collections::HashMap;

use glam::{DVec2, IVec2};
use rayon::prelude::*;

use crate::part::Particle;

/// Per particle list of the indices of the other particles within the smoothing length.
pub type NeighbourLists = Vec<Vec<usize>>;

/// Uniform grid over the particle positions, with a cell size equal to the smoothing length.
///
/// Since the cell size matches the kernel support, all neighbours of a particle lie in
/// the 3x3 block of cells around the cell containing it.
pub struct NeighbourIndex {
    cell_size: f64,
    cells: HashMap<IVec2, Vec<usize>>,
}

impl NeighbourIndex {
    pub fn new(particles: &[Particle], cell_size: f64) -> Self {
        debug_assert!(cell_size > 0.);
        let mut cells: HashMap<IVec2, Vec<usize>> = HashMap::new();
        for (idx, part) in particles.iter().enumerate() {
            cells
                .entry(Self::cell(part.x, cell_size))
                .or_default()
                .push(idx);
        }
        Self { cell_size, cells }
    }

    /// Bin the particles and compute the neighbour lists of all particles in one go.
    pub fn build(particles: &[Particle], smoothing_length: f64) -> NeighbourLists {
        Self::new(particles, smoothing_length).neighbour_lists(particles)
    }

    fn cell(position: DVec2, cell_size: f64) -> IVec2 {
        (position / cell_size).floor().as_ivec2()
    }

    /// Indices of all particles binned in the 3x3 block of cells around `position`.
    ///
    /// Positions beyond the `i32` cell range share the outermost cells, cells past that
    /// range are skipped.
    pub fn candidates(&self, position: DVec2) -> impl Iterator<Item = usize> + '_ {
        let center = Self::cell(position, self.cell_size);
        (-1..=1)
            .flat_map(move |dx| {
                (-1..=1).filter_map(move |dy| {
                    Some(IVec2::new(
                        center.x.checked_add(dx)?,
                        center.y.checked_add(dy)?,
                    ))
                })
            })
            .filter_map(move |cell| self.cells.get(&cell))
            .flat_map(|idx| idx.iter().copied())
    }

    /// Compute the neighbours of every particle.
    ///
    /// Boundary particles get an empty list: their density and pressure are prescribed.
    pub fn neighbour_lists(&self, particles: &[Particle]) -> NeighbourLists {
        let h2 = self.cell_size * self.cell_size;
        particles
            .par_iter()
            .enumerate()
            .map(|(idx, part)| {
                if part.boundary {
                    return vec![];
                }
                self.candidates(part.x)
                    .filter(|&other| {
                        other != idx && part.x.distance_squared(particles[other].x) <= h2
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use glam::DVec2;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::NeighbourIndex;
    use crate::part::Particle;

    const H: f64 = 2.;

    fn random_particles(count: usize, seed: u64) -> Vec<Particle> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let x = DVec2::new(rng.gen_range(-10. ..10.), rng.gen_range(-10. ..10.));
                Particle::fluid(x, DVec2::ZERO)
            })
            .collect()
    }

    #[test]
    fn test_matches_brute_force() {
        let particles = random_particles(400, 1);
        let neighbours = NeighbourIndex::build(&particles, H);

        for (i, pi) in particles.iter().enumerate() {
            let mut expected: Vec<usize> = particles
                .iter()
                .enumerate()
                .filter(|&(j, pj)| j != i && pi.x.distance(pj.x) <= H)
                .map(|(j, _)| j)
                .collect();
            let mut found = neighbours[i].clone();
            expected.sort_unstable();
            found.sort_unstable();
            assert_eq!(expected, found);
        }
    }

    #[test]
    fn test_far_away_particles() {
        let particles = vec![
            Particle::fluid(DVec2::new(1e10, 0.), DVec2::ZERO),
            Particle::fluid(DVec2::ZERO, DVec2::ZERO),
            Particle::fluid(DVec2::new(1., 0.), DVec2::ZERO),
            Particle::fluid(DVec2::new(1e10 + 1., 0.), DVec2::ZERO),
            Particle::fluid(DVec2::new(-1e12, -1e12), DVec2::ZERO),
            Particle::fluid(DVec2::new(f64::INFINITY, 0.), DVec2::ZERO),
        ];
        let neighbours = NeighbourIndex::build(&particles, H);
        assert_eq!(neighbours[0], vec![3]);
        assert_eq!(neighbours[1], vec![2]);
        assert_eq!(neighbours[2], vec![1]);
        assert_eq!(neighbours[3], vec![0]);
        assert!(neighbours[4].is_empty());
        assert!(neighbours[5].is_empty());
    }

    #[test]
    fn test_symmetric() {
        let particles = random_particles(300, 7);
        let neighbours = NeighbourIndex::build(&particles, H);
        for (i, ngbs) in neighbours.iter().enumerate() {
            assert!(!ngbs.contains(&i));
            for &j in ngbs {
                assert!(neighbours[j].contains(&i), "{j} is a neighbour of {i}, but not vice versa");
            }
        }
    }

    #[test]
    fn test_negative_coordinates() {
        // Particles straddling the origin lie in different cells but within range
        let particles = vec![
            Particle::fluid(DVec2::new(-0.1, -0.1), DVec2::ZERO),
            Particle::fluid(DVec2::new(0.1, 0.1), DVec2::ZERO),
            Particle::fluid(DVec2::new(-1.9, 0.), DVec2::ZERO),
        ];
        let neighbours = NeighbourIndex::build(&particles, H);
        assert_eq!(neighbours[0].len(), 2);
        assert_eq!(neighbours[1], vec![0]);
        assert_eq!(neighbours[2], vec![0]);
    }

    #[test]
    fn test_boundary_particles_have_no_neighbours() {
        let particles = vec![
            Particle::boundary(DVec2::new(0., 0.)),
            Particle::fluid(DVec2::new(1., 0.), DVec2::ZERO),
            Particle::boundary(DVec2::new(2., 0.)),
        ];
        let neighbours = NeighbourIndex::build(&particles, H);
        assert!(neighbours[0].is_empty());
        assert!(neighbours[2].is_empty());
        let mut fluid = neighbours[1].clone();
        fluid.sort_unstable();
        assert_eq!(fluid, vec![0, 2]);
    }
}
