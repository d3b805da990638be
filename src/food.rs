use rand::Rng;
use rand::seq::IteratorRandom;

use crate::border::Border;
use crate::utils::Point;

/// Random draws tried before falling back to enumerating the free cells.
const RANDOM_TRIES_PER_CELL: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Food {
    position: Point,
}

impl Food {
    pub fn new(position: Point) -> Self {
        Self { position }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Moves the food to a uniformly random cell not in `occupied`.
    /// Returns false (and keeps the old position) when every cell is taken.
    pub fn place<R: Rng>(&mut self, occupied: &[Point], border: &Border, rng: &mut R) -> bool {
        match free_cell(occupied, border, rng) {
            Some(pos) => {
                self.position = pos;
                true
            }
            None => false,
        }
    }
}

fn free_cell<R: Rng>(occupied: &[Point], border: &Border, rng: &mut R) -> Option<Point> {
    let tries = border.area().saturating_mul(RANDOM_TRIES_PER_CELL);
    for _ in 0..tries {
        let pos = Point {
            x: rng.gen_range(0..border.width() as i32),
            y: rng.gen_range(0..border.height() as i32),
        };
        if !occupied.contains(&pos) {
            return Some(pos);
        }
    }
    // crowded board: pick among what is actually left
    border.cells().filter(|c| !occupied.contains(c)).choose(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_place_avoids_occupied() {
        let border = Border::new(4, 4).unwrap();
        let occupied: Vec<Point> = border.cells().filter(|c| c.y < 3).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut food = Food::new(Point::new(0, 0));
        for _ in 0..50 {
            assert!(food.place(&occupied, &border, &mut rng));
            assert!(!occupied.contains(&food.position()));
            assert!(border.contains(food.position()));
        }
    }

    #[test]
    fn test_place_finds_last_free_cell() {
        let border = Border::new(3, 3).unwrap();
        let last = Point::new(2, 1);
        let occupied: Vec<Point> = border.cells().filter(|&c| c != last).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let mut food = Food::new(Point::new(0, 0));
        assert!(food.place(&occupied, &border, &mut rng));
        assert_eq!(food.position(), last);
    }

    #[test]
    fn test_place_on_full_board_keeps_position() {
        let border = Border::new(2, 2).unwrap();
        let occupied: Vec<Point> = border.cells().collect();
        let mut rng = StdRng::seed_from_u64(3);
        let mut food = Food::new(Point::new(1, 1));
        assert!(!food.place(&occupied, &border, &mut rng));
        assert_eq!(food.position(), Point::new(1, 1));
    }

    #[test]
    fn test_same_seed_same_placement() {
        let border = Border::new(20, 15).unwrap();
        let occupied = [Point::new(10, 7)];
        let mut a = Food::new(Point::new(0, 0));
        let mut b = Food::new(Point::new(0, 0));
        a.place(&occupied, &border, &mut StdRng::seed_from_u64(42));
        b.place(&occupied, &border, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
