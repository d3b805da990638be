use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::border::Border;
use crate::utils::Point;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Action index order used by policies: 0-Up, 1-Down, 2-Left, 3-Right.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Opposite direction (180°).
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Counter-clockwise turn (90° to the left of the heading).
    pub fn left(&self) -> Direction {
        match self {
            Direction::Up => Direction::Left,
            Direction::Down => Direction::Right,
            Direction::Left => Direction::Down,
            Direction::Right => Direction::Up,
        }
    }

    /// Clockwise turn (90° to the right of the heading).
    pub fn right(&self) -> Direction {
        match self {
            Direction::Up => Direction::Right,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
            Direction::Right => Direction::Down,
        }
    }

    /// Coordinate offset (dx, dy) of one step. y grows downwards.
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    pub fn from_index(i: usize) -> Option<Direction> {
        Direction::ALL.get(i).copied()
    }
}

/// What the head ran into.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CollisionKind {
    Wall,
    Tail,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StepOutcome {
    Moved,
    /// The move was refused; the body was left untouched.
    Blocked(CollisionKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    body: Vec<Point>, // body[0] - head
    direction: Direction,
}

impl Snake {
    /// Lays `init_length` segments out behind the head, opposite to `direction`.
    /// A length of 0 is treated as 1: the snake always has a head.
    pub fn new(head_position: Point, init_length: usize, direction: Direction) -> Snake {
        let tail_dir = direction.opposite().delta();
        let body = std::iter::successors(Some(head_position), |p| Some(p.offset(tail_dir)))
            .take(init_length.max(1))
            .collect();
        Snake { body, direction }
    }

    /// Builds a snake from explicit segments, head first.
    pub fn from_body(body: Vec<Point>, direction: Direction) -> Result<Snake> {
        ensure!(!body.is_empty(), "snake body must have at least one segment");
        Ok(Snake { body, direction })
    }

    pub fn head(&self) -> Point {
        self.body[0]
    }

    pub fn tail(&self) -> Point {
        self.body[self.body.len() - 1]
    }

    pub fn body(&self) -> &[Point] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Takes the new heading unless it is a 180° reversal of the current one,
    /// in which case the request is dropped.
    pub fn change_direction(&mut self, requested: Direction) {
        if requested != self.direction.opposite() {
            self.direction = requested;
        }
    }

    /// Where the head would land after one step in `dir`.
    pub fn head_towards(&self, dir: Direction) -> Point {
        self.head().offset(dir.delta())
    }

    pub fn next_head(&self) -> Point {
        self.head_towards(self.direction)
    }

    /// True when `p` is on a segment other than the head.
    pub fn collides_with_body(&self, p: Point) -> bool {
        self.body[1..].contains(&p)
    }

    /// Wall or tail collision a step onto `p` would cause, judged on the
    /// current body.
    pub fn collision_at(&self, p: Point, border: &Border) -> Option<CollisionKind> {
        if !border.contains(p) {
            Some(CollisionKind::Wall)
        } else if self.collides_with_body(p) {
            Some(CollisionKind::Tail)
        } else {
            None
        }
    }

    /// Moves one step forward: new head in front, last segment dropped.
    pub fn step(&mut self, border: &Border) -> StepOutcome {
        let new_head = self.next_head();
        if let Some(kind) = self.collision_at(new_head, border) {
            return StepOutcome::Blocked(kind);
        }
        self.body.insert(0, new_head);
        self.body.pop();
        StepOutcome::Moved
    }

    /// Duplicates the tail segment. The copy sits on the tail cell until the
    /// next `step` pops it, so the extra length shows from the following tick.
    pub fn grow(&mut self) {
        let tail = self.tail();
        self.body.push(tail);
    }
}
