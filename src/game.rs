use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::border::Border;
use crate::config::GameConfig;
use crate::food::Food;
use crate::snake::{CollisionKind, Direction, Snake, StepOutcome};
use crate::utils::Point;

pub const DEFAULT_INIT_LENGTH: usize = 3;

/// Where and how a game ended.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Collision {
    pub kind: CollisionKind,
    pub point: Point,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum GameStatus {
    Running,
    GameOver(Collision),
    /// The snake covers every cell, so no food can be placed.
    Cleared,
}

/// Read-only copy of the game for renderers and harnesses.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Snapshot {
    pub body: Vec<Point>,
    pub direction: Direction,
    pub food_position: Point,
    pub score: u32,
    pub game_over: bool,
    pub collision_point: Option<Point>,
    pub collision_kind: Option<CollisionKind>,
}

/// One game of snake. The only owner and mutator of the snake and the food.
pub struct Game {
    border: Border,
    snake: Snake,
    food: Food,
    score: u32,
    status: GameStatus,
    rng: StdRng,
}

impl Game {
    /// Default-length snake in the middle of the grid, heading right.
    pub fn new(border: Border) -> Result<Game> {
        Self::with_seed(border, rand::random())
    }

    pub fn with_seed(border: Border, seed: u64) -> Result<Game> {
        Self::start(border, DEFAULT_INIT_LENGTH, seed)
    }

    pub fn from_config(cfg: &GameConfig) -> Result<Game> {
        let border = Border::new(cfg.grid_width, cfg.grid_height)?;
        Self::start(border, cfg.initial_length, cfg.seed.unwrap_or_else(rand::random::<u64>))
    }

    fn start(border: Border, init_length: usize, seed: u64) -> Result<Game> {
        ensure!(init_length >= 1, "initial snake length must be at least 1");
        ensure!(
            init_length <= border.area(),
            "snake of length {} does not fit a {}x{} grid",
            init_length,
            border.width(),
            border.height()
        );
        let head = Point::new((border.width() / 2) as i32, (border.height() / 2) as i32);
        let snake = Snake::new(head, init_length, Direction::Right);
        ensure!(
            snake.body().iter().all(|&p| border.contains(p)),
            "snake of length {} does not fit a {}x{} grid",
            init_length,
            border.width(),
            border.height()
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let mut food = Food::new(head);
        ensure!(
            food.place(snake.body(), &border, &mut rng),
            "no free cell left for food on a {}x{} grid",
            border.width(),
            border.height()
        );

        Ok(Game { border, snake, food, score: 0, status: GameStatus::Running, rng })
    }

    /// Game from an arranged snake and food position. The body must lie inside
    /// the grid and the food must be on a free cell.
    pub fn from_parts(border: Border, snake: Snake, food: Point, seed: u64) -> Result<Game> {
        ensure!(
            snake.body().iter().all(|&p| border.contains(p)),
            "snake body leaves the {}x{} grid",
            border.width(),
            border.height()
        );
        ensure!(border.contains(food), "food {:?} is outside the grid", food);
        ensure!(!snake.body().contains(&food), "food {:?} is on the snake", food);

        Ok(Game {
            border,
            snake,
            food: Food::new(food),
            score: 0,
            status: GameStatus::Running,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Advances the game by one tick. Returns false once the game is over,
    /// including when called again after that.
    pub fn update(&mut self) -> bool {
        if self.is_over() {
            return false;
        }

        let head = self.snake.head();
        let new_head = self.snake.next_head();

        if !self.border.contains(new_head) {
            self.crash(CollisionKind::Wall, head);
            return false;
        }
        if self.snake.collides_with_body(new_head) {
            self.crash(CollisionKind::Tail, new_head);
            return false;
        }

        // Same checks run again inside step; through update it always moves.
        if let StepOutcome::Blocked(kind) = self.snake.step(&self.border) {
            let point = if kind == CollisionKind::Wall { head } else { new_head };
            self.crash(kind, point);
            return false;
        }

        if self.snake.head() == self.food.position() {
            self.snake.grow();
            self.score += 1;
            if !self.food.place(self.snake.body(), &self.border, &mut self.rng) {
                self.status = GameStatus::Cleared;
                return false;
            }
        }
        true
    }

    fn crash(&mut self, kind: CollisionKind, point: Point) {
        self.status = GameStatus::GameOver(Collision { kind, point });
    }

    pub fn change_direction(&mut self, dir: Direction) {
        self.snake.change_direction(dir);
    }

    pub fn border(&self) -> &Border {
        &self.border
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn food(&self) -> Point {
        self.food.position()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_over(&self) -> bool {
        self.status != GameStatus::Running
    }

    pub fn collision(&self) -> Option<Collision> {
        match self.status {
            GameStatus::GameOver(c) => Some(c),
            _ => None,
        }
    }

    pub fn collision_point(&self) -> Option<Point> {
        self.collision().map(|c| c.point)
    }

    pub fn collision_kind(&self) -> Option<CollisionKind> {
        self.collision().map(|c| c.kind)
    }

    /// Would stepping in `dir` right now hit a wall or the body?
    pub fn is_danger(&self, dir: Direction) -> bool {
        self.snake.collision_at(self.snake.head_towards(dir), &self.border).is_some()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            body: self.snake.body().to_vec(),
            direction: self.snake.direction(),
            food_position: self.food.position(),
            score: self.score,
            game_over: self.is_over(),
            collision_point: self.collision_point(),
            collision_kind: self.collision_kind(),
        }
    }
}
