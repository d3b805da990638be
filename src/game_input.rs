use crate::game::Game;

/// Length of the observation vector.
pub const INPUTS: usize = 11;

/// Observation handed to a policy. Every entry is 0.0 or 1.0.
pub type Features = [f32; INPUTS];

pub struct GameInput;

impl GameInput {
    /// Layout:
    /// 0..3  danger ahead / right of heading / left of heading
    /// 3..7  heading one-hot: up, down, left, right
    /// 7..11 food is left / right / above / below the head
    pub fn from_game(game: &Game) -> Features {
        let mut input = [0.0f32; INPUTS];
        let snake = game.snake();
        let dir = snake.direction();
        let head = snake.head();
        let food = game.food();

        // danger is judged on the current body, nothing is moved
        input[0] = flag(game.is_danger(dir));
        input[1] = flag(game.is_danger(dir.right()));
        input[2] = flag(game.is_danger(dir.left()));

        input[3 + dir.index()] = 1.0;

        input[7] = flag(food.x < head.x);
        input[8] = flag(food.x > head.x);
        input[9] = flag(food.y < head.y);
        input[10] = flag(food.y > head.y);

        input
    }
}

pub fn extract_features(game: &Game) -> Features {
    GameInput::from_game(game)
}

fn flag(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::border::Border;
    use crate::snake::{Direction, Snake};
    use crate::utils::Point;

    fn game(body: Vec<Point>, dir: Direction, food: Point) -> Game {
        let border = Border::new(10, 10).unwrap();
        Game::from_parts(border, Snake::from_body(body, dir).unwrap(), food, 0).unwrap()
    }

    #[test]
    fn test_open_field() {
        let g = game(vec![Point::new(5, 5), Point::new(4, 5), Point::new(3, 5)], Direction::Right, Point::new(8, 2));
        let f = extract_features(&g);
        assert_eq!(f, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_wall_dangers_follow_heading() {
        // top-left corner heading up: ahead is the wall, left-of-up is the wall too
        let g = game(vec![Point::new(0, 0), Point::new(0, 1)], Direction::Up, Point::new(5, 5));
        let f = extract_features(&g);
        assert_eq!(&f[0..3], &[1.0, 0.0, 1.0]);
        assert_eq!(&f[3..7], &[1.0, 0.0, 0.0, 0.0]);

        // bottom edge heading left: right-of-left is up (free), left-of-left is down (wall)
        let g = game(vec![Point::new(5, 9), Point::new(6, 9)], Direction::Left, Point::new(5, 5));
        let f = extract_features(&g);
        assert_eq!(&f[0..3], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_body_danger() {
        // body curls to the right of a snake heading up
        let body = vec![Point::new(5, 5), Point::new(5, 6), Point::new(6, 6), Point::new(6, 5)];
        let g = game(body, Direction::Up, Point::new(0, 0));
        let f = extract_features(&g);
        assert_eq!(&f[0..3], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_aligned_food_sets_no_axis_flag() {
        let g = game(vec![Point::new(5, 5), Point::new(4, 5)], Direction::Right, Point::new(5, 8));
        let f = extract_features(&g);
        assert_eq!(&f[7..11], &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_heading_is_one_hot() {
        for d in Direction::ALL {
            let g = game(vec![Point::new(5, 5)], d, Point::new(0, 0));
            let f = extract_features(&g);
            assert_eq!(f[3..7].iter().sum::<f32>(), 1.0);
            assert_eq!(f[3 + d.index()], 1.0);
        }
    }
}
