use nalgebra::Vector2;
use pong_engine::ModelUniform;

pub const PADDLE_WIDTH: f32 = 8.0;
pub const PADDLE_HEIGHT: f32 = 64.0;
pub const PADDLE_SPEED: f32 = 128.0;
pub const PADDLE_MARGIN: f32 = 4.0;
pub const BALL_SIZE: f32 = 16.0;
pub const BALL_SPEED: f32 = 32.0;
/// Horizontal speed gained on every paddle hit, as a fraction.
pub const BALL_SPEEDUP: f32 = 0.1;

/// Axis-aligned rectangle in screen pixels, y growing downwards.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(position: Vector2<f32>, size: Vector2<f32>) -> Rect {
        Rect {
            left: position.x,
            top: position.y,
            right: position.x + size.x,
            bottom: position.y + size.y,
        }
    }

    /// Strict overlap; rectangles that only share an edge do not collide.
    pub fn collides(&self, other: &Rect) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Paddle {
    pub position: Vector2<f32>,
    pub size: Vector2<f32>,
    pub velocity: Vector2<f32>,
    pub speed: f32,
}

impl Paddle {
    /// A paddle vertically centred at horizontal position `x`.
    pub fn new(x: f32, screen_height: f32) -> Paddle {
        Paddle {
            position: Vector2::new(x, screen_height * 0.5 - PADDLE_HEIGHT * 0.5),
            size: Vector2::new(PADDLE_WIDTH, PADDLE_HEIGHT),
            velocity: Vector2::zeros(),
            speed: PADDLE_SPEED,
        }
    }

    pub fn player(screen_height: f32) -> Paddle {
        Paddle::new(PADDLE_MARGIN, screen_height)
    }

    pub fn opponent(screen: Vector2<f32>) -> Paddle {
        Paddle::new(screen.x - PADDLE_WIDTH - PADDLE_MARGIN, screen.y)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    pub fn bottom(&self) -> f32 {
        self.position.y + self.size.y
    }

    /// Up wins over down; either is cancelled at the matching screen edge.
    pub fn steer(&mut self, up: bool, down: bool, screen_height: f32) {
        self.velocity.y = if up {
            if self.position.y < 0.0 {
                0.0
            } else {
                -1.0
            }
        } else if down {
            if self.bottom() > screen_height {
                0.0
            } else {
                1.0
            }
        } else {
            0.0
        };
    }

    /// Heads for the ball's rows, stopping at the screen edges.
    pub fn chase(&mut self, ball: &Ball, screen_height: f32) {
        self.velocity.y = if ball.position.y + ball.size.y < self.position.y {
            if self.position.y > 0.0 {
                -1.0
            } else {
                0.0
            }
        } else if ball.position.y > self.bottom() {
            if self.bottom() < screen_height {
                1.0
            } else {
                0.0
            }
        } else {
            0.0
        };
    }

    pub fn advance(&mut self, delta: f32) {
        self.position += self.velocity * self.speed * delta;
    }

    pub fn model(&self) -> ModelUniform {
        ModelUniform::new(self.position, self.size)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ball {
    pub position: Vector2<f32>,
    pub size: Vector2<f32>,
    /// Unit direction per axis, each component either -1 or 1.
    pub velocity: Vector2<f32>,
    pub speed: Vector2<f32>,
}

impl Ball {
    pub fn new() -> Ball {
        Ball {
            position: Vector2::zeros(),
            size: Vector2::repeat(BALL_SIZE),
            velocity: Vector2::zeros(),
            speed: Vector2::repeat(BALL_SPEED),
        }
    }

    /// Back to the centre at base speed, heading in `direction`.
    pub fn reset(&mut self, screen: Vector2<f32>, direction: Vector2<f32>) {
        self.speed = Vector2::repeat(BALL_SPEED);
        self.position = screen * 0.5 - self.size * 0.5;
        self.velocity = direction;
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    pub fn advance(&mut self, delta: f32) {
        self.position += self.velocity.component_mul(&self.speed) * delta;
    }

    pub fn is_off_screen(&self, screen_width: f32) -> bool {
        self.position.x + self.size.x < 0.0 || self.position.x > screen_width
    }

    /// Sends the ball back along `direction` and speeds it up.
    pub fn deflect(&mut self, direction: f32) {
        self.velocity.x = direction;
        self.speed.x += self.speed.x * BALL_SPEEDUP;
    }

    pub fn model(&self) -> ModelUniform {
        ModelUniform::new(self.position, self.size)
    }
}

impl Default for Ball {
    fn default() -> Self {
        Ball::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(Vector2::new(x, y), Vector2::new(w, h))
    }

    #[test]
    fn collision_is_symmetric() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(5.0, 5.0, 10.0, 10.0);
        let c = rect(30.0, 0.0, 10.0, 10.0);

        assert!(a.collides(&b) && b.collides(&a));
        assert!(!a.collides(&c) && !c.collides(&a));
        assert!(a.collides(&a));
    }

    #[test]
    fn touching_edges_do_not_collide() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        assert!(!a.collides(&rect(10.0, 0.0, 10.0, 10.0)));
        assert!(!a.collides(&rect(0.0, 10.0, 10.0, 10.0)));
        assert!(a.collides(&rect(9.5, 9.5, 10.0, 10.0)));
    }

    #[test]
    fn ball_moves_by_direction_times_speed() {
        let mut ball = Ball::new();
        ball.position = Vector2::new(312.0, 232.0);
        ball.velocity = Vector2::new(1.0, 1.0);

        ball.advance(0.5);
        assert_relative_eq!(ball.position, Vector2::new(328.0, 248.0));
    }

    #[test]
    fn reset_centres_the_ball() {
        let mut ball = Ball::new();
        ball.speed = Vector2::new(80.0, 32.0);
        ball.reset(Vector2::new(640.0, 480.0), Vector2::new(-1.0, 1.0));

        assert_relative_eq!(ball.position, Vector2::new(312.0, 232.0));
        assert_relative_eq!(ball.speed, Vector2::repeat(BALL_SPEED));
        assert_relative_eq!(ball.velocity, Vector2::new(-1.0, 1.0));
    }

    #[test]
    fn deflect_speeds_up_horizontally() {
        let mut ball = Ball::new();
        ball.velocity = Vector2::new(-1.0, 1.0);
        ball.deflect(1.0);

        assert_relative_eq!(ball.velocity.x, 1.0);
        assert_relative_eq!(ball.speed.x, 35.2, epsilon = 1e-4);
        assert_relative_eq!(ball.speed.y, 32.0);
    }

    #[test]
    fn paddles_start_centred_at_their_edges() {
        let screen = Vector2::new(640.0, 480.0);
        assert_relative_eq!(Paddle::player(screen.y).position, Vector2::new(4.0, 208.0));
        assert_relative_eq!(Paddle::opponent(screen).position, Vector2::new(628.0, 208.0));
    }

    #[test]
    fn steering_stops_at_screen_edges() {
        let mut paddle = Paddle::player(480.0);
        paddle.steer(true, false, 480.0);
        assert_relative_eq!(paddle.velocity.y, -1.0);

        paddle.position.y = -0.5;
        paddle.steer(true, true, 480.0);
        assert_relative_eq!(paddle.velocity.y, 0.0);

        paddle.position.y = 420.0;
        paddle.steer(false, true, 480.0);
        assert_relative_eq!(paddle.velocity.y, 0.0);

        paddle.steer(false, false, 480.0);
        assert_relative_eq!(paddle.velocity.y, 0.0);
    }

    #[test]
    fn paddle_moves_at_its_speed() {
        let mut paddle = Paddle::player(480.0);
        paddle.steer(false, true, 480.0);
        paddle.advance(0.25);
        assert_relative_eq!(paddle.position.y, 240.0);
    }
}
