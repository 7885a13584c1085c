use log::*;
use nalgebra::Vector2;
use pong_engine::{Game, Input, ModelUniform, SoundSink};
use rand::rngs::StdRng;
use rand::Rng;

use crate::difficulty::Difficulty;
use crate::entity::{Ball, Paddle, PADDLE_MARGIN};

pub const MOVE_UP: &str = "move-up";
pub const MOVE_DOWN: &str = "move-down";
pub const BALL_HIT: &str = "ball-hit";
pub const SPAWN_BALL: &str = "spawn-ball";

/// Drawn objects in draw order: player paddle, opponent paddle, ball.
pub const OBJECT_COUNT: u32 = 3;

pub struct Pong {
    pub player: Paddle,
    pub opponent: Paddle,
    pub ball: Ball,
    difficulty: Difficulty,
    screen: Vector2<f32>,
    rng: StdRng,
    started: bool,
}

impl Pong {
    pub fn new(
        difficulty: Difficulty,
        screen: Vector2<f32>,
        rng: StdRng,
        sounds: &mut dyn SoundSink,
    ) -> Pong {
        let mut pong = Pong {
            player: Paddle::player(screen.y),
            opponent: Paddle::opponent(screen),
            ball: Ball::new(),
            difficulty,
            screen,
            rng,
            started: false,
        };
        pong.serve(sounds);
        pong
    }

    fn random_sign(&mut self) -> f32 {
        if self.rng.gen::<bool>() {
            -1.0
        } else {
            1.0
        }
    }

    fn serve(&mut self, sounds: &mut dyn SoundSink) {
        sounds.play_sound(SPAWN_BALL);
        let direction = Vector2::new(self.random_sign(), self.random_sign());
        self.ball.reset(self.screen, direction);
        debug!("Ball served towards {:?}.", direction);
    }

    fn update_opponent(&mut self, delta: f32) {
        if self.difficulty.tracks(&self.ball, self.screen.x) {
            self.opponent.chase(&self.ball, self.screen.y);
        } else {
            self.opponent.velocity.y = 0.0;
        }
        self.opponent.advance(delta);
    }

    fn update_ball(&mut self, delta: f32, sounds: &mut dyn SoundSink) {
        if self.ball.position.y < 0.0 {
            sounds.play_sound(BALL_HIT);
            self.ball.velocity.y = 1.0;
        } else if self.ball.position.y + self.ball.size.y > self.screen.y {
            sounds.play_sound(BALL_HIT);
            self.ball.velocity.y = -1.0;
        }

        self.ball.advance(delta);

        if self.ball.is_off_screen(self.screen.x) {
            self.serve(sounds);
        }

        let ball = self.ball.rect();
        if ball.collides(&self.player.rect()) {
            sounds.play_sound(BALL_HIT);
            self.ball.deflect(1.0);
        }
        if ball.collides(&self.opponent.rect()) {
            sounds.play_sound(BALL_HIT);
            self.ball.deflect(-1.0);
        }
    }
}

impl Game for Pong {
    fn update(&mut self, delta: f32, input: &Input, sounds: &mut dyn SoundSink) {
        self.started = true;
        self.player.steer(
            input.is_action_pressed(MOVE_UP),
            input.is_action_pressed(MOVE_DOWN),
            self.screen.y,
        );
        self.player.advance(delta);
        self.update_opponent(delta);
        self.update_ball(delta, sounds);
    }

    fn models(&self) -> Vec<ModelUniform> {
        vec![self.player.model(), self.opponent.model(), self.ball.model()]
    }

    /// Before the first update the whole court is laid out again for the new
    /// size, keeping the serve direction. Once play has started the opponent
    /// stays pinned to the right edge and nothing else moves.
    fn resize(&mut self, width: u32, height: u32) {
        self.screen = Vector2::new(width as f32, height as f32);
        if !self.started {
            self.player = Paddle::player(self.screen.y);
            self.opponent = Paddle::opponent(self.screen);
            let direction = self.ball.velocity;
            self.ball.reset(self.screen, direction);
            return;
        }
        self.opponent.position.x = self.screen.x - self.opponent.size.x - PADDLE_MARGIN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pong_engine::KeyCode;
    use rand::SeedableRng;

    #[derive(Default)]
    struct RecordingSink {
        played: Vec<String>,
    }

    impl SoundSink for RecordingSink {
        fn play_sound(&mut self, name: &str) {
            self.played.push(name.to_string());
        }
    }

    fn screen() -> Vector2<f32> {
        Vector2::new(640.0, 480.0)
    }

    fn game(difficulty: Difficulty) -> (Pong, RecordingSink) {
        let mut sounds = RecordingSink::default();
        let pong = Pong::new(difficulty, screen(), StdRng::seed_from_u64(7), &mut sounds);
        sounds.played.clear();
        (pong, sounds)
    }

    fn input() -> Input {
        let mut input = Input::new();
        input.bind(MOVE_UP, KeyCode::ArrowUp);
        input.bind(MOVE_DOWN, KeyCode::ArrowDown);
        input
    }

    #[test]
    fn new_game_serves_from_the_centre() {
        let mut sounds = RecordingSink::default();
        let pong = Pong::new(Difficulty::Easy, screen(), StdRng::seed_from_u64(1), &mut sounds);

        assert_eq!(sounds.played, vec![SPAWN_BALL]);
        assert_relative_eq!(pong.ball.position, Vector2::new(312.0, 232.0));
        assert_relative_eq!(pong.ball.velocity.x.abs(), 1.0);
        assert_relative_eq!(pong.ball.velocity.y.abs(), 1.0);
        assert_eq!(pong.models().len(), OBJECT_COUNT as usize);
    }

    #[test]
    fn ball_advances_half_a_second() {
        let (mut pong, mut sounds) = game(Difficulty::Easy);
        pong.ball.velocity = Vector2::new(1.0, 1.0);

        pong.update(0.5, &input(), &mut sounds);
        assert_relative_eq!(pong.ball.position, Vector2::new(328.0, 248.0));
        assert!(sounds.played.is_empty());
    }

    #[test]
    fn ball_leaving_left_edge_is_served_again() {
        let (mut pong, mut sounds) = game(Difficulty::Easy);
        pong.ball.position = Vector2::new(-15.0, 100.0);
        pong.ball.velocity = Vector2::new(-1.0, 1.0);
        pong.ball.speed = Vector2::new(64.0, 32.0);

        pong.update(0.1, &input(), &mut sounds);

        assert_eq!(sounds.played, vec![SPAWN_BALL]);
        assert_relative_eq!(pong.ball.position, Vector2::new(312.0, 232.0));
        assert_relative_eq!(pong.ball.speed, Vector2::new(32.0, 32.0));
        assert_relative_eq!(pong.ball.velocity.x.abs(), 1.0);
        assert_relative_eq!(pong.ball.velocity.y.abs(), 1.0);
    }

    #[test]
    fn ball_bounces_off_the_top_wall() {
        let (mut pong, mut sounds) = game(Difficulty::Easy);
        pong.ball.position = Vector2::new(300.0, -2.0);
        pong.ball.velocity = Vector2::new(1.0, -1.0);

        pong.update(0.1, &input(), &mut sounds);
        assert_relative_eq!(pong.ball.velocity.y, 1.0);
        assert_eq!(sounds.played, vec![BALL_HIT]);
    }

    #[test]
    fn player_paddle_returns_the_ball() {
        let (mut pong, mut sounds) = game(Difficulty::Easy);
        pong.ball.position = Vector2::new(10.0, pong.player.position.y + 10.0);
        pong.ball.velocity = Vector2::new(-1.0, 1.0);

        pong.update(0.01, &input(), &mut sounds);
        assert_relative_eq!(pong.ball.velocity.x, 1.0);
        assert_relative_eq!(pong.ball.speed.x, 35.2, epsilon = 1e-4);
        assert_eq!(sounds.played, vec![BALL_HIT]);
    }

    #[test]
    fn player_follows_the_keys() {
        let (mut pong, mut sounds) = game(Difficulty::Easy);
        let mut input = input();
        let start = pong.player.position.y;

        input.set_key(KeyCode::ArrowUp, true);
        pong.update(0.25, &input, &mut sounds);
        assert_relative_eq!(pong.player.position.y, start - 32.0);

        input.set_key(KeyCode::ArrowUp, false);
        pong.update(0.25, &input, &mut sounds);
        assert_relative_eq!(pong.player.position.y, start - 32.0);
    }

    #[test]
    fn hard_opponent_waits_for_incoming_ball() {
        let (mut pong, mut sounds) = game(Difficulty::Hard);
        let start = pong.opponent.position;

        // Heading away from the opponent.
        pong.ball.position = Vector2::new(400.0, 20.0);
        pong.ball.velocity = Vector2::new(-1.0, 1.0);
        pong.update(0.1, &input(), &mut sounds);
        assert_relative_eq!(pong.opponent.position, start);

        // Incoming but not past a quarter of the screen.
        pong.ball.position = Vector2::new(100.0, 20.0);
        pong.ball.velocity = Vector2::new(1.0, 1.0);
        pong.update(0.1, &input(), &mut sounds);
        assert_relative_eq!(pong.opponent.position, start);

        // Incoming past the line: moves up towards the ball.
        pong.ball.position = Vector2::new(300.0, 20.0);
        pong.update(0.1, &input(), &mut sounds);
        assert!(pong.opponent.position.y < start.y);
        assert_relative_eq!(pong.opponent.position.x, start.x);
    }

    #[test]
    fn opponent_stops_at_the_top_edge() {
        let (mut pong, mut sounds) = game(Difficulty::Impossible);
        pong.opponent.position.y = 0.0;
        pong.ball.position = Vector2::new(300.0, -40.0);
        pong.ball.velocity = Vector2::new(1.0, 1.0);

        pong.update(0.1, &input(), &mut sounds);
        assert_relative_eq!(pong.opponent.velocity.y, 0.0);
        assert_relative_eq!(pong.opponent.position.y, 0.0);
    }

    #[test]
    fn resize_pins_opponent_to_the_right_edge() {
        let (mut pong, mut sounds) = game(Difficulty::Easy);
        pong.update(0.01, &input(), &mut sounds);
        let player = pong.player.position;

        pong.resize(800, 600);
        assert_relative_eq!(pong.opponent.position.x, 788.0);
        assert_relative_eq!(pong.player.position, player);
    }

    #[test]
    fn resize_before_play_serves_from_the_new_centre() {
        let (mut pong, mut sounds) = game(Difficulty::Easy);
        let direction = pong.ball.velocity;

        pong.resize(1280, 960);
        assert_relative_eq!(pong.ball.position, Vector2::new(632.0, 472.0));
        assert_relative_eq!(pong.ball.velocity, direction);
        assert_relative_eq!(pong.player.position, Vector2::new(4.0, 448.0));
        assert_relative_eq!(pong.opponent.position, Vector2::new(1268.0, 448.0));
        assert!(sounds.played.is_empty());

        pong.ball.velocity = Vector2::new(1.0, 1.0);
        pong.update(0.5, &input(), &mut sounds);
        assert_relative_eq!(pong.ball.position, Vector2::new(648.0, 488.0));
    }
}
