use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use log::*;
use nalgebra::Vector2;
use pong_engine::{Engine, EngineConfig, KeyCode};
use rand::rngs::StdRng;
use rand::SeedableRng;

mod difficulty;
mod entity;
mod pong;

use difficulty::Difficulty;
use pong::Pong;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn cli() -> Command {
    Command::new("vulkan-pong")
        .about("Pong against a computer opponent, rendered with Vulkan")
        .arg(
            Arg::new("difficulty")
                .value_name("DIFFICULTY")
                .help("Opponent skill: easy, normal, hard, expert or impossible")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

/// Exactly one argument picks the difficulty; anything else plays easy.
fn chosen_difficulty(matches: &ArgMatches) -> Difficulty {
    let names = matches
        .get_many::<String>("difficulty")
        .map(|names| names.collect::<Vec<_>>())
        .unwrap_or_default();
    match names.as_slice() {
        [name] => Difficulty::from_name(name),
        _ => Difficulty::default(),
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let difficulty = chosen_difficulty(&cli().get_matches());
    info!("Starting at {:?} difficulty.", difficulty);

    let config = EngineConfig {
        title: difficulty.caption(),
        width: WIDTH,
        height: HEIGHT,
        object_count: pong::OBJECT_COUNT,
    };

    let mut engine = Engine::new(&config)?;
    engine.input_mut().bind(pong::MOVE_UP, KeyCode::ArrowUp);
    engine.input_mut().bind(pong::MOVE_DOWN, KeyCode::ArrowDown);
    engine.sounds_mut().register(pong::BALL_HIT, "data/ball_hit.wav");
    engine.sounds_mut().register(pong::SPAWN_BALL, "data/spawn_ball.wav");

    let (width, height) = engine.extent();
    let mut game = Pong::new(
        difficulty,
        Vector2::new(width as f32, height as f32),
        StdRng::from_entropy(),
        engine.sounds_mut(),
    );

    engine.run(&mut game)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Difficulty {
        let matches = cli()
            .try_get_matches_from(std::iter::once("vulkan-pong").chain(args.iter().copied()))
            .unwrap();
        chosen_difficulty(&matches)
    }

    #[test]
    fn single_argument_picks_the_difficulty() {
        assert_eq!(parse(&[]), Difficulty::Easy);
        assert_eq!(parse(&["hard"]), Difficulty::Hard);
        assert_eq!(parse(&["nightmare"]), Difficulty::Easy);
    }

    #[test]
    fn extra_arguments_fall_back_to_easy() {
        assert_eq!(parse(&["hard", "expert"]), Difficulty::Easy);
        assert_eq!(parse(&["impossible", "--fullscreen"]), Difficulty::Easy);
    }
}
