use crate::entity::Ball;

/// How eagerly the opponent paddle follows the ball.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Difficulty {
    #[default]
    Easy,
    Normal,
    Hard,
    Expert,
    Impossible,
}

impl Difficulty {
    /// Unknown names fall back to `Easy`.
    pub fn from_name(name: &str) -> Difficulty {
        match name {
            "normal" => Difficulty::Normal,
            "hard" => Difficulty::Hard,
            "expert" => Difficulty::Expert,
            "impossible" => Difficulty::Impossible,
            _ => Difficulty::Easy,
        }
    }

    pub fn caption(self) -> String {
        let tier = match self {
            Difficulty::Easy => "(Easy)",
            Difficulty::Normal => "(Normal)",
            Difficulty::Hard => "(Hard)",
            Difficulty::Expert => "(Expert)",
            Difficulty::Impossible => "(Impossible!!! Are you crazy??? You can't win... :( )",
        };
        format!("Vulkan Pong: {}", tier)
    }

    /// Whether the opponent reacts to the ball this frame. Below
    /// `Impossible` it only reacts once the ball is heading its way and has
    /// crossed a tier-specific line.
    pub fn tracks(self, ball: &Ball, screen_width: f32) -> bool {
        let incoming = ball.velocity.x > 0.0;
        let past = |fraction: f32| ball.position.x > screen_width * fraction;
        match self {
            Difficulty::Easy => incoming && past(0.75),
            Difficulty::Normal => incoming && past(0.5),
            Difficulty::Hard => incoming && past(0.25),
            Difficulty::Expert => incoming,
            Difficulty::Impossible => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn ball_at(x: f32, vx: f32) -> Ball {
        Ball {
            position: Vector2::new(x, 100.0),
            velocity: Vector2::new(vx, 1.0),
            ..Ball::new()
        }
    }

    #[test]
    fn names_parse_with_easy_fallback() {
        assert_eq!(Difficulty::from_name("hard"), Difficulty::Hard);
        assert_eq!(Difficulty::from_name("impossible"), Difficulty::Impossible);
        assert_eq!(Difficulty::from_name("HARD"), Difficulty::Easy);
        assert_eq!(Difficulty::from_name("nightmare"), Difficulty::Easy);
    }

    #[test]
    fn captions_name_the_tier() {
        assert_eq!(Difficulty::Easy.caption(), "Vulkan Pong: (Easy)");
        assert_eq!(Difficulty::Expert.caption(), "Vulkan Pong: (Expert)");
        assert!(Difficulty::Impossible.caption().contains("You can't win"));
    }

    #[test]
    fn tiers_react_at_their_thresholds() {
        let width = 640.0;
        let at_200 = ball_at(200.0, 1.0);
        let at_400 = ball_at(400.0, 1.0);

        assert!(!Difficulty::Easy.tracks(&at_400, width));
        assert!(Difficulty::Easy.tracks(&ball_at(500.0, 1.0), width));
        assert!(Difficulty::Normal.tracks(&at_400, width));
        assert!(!Difficulty::Normal.tracks(&at_200, width));
        assert!(Difficulty::Hard.tracks(&at_200, width));
        assert!(!Difficulty::Hard.tracks(&ball_at(160.0, 1.0), width));
        assert!(Difficulty::Expert.tracks(&ball_at(10.0, 1.0), width));
    }

    #[test]
    fn only_impossible_reacts_to_outgoing_ball() {
        let outgoing = ball_at(600.0, -1.0);
        for tier in [
            Difficulty::Easy,
            Difficulty::Normal,
            Difficulty::Hard,
            Difficulty::Expert,
        ] {
            assert!(!tier.tracks(&outgoing, 640.0), "{:?}", tier);
        }
        assert!(Difficulty::Impossible.tracks(&outgoing, 640.0));
    }
}
