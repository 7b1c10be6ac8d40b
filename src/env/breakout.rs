//! A self-contained Breakout game rendering Atari-sized RGB frames.
//!
//! The playfield layout follows the Atari original: a 210x160 screen, six
//! rows of bricks worth 7/7/4/4/1/1 points from top to bottom, five lives
//! and a FIRE action that serves the ball. Rewards are raw score deltas;
//! clipping them is the job of the preprocessing pipeline.
use crate::base::{DiscreteAct, Env, RgbObs, Step};
use crate::error::DqnAtariError;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};

/// Screen size, matching the Atari 2600 video output.
const SCREEN_W: u32 = 160;
const SCREEN_H: u32 = 210;

// Playfield geometry, in screen pixels.
const LEFT_WALL: f32 = 8.0;
const RIGHT_WALL: f32 = 152.0;
const TOP_WALL: f32 = 32.0;

const BRICK_ROWS: usize = 6;
const BRICK_COLS: usize = 18;
const BRICK_W: f32 = 8.0;
const BRICK_H: f32 = 6.0;
const BRICK_TOP: f32 = 57.0;

const PADDLE_Y: f32 = 189.0;
const PADDLE_W: f32 = 16.0;
const PADDLE_H: f32 = 4.0;
const PADDLE_SPEED: f32 = 4.0;

const BALL_SIZE: f32 = 2.0;
const BALL_SPEED_Y: f32 = 2.0;

const N_LIVES: usize = 5;

/// Points per brick row, top row first.
const ROW_POINTS: [u32; BRICK_ROWS] = [7, 7, 4, 4, 1, 1];

/// Brick row colors, top row first.
const ROW_COLORS: [[u8; 3]; BRICK_ROWS] = [
    [200, 72, 72],
    [198, 108, 58],
    [180, 122, 48],
    [162, 162, 42],
    [72, 160, 72],
    [66, 72, 200],
];

const WALL_COLOR: [u8; 3] = [142, 142, 142];
const PADDLE_COLOR: [u8; 3] = [200, 72, 72];
const BALL_COLOR: [u8; 3] = [200, 72, 72];

// Action indices of the Atari Breakout action set.
const ACT_NOOP: u8 = 0;
const ACT_FIRE: u8 = 1;
const ACT_RIGHT: u8 = 2;
const ACT_LEFT: u8 = 3;
const N_ACTIONS: usize = 4;

/// Configuration of [`BreakoutEnv`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GameEnvConfig {
    /// Environment name, e.g. `BreakoutDeterministic-v4`.
    ///
    /// The name determines the frame skip: `NoFrameskip` variants tick the
    /// game once per step, all others four times.
    pub name: String,

    /// Episode length limit; exceeding it truncates the episode.
    pub max_episode_steps: usize,
}

impl Default for GameEnvConfig {
    fn default() -> Self {
        Self {
            name: "BreakoutDeterministic-v4".to_string(),
            max_episode_steps: 100_000,
        }
    }
}

impl GameEnvConfig {
    /// Sets the environment name.
    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the episode length limit.
    pub fn max_episode_steps(mut self, v: usize) -> Self {
        self.max_episode_steps = v;
        self
    }
}

fn frame_skip_of(name: &str) -> usize {
    if name.contains("NoFrameskip") {
        1
    } else {
        4
    }
}

struct GameState {
    paddle_x: f32,
    ball_x: f32,
    ball_y: f32,
    vel_x: f32,
    vel_y: f32,
    bricks: [[bool; BRICK_COLS]; BRICK_ROWS],
    lives: usize,
    score: u32,
    serving: bool,
    finished: bool,
}

impl GameState {
    fn new() -> Self {
        Self {
            paddle_x: (LEFT_WALL + RIGHT_WALL - PADDLE_W) / 2.0,
            ball_x: 0.0,
            ball_y: 0.0,
            vel_x: 0.0,
            vel_y: 0.0,
            bricks: [[true; BRICK_COLS]; BRICK_ROWS],
            lives: N_LIVES,
            score: 0,
            serving: true,
            finished: false,
        }
    }
}

/// Breakout with the interface and frame format of the Atari emulators.
pub struct BreakoutEnv {
    config: GameEnvConfig,
    frame_skip: usize,
    state: GameState,
    n_steps: usize,
    rng: fastrand::Rng,
}

impl BreakoutEnv {
    fn serve(&mut self) {
        let state = &mut self.state;
        state.ball_x = state.paddle_x + PADDLE_W / 2.0;
        state.ball_y = 120.0;
        state.vel_x = match self.rng.usize(0..4) {
            0 => -2.0,
            1 => -1.0,
            2 => 1.0,
            _ => 2.0,
        };
        state.vel_y = BALL_SPEED_Y;
        state.serving = false;
    }

    /// Advances the game by one tick.
    fn tick(&mut self, act: u8) {
        let state = &mut self.state;
        if state.finished {
            return;
        }

        match act {
            ACT_RIGHT => state.paddle_x += PADDLE_SPEED,
            ACT_LEFT => state.paddle_x -= PADDLE_SPEED,
            _ => {}
        }
        state.paddle_x = state.paddle_x.clamp(LEFT_WALL, RIGHT_WALL - PADDLE_W);

        if state.serving {
            if act == ACT_FIRE {
                self.serve();
            }
            return;
        }

        state.ball_x += state.vel_x;
        state.ball_y += state.vel_y;

        // walls
        if state.ball_x <= LEFT_WALL {
            state.ball_x = LEFT_WALL;
            state.vel_x = -state.vel_x;
        } else if state.ball_x + BALL_SIZE >= RIGHT_WALL {
            state.ball_x = RIGHT_WALL - BALL_SIZE;
            state.vel_x = -state.vel_x;
        }
        if state.ball_y <= TOP_WALL {
            state.ball_y = TOP_WALL;
            state.vel_y = -state.vel_y;
        }

        // bricks
        let cy = state.ball_y + BALL_SIZE / 2.0;
        if cy >= BRICK_TOP && cy < BRICK_TOP + BRICK_ROWS as f32 * BRICK_H {
            let row = ((cy - BRICK_TOP) / BRICK_H) as usize;
            let col = (((state.ball_x + BALL_SIZE / 2.0 - LEFT_WALL) / BRICK_W) as usize)
                .min(BRICK_COLS - 1);
            if state.bricks[row][col] {
                state.bricks[row][col] = false;
                state.score += ROW_POINTS[row];
                state.vel_y = -state.vel_y;
            }
        }

        // paddle
        let ball_bottom = state.ball_y + BALL_SIZE;
        if state.vel_y > 0.0
            && ball_bottom >= PADDLE_Y
            && ball_bottom <= PADDLE_Y + PADDLE_H
            && state.ball_x + BALL_SIZE >= state.paddle_x
            && state.ball_x <= state.paddle_x + PADDLE_W
        {
            state.vel_y = -state.vel_y;
            // Deflection depends on where the ball meets the paddle.
            let offset = (state.ball_x + BALL_SIZE / 2.0 - (state.paddle_x + PADDLE_W / 2.0))
                / (PADDLE_W / 2.0);
            let vx = (offset * 2.0).clamp(-2.0, 2.0);
            state.vel_x = if vx.abs() < 0.5 {
                0.5f32.copysign(vx)
            } else {
                vx
            };
        }

        // lost ball
        if state.ball_y > SCREEN_H as f32 {
            state.lives -= 1;
            state.serving = true;
            if state.lives == 0 {
                state.finished = true;
            }
        }

        // cleared wall
        if state.bricks.iter().flatten().all(|b| !b) {
            state.finished = true;
        }
    }

    fn render(&self) -> RgbObs {
        let mut obs = RgbObs::zeros(SCREEN_H, SCREEN_W);
        let state = &self.state;

        // walls
        fill_rect(&mut obs, 0.0, 17.0, SCREEN_W as f32, TOP_WALL - 17.0, WALL_COLOR);
        fill_rect(&mut obs, 0.0, TOP_WALL, LEFT_WALL, SCREEN_H as f32 - TOP_WALL, WALL_COLOR);
        fill_rect(
            &mut obs,
            RIGHT_WALL,
            TOP_WALL,
            SCREEN_W as f32 - RIGHT_WALL,
            SCREEN_H as f32 - TOP_WALL,
            WALL_COLOR,
        );

        // bricks
        for (row, cols) in state.bricks.iter().enumerate() {
            for (col, alive) in cols.iter().enumerate() {
                if *alive {
                    fill_rect(
                        &mut obs,
                        LEFT_WALL + col as f32 * BRICK_W,
                        BRICK_TOP + row as f32 * BRICK_H,
                        BRICK_W,
                        BRICK_H,
                        ROW_COLORS[row],
                    );
                }
            }
        }

        // paddle
        fill_rect(
            &mut obs,
            state.paddle_x,
            PADDLE_Y,
            PADDLE_W,
            PADDLE_H,
            PADDLE_COLOR,
        );

        // ball
        if !state.serving {
            fill_rect(
                &mut obs,
                state.ball_x,
                state.ball_y,
                BALL_SIZE,
                BALL_SIZE,
                BALL_COLOR,
            );
        }

        obs
    }
}

fn fill_rect(obs: &mut RgbObs, x: f32, y: f32, w: f32, h: f32, color: [u8; 3]) {
    let x0 = x.max(0.0) as u32;
    let y0 = y.max(0.0) as u32;
    let x1 = ((x + w) as u32).min(obs.width);
    let y1 = ((y + h) as u32).min(obs.height);
    for yy in y0..y1 {
        for xx in x0..x1 {
            let i = ((yy * obs.width + xx) * 3) as usize;
            obs.data[i..i + 3].copy_from_slice(&color);
        }
    }
}

impl Env for BreakoutEnv {
    type Config = GameEnvConfig;

    fn build(config: &Self::Config, seed: u64) -> Result<Self> {
        if !config.name.contains("Breakout") {
            return Err(DqnAtariError::UnknownEnv(config.name.clone()).into());
        }
        let frame_skip = frame_skip_of(&config.name);
        info!(
            "Built environment {} with frame skip {}",
            &config.name, frame_skip
        );

        Ok(Self {
            config: config.clone(),
            frame_skip,
            state: GameState::new(),
            n_steps: 0,
            rng: fastrand::Rng::with_seed(seed),
        })
    }

    fn n_actions(&self) -> usize {
        N_ACTIONS
    }

    fn reset(&mut self) -> Result<RgbObs> {
        self.state = GameState::new();
        self.n_steps = 0;
        Ok(self.render())
    }

    fn step(&mut self, act: &DiscreteAct) -> Step {
        let prev_score = self.state.score;

        for _ in 0..self.frame_skip {
            self.tick(act.act);
            if self.state.finished {
                break;
            }
        }
        self.n_steps += 1;

        let truncated = self.n_steps >= self.config.max_episode_steps;
        let reward = (self.state.score - prev_score) as f32;

        Step::new(self.render(), reward, self.state.finished || truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> BreakoutEnv {
        BreakoutEnv::build(&GameEnvConfig::default().name(name), 42).unwrap()
    }

    #[test]
    fn rejects_unknown_games() {
        let r = BreakoutEnv::build(&GameEnvConfig::default().name("PongDeterministic-v4"), 0);
        assert!(r.is_err());
    }

    #[test]
    fn frame_skip_follows_the_name() {
        assert_eq!(env("BreakoutNoFrameskip-v4").frame_skip, 1);
        assert_eq!(env("BreakoutDeterministic-v4").frame_skip, 4);
        assert_eq!(env("Breakout-v4").frame_skip, 4);
    }

    #[test]
    fn reset_returns_full_screen_rgb() -> Result<()> {
        let mut e = env("BreakoutDeterministic-v4");
        let obs = e.reset()?;
        assert_eq!(obs.height, 210);
        assert_eq!(obs.width, 160);
        assert_eq!(obs.data.len(), 210 * 160 * 3);
        Ok(())
    }

    #[test]
    fn fire_serves_the_ball() -> Result<()> {
        let mut e = env("BreakoutNoFrameskip-v4");
        e.reset()?;
        assert!(e.state.serving);

        let _ = e.step(&DiscreteAct::from(ACT_NOOP));
        assert!(e.state.serving);

        let _ = e.step(&DiscreteAct::from(ACT_FIRE));
        assert!(!e.state.serving);
        Ok(())
    }

    #[test]
    fn breaking_a_brick_scores_its_row_points() -> Result<()> {
        let mut e = env("BreakoutNoFrameskip-v4");
        e.reset()?;

        // place the ball just below the top brick row, moving up
        e.state.serving = false;
        e.state.ball_x = LEFT_WALL + 4.0;
        e.state.ball_y = BRICK_TOP + BRICK_ROWS as f32 * BRICK_H + 1.0;
        e.state.vel_x = 0.0;
        e.state.vel_y = -BALL_SPEED_Y;

        let mut total = 0.0;
        for _ in 0..20 {
            let step = e.step(&DiscreteAct::from(ACT_NOOP));
            total += step.reward;
            if total > 0.0 {
                break;
            }
        }
        // bottom row is worth one point
        assert_eq!(total, 1.0);
        Ok(())
    }

    #[test]
    fn losing_all_lives_ends_the_episode() -> Result<()> {
        let mut e = env("BreakoutNoFrameskip-v4");
        e.reset()?;

        // park the paddle on the left and drop the ball on the right
        let mut done = false;
        for _ in 0..10_000 {
            if e.state.serving {
                e.step(&DiscreteAct::from(ACT_FIRE));
                e.state.ball_x = RIGHT_WALL - 20.0;
                e.state.vel_x = 0.0;
            }
            let step = e.step(&DiscreteAct::from(ACT_LEFT));
            if step.is_done {
                done = true;
                break;
            }
        }
        assert!(done);
        assert_eq!(e.state.lives, 0);
        Ok(())
    }

    #[test]
    fn long_episodes_are_truncated() -> Result<()> {
        let config = GameEnvConfig::default()
            .name("BreakoutNoFrameskip-v4")
            .max_episode_steps(10);
        let mut e = BreakoutEnv::build(&config, 0)?;
        e.reset()?;

        let mut n = 0;
        loop {
            n += 1;
            if e.step(&DiscreteAct::from(ACT_NOOP)).is_done {
                break;
            }
        }
        assert_eq!(n, 10);
        Ok(())
    }

    #[test]
    fn same_seed_same_serve() -> Result<()> {
        let mut e1 = env("BreakoutNoFrameskip-v4");
        let mut e2 = env("BreakoutNoFrameskip-v4");
        e1.reset()?;
        e2.reset()?;
        e1.step(&DiscreteAct::from(ACT_FIRE));
        e2.step(&DiscreteAct::from(ACT_FIRE));
        assert_eq!(e1.state.vel_x, e2.state.vel_x);
        Ok(())
    }
}
