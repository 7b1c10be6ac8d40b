use anyhow::Result;
use candle_core::Device;
use clap::{Parser, ValueEnum};
use dqn_atari::{
    base::{Agent as _, Env as _},
    cnn::{Cnn, CnnConfig},
    dqn::{Dqn, DqnConfig, DqnModelConfig, EpsilonGreedy},
    env::{BreakoutEnv, GameEnvConfig},
    evaluator::{DefaultEvaluator, Evaluator as _},
    opt::OptimizerConfig,
    processor::{FrameProcessor, FrameProcessorConfig, WINDOW_LENGTH},
    record::CsvRecorder,
    replay_buffer::{FrameReplayBuffer, FrameReplayBufferConfig},
    trainer::{Trainer, TrainerConfig},
};
use log::info;
use std::path::{Path, PathBuf};

const LR: f64 = 0.00025;
const DISCOUNT_FACTOR: f64 = 0.99;
const BATCH_SIZE: usize = 32;
const REPLAY_BUFFER_CAPACITY: usize = 500_000;
const WARMUP_PERIOD: usize = 50_000;
const OPT_INTERVAL: usize = 4;
const MAX_STEPS: usize = 1_750_000;
// Target network updates every 10,000 environment steps.
const SYNC_INTERVAL: usize = 10_000 / OPT_INTERVAL;
const CHECKPOINT_INTERVAL: usize = 250_000;
const FLUSH_RECORD_INTERVAL: usize = 10_000;
const FINAL_EXPLORATION_STEP: usize = 1_000_000;
const EPS_TEST: f64 = 0.05;
const N_EPISODES_PER_EVAL: usize = 10;
const SEED: u64 = 123;

type Env = BreakoutEnv;
type ReplayBuffer = FrameReplayBuffer;
type DqnAgent = Dqn<Cnn, ReplayBuffer>;

#[derive(Clone, Debug, ValueEnum)]
enum Mode {
    Train,
    Test,
}

/// Train or evaluate a DQN agent on Breakout
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Run mode
    #[arg(long, value_enum, default_value = "train")]
    mode: Mode,

    /// Environment name
    #[arg(long, default_value = "BreakoutDeterministic-v4")]
    env_name: String,

    /// Weights file to evaluate; the default path of the
    /// environment is used when omitted
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Directory for weights, logs and videos
    #[arg(long = "output_dir")]
    output_dir: Option<PathBuf>,

    /// Record a playback video while evaluating
    #[arg(long, default_value_t = false)]
    show: bool,
}

mod utils {
    use super::*;

    pub fn device() -> Result<Device> {
        if candle_core::utils::cuda_is_available() {
            info!("Using CUDA device 0");
            Ok(Device::new_cuda(0)?)
        } else {
            info!("Using CPU");
            Ok(Device::Cpu)
        }
    }

    pub fn output_dir(args: &Args) -> PathBuf {
        args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn weights_path(args: &Args) -> PathBuf {
        output_dir(args).join(format!("dqn_{}_weights.safetensors", args.env_name))
    }

    pub fn checkpoint_template(args: &Args) -> String {
        output_dir(args)
            .join(format!("dqn_{}_weights_{{step}}.safetensors", args.env_name))
            .to_string_lossy()
            .into_owned()
    }

    pub fn log_path(args: &Args) -> PathBuf {
        output_dir(args).join(format!("dqn_{}_log.csv", args.env_name))
    }

    pub fn n_actions(env_config: &GameEnvConfig) -> Result<usize> {
        Ok(Env::build(env_config, 0)?.n_actions())
    }
}

mod config {
    use super::*;

    pub fn env_config(name: impl Into<String>) -> GameEnvConfig {
        GameEnvConfig::default().name(name)
    }

    pub fn agent_config(n_actions: usize) -> DqnConfig<CnnConfig> {
        let model_config = DqnModelConfig::default()
            .q_config(CnnConfig::new(WINDOW_LENGTH as i64, n_actions as i64))
            .opt_config(OptimizerConfig::Adam { lr: LR });
        let explorer = EpsilonGreedy::with_final_step(FINAL_EXPLORATION_STEP);

        DqnConfig::default()
            .model_config(model_config)
            .batch_size(BATCH_SIZE)
            .discount_factor(DISCOUNT_FACTOR)
            .min_transitions_warmup(WARMUP_PERIOD)
            .soft_update_interval(SYNC_INTERVAL)
            .explorer(explorer)
            .eps_test(EPS_TEST)
    }

    pub fn trainer_config(args: &Args) -> TrainerConfig {
        TrainerConfig::default()
            .max_steps(MAX_STEPS)
            .opt_interval(OPT_INTERVAL)
            .warmup_period(WARMUP_PERIOD)
            .checkpoint_interval(CHECKPOINT_INTERVAL)
            .checkpoint_path(Some(utils::checkpoint_template(args)))
            .flush_record_interval(FLUSH_RECORD_INTERVAL)
            .seed(SEED)
    }
}

fn train(args: &Args) -> Result<()> {
    let env_config = config::env_config(&args.env_name);
    let n_actions = utils::n_actions(&env_config)?;

    let mut agent = DqnAgent::build(config::agent_config(n_actions), utils::device()?)?;
    let processor_config = FrameProcessorConfig::default()
        .show(args.show)
        .output_dir(Some(utils::output_dir(args)));
    let mut processor = FrameProcessor::build(&processor_config);
    let mut recorder = CsvRecorder::new(utils::log_path(args))?;

    let replay_buffer_config = FrameReplayBufferConfig::default()
        .capacity(REPLAY_BUFFER_CAPACITY)
        .seed(SEED);
    let mut trainer = Trainer::<Env, ReplayBuffer>::build(
        config::trainer_config(args),
        env_config,
        replay_buffer_config,
    );

    trainer.train(&mut agent, &mut processor, &mut recorder)?;
    processor.finish()?;

    let weights_path = utils::weights_path(args);
    agent.save(&weights_path)?;
    info!("Saved final weights to {:?}", &weights_path);

    Ok(())
}

fn test(args: &Args) -> Result<()> {
    let env_config = config::env_config(&args.env_name);
    let n_actions = utils::n_actions(&env_config)?;

    let mut agent = DqnAgent::build(config::agent_config(n_actions), utils::device()?)?;
    let weights_path = args
        .weights
        .clone()
        .unwrap_or_else(|| utils::weights_path(args));
    agent.load(Path::new(&weights_path))?;
    agent.eval();

    let processor_config = FrameProcessorConfig::default()
        .show(args.show)
        .output_dir(Some(utils::output_dir(args)));
    let mut processor = FrameProcessor::build(&processor_config);

    let mut evaluator = DefaultEvaluator::<Env>::new(&env_config, 0, N_EPISODES_PER_EVAL)?;
    let record = evaluator.evaluate(&mut agent, &mut processor)?;
    processor.finish()?;

    info!(
        "Mean return over {} episodes: {:.2}",
        N_EPISODES_PER_EVAL,
        record.get_scalar("episode_return")?
    );

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.mode {
        Mode::Train => train(&args)?,
        Mode::Test => test(&args)?,
    }

    Ok(())
}
