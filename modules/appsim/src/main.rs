use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app_harness_client::AppHarnessClient;
use appsim::{
    AppSimulator, Config, DecodePolicy, DenseNetwork, DispatchTarget, GeneratorConfig,
    HistorySource, HttpTarget, InteractionGenerator, InteractionHistory, MarkovPredictor,
    Pipeline, PipelineError, Predictor, RunRecord, SimulatedApp, Stage, resolve_decode,
};

#[derive(Parser)]
#[command(name = "appsim", about = "Replay model-generated user interactions against a web app")]
struct Cli {
    /// Number of interactions to generate
    #[arg(long)]
    count: Option<usize>,

    /// Historical interaction CSV
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Dense-network weights (JSON); defaults to a Markov model fitted on the dataset
    #[arg(long)]
    model: Option<PathBuf>,

    /// argmax | sample | sample:<seed>
    #[arg(long)]
    decode: Option<DecodePolicy>,

    /// Seed for sampling; implies `--decode sample` unless argmax is given
    #[arg(long)]
    seed: Option<u64>,

    /// Remote app harness; defaults to an in-process simulated app
    #[arg(long)]
    target_url: Option<String>,

    /// Re-run simulate/analyze/render for the batch in a saved run record
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Write the chart definition here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(count) = self.count {
            config.count = count;
        }
        if let Some(ref dataset) = self.dataset {
            config.dataset = dataset.clone();
        }
        if let Some(ref model) = self.model {
            config.model_path = Some(model.clone());
        }
        config.decode = resolve_decode(self.decode, self.seed, config.decode);
        if let Some(ref url) = self.target_url {
            config.target_url = Some(url.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("appsim=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    info!("appsim starting...");

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    config.log_redacted();

    let history = match InteractionHistory::load(&config.dataset).await {
        Ok(history) => Arc::new(history),
        Err(e) => return Err(PipelineError::new(Stage::Generate, e).into()),
    };

    let predictor: Arc<dyn Predictor> = match config.model_path {
        Some(ref path) => match DenseNetwork::load(path).await {
            Ok(network) => Arc::new(network),
            Err(e) => return Err(PipelineError::new(Stage::Generate, e).into()),
        },
        None => Arc::new(MarkovPredictor::fit(&history)),
    };

    let target: Arc<dyn DispatchTarget> = match config.target_url {
        Some(ref url) => {
            let client = AppHarnessClient::new(
                url,
                config.target_token.as_deref(),
                config.dispatch_timeout,
            )
            .context("Failed to build harness client")?;
            Arc::new(HttpTarget::new(Arc::new(client)))
        }
        None => Arc::new(SimulatedApp::from_history(&history.profile())),
    };

    let generator = InteractionGenerator::new(
        GeneratorConfig::new(HistorySource::Loaded(history))
            .with_decode(config.decode)
            .with_inference_timeout(config.inference_timeout),
        predictor,
    );
    let simulator = AppSimulator::new(target).with_dispatch_timeout(config.dispatch_timeout);
    let pipeline = Pipeline::new(generator, simulator);

    let chart = match cli.replay {
        Some(ref path) => {
            let record = RunRecord::load(path)
                .with_context(|| format!("Failed to load run record {}", path.display()))?;
            let Some(batch) = record.batch() else {
                bail!("Run record {} holds no batch to replay", record.run_id);
            };
            info!(run_id = %record.run_id, events = batch.len(), "Replaying recorded batch");
            pipeline.replay(batch).await?.chart
        }
        None => {
            let (record, result) = pipeline.run_recorded(config.count).await;
            if let Some(ref dir) = config.run_dir {
                let path = record.default_path(dir);
                record.save(&path)?;
                info!(path = %path.display(), run_id = %record.run_id, "Saved run record");
            }
            result?.chart
        }
    };

    let definition = serde_json::to_string_pretty(&chart.to_vega_lite())?;
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, definition)?;
            info!(path = %path.display(), "Wrote chart definition");
        }
        None => println!("{definition}"),
    }
    eprint!("{chart}");

    Ok(())
}
