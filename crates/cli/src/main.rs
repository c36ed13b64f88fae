use anyhow::Context;
use clap::{ArgGroup, Parser, ValueEnum};
use prosody_coach_core::asr::{AsrBackend, TranscriptFileBackend};
use prosody_coach_core::config::{
    resolve_api_key, resolve_optional_string, resolve_string_with_default, AnalysisConfig,
    AsrConfig, Env, FeedbackConfig, Language, StdEnv, DEFAULT_ASR_MODEL, DEFAULT_FEEDBACK_HOST,
    DEFAULT_FEEDBACK_MODEL, DEFAULT_LANGUAGE, ENV_FEEDBACK_API_KEY, ENV_FEEDBACK_HOST,
    ENV_FEEDBACK_MODEL, ENV_FEEDBACK_REQUEST_ID,
};
use prosody_coach_core::decode::{Decoder, FfmpegAudioDecoder, SymphoniaAudioDecoder};
use prosody_coach_core::feedback::{ClovaFeedbackClient, FeedbackGenerator, RuleBasedFeedback};
use prosody_coach_core::pipeline::{AnalysisPipeline, PipelineConfig};
use prosody_coach_core::sink::{AnalysisSink, JsonFileSink, WriterSink};
use prosody_coach_core::summary::SpeechSummary;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DecoderKind {
    Ffmpeg,
    Symphonia,
}

#[derive(Parser, Debug)]
#[command(name = "prosody-coach")]
#[command(about = "Per-segment and per-word prosody metrics for recorded speech")]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .multiple(false)
        .args(["transcript", "model"])
))]
struct Args {
    /// Audio file to analyze.
    audio: PathBuf,

    /// Precomputed transcript JSON (`{"text", "segments": [...]}`).
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Whisper ggml model file. Needs the `whisper-rs` feature.
    #[arg(long)]
    model: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    #[arg(long)]
    no_word_timestamps: bool,

    /// Write the analysis here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = DecoderKind::Ffmpeg)]
    decoder: DecoderKind,

    /// Measure segments on all cores.
    #[arg(long)]
    parallel: bool,

    /// Print coaching feedback after the analysis.
    #[arg(long)]
    feedback: bool,

    /// Print an outline of the transcript after the analysis.
    #[arg(long)]
    outline: bool,

    #[arg(long)]
    feedback_api_key: Option<String>,

    #[arg(long)]
    feedback_host: Option<String>,

    #[arg(long)]
    feedback_model: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug)]
struct RunConfig {
    audio: PathBuf,
    transcript: Option<PathBuf>,
    model: Option<PathBuf>,
    output: Option<PathBuf>,
    decoder: DecoderKind,
    pipeline: PipelineConfig,
    feedback: FeedbackConfig,
    want_feedback: bool,
    want_outline: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(args, &env)?;

    tracing::info!(
        audio = %cfg.audio.display(),
        language = cfg.pipeline.asr.language.as_str(),
        decoder = ?cfg.decoder,
        parallel = cfg.pipeline.analysis.parallel,
        "config loaded"
    );

    run(cfg).await
}

async fn run(cfg: RunConfig) -> anyhow::Result<()> {
    let decoder = build_decoder(cfg.decoder, cfg.pipeline.analysis.sample_rate);
    let asr = build_asr(&cfg)?;
    let pipeline = AnalysisPipeline::new(decoder, asr, cfg.pipeline.clone());

    let mut sink: Box<dyn AnalysisSink> = match &cfg.output {
        Some(path) => Box::new(JsonFileSink::new(path)),
        None => Box::new(WriterSink::new(std::io::stdout())),
    };
    let result = pipeline
        .analyze_into(&cfg.audio, sink.as_mut())
        .await
        .with_context(|| format!("analysis of {} failed", cfg.audio.display()))?;

    if !(cfg.want_feedback || cfg.want_outline) {
        return Ok(());
    }

    let generator = build_feedback(&cfg.feedback)?;
    if cfg.want_feedback {
        match SpeechSummary::from_result(&result) {
            Some(summary) => {
                let feedback = generator
                    .coach(&summary)
                    .await
                    .context("coaching feedback failed")?;
                println!("{}", to_pretty_json(&feedback)?);
            }
            None => tracing::warn!("no segment could be measured, skipping feedback"),
        }
    }
    if cfg.want_outline {
        let outline = generator
            .outline(&result.text)
            .await
            .context("outline generation failed")?;
        println!("{}", to_pretty_json(&outline)?);
    }

    Ok(())
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn build_decoder(kind: DecoderKind, sample_rate: u32) -> Decoder {
    match kind {
        DecoderKind::Ffmpeg => Decoder::new(Arc::new(FfmpegAudioDecoder::new(sample_rate))),
        DecoderKind::Symphonia => Decoder::new(Arc::new(SymphoniaAudioDecoder::new(sample_rate))),
    }
}

fn build_asr(cfg: &RunConfig) -> anyhow::Result<Arc<dyn AsrBackend>> {
    if let Some(path) = &cfg.transcript {
        return Ok(Arc::new(TranscriptFileBackend::new(path)));
    }
    let Some(model) = &cfg.model else {
        anyhow::bail!("one of --transcript or --model must be provided");
    };
    whisper_backend(model)
}

#[cfg(feature = "whisper-rs")]
fn whisper_backend(model: &std::path::Path) -> anyhow::Result<Arc<dyn AsrBackend>> {
    let backend = prosody_coach_core::asr::WhisperAsrBackend::new(model)?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "whisper-rs"))]
fn whisper_backend(model: &std::path::Path) -> anyhow::Result<Arc<dyn AsrBackend>> {
    anyhow::bail!(
        "--model {} needs a build with the `whisper-rs` feature; pass --transcript instead",
        model.display()
    )
}

fn build_feedback(cfg: &FeedbackConfig) -> anyhow::Result<Box<dyn FeedbackGenerator>> {
    if cfg.api_key.is_none() {
        tracing::warn!(
            "no {ENV_FEEDBACK_API_KEY} configured, using offline rule-based feedback"
        );
        return Ok(Box::new(RuleBasedFeedback::new()));
    }
    let client = ClovaFeedbackClient::new(cfg)?;
    tracing::info!(endpoint = %client.endpoint(), "using remote feedback service");
    Ok(Box::new(client))
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: Args, env: &impl Env) -> anyhow::Result<RunConfig> {
    let language = Language::new(args.language)?;
    let model_name = args
        .model
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| DEFAULT_ASR_MODEL.to_owned());

    let pipeline = PipelineConfig {
        analysis: AnalysisConfig::default().with_parallel(args.parallel),
        asr: AsrConfig {
            model: model_name,
            language,
            word_timestamps: !args.no_word_timestamps,
        },
    };

    let api_key = resolve_api_key(args.feedback_api_key, ENV_FEEDBACK_API_KEY, env)?;
    let host = resolve_string_with_default(
        args.feedback_host,
        ENV_FEEDBACK_HOST,
        env,
        DEFAULT_FEEDBACK_HOST,
    );
    let model = resolve_string_with_default(
        args.feedback_model,
        ENV_FEEDBACK_MODEL,
        env,
        DEFAULT_FEEDBACK_MODEL,
    );
    let feedback = FeedbackConfig::new(&host, model, api_key)?
        .with_request_id(resolve_optional_string(None, ENV_FEEDBACK_REQUEST_ID, env));

    Ok(RunConfig {
        audio: args.audio,
        transcript: args.transcript,
        model: args.model,
        output: args.output,
        decoder: args.decoder,
        pipeline,
        feedback,
        want_feedback: args.feedback,
        want_outline: args.outline,
    })
}
