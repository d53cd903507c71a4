//! Arcana - verifiable card draws from the command line
//!
//! ## Commands
//!
//! - `sample`: draw cards deterministically from a seed
//! - `verify`: check a recorded reading against its proof
//! - `spreads`: list the spread layouts
//! - `card`: show one card's reference data
//! - `read`: perform a full reading against the fixture chain

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use arcana_core::fakes::{FixtureChain, ScriptedProvider};
use arcana_core::{
    card, sampler, AiProvider, EngineConfig, EntropySource, HttpAiProvider, HttpProviderConfig,
    InterpretationOptions, InterpretationOrchestrator, Layout, LexiconAnalyzer, ProviderError,
    ReadingRequest, ReadingResponse, ReadingService, Verification, DECK_SIZE, METRICS, SPREADS,
};
use arcana_state::fakes::MemoryHistoryStore;
use arcana_state::{Draw, HistoryRecord, HistoryStore, RequesterId, Tier};

/// Finalized head of the offline chain used by `read`.
const FIXTURE_HEAD_SLOT: u64 = 1_000;

#[derive(Parser)]
#[command(name = "arcana")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verifiable card draws with blockchain-anchored seeds", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Engine configuration file (TOML)
    #[arg(long, global = true, env = "ARCANA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw cards deterministically from a seed
    Sample {
        /// Seed bytes, as text unless --hex is given
        #[arg(long)]
        seed: String,

        /// Decode the seed as hex
        #[arg(long)]
        hex: bool,

        /// Number of cards (defaults to the spread's size, or 3)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Spread layout to label the cards with
        #[arg(short, long)]
        spread: Option<String>,
    },

    /// Verify a recorded reading (or bare draw) JSON file
    Verify {
        /// Path to the record
        record: PathBuf,
    },

    /// List the available spreads
    Spreads,

    /// Show a card's reference data
    Card {
        /// Card id (0..=77)
        id: u8,
    },

    /// Perform a reading against the offline fixture chain
    Read {
        /// The question to ask
        #[arg(short, long)]
        question: String,

        /// Spread layout
        #[arg(short, long)]
        spread: Option<String>,

        /// Number of cards for a free draw
        #[arg(short = 'n', long)]
        cards: Option<usize>,

        /// Service tier
        #[arg(short, long, default_value = "free")]
        tier: Tier,

        /// Ask for per-card elaboration (premium only)
        #[arg(long)]
        elaborate: bool,

        /// Synthesis passes (premium only)
        #[arg(long, default_value = "1")]
        passes: u8,

        /// Completion endpoint; without one the narrative is degraded
        #[arg(long, env = "ARCANA_PROVIDER_URL")]
        provider_url: Option<String>,

        /// Requester id recorded with the reading
        #[arg(long, default_value = "cli")]
        requester: String,

        /// Write the full record (with proof) to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Arguments of the `read` command.
struct ReadArgs {
    request: ReadingRequest,
    provider_url: Option<String>,
    requester: RequesterId,
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    arcana_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Sample {
            seed,
            hex,
            count,
            spread,
        } => cmd_sample(&seed, hex, count, spread.as_deref()),
        Commands::Verify { record } => cmd_verify(&record),
        Commands::Spreads => cmd_spreads(),
        Commands::Card { id } => cmd_card(id),
        Commands::Read {
            question,
            spread,
            cards,
            tier,
            elaborate,
            passes,
            provider_url,
            requester,
            out,
        } => {
            let config = EngineConfig::resolve(cli.config.as_deref())?;
            let mut options = InterpretationOptions::default().with_passes(passes);
            if elaborate {
                options = options.elaborate();
            }
            let mut request = ReadingRequest::new(question, tier).with_options(options);
            request.spread = spread;
            request.num_cards = cards;

            let args = ReadArgs {
                request,
                provider_url,
                requester: RequesterId::new(requester),
                out,
            };
            cmd_read(config, args).await
        }
    }
}

fn parse_seed(seed: &str, is_hex: bool) -> Result<Vec<u8>> {
    let bytes = if is_hex {
        hex::decode(seed.trim()).context("seed is not valid hex")?
    } else {
        seed.as_bytes().to_vec()
    };
    if bytes.is_empty() {
        bail!("seed must not be empty");
    }
    Ok(bytes)
}

/// Draw from a caller-supplied seed
fn cmd_sample(seed: &str, is_hex: bool, count: Option<usize>, spread: Option<&str>) -> Result<()> {
    let seed = parse_seed(seed, is_hex)?;
    let layout = Layout::plan(spread, count)?;
    let samples = sampler::draw(&seed, layout.card_count())?;
    let cards = layout.resolve(&samples)?;

    println!("{} (seed {})", layout.display_name, hex::encode(&seed));
    let width = layout.labels.iter().map(String::len).max().unwrap_or(0);
    for drawn in &cards {
        println!(
            "  {:width$}  {} ({})",
            drawn.position,
            drawn.card_name,
            drawn.orientation
        );
    }
    Ok(())
}

/// Load a draw from a reading record, or from a bare draw.
fn load_draw(path: &Path) -> Result<Draw> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if let Ok(record) = serde_json::from_str::<HistoryRecord>(&content) {
        return Ok(record.draw);
    }
    serde_json::from_str::<Draw>(&content)
        .with_context(|| format!("{} is neither a reading record nor a draw", path.display()))
}

fn verify_file(path: &Path) -> Result<Verification> {
    let draw = load_draw(path)?;
    Ok(arcana_core::verify_draw(&draw, &draw.proof))
}

/// Verify a recorded draw
fn cmd_verify(path: &Path) -> Result<()> {
    let verification = verify_file(path)?;
    match verification.mismatch {
        None => {
            println!("✓ {} verifies", path.display());
            Ok(())
        }
        Some(reason) => bail!("{} does not verify: {}", path.display(), reason),
    }
}

/// List spreads
fn cmd_spreads() -> Result<()> {
    for spread in SPREADS {
        println!(
            "{:14} {:20} {:>2} cards  {}",
            spread.name,
            spread.display_name,
            spread.card_count(),
            spread.positions.join(", ")
        );
    }
    println!(
        "{:14} {:20} 1-10 cards  Card 1, Card 2, ...",
        "free_draw", "Free Draw"
    );
    Ok(())
}

/// Show one card
fn cmd_card(id: u8) -> Result<()> {
    let card = card(id)
        .with_context(|| format!("no card with id {id} (the deck has {DECK_SIZE} cards)"))?;

    println!("{:>2}  {}", card.id, card.name);
    match card.suit {
        Some(suit) => println!("    {:?} arcana, {:?}, rank {}", card.arcana, suit, card.rank),
        None => println!("    {:?} arcana, rank {}", card.arcana, card.rank),
    }
    println!("    Upright:  {}", card.upright);
    println!("    Reversed: {}", card.reversed);
    Ok(())
}

fn provider_for(url: Option<&str>) -> Result<Arc<dyn AiProvider>> {
    match url {
        Some(url) => {
            let mut config = HttpProviderConfig::from_env();
            config.endpoint = url.to_string();
            Ok(Arc::new(HttpAiProvider::new(config)?))
        }
        None => Ok(Arc::new(ScriptedProvider::failing(ProviderError::Rejected(
            "no provider configured".to_string(),
        )))),
    }
}

async fn run_reading(config: EngineConfig, args: &ReadArgs) -> Result<ReadingResponse> {
    let chain = Arc::new(FixtureChain::producing(FIXTURE_HEAD_SLOT));
    let store = Arc::new(MemoryHistoryStore::new());
    let orchestrator = InterpretationOrchestrator::with_sentiment(
        provider_for(args.provider_url.as_deref())?,
        Arc::new(LexiconAnalyzer),
        config.orchestrator,
    );
    let service = ReadingService::new(
        EntropySource::new(chain, config.entropy),
        Arc::new(orchestrator),
        store.clone(),
    );

    let response = service
        .perform(&args.requester, args.request.clone())
        .await?;

    if let Some(out) = &args.out {
        let record = store
            .get_by_id(&response.draw_id, &args.requester)
            .await
            .context("reading was not recorded")?;
        std::fs::write(out, serde_json::to_string_pretty(&record)?)
            .with_context(|| format!("failed to write {}", out.display()))?;
        info!(path = %out.display(), "record written");
    }
    Ok(response)
}

/// Perform a reading
async fn cmd_read(config: EngineConfig, args: ReadArgs) -> Result<()> {
    let response = run_reading(config, &args).await?;

    println!("Reading {} ({})", response.draw_id, response.spread);
    println!(
        "Commitment {} anchored at {}",
        response.proof.commitment_hash, response.proof.blockchain_reference
    );
    println!();
    for position in &response.positions {
        println!("{}: {} ({})", position.label, position.card, position.orientation);
        println!("    {}", position.text);
    }
    println!();
    println!("{}", response.synthesis);
    if response.degraded {
        println!();
        println!("(interpretation degraded)");
    }
    if !response.recorded {
        println!("(reading was not saved to history)");
    }
    if let Some(out) = &args.out {
        println!("Record written to {}", out.display());
    }

    METRICS.flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION: &str = "What should I focus on this season?";

    fn read_args(out: Option<PathBuf>) -> ReadArgs {
        ReadArgs {
            request: ReadingRequest::new(QUESTION, Tier::Free),
            provider_url: None,
            requester: RequesterId::new("cli-test"),
            out,
        }
    }

    #[test]
    fn test_parse_seed_text_and_hex() {
        assert_eq!(parse_seed("abc123", false).unwrap(), b"abc123");
        assert_eq!(parse_seed("616263", true).unwrap(), b"abc");
        assert!(parse_seed("zz", true).is_err());
        assert!(parse_seed("", false).is_err());
    }

    #[test]
    fn test_sample_default_and_spread() {
        assert!(cmd_sample("abc123", false, None, None).is_ok());
        assert!(cmd_sample("abc123", false, None, Some("celtic_cross")).is_ok());
        assert!(cmd_sample("abc123", false, Some(7), None).is_ok());
    }

    #[test]
    fn test_sample_rejects_bad_requests() {
        assert!(cmd_sample("abc123", false, Some(11), None).is_err());
        assert!(cmd_sample("abc123", false, Some(0), None).is_err());
        assert!(cmd_sample("abc123", false, Some(4), Some("three_card")).is_err());
        assert!(cmd_sample("abc123", false, None, Some("horseshoe")).is_err());
    }

    #[test]
    fn test_card_lookup() {
        assert!(cmd_card(0).is_ok());
        assert!(cmd_card(77).is_ok());
        let err = cmd_card(78).unwrap_err();
        assert!(err.to_string().contains("78"));
    }

    #[test]
    fn test_cli_parses_read_flags() {
        let cli = Cli::try_parse_from([
            "arcana",
            "read",
            "--question",
            QUESTION,
            "--tier",
            "premium",
            "--cards",
            "5",
            "--elaborate",
        ])
        .unwrap();
        match cli.command {
            Commands::Read {
                tier,
                cards,
                elaborate,
                passes,
                ..
            } => {
                assert_eq!(tier, Tier::Premium);
                assert_eq!(cards, Some(5));
                assert!(elaborate);
                assert_eq!(passes, 1);
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_tier() {
        assert!(Cli::try_parse_from(["arcana", "read", "-q", QUESTION, "-t", "gold"]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_without_provider_is_degraded() {
        let response = run_reading(EngineConfig::default(), &read_args(None))
            .await
            .unwrap();
        assert!(response.degraded);
        assert!(response.recorded);
        assert_eq!(response.spread, "three_card");
        assert_eq!(response.positions.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_then_verify_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");

        run_reading(EngineConfig::default(), &read_args(Some(path.clone())))
            .await
            .unwrap();

        assert!(verify_file(&path).unwrap().valid);
        assert!(cmd_verify(&path).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_detects_edited_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        run_reading(EngineConfig::default(), &read_args(Some(path.clone())))
            .await
            .unwrap();

        let mut record: HistoryRecord =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        record.draw.cards.reverse();
        std::fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

        let verification = verify_file(&path).unwrap();
        assert!(!verification.valid);
        assert!(cmd_verify(&path).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_accepts_bare_draw() {
        let dir = tempfile::tempdir().unwrap();
        let record_path = dir.path().join("record.json");
        run_reading(EngineConfig::default(), &read_args(Some(record_path.clone())))
            .await
            .unwrap();

        let draw = load_draw(&record_path).unwrap();
        let draw_path = dir.path().join("draw.json");
        std::fs::write(&draw_path, serde_json::to_string(&draw).unwrap()).unwrap();
        assert!(verify_file(&draw_path).unwrap().valid);
    }

    #[test]
    fn test_verify_rejects_unrelated_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        std::fs::write(&path, r#"{"hello": "world"}"#).unwrap();
        assert!(verify_file(&path).is_err());
    }
}
