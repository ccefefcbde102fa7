use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use donor_segments::{
    generate_segment_suggestions, predict_churn, update_propensity_scores, DonorDB, RiskTier,
    SegmentationConfig,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "donor-segments", version, about = "Donor segmentation and scoring jobs")]
struct Cli {
    /// SQLite donor database
    #[arg(long, env = "DONOR_SEGMENTS_DB", default_value = "donors.db")]
    db: String,

    /// JSON file overriding segmentation defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cluster active donors and store segment suggestions
    Suggest {
        organization_id: String,
        /// Seed the centroid picker for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Recompute RFM propensity scores
    Score {
        #[arg(long)]
        organization: Option<String>,
    },
    /// Predict churn probability for active donors
    Churn {
        #[arg(long)]
        organization: Option<String>,
    },
    /// List stored segment suggestions
    Suggestions { organization_id: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SegmentationConfig::from_file(path)?,
        None => SegmentationConfig::default(),
    };
    let mut db = DonorDB::open(&cli.db)?;

    match cli.command {
        Command::Suggest {
            organization_id,
            seed,
        } => suggest(&mut db, &organization_id, &config, seed),
        Command::Score { organization } => score(&mut db, organization.as_deref()),
        Command::Churn { organization } => churn(&mut db, organization.as_deref()),
        Command::Suggestions { organization_id } => list(&db, &organization_id),
    }
}

fn suggest(
    db: &mut DonorDB,
    organization_id: &str,
    config: &SegmentationConfig,
    seed: Option<u64>,
) -> Result<()> {
    let start = Instant::now();
    println!("Generating segment suggestions for organization {}...\n", organization_id);

    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let report = generate_segment_suggestions(db, organization_id, config, &mut rng, Utc::now())
        .context("Segment suggestion run failed")?;

    println!("  {} donors found", report.donor_count);
    if report.donor_count == 0 {
        println!("\n  No donors found. No suggestions generated.");
        return Ok(());
    }

    println!("  Clustering with k={}...", report.k);
    println!(
        "  ✓ {} clusters identified in {} iterations\n",
        report.cluster_count, report.iterations
    );

    for s in &report.suggestions {
        println!(
            "  ✓ {}: {} donors (confidence: {:.1}%)",
            s.name,
            s.donor_count,
            s.confidence * 100.0
        );
    }

    if report.suggestions.is_empty() {
        println!("  No suggestions generated (clusters too small)");
    } else {
        println!(
            "\n✓ {} suggestions created, {} pending suggestions replaced [{:.2}s]",
            report.suggestions.len(),
            report.replaced,
            start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

fn score(db: &mut DonorDB, organization: Option<&str>) -> Result<()> {
    println!("Calculating propensity scores...\n");

    let report = update_propensity_scores(db, organization, Utc::now())
        .context("Propensity scoring failed")?;

    println!("  {} donors found\n", report.scored.len());
    for s in report.scored.iter().take(5) {
        println!(
            "  ✓ {}: R={} F={} M={} → score={}",
            s.email.as_deref().unwrap_or(&s.donor_id),
            s.rfm.recency,
            s.rfm.frequency,
            s.rfm.monetary,
            s.score
        );
    }

    println!("\n✓ {} donors updated", report.scored.len());
    Ok(())
}

fn churn(db: &mut DonorDB, organization: Option<&str>) -> Result<()> {
    println!("Predicting churn...\n");

    let report = predict_churn(db, organization, Utc::now()).context("Churn prediction failed")?;

    for p in report.high_risk() {
        let last = match p.days_since_last_donation {
            Some(days) => format!("{} days", days),
            None => "never".to_string(),
        };
        println!(
            "  ⚠ {}: high risk ({:.1}%), last donation: {}",
            p.email.as_deref().unwrap_or(&p.donor_id),
            p.probability * 100.0,
            last
        );
    }

    println!("\n=== Churn Statistics ===");
    println!("Donors updated:       {}", report.predictions.len());
    println!("High risk (≥75%):     {}", report.count(RiskTier::High));
    println!("Medium risk (50-74%): {}", report.count(RiskTier::Medium));
    println!("Low risk (<50%):      {}", report.count(RiskTier::Low));
    Ok(())
}

fn list(db: &DonorDB, organization_id: &str) -> Result<()> {
    let suggestions = db.list_suggestions(organization_id)?;
    if suggestions.is_empty() {
        println!("No suggestions stored for organization {}", organization_id);
        return Ok(());
    }

    for s in &suggestions {
        let status = if s.is_accepted { "accepted" } else { "pending" };
        println!(
            "{} [{}] {} donors, confidence {:.1}%, criteria {}",
            s.name,
            status,
            s.donor_count,
            s.confidence * 100.0,
            serde_json::to_string(&s.criteria)?
        );
        println!("    {}", s.description);
    }
    Ok(())
}
