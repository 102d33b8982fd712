use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};

mod artifacts;
mod dashboard;
mod encoding;
mod forest;
mod logging;
mod metrics;
mod models;
mod predict;
mod recommend;
mod render;
mod sample;
mod server;
mod shap;
mod training;

use artifacts::ArtifactBundle;
use forest::ForestParams;
use models::{Gender, StudentProfile};
use predict::Predictor;

#[derive(Parser)]
#[command(name = "grade-dashboard")]
#[command(about = "Student grade prediction dashboard with learning recommendations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the random forest and write model, scaler and encoder artifacts
    Train {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, env = "GRADE_DASHBOARD_ARTIFACTS", default_value = "artifacts")]
        out: PathBuf,
        #[arg(long, default_value_t = 100)]
        trees: usize,
        #[arg(long, default_value_t = 20)]
        max_depth: usize,
        #[arg(long, default_value_t = training::DEFAULT_TEST_SIZE)]
        test_size: f64,
        /// Forest seed; unset draws a fresh one
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = training::DEFAULT_SPLIT_SEED)]
        split_seed: u64,
    },
    /// Serve the dashboard and JSON API
    Serve {
        #[arg(long, env = "GRADE_DASHBOARD_ARTIFACTS", default_value = "artifacts")]
        artifacts: PathBuf,
        #[arg(long, env = "GRADE_DASHBOARD_BIND", default_value = "127.0.0.1:8501")]
        bind: SocketAddr,
    },
    /// Predict one profile and print the result
    Predict {
        #[arg(long, env = "GRADE_DASHBOARD_ARTIFACTS", default_value = "artifacts")]
        artifacts: PathBuf,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Write a markdown report for one profile
    Report {
        #[arg(long, env = "GRADE_DASHBOARD_ARTIFACTS", default_value = "artifacts")]
        artifacts: PathBuf,
        #[command(flatten)]
        profile: ProfileArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write a synthetic training CSV
    Sample {
        #[arg(long, default_value = "students.csv")]
        out: PathBuf,
        #[arg(long, default_value_t = 1000)]
        rows: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Args)]
struct ProfileArgs {
    #[arg(long, default_value_t = 20)]
    age: u32,
    #[arg(long, value_enum, default_value_t = Gender::Male)]
    gender: Gender,
    #[arg(long, default_value_t = 15)]
    study_hours: u32,
    #[arg(long, default_value_t = 90)]
    attendance: u32,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    participation: bool,
    /// Self-reported stress, 0-10
    #[arg(long, default_value_t = 5)]
    stress: u32,
    #[arg(long, default_value_t = 7)]
    sleep: u32,
    #[arg(long, default_value_t = 5)]
    social_media: u32,
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    kinesthetic: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    reading_writing: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    visual: bool,
}

impl From<ProfileArgs> for StudentProfile {
    fn from(args: ProfileArgs) -> Self {
        Self {
            age: args.age,
            gender: args.gender,
            study_hours: args.study_hours,
            attendance: args.attendance,
            participation: args.participation,
            stress: args.stress,
            sleep: args.sleep,
            social_media: args.social_media,
            kinesthetic: args.kinesthetic,
            reading_writing: args.reading_writing,
            visual: args.visual,
        }
    }
}

fn load_predictor(dir: &Path) -> anyhow::Result<Predictor> {
    let bundle = ArtifactBundle::load(dir)
        .with_context(|| format!("failed to load artifacts from {}", dir.display()))?;
    Ok(Predictor::new(bundle))
}

fn evaluate(
    predictor: &Predictor,
    profile: &StudentProfile,
) -> anyhow::Result<dashboard::DashboardView> {
    profile.validate()?;
    let prediction = predictor
        .predict(profile)
        .context("failed to encode profile")?;
    Ok(dashboard::build_view(profile, &prediction))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            csv,
            out,
            trees,
            max_depth,
            test_size,
            seed,
            split_seed,
        } => {
            let options = training::TrainingOptions {
                csv,
                out_dir: out,
                forest: ForestParams {
                    n_estimators: trees,
                    max_depth,
                    seed,
                    ..ForestParams::default()
                },
                test_size,
                split_seed,
            };
            let summary = tokio::task::spawn_blocking(move || training::run(&options))
                .await
                .context("training task panicked")??;
            println!(
                "Trained on {} of {} rows; holdout of {} rows.",
                summary.train_rows, summary.rows, summary.test_rows
            );
            println!(
                "MAE {:.3}  MSE {:.3}  RMSE {:.3}  R² {:.3}",
                summary.metrics.mae, summary.metrics.mse, summary.metrics.rmse, summary.metrics.r2
            );
            println!("Model written to {}.", summary.paths.model.display());
            println!("Scaler written to {}.", summary.paths.scaler.display());
            println!("Encoder written to {}.", summary.paths.encoder.display());
        }
        Commands::Serve { artifacts, bind } => {
            let predictor = load_predictor(&artifacts)?;
            let state =
                server::AppState::new(predictor).context("failed to compile page templates")?;
            server::serve(state, bind).await?;
        }
        Commands::Predict { artifacts, profile } => {
            let predictor = load_predictor(&artifacts)?;
            let profile = StudentProfile::from(profile);
            let view = evaluate(&predictor, &profile)?;

            let tab = &view.prediction;
            println!("Predicted score {:.2} ({}).", tab.score, tab.band_label);
            println!("{}", tab.feedback);
            match view.recommendations.all_good {
                Some(message) => println!("{message}"),
                None => {
                    for group in &view.recommendations.groups {
                        println!("{} {}", group.icon, group.title);
                        for message in &group.messages {
                            println!("- {message}");
                        }
                    }
                }
            }
            println!("Feature contributions (baseline {:.2}):", view.importance.baseline);
            for bar in view.importance.bars.iter().rev() {
                println!("- {} {:+.2}", bar.feature, bar.value);
            }
        }
        Commands::Report {
            artifacts,
            profile,
            out,
        } => {
            let predictor = load_predictor(&artifacts)?;
            let profile = StudentProfile::from(profile);
            let view = evaluate(&predictor, &profile)?;
            let report = render::markdown_report(&profile, &view, &predictor.info());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Sample { out, rows, seed } => {
            sample::write_csv(&out, rows, seed)?;
            println!("Wrote {rows} synthetic rows to {}.", out.display());
        }
    }

    Ok(())
}
