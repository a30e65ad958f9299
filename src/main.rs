use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use clap::{Parser, Subcommand, ValueEnum};

use s_curve_gate::authz::ScreenGate;
use s_curve_gate::config::{GateConfig, RecordStoreConfig};
use s_curve_gate::models::{AuthorizationRecord, Identity, Role, SessionState};
use s_curve_gate::providers::memory::{MemoryIdentityProvider, MemoryNavigator, MemoryRecordStore};
use s_curve_gate::providers::NavigationController;
use s_curve_gate::utils::utc_now;
use s_curve_gate::{create_gate, decide, ScreenRequirement, SessionGate};

#[derive(Parser, Debug)]
#[command(author, version, about = "s-curve session gate simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk one account through sign-in, approval, revocation and sign-out
    Walkthrough {
        #[arg(long, default_value = "dev@example.com")]
        email: String,
        /// Put the email on the admin allow-list first
        #[arg(long)]
        admin: bool,
    },
    /// Print the route guard's decision for a session phase
    Decide {
        #[arg(long, value_enum)]
        phase: PhaseArg,
        #[arg(long)]
        require_approval: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PhaseArg {
    SignedOut,
    Authenticating,
    AwaitingRecord,
    Unapproved,
    Approved,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = GateConfig::from_env().context("failed to load gate configuration")?;
    let store_config = RecordStoreConfig::from_env().context("failed to load record store configuration")?;

    match cli.command {
        Commands::Walkthrough { email, admin } => walkthrough(config, store_config, &email, admin).await?,
        Commands::Decide {
            phase,
            require_approval,
        } => {
            let state = synthetic_state(phase);
            let decision = decide(&state, ScreenRequirement { require_approval });
            println!("{}", serde_json::to_string(&decision)?);
        }
    }

    Ok(())
}

async fn walkthrough(
    config: GateConfig,
    store_config: RecordStoreConfig,
    email: &str,
    admin: bool,
) -> anyhow::Result<()> {
    let config = if admin { config.with_admin_email(email) } else { config };

    let identity = Arc::new(MemoryIdentityProvider::for_email(email));
    let records = Arc::new(MemoryRecordStore::from_config(&store_config));
    let navigator = Arc::new(MemoryNavigator::starting_at(&config.routes.login));
    let gate = create_gate(config, identity, records.clone());
    let mut screen = gate.screen_gate(ScreenRequirement::approved_only(), navigator.clone());

    println!("{:<30} {:<16} {:<32} {}", "step", "phase", "decision", "root");
    report("start", &gate, &mut screen, &navigator);

    let signed_in = gate.sign_in().await.context("sign-in failed")?;
    let uid = signed_in.uid;
    report("signed in", &gate, &mut screen, &navigator);

    let base = utc_now();
    records.set_approval(&uid, true, base + Duration::seconds(1))?;
    let approved_doc = records.document(&uid).context("record missing after approval")?;
    report("approved by admin", &gate, &mut screen, &navigator);

    records.set_approval(&uid, false, base + Duration::seconds(2))?;
    report("approval revoked", &gate, &mut screen, &navigator);

    records.redeliver(&uid, approved_doc);
    report("stale redelivery", &gate, &mut screen, &navigator);

    gate.sign_out().await;
    report("signed out", &gate, &mut screen, &navigator);

    // A snapshot that was already in flight when the listener detached.
    let late = AuthorizationRecord::new(uid, Role::Member, true, base + Duration::seconds(3));
    gate.session().apply_record_snapshot(late);
    report("snapshot after sign-out", &gate, &mut screen, &navigator);

    println!("diagnostics: {}", serde_json::to_string(&gate.diagnostics())?);
    Ok(())
}

fn report(step: &str, gate: &SessionGate, screen: &mut ScreenGate, navigator: &MemoryNavigator) {
    let state = gate.state();
    let decision = screen.evaluate(&state);
    println!(
        "{:<30} {:<16} {:<32} {}",
        step,
        state.phase().to_string(),
        format!("{decision:?}"),
        navigator.current_root().unwrap_or_default()
    );
}

fn synthetic_state(phase: PhaseArg) -> SessionState {
    let identity = Identity::new("demo", "demo@example.com");
    let record = |approved| AuthorizationRecord::new("demo", Role::Member, approved, utc_now());
    match phase {
        PhaseArg::SignedOut => SessionState::signed_out(),
        PhaseArg::Authenticating => SessionState::authenticating(),
        PhaseArg::AwaitingRecord => SessionState::awaiting_record(identity),
        PhaseArg::Unapproved => SessionState::with_record(identity, record(false)),
        PhaseArg::Approved => SessionState::with_record(identity, record(true)),
    }
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
