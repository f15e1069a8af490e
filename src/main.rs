use exercise_odds::engine::{self, ranking};
use exercise_odds::server;
use exercise_odds::state::AppState;
use exercise_odds::{AppConfig, BlackScholesExercise, EngineResult, OptionTable, RankingReport, RunOverrides};
use std::path::Path;

#[tokio::main]
async fn main() {
    // Structured logging on stderr; stdout is reserved for batch output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    // ── Batch mode: rank one file and exit ──
    if let Some(path) = cfg.input_path.clone() {
        if let Err(e) = run_batch(&cfg, &path) {
            tracing::error!(path = %path.display(), "batch run failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    // ── Service mode ──
    tracing::info!(
        rate = cfg.risk_free_rate,
        vols = ?cfg.volatilities,
        expiry = ?cfg.expiry_date,
        "exercise_odds service starting"
    );

    let port = cfg.server_port;
    let app = server::router(AppState::new(cfg));

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}

/// Rank the file at `path` with the process defaults and print the report
/// as JSON on stdout.
fn run_batch(cfg: &AppConfig, path: &Path) -> EngineResult<()> {
    let run = cfg.resolve_run(&RunOverrides::default())?;
    let bytes = std::fs::read(path)?;
    let table = OptionTable::from_bytes(&bytes)?;

    let model = BlackScholesExercise::new();
    let report = engine::run(&table, &run, &model);
    log_top(&report, cfg.top_n);

    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), &report)?;
    println!();
    Ok(())
}

fn log_top(report: &RankingReport, n: usize) {
    for (side, ranked) in [("CALL", &report.calls), ("PUT", &report.puts)] {
        for (pos, r) in ranking::top(ranked, n).iter().enumerate() {
            tracing::info!(
                side,
                rank = pos + 1,
                option = %r.option_code,
                underlying = %r.underlying_symbol,
                mean = ?r.mean_probability,
                label = %r.label,
                "top contract"
            );
        }
    }
}
