//! Demo bridge daemon: registers a sample node-management object and serves
//! it on a Unix domain socket until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use helmrpc::{NativeType, WireValue};
use helmrun::dispatch::Dispatcher;
use helmrun::ipc::{IpcBuilder, OPT_MAX_FRAME_BYTES};
use helmrun::jobs::{JobId, JobTracker};
use helmrun::registry::{
    ExecMode, MethodSpec, NativeOutput, ObjectSpec, ParamSpec, Registry, ResultShape,
};

#[derive(Parser)]
#[command(author, version, about = "helm control bridge daemon")]
struct Cli {
    /// Path of the Unix domain socket to serve on.
    #[arg(long, default_value = "/tmp/helmd.sock")]
    socket: PathBuf,

    /// Log filter, e.g. "info" or "helmrun=debug".
    #[arg(long, default_value = "info")]
    log: String,

    /// Maximum frame size in bytes.
    #[arg(long)]
    max_frame_bytes: Option<usize>,
}

fn build_registry(jobs: Arc<JobTracker>) -> Result<Arc<Registry>> {
    let registry = Arc::new(Registry::new());

    registry
        .register_object(
            ObjectSpec::new("NodeOps")
                .method(MethodSpec::new(
                    "ping",
                    vec![],
                    ResultShape::Single(NativeType::Text),
                    Arc::new(|_ctx| Ok(NativeOutput::Single(WireValue::Text("pong".into())))),
                ))
                .method(MethodSpec::new(
                    "echo",
                    vec![
                        ParamSpec::caller_identity("caller"),
                        ParamSpec::new("message", NativeType::Text),
                    ],
                    ResultShape::Rows(vec![
                        ("caller".into(), NativeType::Text),
                        ("message".into(), NativeType::Text),
                    ]),
                    Arc::new(|ctx| {
                        Ok(NativeOutput::Rows(vec![vec![
                            ("caller".into(), ctx.arg(0).clone()),
                            ("message".into(), ctx.arg(1).clone()),
                        ]]))
                    }),
                ))
                .method(
                    MethodSpec::new(
                        "decommission",
                        vec![ParamSpec::new("node", NativeType::Text)],
                        ResultShape::Single(NativeType::Text),
                        Arc::new(|ctx| {
                            tracing::info!(node = ?ctx.arg(0), "decommission started");
                            std::thread::sleep(Duration::from_millis(50));
                            Ok(NativeOutput::Void)
                        }),
                    )
                    .with_mode(ExecMode::Job("decommission".into()))
                    .with_permissions(vec!["node.admin".into()]),
                ),
        )
        .context("registering NodeOps")?;

    registry
        .register_object(ObjectSpec::new("Jobs").method(MethodSpec::new(
            "status",
            vec![ParamSpec::new("job_id", NativeType::Text)],
            ResultShape::Rows(vec![
                ("status".into(), NativeType::Text),
                ("error".into(), NativeType::Text),
            ]),
            Arc::new(move |ctx| {
                let WireValue::Text(raw) = ctx.arg(0) else {
                    return Ok(NativeOutput::Rows(vec![]));
                };
                let Ok(id) = raw.parse() else {
                    return Ok(NativeOutput::Rows(vec![]));
                };
                let Some(view) = jobs.get(JobId(id)) else {
                    return Ok(NativeOutput::Rows(vec![]));
                };
                Ok(NativeOutput::Rows(vec![vec![
                    ("status".into(), WireValue::Text(view.status.to_string())),
                    (
                        "error".into(),
                        view.error.map(WireValue::Text).unwrap_or(WireValue::Null),
                    ),
                ]]))
            }),
        )))
        .context("registering Jobs")?;

    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&cli.log))
        .init();

    let jobs = Arc::new(JobTracker::new());
    let registry = build_registry(jobs.clone())?;
    let dispatcher = Arc::new(Dispatcher::new(registry, jobs));

    // The daemon owns the socket file lifecycle; clear a stale one from a
    // previous run before binding.
    if cli.socket.exists() {
        std::fs::remove_file(&cli.socket)
            .with_context(|| format!("removing stale socket {}", cli.socket.display()))?;
    }

    let mut builder = IpcBuilder::server(&cli.socket, dispatcher)
        .on_connect(Arc::new(|| tracing::debug!("peer connected")));
    if let Some(max) = cli.max_frame_bytes {
        builder = builder.option(OPT_MAX_FRAME_BYTES, max.to_string());
    }

    let controller = builder.build()?;
    controller.start().await?;
    tracing::info!(socket = %cli.socket.display(), "helmd serving");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");

    controller.stop().await;
    let _ = std::fs::remove_file(&cli.socket);
    Ok(())
}
