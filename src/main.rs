use std::{fs, process, sync::Arc};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use disegno::{
    application::error::AppError,
    application::render::{RenderGateway, RenderService},
    config,
    domain::diagram::RenderRequest,
    infra::{
        error::InfraError,
        http::{self, McpState},
        telemetry,
    },
};
use tokio::time::sleep;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let gateway: Arc<dyn RenderService> = Arc::new(RenderGateway::new(&settings.render));
    let router = http::build_router(McpState { render: gateway });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "disegno::serve",
        addr = %settings.server.addr,
        "MCP render gateway listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let mut drain_rx = shutdown_rx.clone();
    let mut deadline_rx = shutdown_rx;
    let drain_limit = settings.server.graceful_shutdown;

    let server = async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = drain_rx.wait_for(|fired| *fired).await;
                info!(target = "disegno::serve", "shutdown signal received, draining");
            })
            .await
    };

    // Bound the drain phase so a wedged render cannot hold shutdown forever.
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            let _ = deadline_rx.wait_for(|fired| *fired).await;
            sleep(drain_limit).await;
        } => {
            info!(target = "disegno::serve", "graceful shutdown window elapsed, exiting");
        }
    }

    Ok(())
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let source =
        fs::read_to_string(&args.file).map_err(|err| AppError::from(InfraError::from(err)))?;

    let mut request = RenderRequest::new(source, args.format);
    request.theme = args.theme.clone();

    let gateway = RenderGateway::new(&settings.render);
    let payload = tokio::task::spawn_blocking(move || gateway.render(&request))
        .await
        .map_err(|err| AppError::unexpected(format!("render task failed: {err}")))??;

    match args.output {
        Some(path) => {
            let bytes = if payload.format.is_text() {
                payload.content.into_bytes()
            } else {
                STANDARD.decode(&payload.content).map_err(|err| {
                    AppError::unexpected(format!("renderer produced invalid base64: {err}"))
                })?
            };
            fs::write(&path, &bytes).map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(
                target = "disegno::render",
                path = %path.display(),
                bytes = bytes.len(),
                "diagram written"
            );
        }
        None if payload.format.is_text() => {
            print!("{}", payload.content);
        }
        None => {
            return Err(AppError::validation(
                "binary output formats require --output <PATH>",
            ));
        }
    }

    Ok(())
}
