use reactor::config::Config;
use reactor::http::request::Request;
use reactor::http::response::{ResponseBuilder, StatusCode};
use reactor::router::Router;
use reactor::server;
use reactor::Context;

fn main_page(request: Request, context: Context) {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/html")
        .keep_alive(request.keep_alive())
        .body(b"Main page\n".to_vec())
        .build();

    if let Err(e) = context.send(response) {
        tracing::warn!(error = %e, "failed to answer");
    }
}

fn not_found(request: Request, context: Context) {
    let response = ResponseBuilder::new(StatusCode::NotFound)
        .header("Content-Type", "text/html")
        .keep_alive(request.keep_alive())
        .body(b"Resource is not found\n".to_vec())
        .build();

    if let Err(e) = context.send(response) {
        tracing::warn!(error = %e, "failed to answer");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()>{
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let router = Router::new();
    router.get(r"^/$", main_page).await?;
    router.all(r"^.*$", not_found).await?;

    tokio::select! {
        res = server::listener::run(&cfg, router) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
