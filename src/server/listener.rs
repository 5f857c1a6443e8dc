use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{Config, SessionSettings};
use crate::router::Router;
use crate::session::Session;

pub async fn run(cfg: &Config, router: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
    info!("Listening on {}", cfg.server.listen_addr);

    serve(listener, router, &cfg.session).await
}

/// Accepts forever, seeding one session per connection.
pub async fn serve(listener: TcpListener, router: Router, settings: &SessionSettings) -> anyhow::Result<()> {
    let session_config = settings.session_config();

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let session = Session::new(socket, router.clone()).config(session_config.clone());
        match settings.read_timeout() {
            Some(timeout) => session.recv_timeout(timeout),
            None => session.recv(),
        };
    }
}
