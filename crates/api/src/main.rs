use gurukul_api::app::{AppConfig, BootstrapAdmin};

#[tokio::main]
async fn main() {
    gurukul_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let bootstrap_admin = match (
        std::env::var("ADMIN_EMAIL"),
        std::env::var("ADMIN_USERNAME"),
        std::env::var("ADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(username), Ok(password)) => Some(BootstrapAdmin {
            email,
            username,
            password,
        }),
        _ => None,
    };

    let config = AppConfig {
        jwt_secret,
        bootstrap_admin,
        ..AppConfig::default()
    };

    let app = gurukul_api::app::build_app(config);

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
