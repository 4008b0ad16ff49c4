use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use torque_api::auth::{self, AppState, AppStateInner};
use torque_api::middleware::require_auth;
use torque_api::{announcements, dashboard, employees, invoice, sales};
use torque_core::SaleCoordinator;
use torque_gateway::connection;
use torque_gateway::dispatcher::Dispatcher;
use torque_webhook::WebhookClient;

mod maintenance;

/// Expired announcements are swept every five minutes.
const ANNOUNCEMENT_PRUNE_INTERVAL_SECS: u64 = 300;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "torque=debug,tower_http=debug".into()),
        )
        .init();

    // Config, read once at startup
    let jwt_secret =
        std::env::var("TORQUE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let verification_key = std::env::var("TORQUE_VERIFICATION_KEY").unwrap_or_else(|_| {
        warn!("TORQUE_VERIFICATION_KEY not set; employee registration will be rejected");
        String::new()
    });
    let db_path = std::env::var("TORQUE_DB_PATH").unwrap_or_else(|_| "torque.db".into());
    let webhook_url = std::env::var("TORQUE_WEBHOOK_URL").ok();
    let host = std::env::var("TORQUE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("TORQUE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(torque_db::Database::open(&PathBuf::from(&db_path))?);

    // A missing webhook URL disables notifications, never startup
    let notifier = WebhookClient::new(webhook_url);
    if !notifier.is_configured() {
        warn!("TORQUE_WEBHOOK_URL not set; bill notifications are disabled");
    }

    // Shared state
    let dispatcher = Dispatcher::new();
    let coordinator = SaleCoordinator::new(db.clone(), notifier);
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        coordinator,
        dispatcher: dispatcher.clone(),
        jwt_secret: jwt_secret.clone(),
        verification_key,
    });

    tokio::spawn(maintenance::run_announcement_prune_loop(
        db,
        dispatcher.clone(),
        ANNOUNCEMENT_PRUNE_INTERVAL_SECS,
    ));

    // Routes
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/sales", post(sales::create_sale))
        .route("/sales/quick-bill", post(sales::quick_bill))
        .route("/sales/{sale_id}", delete(sales::delete_sale))
        .route("/sales/{sale_id}/items", get(sales::get_sale_items))
        .route("/sales/{sale_id}/items/{item_id}", delete(sales::delete_item))
        .route("/sales/{sale_id}/totals", post(sales::save_totals))
        .route("/sales/{sale_id}/verify", post(sales::verify_sale))
        .route("/sales/{sale_id}/fake", post(sales::toggle_fake))
        .route("/sales/{sale_id}/invoice", get(invoice::render_invoice))
        .route("/owner/overview", get(employees::owner_overview))
        .route("/owner/employees/{employee_id}/sales", get(employees::employee_sales))
        .route("/owner/employees/{employee_id}/block", post(employees::block_employee))
        .route("/owner/employees/{employee_id}/unblock", post(employees::unblock_employee))
        .route("/owner/employees/{employee_id}", delete(employees::delete_employee))
        .route("/announcements/active", get(announcements::get_active))
        .route("/announcements", post(announcements::create_announcement))
        .route(
            "/announcements/{id}",
            put(announcements::update_announcement).delete(announcements::delete_announcement),
        )
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ServerState { dispatcher, jwt_secret });

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Torque server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.jwt_secret)
    })
}
