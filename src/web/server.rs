use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::credentials::{
    load_identity_token, CredentialCache, CredentialProvider, DeploymentOutputs,
};
use crate::location::{AgentSource, FixedSource, Source};
use crate::session::TrackingSession;
use crate::sink::{RecordStore, Sink, TopicSink};

use super::api::history as history_handlers;
use super::api::session as session_handlers;
use super::api::session::ConnectionStatus;
use super::api_doc::ApiDoc;
use super::auth::AppState;
use super::config::{Config, LocationConfig, SinkConfig};
use super::ui::handlers as ui_handlers;

pub async fn run_server(config: Config) -> std::io::Result<()> {
    let bind_addr = config.web.bind.clone();

    let source = build_source(&config.location);

    // Initialization order: config -> credentials -> sink client. A failed
    // exchange leaves the server up but disconnected; tracking stays
    // disabled until a restart with a valid token.
    let (connection, sink, history) = match connect_sink(&config).await {
        Ok((user_id, sink, history)) => {
            log::info!("sink connected as {}", user_id);
            (
                ConnectionStatus::Connected { user_id },
                Some(sink),
                history,
            )
        }
        Err(reason) => {
            log::warn!("credential initialization failed: {}", reason);
            (ConnectionStatus::Disconnected { reason }, None, None)
        }
    };

    let user_id = connection.user_id().map(String::from);
    let session = TrackingSession::new(
        Arc::new(source),
        sink.map(Arc::new),
        user_id,
        config.session.period,
    );

    let state = AppState {
        config: Arc::new(config),
        session: Arc::new(Mutex::new(session)),
        history,
        connection: Arc::new(connection),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // UI routes
        .route("/", get(ui_handlers::dashboard))
        // Session API endpoints
        .route("/api/session/start", post(session_handlers::start))
        .route("/api/session/stop", post(session_handlers::stop))
        .route("/api/session/status", get(session_handlers::status))
        // History API endpoints
        .route("/api/history", get(history_handlers::list_history))
        // Static files
        .nest_service("/static", ServeDir::new("src/web/static"))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await
}

fn build_source(location: &LocationConfig) -> Source {
    match location {
        LocationConfig::Agent {
            url,
            timeout,
            high_accuracy,
        } => Source::Agent(AgentSource::new(url.clone(), *timeout, *high_accuracy)),
        LocationConfig::Fixed { coordinates } => {
            let fixed = FixedSource::from_coordinates(coordinates).unwrap_or_else(|| {
                log::warn!("invalid fixed coordinates {:?}, using origin", coordinates);
                FixedSource::default()
            });
            Source::Fixed(fixed)
        }
    }
}

/// Exchange credentials and construct the configured sink variant. Returns
/// the identity the sink keys samples by, the sink, and the record store
/// when the variant has one.
async fn connect_sink(
    config: &Config,
) -> Result<(String, Sink, Option<Arc<RecordStore>>), String> {
    let outputs =
        DeploymentOutputs::from_file(&config.auth.outputs_file).map_err(|e| e.to_string())?;

    let identity_token =
        load_identity_token(&config.auth.identity_token_file).map_err(|e| e.to_string())?;

    let provider = CredentialProvider::new(outputs.auth);
    let credentials = Arc::new(CredentialCache::new(provider, identity_token));
    let user_id = credentials.initialize().await.map_err(|e| e.to_string())?;

    match &config.sink {
        SinkConfig::Topic {
            endpoint,
            topic_prefix,
        } => {
            let sink = TopicSink::new(endpoint.clone(), topic_prefix, &user_id, credentials);
            Ok((user_id, Sink::Topic(sink), None))
        }
        SinkConfig::Records { endpoint } => {
            let store = Arc::new(RecordStore::new(endpoint.clone(), credentials));
            Ok((user_id, Sink::Records(store.clone()), Some(store)))
        }
    }
}
