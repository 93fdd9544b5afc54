use axum::{
    extract::Query,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::physics::PhysicsConfig;
use crate::store::PositionUpdate;
use crate::view::Dashboard;

#[derive(Deserialize)]
pub struct NetworkQuery {
    pub date: Option<DateTime<Utc>>,
    pub recent: Option<bool>,
}

#[derive(Deserialize)]
pub struct DateBody {
    pub date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct SpeedBody {
    pub hours_per_second: f64,
}

#[derive(Deserialize)]
pub struct ToggleBody {
    pub enabled: bool,
}

pub async fn serve(cfg: Config, dash: Arc<Dashboard>) -> eyre::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Voucher graph API running" }))
        .route("/graph", get({
            let dash = Arc::clone(&dash);
            move || {
                let dash = Arc::clone(&dash);
                async move { Json(dash.snapshot()) }
            }
        }))
        .route("/network", get({
            let dash = Arc::clone(&dash);
            move |q: Query<NetworkQuery>| {
                let dash = Arc::clone(&dash);
                async move {
                    let date = q.date.unwrap_or_else(|| dash.timeline_state().date);
                    Json(dash.network_at(date, q.recent.unwrap_or(false)))
                }
            }
        }))
        .route("/timeline", get({
            let dash = Arc::clone(&dash);
            move || {
                let dash = Arc::clone(&dash);
                async move { Json(dash.timeline_state()) }
            }
        }))
        .route("/timeline/play", post({
            let dash = Arc::clone(&dash);
            move || {
                let dash = Arc::clone(&dash);
                async move {
                    dash.play();
                    Json(dash.timeline_state())
                }
            }
        }))
        .route("/timeline/pause", post({
            let dash = Arc::clone(&dash);
            move || {
                let dash = Arc::clone(&dash);
                async move {
                    dash.pause();
                    Json(dash.timeline_state())
                }
            }
        }))
        .route("/timeline/reset", post({
            let dash = Arc::clone(&dash);
            move || {
                let dash = Arc::clone(&dash);
                async move {
                    dash.reset();
                    Json(dash.timeline_state())
                }
            }
        }))
        .route("/timeline/date", post({
            let dash = Arc::clone(&dash);
            move |Json(body): Json<DateBody>| {
                let dash = Arc::clone(&dash);
                async move {
                    dash.scrub(body.date);
                    Json(dash.timeline_state())
                }
            }
        }))
        .route("/timeline/speed", post({
            let dash = Arc::clone(&dash);
            move |Json(body): Json<SpeedBody>| {
                let dash = Arc::clone(&dash);
                async move {
                    dash.set_speed(body.hours_per_second);
                    Json(dash.timeline_state())
                }
            }
        }))
        .route("/recent", post({
            let dash = Arc::clone(&dash);
            move |Json(body): Json<ToggleBody>| {
                let dash = Arc::clone(&dash);
                async move {
                    dash.set_recent_only(body.enabled);
                    Json(dash.timeline_state())
                }
            }
        }))
        .route("/animate", post({
            let dash = Arc::clone(&dash);
            move |Json(body): Json<ToggleBody>| {
                let dash = Arc::clone(&dash);
                async move {
                    dash.set_animate(body.enabled);
                    Json(dash.timeline_state())
                }
            }
        }))
        .route("/physics", post({
            let dash = Arc::clone(&dash);
            move |Json(body): Json<PhysicsConfig>| {
                let dash = Arc::clone(&dash);
                async move {
                    // applied after the debounce settles
                    dash.set_physics(body);
                    Json(body)
                }
            }
        }))
        .route("/positions", post({
            let dash = Arc::clone(&dash);
            move |Json(updates): Json<Vec<PositionUpdate>>| {
                let dash = Arc::clone(&dash);
                async move {
                    dash.apply_positions(&updates);
                    Json(json!({ "applied": updates.len() }))
                }
            }
        }))
        .route("/vouchers", get({
            let dash = Arc::clone(&dash);
            move || {
                let dash = Arc::clone(&dash);
                async move { Json(dash.vouchers()) }
            }
        }))
        .route("/reports", get({
            let dash = Arc::clone(&dash);
            move || {
                let dash = Arc::clone(&dash);
                async move { Json(dash.field_reports()) }
            }
        }))
        .route("/pools", get({
            let dash = Arc::clone(&dash);
            move || {
                let dash = Arc::clone(&dash);
                async move { Json(dash.pools()) }
            }
        }))
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
