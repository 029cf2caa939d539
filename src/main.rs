use anyhow::Result;
use serde_json::Value;
use std::{env, time::Instant};
use strata_period::{lambda_handler, telemetry};
use tracing::info;
use uuid::Uuid;
use warp::{reject::Rejection, reply::Reply, Filter};

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "strata-period-method"
    })))
}

async fn invoke(request_id: Option<String>, event: Value) -> Result<impl Reply, Rejection> {
    let start = Instant::now();
    let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let response = lambda_handler(&event, &request_id);

    info!(
        request_id = %request_id,
        success = response.success,
        elapsed = ?start.elapsed(),
        "invocation finished"
    );
    Ok(warp::reply::json(&response))
}

fn routes() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let invoke = warp::path("invoke")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("x-request-id"))
        .and(warp::body::json())
        .and_then(invoke);

    health.or(invoke)
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_logging();
    info!("Starting strata period method service");

    // Cloud Run injects PORT
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    info!("Server starting on port {}", port);
    info!("Invoke endpoint: POST http://localhost:{}/invoke", port);

    warp::serve(routes()).run(([0, 0, 0, 0], port)).await;

    Ok(())
}
