use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::unbounded_channel;

use crate::services::{
    dedup::ExclusionSet,
    orchestrator::{SearchOrchestrator, SearchRequest},
    run_control::{ProgressSender, ResultSender, RunRegistry},
};

#[derive(Deserialize)]
struct StartSearchBody {
    #[serde(flatten)]
    request: SearchRequest,
    /// Company names and URLs already worked in earlier runs; owned and
    /// persisted by the caller.
    #[serde(default)]
    exclusions: Vec<String>,
}

#[post("/search")]
pub async fn start_search(
    body: web::Json<StartSearchBody>,
    orchestrator: web::Data<SearchOrchestrator>,
    runs: web::Data<RunRegistry>,
) -> HttpResponse {
    let Some(cancel) = runs.begin() else {
        return HttpResponse::Conflict().body("A search is already running");
    };

    let body = body.into_inner();
    let exclusions = ExclusionSet::new(body.exclusions);
    let (result_sender, mut result_receiver) = unbounded_channel();

    let outcome = orchestrator
        .start_search(
            body.request,
            exclusions,
            cancel,
            ProgressSender::log_only(),
            ResultSender::new(result_sender),
        )
        .await;
    runs.finish();

    let leads = result_receiver.recv().await.unwrap_or_default();
    HttpResponse::Ok().json(json!({ "outcome": outcome, "leads": leads }))
}

#[post("/search/stop")]
pub async fn stop_search(runs: web::Data<RunRegistry>) -> HttpResponse {
    match runs.stop() {
        true => HttpResponse::Ok().body("Stopping"),
        false => HttpResponse::Ok().body("No search is running"),
    }
}
