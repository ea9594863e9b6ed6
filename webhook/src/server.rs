// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! HTTP endpoints called by the API server.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use kube::api::DynamicObject;
use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, ConvertAdmissionReviewError,
};
use std::sync::Arc;
use tracing::error;

use crate::admission::Dispatcher;

pub const MUTATION_PATH: &str = "/v1/webhook/mutation";
pub const VALIDATION_PATH: &str = "/v1/webhook/validation";
pub const HEALTH_PATH: &str = "/healthz";

type Review = AdmissionReview<DynamicObject>;

fn into_request(review: Review) -> Result<AdmissionRequest<DynamicObject>, Json<Review>> {
    review.try_into().map_err(|e: ConvertAdmissionReviewError| {
        error!("Failed to parse admission request: {e}");
        Json(AdmissionResponse::invalid(e.to_string()).into_review())
    })
}

async fn mutate(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(review): Json<Review>,
) -> Json<Review> {
    match into_request(review) {
        Ok(request) => Json(dispatcher.mutate(&request).await.into_review()),
        Err(invalid) => invalid,
    }
}

async fn validate(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(review): Json<Review>,
) -> Json<Review> {
    match into_request(review) {
        Ok(request) => Json(dispatcher.validate(&request).await.into_review()),
        Err(invalid) => invalid,
    }
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route(MUTATION_PATH, post(mutate))
        .route(VALIDATION_PATH, post(validate))
        .route(HEALTH_PATH, get(healthz))
        .with_state(dispatcher)
}
