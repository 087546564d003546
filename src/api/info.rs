use actix_web::{HttpResponse, Responder, get, web};
use log::debug;

use super::models::AppState;
use crate::client::models::{Envelope, INFO_TAG};

/// Chain metadata; no authentication.
#[get("/info")]
pub async fn get_info(state: web::Data<AppState>) -> impl Responder {
    let info = state.ledger().info();
    debug!(
        "MOCK - info owned={} free={} difficulty={}",
        info.owned_blocks, info.free_blocks, info.difficulty
    );
    HttpResponse::Ok().json(Envelope::new(INFO_TAG, info))
}
