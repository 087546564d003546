use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, post, web};
use log::{info, warn};
use serde_json::json;

use super::models::{AppState, ClaimError};
use crate::client::models::{Envelope, ErrorBody, MINE_TAG, MineRequest, MineResponse};

/// Claim a block hash for the authenticated miner.
#[post("/mine")]
pub async fn post_mine(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let claimed = state.ledger().claim(&req.id, &req.key, &req.hash);

    match claimed {
        Ok(number) => {
            info!("MOCK - ACCEPTED #{} hash={}", number, req.hash);
            HttpResponse::Ok().json(Envelope::new(
                MINE_TAG,
                MineResponse {
                    data: Some(json!({ "hash": req.hash, "block": number })),
                },
            ))
        }
        Err(e) => {
            warn!("MOCK - refused hash={}: {}", req.hash, e.detail());
            let status = match e {
                ClaimError::Unauthorized => StatusCode::UNAUTHORIZED,
                ClaimError::MalformedHash | ClaimError::TooEasy => StatusCode::BAD_REQUEST,
                ClaimError::Exhausted | ClaimError::AlreadyClaimed => StatusCode::CONFLICT,
            };
            let kind = if e == ClaimError::Unauthorized {
                "error:auth"
            } else {
                "error:mine"
            };
            HttpResponse::build(status).json(ErrorBody {
                status: status.as_u16(),
                kind: kind.to_string(),
                detail: e.detail().to_string(),
            })
        }
    }
}
