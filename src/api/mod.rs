//! Local stand-in for the verification service, for manual runs and client tests.

mod health;
mod info;
mod mining;
pub mod models;

use actix_web::web::ServiceConfig;

pub use models::{AppState, MockSettings};

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(health::health_check)
        .service(info::get_info)
        .service(mining::post_mine);
}
