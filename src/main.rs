// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;
#[cfg(test)]
mod test_helpers;

use crate::config::Config;
use crate::services::{
    ConversationalDescriber, ImageProcessor, OpenAIVisionClient, SceneDescriber, SessionStore,
    VisionClient,
};

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionStore>,
    scene_describer: Arc<SceneDescriber>,
    assistant: Arc<ConversationalDescriber>,
    image_processor: Arc<ImageProcessor>,
}

impl AppState {
    pub fn new(client: Arc<dyn VisionClient>) -> Self {
        let image_processor = Arc::new(ImageProcessor::new());
        Self {
            sessions: Arc::new(SessionStore::new()),
            scene_describer: Arc::new(SceneDescriber::new(
                client.clone(),
                image_processor.clone(),
            )),
            assistant: Arc::new(ConversationalDescriber::new(client, image_processor.clone())),
            image_processor,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting EcoVision service...");

    let config = Config::from_env().context("loading configuration")?;
    info!("Using model {} at {}", config.model, config.base_url);

    let client: Arc<dyn VisionClient> = Arc::new(OpenAIVisionClient::new(
        config.api_key.clone(),
        config.base_url.clone(),
        config.model.clone(),
    ));
    let app_state = AppState::new(client);
    let static_dir = config.static_dir.clone();

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
            .route("/health", web::get().to(health_check))
            .service(actix_files::Files::new("/", static_dir.clone()).index_file("index.html"))
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("binding {}", config.bind_addr))?
    .run()
    .await?;

    Ok(())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "ecovision",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
