// src/handlers.rs
use crate::services::{csv_export, impact_scorer};
use crate::{AppState, errors::EcoVisionError, models::*};
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{Error, HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    #[serde(default)]
    pub mode: AnalysisMode,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/sessions", web::post().to(create_session))
            .route("/sessions", web::get().to(list_sessions))
            .route("/sessions/{session_id}", web::delete().to(delete_session))
            .route("/sessions/{session_id}/reset", web::post().to(reset_session))
            .route("/sessions/{session_id}/analyze", web::post().to(analyze_image))
            .route("/sessions/{session_id}/analysis", web::get().to(get_analysis))
            .route(
                "/sessions/{session_id}/analysis/objects.csv",
                web::get().to(export_objects),
            )
            .route("/sessions/{session_id}/image", web::put().to(set_image))
            .route("/sessions/{session_id}/chat", web::get().to(get_chat))
            .route("/sessions/{session_id}/chat", web::post().to(ask_question))
            .route("/sessions/{session_id}/chat", web::delete().to(clear_chat)),
    );
}

/// Collects the bytes of the multipart field named `image`.
async fn read_image_field(payload: &mut Multipart) -> Result<Vec<u8>, Error> {
    let mut image_data: Option<BytesMut> = None;

    while let Some(mut field) = payload.try_next().await? {
        let is_image = field.content_disposition().and_then(|cd| cd.get_name()) == Some("image");

        let mut buf = BytesMut::new();
        while let Some(chunk) = field.try_next().await? {
            if buf.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(EcoVisionError::Validation(format!(
                    "Image exceeds {} MB upload limit",
                    MAX_UPLOAD_BYTES / (1024 * 1024)
                ))
                .into());
            }
            buf.extend_from_slice(&chunk);
        }

        if is_image && image_data.is_none() {
            image_data = Some(buf);
        }
    }

    image_data
        .map(|b| b.to_vec())
        .ok_or_else(|| EcoVisionError::Validation("No image provided".to_string()).into())
}

pub async fn create_session(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let session = data.sessions.create().await;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "session_id": session.id,
        "transcript": session.transcript,
    })))
}

pub async fn list_sessions(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let sessions = data.sessions.list().await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    })))
}

pub async fn delete_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    data.sessions.remove(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn reset_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let summary = data
        .sessions
        .update(&session_id, |s| {
            s.reset();
            s.summary()
        })
        .await?;

    Ok(HttpResponse::Ok().json(summary))
}

pub async fn analyze_image(
    path: web::Path<Uuid>,
    query: web::Query<AnalyzeParams>,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let mode = query.mode;

    data.sessions.read(&session_id, |_| ()).await?;

    let image_data = read_image_field(&mut payload).await?;
    let image = data.image_processor.decode(&image_data)?;

    let start = Instant::now();
    let result = data.scene_describer.describe(&image, mode).await;

    // Error results are shown as a banner only; nothing to score.
    let impact = if result.is_error() {
        None
    } else {
        Some(impact_scorer::score(&result))
    };

    let analysis = StoredAnalysis {
        id: Uuid::new_v4(),
        mode,
        result,
        impact,
        processing_time_ms: start.elapsed().as_millis() as u64,
        created_at: chrono::Utc::now(),
    };
    log::info!(
        "Session {} analysis {} finished as {} in {} ms",
        session_id,
        analysis.id,
        analysis.result.variant_name(),
        analysis.processing_time_ms
    );

    let stored = analysis.clone();
    let analysis_count = data
        .sessions
        .update(&session_id, move |s| {
            s.record_analysis(stored, Arc::new(image));
            s.analysis_count
        })
        .await
        .inspect_err(|_| {
            log::warn!(
                "Session {} was removed while analysis {} was running; result discarded",
                session_id,
                analysis.id
            )
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "analysis": analysis,
        "analysis_count": analysis_count,
    })))
}

pub async fn get_analysis(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let analysis = data
        .sessions
        .read(&session_id, |s| s.last_analysis.clone())
        .await?
        .ok_or_else(|| EcoVisionError::NotFound("No analysis yet for this session".to_string()))?;

    Ok(HttpResponse::Ok().json(&analysis))
}

pub async fn export_objects(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let csv = data
        .sessions
        .read(&session_id, |s| {
            s.last_analysis
                .as_ref()
                .and_then(|a| a.result.objects())
                .and_then(csv_export::objects_to_csv)
        })
        .await?
        .ok_or_else(|| EcoVisionError::NotFound("No detected objects to export".to_string()))?;

    let filename = csv_export::export_filename(chrono::Local::now());
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(csv))
}

pub async fn set_image(
    path: web::Path<Uuid>,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();

    data.sessions.read(&session_id, |_| ()).await?;

    let image_data = read_image_field(&mut payload).await?;
    let image = data.image_processor.decode(&image_data)?;
    let (width, height) = image.dimensions();

    data.sessions
        .update(&session_id, move |s| s.current_image = Some(Arc::new(image)))
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "has_image": true,
        "width": width,
        "height": height,
    })))
}

pub async fn get_chat(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let (transcript, has_image) = data
        .sessions
        .read(&session_id, |s| {
            (s.transcript.clone(), s.current_image.is_some())
        })
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "has_image": has_image,
        "transcript": transcript,
    })))
}

pub async fn ask_question(
    path: web::Path<Uuid>,
    body: web::Json<ChatRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let question = body.question.trim().to_string();
    if question.is_empty() {
        return Err(EcoVisionError::Validation("Please enter a question!".to_string()).into());
    }

    let image = data
        .sessions
        .read(&session_id, |s| s.current_image.clone())
        .await?;

    let user_message = ChatMessage::new(ChatRole::User, question.clone());
    let answer = data.assistant.ask(image.as_deref(), &question).await;
    let assistant_message = ChatMessage::new(ChatRole::Assistant, answer);

    let (question_msg, answer_msg) = (user_message.clone(), assistant_message.clone());
    let question_count = data
        .sessions
        .update(&session_id, move |s| {
            s.record_exchange(question_msg, answer_msg);
            s.question_count()
        })
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "question": user_message,
        "answer": assistant_message,
        "question_count": question_count,
    })))
}

pub async fn clear_chat(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session_id = path.into_inner();
    let transcript = data
        .sessions
        .update(&session_id, |s| {
            s.clear_chat();
            s.transcript.clone()
        })
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "transcript": transcript,
    })))
}
