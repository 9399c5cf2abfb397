// src/services/session_store.rs
use crate::errors::EcoVisionError;
use crate::models::*;
use crate::services::image_processor::RawImage;
use crate::services::llm_service::GREETING;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Everything one dashboard user has accumulated: transcript, last
/// analysis, the image questions are asked about, and counters.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub transcript: Vec<ChatMessage>,
    pub last_analysis: Option<StoredAnalysis>,
    pub current_image: Option<Arc<RawImage>>,
    pub analysis_count: u64,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            transcript: vec![ChatMessage::new(ChatRole::Assistant, GREETING)],
            last_analysis: None,
            current_image: None,
            analysis_count: 0,
        }
    }

    /// Back to a fresh state, keeping the id.
    pub fn reset(&mut self) {
        *self = Session::new(self.id);
    }

    /// Drops the conversation and the image it was about.
    pub fn clear_chat(&mut self) {
        self.transcript = vec![ChatMessage::new(ChatRole::Assistant, GREETING)];
        self.current_image = None;
    }

    pub fn record_analysis(&mut self, analysis: StoredAnalysis, image: Arc<RawImage>) {
        self.last_analysis = Some(analysis);
        self.current_image = Some(image);
        self.analysis_count += 1;
    }

    pub fn record_exchange(&mut self, question: ChatMessage, answer: ChatMessage) {
        self.transcript.push(question);
        self.transcript.push(answer);
    }

    pub fn question_count(&self) -> usize {
        self.transcript
            .iter()
            .filter(|m| m.role == ChatRole::User)
            .count()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            analysis_count: self.analysis_count,
            question_count: self.question_count(),
            has_image: self.current_image.is_some(),
        }
    }
}

/// In-process session registry. Locks are held only for the duration of a
/// closure, never across a network call.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self) -> Session {
        let session = Session::new(Uuid::new_v4());
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        log::info!("Created session {}", session.id);
        session
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(Session::summary)
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    pub async fn read<R>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&Session) -> R,
    ) -> Result<R, EcoVisionError> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(f).ok_or_else(|| not_found(id))
    }

    pub async fn update<R>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, EcoVisionError> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(f).ok_or_else(|| not_found(id))
    }

    pub async fn remove(&self, id: &Uuid) -> Result<(), EcoVisionError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| log::info!("Removed session {}", id))
            .ok_or_else(|| not_found(id))
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: &Uuid) -> EcoVisionError {
    EcoVisionError::NotFound(format!("session {}", id))
}
