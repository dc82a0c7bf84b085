//! Session middleware
//!
//! Resolves the visitor's session from the sealed cookie before the
//! handler runs, and writes it back afterwards. Unknown, expired or
//! tampered cookies start a fresh session.

use crate::session::cookie::find_session_cookie;
use crate::session::WatcherSession;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Request extension giving handlers the current session
#[derive(Clone, Default)]
pub struct SessionHandle(Arc<Mutex<WatcherSession>>);

impl SessionHandle {
    pub fn new(session: WatcherSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, WatcherSession> {
        self.0.lock().await
    }
}

pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session_id = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(find_session_cookie)
        .and_then(|sealed| match state.cookies.open(sealed) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("Ignoring session cookie: {}", e);
                None
            }
        });

    let loaded = session_id.and_then(|id| state.sessions.load(&id).map(|session| (id, session)));
    let (id, session, is_new) = match loaded {
        Some((id, session)) => (id, session, false),
        None => (state.sessions.create(), WatcherSession::default(), true),
    };

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let session = handle.lock().await.clone();
    if let Err(e) = state.sessions.save(&id, &session) {
        warn!("Failed to save session {}: {}", id, e);
    }

    if is_new {
        let cookie = state
            .cookies
            .set_cookie(&id, state.config.session_max_age_secs)
            .map_err(|e| e.to_string())
            .and_then(|cookie| HeaderValue::from_str(&cookie).map_err(|e| e.to_string()));
        match cookie {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Failed to set session cookie: {}", e),
        }
    }

    response
}
