// =============================================================================
// Central Application State: Dashboard Service
// =============================================================================
//
// Shared by every request handler via `Arc<AppState>`. Holds the immutable
// service settings, the market-data source, and the live dashboard sessions.
//
// Thread safety:
//   - Atomic counters for lock-free render statistics.
//   - parking_lot::RwLock for the session map. Locks are never held across an
//     `.await`: handlers clone a session out, update it, and store it back.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dashboard::Session;
use crate::engine::IndicatorEngine;
use crate::error::SessionStoreError;
use crate::market_data::MarketDataSource;
use crate::runtime_config::{DashboardConfig, ServiceConfig};
use crate::view::{render_with, DashboardData, DashboardView};

pub struct AppState {
    pub config: ServiceConfig,
    pub engine: IndicatorEngine,
    pub source: Arc<dyn MarketDataSource>,

    sessions: RwLock<HashMap<Uuid, Session>>,

    /// Total views rendered since start-up.
    renders: AtomicU64,

    /// Instant when the service was started. Used for uptime reporting.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, source: Arc<dyn MarketDataSource>) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone());
        Self {
            config,
            engine,
            source,
            sessions: RwLock::new(HashMap::new()),
            renders: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    /// Options a new dashboard starts with.
    pub fn default_dashboard(&self) -> DashboardConfig {
        self.config.defaults.clone()
    }

    // ── Rendering ───────────────────────────────────────────────────────

    pub fn render(&self, config: &DashboardConfig, data: &DashboardData) -> DashboardView {
        self.renders.fetch_add(1, Ordering::Relaxed);
        render_with(&self.engine, config, data)
    }

    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    // ── Sessions ────────────────────────────────────────────────────────

    /// Store a new session, evicting the oldest ones beyond `max_sessions`.
    pub fn insert_session(&self, session: Session) {
        let mut sessions = self.sessions.write();
        let cap = self.config.max_sessions.max(1);
        while sessions.len() >= cap {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.updated_at)
                .map(|s| s.id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    info!(session = %id, "session evicted (capacity reached)");
                }
                None => break,
            }
        }
        debug!(session = %session.id, "session stored");
        sessions.insert(session.id, session);
    }

    /// Snapshot of a session.
    pub fn session(&self, id: &Uuid) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    /// Write back a session updated from a snapshot.
    ///
    /// Every update bumps the revision by exactly one, so the write is only
    /// accepted when it directly follows the stored revision. A session
    /// deleted meanwhile is not resurrected.
    pub fn store_session(&self, session: Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write();
        let current = sessions
            .get_mut(&session.id)
            .ok_or(SessionStoreError::NotFound(session.id))?;
        if current.revision + 1 != session.revision {
            return Err(SessionStoreError::Conflict {
                id: session.id,
                stored: current.revision,
                base: session.revision.saturating_sub(1),
            });
        }
        *current = session;
        Ok(())
    }

    pub fn remove_session(&self, id: &Uuid) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}
