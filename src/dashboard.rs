// =============================================================================
// Dashboard Session: explicit event-driven update
// =============================================================================
//
// One user input change is one `DashboardEvent`. Applying it updates the
// session's config and yields a `RefreshPlan` naming the fetches that change
// invalidates. `Session::load` runs those fetches (primary first, then the
// comparison tickers, sequentially) and the view is re-rendered from scratch.
//
// A failed fetch is stored as `DataOutcome::Failed`; it never aborts the
// session and never prevents the rest of the page from rendering.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::market_data::MarketDataSource;
use crate::runtime_config::DashboardConfig;
use crate::types::{normalize_ticker, FeatureSet, QueryWindow};
use crate::view::{ComparisonData, DashboardData, DataOutcome};

// =============================================================================
// Events & plans
// =============================================================================

/// A single user input change.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    TickerChanged { ticker: String },
    WindowChanged { window: QueryWindow },
    FeaturesChanged { features: FeatureSet },
    ComparisonChanged { comparison: String },
    /// Re-fetch everything with the current options.
    Refresh,
}

/// Which fetches an event invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshPlan {
    pub primary: bool,
    pub comparisons: bool,
}

impl RefreshPlan {
    pub const NONE: Self = Self {
        primary: false,
        comparisons: false,
    };
    pub const ALL: Self = Self {
        primary: true,
        comparisons: true,
    };
    pub const COMPARISONS: Self = Self {
        primary: false,
        comparisons: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.primary && !self.comparisons
    }
}

impl DashboardEvent {
    /// Fold the event into `config` and report what must be re-fetched.
    ///
    /// Setting an option to its current value is not a change.
    pub fn apply(self, config: &mut DashboardConfig) -> RefreshPlan {
        match self {
            Self::TickerChanged { ticker } => {
                let ticker = normalize_ticker(&ticker);
                if ticker == config.ticker {
                    return RefreshPlan::NONE;
                }
                config.ticker = ticker;
                // The comparison list excludes the primary ticker, so it
                // can change too.
                RefreshPlan::ALL
            }
            Self::WindowChanged { window } => {
                if window == config.window {
                    return RefreshPlan::NONE;
                }
                config.window = window;
                RefreshPlan::ALL
            }
            Self::FeaturesChanged { features } => {
                config.features = features;
                RefreshPlan::NONE
            }
            Self::ComparisonChanged { comparison } => {
                let before = config.comparison_tickers();
                config.comparison = comparison;
                if config.comparison_tickers() == before {
                    RefreshPlan::NONE
                } else {
                    RefreshPlan::COMPARISONS
                }
            }
            Self::Refresh => RefreshPlan::ALL,
        }
    }
}

// =============================================================================
// Fetching
// =============================================================================

/// Fetch one ticker, turning failure into a user-facing outcome.
pub async fn fetch_outcome(
    source: &dyn MarketDataSource,
    ticker: &str,
    window: &QueryWindow,
) -> DataOutcome {
    match source.fetch(ticker, window).await {
        Ok(series) => {
            debug!(ticker, rows = series.len(), "fetch succeeded");
            DataOutcome::Loaded(series)
        }
        Err(e) => {
            warn!(ticker, window = %window, error = %e, "fetch failed");
            DataOutcome::Failed(format!("Failed to retrieve data for {ticker}: {e}"))
        }
    }
}

/// Perform the fetches `plan` asks for, updating `data` in place.
pub async fn load_into(
    source: &dyn MarketDataSource,
    config: &DashboardConfig,
    plan: RefreshPlan,
    data: &mut DashboardData,
) {
    if plan.primary {
        data.primary = fetch_outcome(source, &config.ticker, &config.window).await;
    }
    if plan.comparisons {
        let mut comparisons = Vec::new();
        for ticker in config.comparison_tickers() {
            let outcome = fetch_outcome(source, &ticker, &config.window).await;
            comparisons.push(ComparisonData { ticker, outcome });
        }
        data.comparisons = comparisons;
    }
}

/// Fetch everything for a one-off render.
pub async fn load_dashboard(source: &dyn MarketDataSource, config: &DashboardConfig) -> DashboardData {
    let mut data = DashboardData::default();
    load_into(source, config, RefreshPlan::ALL, &mut data).await;
    data
}

// =============================================================================
// Session
// =============================================================================

/// One user's dashboard: options plus the raw data of the current query.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub config: DashboardConfig,
    pub data: DashboardData,
    /// Incremented on every handled event.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A session with nothing fetched yet.
    pub fn new(mut config: DashboardConfig) -> Self {
        config.ticker = normalize_ticker(&config.ticker);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            config,
            data: DashboardData::default(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Run the fetches of `plan` against this session's options.
    pub async fn load(&mut self, source: &dyn MarketDataSource, plan: RefreshPlan) {
        load_into(source, &self.config, plan, &mut self.data).await;
        self.revision += 1;
        self.updated_at = Utc::now();
    }

    /// Apply one input change and refresh whatever it invalidated.
    pub async fn handle_event(
        &mut self,
        source: &dyn MarketDataSource,
        event: DashboardEvent,
    ) -> RefreshPlan {
        let plan = event.apply(&mut self.config);
        info!(
            session = %self.id,
            primary = plan.primary,
            comparisons = plan.comparisons,
            "dashboard event applied"
        );
        self.load(source, plan).await;
        plan
    }
}
