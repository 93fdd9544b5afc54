use crate::aggregator::aggregate;
use crate::config::Config;
use crate::filter::filter_window;
use crate::models::{FieldReport, GraphData, Pool, RawTransfer, Voucher, VoucherUsage};
use crate::physics::{Debounce, PhysicsConfig};
use crate::pulse::PulseTracker;
use crate::scheduler::{self, AdmissionConfig};
use crate::store::{PositionUpdate, StableGraphStore};
use crate::timeline::TimelineCursor;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

/// Tunables for one graph view instance
#[derive(Debug, Clone)]
pub struct ViewSettings {
    pub recent_window: ChronoDuration,
    pub animate: bool,
    pub speed_hours: f64,
    pub pulse: Duration,
    pub admission: AdmissionConfig,
    pub admission_period: Duration,
    pub physics_debounce: Duration,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            recent_window: ChronoDuration::days(30),
            animate: true,
            speed_hours: 24.0,
            pulse: Duration::from_millis(1000),
            admission: AdmissionConfig::default(),
            admission_period: Duration::from_millis(30),
            physics_debounce: Duration::from_millis(150),
        }
    }
}

impl From<&Config> for ViewSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            recent_window: ChronoDuration::days(cfg.recent_window_days),
            animate: cfg.animate,
            speed_hours: cfg.speed_hours,
            pulse: Duration::from_millis(cfg.pulse_ms),
            admission: AdmissionConfig::default(),
            admission_period: Duration::from_millis(cfg.admission_tick_ms),
            physics_debounce: Duration::from_millis(150),
        }
    }
}

/// One node as the renderer sees it
#[derive(Debug, Serialize)]
pub struct NodeView {
    pub address: String,
    pub value: u64,
    pub used_vouchers: HashMap<String, VoucherUsage>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub pulse: f64,
}

/// One link as the renderer sees it; endpoints stay identifiers
#[derive(Debug, Serialize)]
pub struct LinkView {
    pub key: String,
    pub source: String,
    pub target: String,
    pub contract_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub value: Decimal,
    pub tx_count: u64,
    pub date: DateTime<Utc>,
    pub date_first: DateTime<Utc>,
    pub pulse: f64,
}

#[derive(Debug, Serialize)]
pub struct TimelineState {
    pub date: DateTime<Utc>,
    pub playing: bool,
    pub speed_hours: f64,
    pub range_start: Option<DateTime<Utc>>,
    pub range_end: Option<DateTime<Utc>>,
    pub recent_only: bool,
    pub animate: bool,
}

/// The full displayed state pushed to the rendering layer
#[derive(Debug, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeView>,
    pub links: Vec<LinkView>,
    pub timeline: TimelineState,
    pub physics: PhysicsConfig,
    pub pending: usize,
}

/// Composition root of the graph core: aggregated data, cursor, stable
/// store, pulse tracking and physics debounce, reconciled together on
/// every input change.
pub struct GraphView {
    vouchers: Vec<Voucher>,
    field_reports: Vec<FieldReport>,
    pools: Vec<Pool>,
    full_graph: GraphData,
    has_data: bool,
    timeline: TimelineCursor,
    recent_only: bool,
    recent_window: ChronoDuration,
    animate: bool,
    store: StableGraphStore,
    admission: AdmissionConfig,
    pulse: PulseTracker,
    physics_pending: Debounce<PhysicsConfig>,
    physics: PhysicsConfig,
}

impl GraphView {
    pub fn new(settings: &ViewSettings) -> Self {
        Self {
            vouchers: Vec::new(),
            field_reports: Vec::new(),
            pools: Vec::new(),
            full_graph: GraphData::default(),
            has_data: false,
            timeline: TimelineCursor::new(settings.speed_hours),
            recent_only: false,
            recent_window: settings.recent_window,
            animate: settings.animate,
            store: StableGraphStore::new(),
            admission: settings.admission,
            pulse: PulseTracker::new(settings.pulse),
            physics_pending: Debounce::new(settings.physics_debounce),
            physics: PhysicsConfig::default(),
        }
    }

    /// Swap in a fresh upstream dataset: re-aggregate, re-range the
    /// cursor, reconcile. A cursor the user already moved stays put.
    pub fn set_data(
        &mut self,
        vouchers: Vec<Voucher>,
        transfers: Vec<RawTransfer>,
        field_reports: Vec<FieldReport>,
        pools: Vec<Pool>,
    ) {
        self.full_graph = aggregate(&vouchers, &transfers);
        self.vouchers = vouchers;
        self.field_reports = field_reports;
        self.pools = pools;

        self.timeline
            .set_range_from(&self.full_graph.links, self.has_data);
        self.has_data = true;

        let summary = self.refilter();
        info!(
            "Graph data refreshed: {} nodes / {} links aggregated, {} queued, {} admitted, {} removed",
            self.full_graph.nodes.len(),
            self.full_graph.links.len(),
            summary.queued_nodes + summary.queued_links,
            summary.admitted_nodes + summary.admitted_links,
            summary.removed_nodes + summary.removed_links,
        );
    }

    fn refilter(&mut self) -> crate::store::ReconcileSummary {
        let window = self.recent_only.then_some(self.recent_window);
        let target = filter_window(&self.full_graph, self.timeline.date(), window);
        self.store.reconcile(target, self.animate)
    }

    /// Stateless filtered view of the aggregate, independent of the
    /// displayed state machine
    pub fn network_at(&self, date: DateTime<Utc>, recent_only: bool) -> GraphData {
        let window = recent_only.then_some(self.recent_window);
        filter_window(&self.full_graph, date, window)
    }

    pub fn play(&mut self) {
        self.timeline.play();
        self.refilter();
    }

    pub fn pause(&mut self) {
        self.timeline.pause();
    }

    pub fn reset(&mut self) {
        self.timeline.reset();
        self.refilter();
    }

    pub fn scrub(&mut self, date: DateTime<Utc>) -> DateTime<Utc> {
        let applied = self.timeline.set_date(date);
        self.refilter();
        applied
    }

    pub fn set_speed(&mut self, hours_per_second: f64) {
        self.timeline.set_speed(hours_per_second);
    }

    pub fn set_recent_only(&mut self, enabled: bool) {
        self.recent_only = enabled;
        self.refilter();
    }

    /// Toggling the admission animation off flushes whatever is queued
    pub fn set_animate(&mut self, enabled: bool) {
        self.animate = enabled;
        if !enabled {
            let flushed = self.store.flush_pending();
            if flushed > 0 {
                debug!("Animation disabled, flushed {} pending items", flushed);
            }
        }
    }

    pub fn set_physics(&mut self, config: PhysicsConfig) {
        self.physics_pending.set(config);
    }

    /// Flush a debounced physics change. Returns true when one applied.
    pub fn poll_physics(&mut self) -> bool {
        if let Some(config) = self.physics_pending.poll() {
            self.physics = config;
            return true;
        }
        false
    }

    pub fn apply_positions(&mut self, updates: &[PositionUpdate]) {
        self.store.apply_positions(updates);
    }

    /// One wall-clock second of playback; true when the cursor moved
    pub fn timeline_tick(&mut self) -> bool {
        if self.timeline.tick() {
            self.refilter();
            return true;
        }
        false
    }

    /// One admission-drain tick; true once the queue is empty
    pub fn admission_tick(&mut self) -> bool {
        let outcome = scheduler::step(&mut self.store, &self.admission, &mut self.pulse);
        self.pulse.cleanup();
        if outcome.admitted_links > 0 {
            debug!(
                "Admitted {} links / {} nodes, {} still pending",
                outcome.admitted_links,
                outcome.admitted_nodes,
                self.store.pending_len()
            );
        }
        outcome.drained
    }

    pub fn queue_idle(&self) -> bool {
        !self.store.has_pending()
    }

    pub fn vouchers(&self) -> &[Voucher] {
        &self.vouchers
    }

    pub fn field_reports(&self) -> &[FieldReport] {
        &self.field_reports
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn timeline_state(&self) -> TimelineState {
        let range = self.timeline.range();
        TimelineState {
            date: self.timeline.date(),
            playing: self.timeline.playing(),
            speed_hours: self.timeline.speed_hours(),
            range_start: range.map(|(start, _)| start),
            range_end: range.map(|(_, end)| end),
            recent_only: self.recent_only,
            animate: self.animate,
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .store
            .nodes()
            .iter()
            .map(|n| NodeView {
                address: n.account.address.clone(),
                value: n.account.value,
                used_vouchers: n.account.used_vouchers.clone(),
                x: n.body.map(|b| b.x),
                y: n.body.map(|b| b.y),
                z: n.body.map(|b| b.z),
                pulse: self.pulse.node_intensity(&n.account.address),
            })
            .collect();
        let links = self
            .store
            .links()
            .iter()
            .map(|l| LinkView {
                key: l.key(),
                source: l.source.clone(),
                target: l.target.clone(),
                contract_address: l.contract_address.clone(),
                token_name: l.token_name.clone(),
                token_symbol: l.token_symbol.clone(),
                value: l.value,
                tx_count: l.tx_count,
                date: l.date,
                date_first: l.date_first,
                pulse: self.pulse.link_intensity(&l.key()),
            })
            .collect();

        GraphSnapshot {
            nodes,
            links,
            timeline: self.timeline_state(),
            physics: self.physics,
            pending: self.store.pending_len(),
        }
    }
}

/// Shared handle around the view: one mutex for every mutation (a tick can
/// never observe a half-reconciled store) plus the wake signal for the
/// admission pump.
pub struct Dashboard {
    view: Mutex<GraphView>,
    admission_wake: Notify,
    admission_period: Duration,
}

impl Dashboard {
    pub fn new(settings: ViewSettings) -> Self {
        Self {
            view: Mutex::new(GraphView::new(&settings)),
            admission_wake: Notify::new(),
            admission_period: settings.admission_period,
        }
    }

    fn with_view<R>(&self, f: impl FnOnce(&mut GraphView) -> R) -> R {
        let mut view = self.view.lock().unwrap();
        let result = f(&mut view);
        if view.store.has_pending() {
            self.admission_wake.notify_one();
        }
        result
    }

    pub fn set_data(
        &self,
        vouchers: Vec<Voucher>,
        transfers: Vec<RawTransfer>,
        field_reports: Vec<FieldReport>,
        pools: Vec<Pool>,
    ) {
        self.with_view(|v| v.set_data(vouchers, transfers, field_reports, pools));
    }

    pub fn play(&self) {
        self.with_view(|v| v.play());
    }

    pub fn pause(&self) {
        self.with_view(|v| v.pause());
    }

    pub fn reset(&self) {
        self.with_view(|v| v.reset());
    }

    pub fn scrub(&self, date: DateTime<Utc>) -> DateTime<Utc> {
        self.with_view(|v| v.scrub(date))
    }

    pub fn set_speed(&self, hours_per_second: f64) {
        self.with_view(|v| v.set_speed(hours_per_second));
    }

    pub fn set_recent_only(&self, enabled: bool) {
        self.with_view(|v| v.set_recent_only(enabled));
    }

    pub fn set_animate(&self, enabled: bool) {
        self.with_view(|v| v.set_animate(enabled));
    }

    pub fn set_physics(&self, config: PhysicsConfig) {
        self.with_view(|v| v.set_physics(config));
    }

    pub fn apply_positions(&self, updates: &[PositionUpdate]) {
        self.with_view(|v| v.apply_positions(updates));
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.view.lock().unwrap().snapshot()
    }

    pub fn network_at(&self, date: DateTime<Utc>, recent_only: bool) -> GraphData {
        self.view.lock().unwrap().network_at(date, recent_only)
    }

    pub fn timeline_state(&self) -> TimelineState {
        self.view.lock().unwrap().timeline_state()
    }

    pub fn vouchers(&self) -> Vec<Voucher> {
        self.view.lock().unwrap().vouchers().to_vec()
    }

    pub fn field_reports(&self) -> Vec<FieldReport> {
        self.view.lock().unwrap().field_reports().to_vec()
    }

    pub fn pools(&self) -> Vec<Pool> {
        self.view.lock().unwrap().pools().to_vec()
    }

    pub fn queue_idle(&self) -> bool {
        self.view.lock().unwrap().queue_idle()
    }

    fn timeline_tick(&self) {
        self.with_view(|v| {
            v.timeline_tick();
        });
    }

    fn admission_tick(&self) {
        self.view.lock().unwrap().admission_tick();
    }

    fn poll_physics(&self) -> bool {
        self.view.lock().unwrap().poll_physics()
    }
}

/// Drain the pending queues at the admission cadence. Parks on the wake
/// signal whenever the queue is empty; reconciliations that enqueue new
/// work wake it back up, so a stopped timer never resurrects itself.
pub async fn run_admission_pump(dash: Arc<Dashboard>) {
    loop {
        if dash.queue_idle() {
            dash.admission_wake.notified().await;
            continue;
        }
        tokio::time::sleep(dash.admission_period).await;
        dash.admission_tick();
    }
}

/// Advance the playback cursor once per wall-clock second
pub async fn run_timeline_pump(dash: Arc<Dashboard>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        dash.timeline_tick();
    }
}

/// Flush debounced physics changes shortly after the slider settles
pub async fn run_physics_pump(dash: Arc<Dashboard>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    loop {
        ticker.tick().await;
        if dash.poll_physics() {
            debug!("Applied debounced physics config");
        }
    }
}
