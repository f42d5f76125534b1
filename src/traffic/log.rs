//! Append-only correlated traffic log.
//!
//! # Responsibilities
//! - Own HTTP exchange and WebSocket event record lists
//! - Correlate CORS preflights with the exchange that follows them
//! - Bound the HTTP list and evict oldest-first
//!
//! # Design Decisions
//! - Constructed once at startup and passed by handle (no globals) so
//!   tests can run isolated instances
//! - HTTP and WS logs are independent observable lists
//! - `clear` drains one record per tick instead of truncating in one
//!   step, so a redraw-per-mutation observer is not overwhelmed

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::observable::Observable;
use crate::stomp::StompFrame;
use crate::traffic::record::{
    now_millis, Direction, HttpExchangeRecord, WsEvent, WsEventRecord,
};

/// Maximum retained HTTP exchanges; oldest are evicted first.
const HTTP_LOG_CAP: usize = 120;

/// Interval between single-record removals during an incremental clear.
const CLEAR_TICK: Duration = Duration::from_millis(5);

/// Bounded, observable store of captured traffic.
pub struct TrafficLog {
    http: Observable<Vec<Arc<HttpExchangeRecord>>>,
    ws: Observable<Vec<Arc<WsEventRecord>>>,
    pending_preflights: Mutex<Vec<Arc<HttpExchangeRecord>>>,
    clearing: AtomicBool,
}

impl TrafficLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            http: Observable::new(Vec::new()),
            ws: Observable::new(Vec::new()),
            pending_preflights: Mutex::new(Vec::new()),
            clearing: AtomicBool::new(false),
        })
    }

    /// Observable HTTP exchange list, read by the inspector UI.
    pub fn http_records(&self) -> Observable<Vec<Arc<HttpExchangeRecord>>> {
        self.http.clone()
    }

    /// Observable WebSocket event list, read by the inspector UI.
    pub fn ws_records(&self) -> Observable<Vec<Arc<WsEventRecord>>> {
        self.ws.clone()
    }

    /// Open a record for a new browser request.
    ///
    /// A preflight is parked as pending; a non-preflight that matches a
    /// pending preflight by (path, requested method) consumes it, reuses
    /// its key so a UI selection survives the transition, and replaces
    /// the preflight's list entry in place instead of appending.
    pub fn log_fetch(
        &self,
        method: &str,
        url: &str,
        path: &str,
        query: Option<&str>,
        request_headers: Vec<(String, String)>,
    ) -> Arc<HttpExchangeRecord> {
        let probe = HttpExchangeRecord::new(
            Uuid::new_v4(),
            method.to_string(),
            url.to_string(),
            path.to_string(),
            query.map(str::to_string),
            request_headers,
        );

        if probe.is_preflight() {
            let record = Arc::new(probe);
            {
                let mut pending = self.pending_preflights.lock().unwrap();
                // One unmatched preflight per (path, requested method) pair.
                pending.retain(|p| {
                    !(p.path == record.path && p.requested_method() == record.requested_method())
                });
                pending.push(Arc::clone(&record));
            }
            self.append_http(record.clone());
            return record;
        }

        let matched = {
            let mut pending = self.pending_preflights.lock().unwrap();
            pending
                .iter()
                .position(|p| p.path == probe.path && p.requested_method() == Some(&probe.method))
                .map(|index| pending.remove(index))
        };

        match matched {
            Some(preflight) => {
                let mut record = probe;
                record.key = preflight.key;
                let record = Arc::new(record);
                record.set_preflight(Arc::clone(&preflight));

                let replaced = Arc::clone(&record);
                self.http.update(move |records| {
                    match records.iter().position(|r| r.key == replaced.key) {
                        Some(index) => records[index] = replaced,
                        // The preflight may already have been evicted.
                        None => records.push(replaced),
                    }
                    Self::enforce_cap(records);
                });
                record
            }
            None => {
                let record = Arc::new(probe);
                self.append_http(record.clone());
                record
            }
        }
    }

    fn append_http(&self, record: Arc<HttpExchangeRecord>) {
        self.http.update(move |records| {
            records.push(record);
            Self::enforce_cap(records);
        });
    }

    fn enforce_cap(records: &mut Vec<Arc<HttpExchangeRecord>>) {
        if records.len() > HTTP_LOG_CAP {
            let excess = records.len() - HTTP_LOG_CAP;
            records.drain(..excess);
        }
    }

    pub fn log_stomp_frame(&self, direction: Direction, frame: &StompFrame) {
        self.push_ws(direction, WsEvent::from_frame(frame));
    }

    pub fn log_ping(&self, direction: Direction) {
        self.push_ws(direction, WsEvent::Ping);
    }

    pub fn log_ready_state(&self, direction: Direction, state: u8) {
        self.push_ws(direction, WsEvent::ReadyState(state));
    }

    pub fn log_error(&self, direction: Direction, code: Option<String>, reason: Option<String>) {
        self.push_ws(direction, WsEvent::Error { code, reason });
    }

    fn push_ws(&self, direction: Direction, event: WsEvent) {
        let record = Arc::new(WsEventRecord {
            key: Uuid::new_v4(),
            t: now_millis(),
            direction,
            event,
        });
        self.ws.update(move |records| records.push(record));
    }

    /// Incrementally drain the HTTP list, one record per tick.
    ///
    /// Calling while a drain is already running is a no-op.
    pub fn clear(self: &Arc<Self>) {
        if self.clearing.swap(true, Ordering::SeqCst) {
            return;
        }

        let log = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(CLEAR_TICK);
            loop {
                tick.tick().await;
                let emptied = log.http.update(|records| {
                    if records.is_empty() {
                        true
                    } else {
                        records.remove(0);
                        records.is_empty()
                    }
                });
                if emptied {
                    break;
                }
            }
            log.pending_preflights.lock().unwrap().clear();
            log.clearing.store(false, Ordering::SeqCst);
        });
    }
}
