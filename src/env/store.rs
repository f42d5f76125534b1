//! Runtime store for the active environment and its cookie jars.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::config::{EnvironmentConfig, RouteEntry};
use crate::env::persist::{load_state, store_state, PersistedState};
use crate::observable::{Observable, Subscription};

/// A point-in-time view of the active environment.
///
/// Handlers capture one snapshot per exchange; switching the active
/// environment mid-request does not retroactively change that request's
/// headers or target.
#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    config: Arc<EnvironmentConfig>,
    cookies: Vec<String>,
}

impl EnvSnapshot {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn origin(&self) -> &Url {
        &self.config.origin
    }

    /// Route table in declaration order.
    pub fn routes(&self) -> &[RouteEntry] {
        &self.config.routes
    }

    /// Cookie jar contents at snapshot time.
    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }
}

#[derive(Clone)]
struct StoreState {
    selected: usize,
    cookies: HashMap<String, Vec<String>>,
}

/// Holds the active-environment selector and per-environment cookie jars.
///
/// The environment table itself is immutable after construction; only the
/// selection and cookies change at runtime. Every change notifies
/// subscribers and, when persistence is configured, is written to disk
/// best-effort.
pub struct EnvironmentStore {
    environments: Vec<Arc<EnvironmentConfig>>,
    state: Observable<StoreState>,
}

impl EnvironmentStore {
    /// Build a store over a non-empty, validated environment table.
    pub fn new(environments: Vec<EnvironmentConfig>) -> Arc<Self> {
        assert!(
            !environments.is_empty(),
            "environment table must be validated as non-empty"
        );
        Arc::new(Self {
            environments: environments.into_iter().map(Arc::new).collect(),
            state: Observable::new(StoreState {
                selected: 0,
                cookies: HashMap::new(),
            }),
        })
    }

    /// Build a store that restores from and persists to `state_file`.
    pub fn with_persistence(
        environments: Vec<EnvironmentConfig>,
        state_file: PathBuf,
    ) -> Arc<Self> {
        let store = Self::new(environments);

        if let Some(persisted) = load_state(&state_file) {
            store.state.update(|state| {
                if let Some(index) = store
                    .environments
                    .iter()
                    .position(|env| env.name == persisted.selected)
                {
                    state.selected = index;
                }
                // Drop cookies for environments no longer in the config.
                state.cookies = persisted
                    .cookies
                    .into_iter()
                    .filter(|(name, _)| store.environments.iter().any(|env| &env.name == name))
                    .collect();
            });
        }

        let names: Vec<String> = store
            .environments
            .iter()
            .map(|env| env.name.clone())
            .collect();
        store
            .state
            .subscribe(move |state| {
                let persisted = PersistedState {
                    selected: names[state.selected].clone(),
                    cookies: state.cookies.clone(),
                };
                store_state(&state_file, &persisted);
            })
            .detach();

        store
    }

    /// Snapshot of the active environment and its cookies.
    pub fn active(&self) -> EnvSnapshot {
        self.state.with(|state| EnvSnapshot {
            config: Arc::clone(&self.environments[state.selected]),
            cookies: state
                .cookies
                .get(&self.environments[state.selected].name)
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// Cycle to the next environment in declaration order.
    pub fn select_next(&self) {
        let count = self.environments.len();
        let name = self.state.update(|state| {
            state.selected = (state.selected + 1) % count;
            state.selected
        });
        tracing::info!(environment = %self.environments[name].name, "Environment selected");
    }

    /// Replace the active environment's cookie jar; an empty list clears it.
    pub fn set_cookies(&self, cookies: Vec<String>) {
        let environments = &self.environments;
        self.state.update(|state| {
            let name = environments[state.selected].name.clone();
            if cookies.is_empty() {
                state.cookies.remove(&name);
            } else {
                state.cookies.insert(name, cookies.clone());
            }
        });
    }

    /// Cookie jar of the active environment.
    pub fn cookies(&self) -> Vec<String> {
        self.state.with(|state| {
            state
                .cookies
                .get(&self.environments[state.selected].name)
                .cloned()
                .unwrap_or_default()
        })
    }

    /// Subscribe to any change (selection or cookies).
    pub fn on_change(&self, cb: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.state.subscribe(move |_| cb())
    }
}
