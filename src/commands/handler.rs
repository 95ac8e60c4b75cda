//! Command execution against the configured collaborators.

use crate::commands::{Deleter, Getter, Setter};
use crate::protocol::{Item, Response};
use crate::stats::Stats;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Executes parsed commands and keeps the statistics registry current.
///
/// Cheap to clone; one clone travels with every connection task. The
/// collaborators are optional so a partially wired server still answers
/// the protocol: a missing getter or deleter yields `ERROR`, a missing
/// setter yields `SERVER_ERROR`.
#[derive(Clone)]
pub struct CommandHandler {
    getter: Option<Arc<dyn Getter>>,
    setter: Option<Arc<dyn Setter>>,
    deleter: Option<Arc<dyn Deleter>>,
    stats: Arc<Stats>,
    /// Tracks fire-and-forget `noreply` set tasks so shutdown can drain
    /// them instead of leaking.
    noreply_tasks: TaskTracker,
}

impl CommandHandler {
    pub fn new(stats: Arc<Stats>, noreply_tasks: TaskTracker) -> Self {
        Self {
            getter: None,
            setter: None,
            deleter: None,
            stats,
            noreply_tasks,
        }
    }

    pub fn with_getter(mut self, getter: Arc<dyn Getter>) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn with_setter(mut self, setter: Arc<dyn Setter>) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn with_deleter(mut self, deleter: Arc<dyn Deleter>) -> Self {
        self.deleter = Some(deleter);
        self
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Retrieval. A hit is whatever the getter answered followed by
    /// `END`; a miss is `END` alone.
    pub async fn get(&self, key: &str) -> Vec<Response> {
        let Some(getter) = &self.getter else {
            return vec![Response::Error];
        };

        self.stats.cmd_get.incr(1);
        match getter.get(key).await {
            Some(response) => {
                self.stats.get_hits.incr(1);
                vec![response, Response::End]
            }
            None => {
                self.stats.get_misses.incr(1);
                vec![Response::End]
            }
        }
    }

    /// Storage. With `noreply` the set runs in a tracked background
    /// task and nothing is written back; best effort on shutdown.
    pub async fn set(&self, item: Item, noreply: bool) -> Vec<Response> {
        let Some(setter) = &self.setter else {
            return vec![Response::ServerError];
        };

        self.stats.cmd_set.incr(1);
        if noreply {
            let setter = Arc::clone(setter);
            self.noreply_tasks.spawn(async move {
                if let Some(response) = setter.set(item).await {
                    debug!(?response, "noreply set response discarded");
                }
            });
            return Vec::new();
        }

        match setter.set(item).await {
            Some(response) => vec![response],
            None => vec![Response::Stored],
        }
    }

    pub async fn delete(&self, key: &str) -> Vec<Response> {
        let Some(deleter) = &self.deleter else {
            return vec![Response::Error];
        };

        match deleter.delete(key).await {
            Ok(()) => vec![Response::Deleted],
            Err(_) => vec![Response::NotFound],
        }
    }

    pub fn server_stats(&self) -> Response {
        Response::Stats(self.stats.snapshot())
    }

    pub fn version(&self) -> Response {
        Response::Version(crate::VERSION.to_string())
    }
}
