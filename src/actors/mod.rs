//! Who triggered a run, and how to show them.

use serde::Deserialize;
use std::collections::HashMap;

pub trait ActorResolver: Send + Sync {
    /// A human readable label for the actor, or None if it is unknown.
    fn resolve_display_label(&self, actor_id: i64) -> Option<String>;
}

/// An operator allowed to use the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminIdentity {
    pub token: String,
    pub actor_id: i64,
    pub label: String,
}

/// Fixed set of operators loaded from configuration.
#[derive(Debug, Default)]
pub struct AdminDirectory {
    by_token: HashMap<String, AdminIdentity>,
    labels: HashMap<i64, String>,
}

impl AdminDirectory {
    pub fn new(admins: Vec<AdminIdentity>) -> Self {
        let labels = admins
            .iter()
            .map(|admin| (admin.actor_id, admin.label.clone()))
            .collect();
        let by_token = admins
            .into_iter()
            .map(|admin| (admin.token.clone(), admin))
            .collect();
        Self { by_token, labels }
    }

    pub fn find_by_token(&self, token: &str) -> Option<&AdminIdentity> {
        self.by_token.get(token)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

impl ActorResolver for AdminDirectory {
    fn resolve_display_label(&self, actor_id: i64) -> Option<String> {
        self.labels.get(&actor_id).cloned()
    }
}
