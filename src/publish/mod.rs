//! Published forms: restyled HTML stored under a short random id and served
//! at `/f/<id>` until its retention window runs out.

use crate::error::PublishError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

pub const PUBLISH_ID_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedForm {
    pub html: String,
    pub form_id: String,
    pub created_at: DateTime<Utc>,
}

pub trait PublishStore: Send + Sync {
    fn save(&self, id: &str, form: PublishedForm) -> Result<(), PublishError>;

    /// `None` when the id is unknown or its record has expired.
    fn get(&self, id: &str) -> Result<Option<PublishedForm>, PublishError>;
}

/// Validate and store a form under a fresh id, returning the id.
pub fn publish_form(
    store: &dyn PublishStore,
    html: &str,
    form_id: &str,
) -> Result<String, PublishError> {
    if html.trim().is_empty() {
        return Err(PublishError::Validation("html is required".into()));
    }
    if form_id.trim().is_empty() {
        return Err(PublishError::Validation("formId is required".into()));
    }

    let id = crate::util::random_id(PUBLISH_ID_LEN);
    store.save(
        &id,
        PublishedForm {
            html: html.to_string(),
            form_id: form_id.to_string(),
            created_at: Utc::now(),
        },
    )?;
    tracing::info!(%id, form_id, "form published");
    Ok(id)
}

/// Process-local store. Expired records are treated as absent and purged
/// lazily on access.
pub struct InMemoryPublishStore {
    ttl: TimeDelta,
    records: Mutex<HashMap<String, PublishedForm>>,
}

impl InMemoryPublishStore {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            ttl,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl_hours(hours: u64) -> Self {
        let hours = i64::try_from(hours).unwrap_or(i64::MAX);
        Self::new(TimeDelta::try_hours(hours).unwrap_or(TimeDelta::MAX))
    }

    fn is_expired(&self, form: &PublishedForm, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(form.created_at) >= self.ttl
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, PublishedForm>>, PublishError> {
        self.records
            .lock()
            .map_err(|_| PublishError::Store("publish store lock poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PublishStore for InMemoryPublishStore {
    fn save(&self, id: &str, form: PublishedForm) -> Result<(), PublishError> {
        let now = Utc::now();
        let mut records = self.lock()?;
        records.retain(|_, existing| !self.is_expired(existing, now));
        records.insert(id.to_string(), form);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PublishedForm>, PublishError> {
        let mut records = self.lock()?;
        let expired = match records.get(id) {
            Some(form) => self.is_expired(form, Utc::now()),
            None => return Ok(None),
        };
        if expired {
            records.remove(id);
            return Ok(None);
        }
        Ok(records.get(id).cloned())
    }
}
