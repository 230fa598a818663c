use crate::crawl::{RecordSink, SectionRecord};
use crate::loris::models::{CourseCode, Crn, Instructor, Term};
use crate::store::{Store, StoreError};
use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;
use tokio::sync::Mutex;
use tracing::{trace, warn};

static FORBIDDEN_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.$#/\[\]]").unwrap());

/// Strip the characters store keys cannot contain.
pub fn sanitize_key(name: &str) -> String {
    FORBIDDEN_KEY_RE.replace_all(name, "").trim().to_owned()
}

/// Writes section records into the two trees consumers read:
///
/// - `courses/{courseCode}/{term}`: CRNs of the course in that term
/// - `instructors/{name}`: `{"email": ..., "{term}": [CRNs]}`
///
/// Both are merged into what is already stored, so re-running a crawl only
/// adds CRNs that were not there before.
pub struct CatalogWriter<S> {
    store: S,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl<S: Store> CatalogWriter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn add_course_section(
        &self,
        term: &Term,
        course_code: &CourseCode,
        crn: &Crn,
    ) -> Result<(), StoreError> {
        let path = format!("courses/{course_code}/{term}");
        let mut crns = self.store.read(&path).await?.unwrap_or_else(|| json!([]));
        if push_unique(&mut crns, crn) {
            self.store.upsert(&path, crns).await?;
        }
        Ok(())
    }

    async fn add_instructor_section(
        &self,
        term: &Term,
        instructor: &Instructor,
        crn: &Crn,
    ) -> Result<(), StoreError> {
        let key = sanitize_key(&instructor.display_name);
        if key.is_empty() {
            warn!(
                name = %instructor.display_name,
                "Instructor name is empty once sanitized, skipping"
            );
            return Ok(());
        }

        let path = format!("instructors/{key}");
        let mut entry = match self.store.read(&path).await? {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let email = entry.entry("email").or_insert(Value::Null);
        if email.is_null()
            && let Some(address) = &instructor.email_address
        {
            *email = Value::String(address.clone());
        }

        push_unique(entry.entry(term.as_str()).or_insert_with(|| json!([])), crn);
        self.store.upsert(&path, Value::Object(entry)).await
    }
}

/// Append `crn` to a JSON array unless present. Returns whether it was added.
fn push_unique(list: &mut Value, crn: &Crn) -> bool {
    if !list.is_array() {
        *list = json!([]);
    }
    let Value::Array(items) = list else {
        return false;
    };
    if items.iter().any(|item| item.as_str() == Some(crn.as_str())) {
        return false;
    }
    items.push(Value::String(crn.to_string()));
    true
}

#[async_trait]
impl<S: Store> RecordSink for CatalogWriter<S> {
    async fn emit(&self, record: SectionRecord) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;

        self.add_course_section(&record.term, &record.course_code, &record.crn)
            .await
            .with_context(|| format!("failed to store course {}", record.course_code))?;
        for instructor in &record.instructors {
            self.add_instructor_section(&record.term, instructor, &record.crn)
                .await
                .with_context(|| {
                    format!("failed to store instructor {}", instructor.display_name)
                })?;
        }

        trace!(
            term = %record.term,
            course_code = %record.course_code,
            crn = %record.crn,
            instructors = record.instructors.len(),
            "record stored"
        );
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.flush().await.context("failed to flush store")
    }
}
