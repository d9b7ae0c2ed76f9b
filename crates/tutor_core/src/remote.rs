//! crates/tutor_core/src/remote.rs
//!
//! JSON-over-HTTP implementations of the content, review and error-reporting
//! ports. Content and review calls go through `ResilientFetch`; error reports
//! use the raw transport because the resilience layer queues them itself.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{CatalogEntry, ErrorReport, HttpRequest, LessonDefinition, ReviewItem, ReviewUpdate};
use crate::ports::{
    ErrorReporter, LessonContentProvider, PortError, PortResult, ReviewStore, Transport,
};
use crate::resilience::fetch::ResilientFetch;

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

pub struct RemoteLessonProvider {
    fetch: Arc<ResilientFetch>,
    base_url: String,
}

impl RemoteLessonProvider {
    pub fn new(fetch: Arc<ResilientFetch>, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LessonContentProvider for RemoteLessonProvider {
    async fn lesson(&self, lesson_id: &str) -> PortResult<LessonDefinition> {
        match self.fetch.get_json(join(&self.base_url, &format!("lessons/{lesson_id}"))).await {
            Err(PortError::Http { status: 404, .. }) => {
                Err(PortError::NotFound(format!("Lesson {lesson_id} not found")))
            }
            other => other,
        }
    }

    async fn catalog(&self) -> PortResult<Vec<CatalogEntry>> {
        self.fetch.get_json(join(&self.base_url, "lessons")).await
    }
}

#[derive(Serialize)]
struct GradeBody {
    quality: u8,
    confidence: u8,
}

pub struct RemoteReviewStore {
    fetch: Arc<ResilientFetch>,
    base_url: String,
}

impl RemoteReviewStore {
    pub fn new(fetch: Arc<ResilientFetch>, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReviewStore for RemoteReviewStore {
    async fn due(&self, user_id: &str) -> PortResult<Vec<ReviewItem>> {
        self.fetch
            .get_json(join(&self.base_url, &format!("reviews/{user_id}/due")))
            .await
    }

    async fn update(
        &self,
        user_id: &str,
        phrase_id: &str,
        quality: u8,
        confidence: u8,
    ) -> PortResult<ReviewUpdate> {
        let url = join(&self.base_url, &format!("reviews/{user_id}/{phrase_id}"));
        self.fetch
            .post_json(url, &GradeBody { quality, confidence })
            .await
    }
}

pub struct RemoteErrorReporter {
    transport: Arc<dyn Transport>,
    url: String,
}

impl RemoteErrorReporter {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ErrorReporter for RemoteErrorReporter {
    async fn report(&self, report: &ErrorReport) -> PortResult<()> {
        let request = HttpRequest::post_json(self.url.clone(), serde_json::to_string(report)?);
        let response = self.transport.send(&request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(PortError::Http {
                status: response.status,
                body: response.body,
            })
        }
    }
}
