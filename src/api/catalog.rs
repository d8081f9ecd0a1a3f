//! Activity search over an authenticated session.

use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::api::auth::AuthenticatedSession;
use crate::api::rate_limit::RateLimiter;
use crate::api::session::HttpSession;
use crate::api::types::ActivitySummary;
use crate::cancel::CancelSignal;
use crate::config::EndpointsConfig;
use crate::error::Result;

/// Pages through the activity search endpoint.
pub struct ActivityCatalog {
    session: HttpSession,
    search_path: String,
    start_param: String,
    limit_param: String,
    search_param: String,
    page_limiter: RateLimiter,
}

impl ActivityCatalog {
    /// Building a catalog requires a logged-in session, so it can never
    /// be queried before the handshake completes.
    pub fn new(
        session: &AuthenticatedSession,
        endpoints: &EndpointsConfig,
        page_interval: Duration,
    ) -> Self {
        Self {
            session: session.connect().clone(),
            search_path: endpoints.activity_search_path.clone(),
            start_param: endpoints.start_param.clone(),
            limit_param: endpoints.limit_param.clone(),
            search_param: endpoints.search_param.clone(),
            page_limiter: RateLimiter::new(page_interval),
        }
    }

    /// One search request.
    pub async fn try_list_activities(
        &self,
        start: u32,
        limit: u32,
        filter: &str,
    ) -> Result<Vec<ActivitySummary>> {
        let mut query = vec![
            (self.start_param.clone(), start.to_string()),
            (self.limit_param.clone(), limit.to_string()),
        ];
        if !filter.is_empty() {
            query.push((self.search_param.clone(), filter.to_string()));
        }

        let page = self
            .session
            .get(&self.search_path, &HeaderMap::new(), &query)
            .await?;
        let summaries: Vec<ActivitySummary> = page.json()?;
        tracing::debug!(
            "Catalog page start={} limit={} returned {} activities",
            start,
            limit,
            summaries.len()
        );

        Ok(summaries)
    }

    /// One search request; a failed request reads as "nothing new".
    pub async fn list_activities(&self, start: u32, limit: u32, filter: &str) -> Vec<ActivitySummary> {
        match self.try_list_activities(start, limit, filter).await {
            Ok(summaries) => summaries,
            Err(e) => {
                tracing::error!("Exception getting activity summary: {}", e);
                Vec::new()
            }
        }
    }

    /// Gather up to `count` summaries, `page_size` per request, stopping at
    /// the first short or failed page. `cancel` is checked before each page.
    pub async fn collect(
        &self,
        count: u32,
        page_size: u32,
        filter: &str,
        cancel: &CancelSignal,
    ) -> Vec<ActivitySummary> {
        let page_size = page_size.max(1);
        let mut summaries = Vec::new();
        let mut start = 0u32;

        while start < count {
            if cancel.is_cancelled() {
                tracing::info!("Cancelled; stopping catalog after {} activities", summaries.len());
                break;
            }
            let limit = page_size.min(count - start);
            self.page_limiter.acquire().await;

            let page = self.list_activities(start, limit, filter).await;
            let returned = page.len() as u32;
            summaries.extend(page);

            if returned < limit {
                break;
            }
            start += returned;
        }

        summaries.truncate(count as usize);
        summaries
    }
}
