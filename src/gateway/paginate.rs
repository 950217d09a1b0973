//! Paginated collector for cursor-based list APIs.

use std::future::Future;
use tracing::debug;

use crate::classify;
use crate::error::GatewayError;

use super::types::{ListObjectsInput, ListObjectsOutput, ObjectSummary};
use super::{call, RemoteGateway, S3};

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Cursor for the next page, `None` on the last one.
    pub next: Option<String>,
}

/// Drains a cursor-paginated API into a flat list.
///
/// `fetch` receives `None` for the first page and the previous page's cursor
/// afterwards. Draining stops when a page has no cursor or repeats the last one.
///
/// # Errors
///
/// Returns the first error produced by `fetch`.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, GatewayError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, GatewayError>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0_usize;

    loop {
        let page = fetch(cursor.clone()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => break,
        }
    }

    debug!("Collected {} item(s) across {pages} page(s)", items.len());
    Ok(items)
}

/// Treats a not-found listing as an empty one.
///
/// # Errors
///
/// Passes through every error that is not a 404.
pub fn not_found_as_empty<T>(result: Result<Vec<T>, GatewayError>) -> Result<Vec<T>, GatewayError> {
    match result {
        Err(err) if classify::is_not_found(&err) => {
            debug!("Listing not found, treating as empty: {err}");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Lists every object under a prefix, following continuation tokens.
///
/// # Errors
///
/// Returns the gateway error of the failing page.
pub async fn list_objects(
    gateway: &dyn RemoteGateway,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<ObjectSummary>, GatewayError> {
    collect_pages(|continuation_token| async move {
        let output: ListObjectsOutput = call(
            gateway,
            S3,
            "listObjectsV2",
            ListObjectsInput {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                continuation_token,
            },
        )
        .await?;

        let next = if output.is_truncated {
            output.next_continuation_token
        } else {
            None
        };

        Ok(Page {
            items: output.contents,
            next,
        })
    })
    .await
}
