//! Draining cursor-paginated list endpoints.

use crate::error::AccountError;
use crate::youtube_api::types::{Page, PageRequest, PagedStream};
use futures::TryStreamExt;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Limits on a single drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginateOptions {
    /// Fail with [`AccountError::PaginationExceeded`] rather than request more than this many
    /// pages. `None` follows cursors for as long as the upstream hands them out.
    pub max_pages: Option<usize>,
}

/// Fetches every page of a list endpoint and returns all transformed items in order.
///
/// `list_fn` is called with `init_params` for the first page and with the previous page's cursor
/// filled in after that, strictly one call at a time. `item_transform` turns each page into
/// output items. The drain stops after the first page without a cursor.
///
/// There is no page cap; an upstream that never stops handing out cursors is followed forever. Use
/// [`paginate_list_with`] to bound it.
///
/// Any error from `list_fn` aborts the whole drain and is returned as is; items from pages that
/// were already fetched are discarded.
pub async fn paginate_list<P, R, T, L, LF, X>(
    list_fn: L,
    init_params: P,
    item_transform: X,
) -> eyre::Result<Vec<T>>
where
    P: PageRequest + Clone + Send,
    L: Fn(P) -> LF + Send,
    LF: Future<Output = eyre::Result<Page<R>>> + Send,
    X: Fn(Page<R>) -> Vec<T> + Sync,
    T: Unpin + Send,
{
    paginate_list_with(PaginateOptions::default(), list_fn, init_params, item_transform).await
}

/// [`paginate_list`] with [`PaginateOptions`].
pub async fn paginate_list_with<P, R, T, L, LF, X>(
    options: PaginateOptions,
    list_fn: L,
    init_params: P,
    item_transform: X,
) -> eyre::Result<Vec<T>>
where
    P: PageRequest + Clone + Send,
    L: Fn(P) -> LF + Send,
    LF: Future<Output = eyre::Result<Page<R>>> + Send,
    X: Fn(Page<R>) -> Vec<T> + Sync,
    T: Unpin + Send,
{
    let transform = &item_transform;
    let pages = AtomicUsize::new(0);
    let fetched = &pages;

    let fetch_page = move |page_token: Option<String>| {
        let already = fetched.fetch_add(1, Ordering::Relaxed);
        let max_pages = options.max_pages.filter(|&max| already >= max);
        let call = match max_pages {
            Some(_) => None,
            None => Some(list_fn(init_params.clone().with_page_token(page_token))),
        };
        async move {
            let Some(call) = call else {
                let max_pages = max_pages.unwrap_or_default();
                return Err(eyre::Report::from(AccountError::PaginationExceeded {
                    max_pages,
                }));
            };
            let page = call.await?;
            let next_page_token = page.next_cursor().map(str::to_string);
            Ok::<_, eyre::Report>((VecDeque::from(transform(page)), next_page_token))
        }
    };

    let items: Vec<T> = PagedStream::new(fetch_page).try_collect().await?;
    tracing::debug!(
        pages = pages.load(Ordering::Relaxed),
        returned_items = items.len(),
        "drained paginated list"
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube_api::types::PageInfo;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Params {
        filter: &'static str,
        page_token: Option<String>,
    }

    impl PageRequest for Params {
        fn with_page_token(self, page_token: Option<String>) -> Self {
            Self { page_token, ..self }
        }
    }

    fn page(items: &[u32], next: Option<&str>) -> Page<u32> {
        Page {
            items: items.to_vec(),
            next_page_token: next.map(String::from),
            page_info: None::<PageInfo>,
        }
    }

    /// Serves `pages` in order, recording the parameters of every call.
    fn scripted(
        pages: Vec<Page<u32>>,
        calls: &Mutex<Vec<Params>>,
    ) -> impl Fn(Params) -> futures::future::Ready<eyre::Result<Page<u32>>> + Send + '_ {
        move |params| {
            let mut calls = calls.lock().unwrap();
            let page = pages[calls.len()].clone();
            calls.push(params);
            futures::future::ready(Ok(page))
        }
    }

    fn init() -> Params {
        Params {
            filter: "channel",
            page_token: None,
        }
    }

    #[tokio::test]
    async fn drains_until_cursor_is_absent() {
        let calls = Mutex::new(Vec::new());
        let pages = vec![
            page(&[1, 2], Some("b")),
            page(&[3], Some("c")),
            page(&[4, 5], None),
        ];
        let items = paginate_list(scripted(pages, &calls), init(), |p| p.items)
            .await
            .unwrap();
        assert_eq!(items, [1, 2, 3, 4, 5]);

        let calls = calls.into_inner().unwrap();
        assert_eq!(
            calls.iter().map(|c| c.page_token.as_deref()).collect::<Vec<_>>(),
            [None, Some("b"), Some("c")]
        );
        assert!(calls.iter().all(|c| c.filter == "channel"));
    }

    #[tokio::test]
    async fn null_absent_and_empty_cursors_all_terminate() {
        for last in [
            serde_json::json!({"items": [9], "nextPageToken": null}),
            serde_json::json!({"items": [9]}),
            serde_json::json!({"items": [9], "nextPageToken": ""}),
        ] {
            let last: Page<u32> = serde_json::from_value(last).unwrap();
            let calls = Mutex::new(Vec::new());
            let items = paginate_list(
                scripted(vec![page(&[1], Some("b")), last], &calls),
                init(),
                |p| p.items,
            )
            .await
            .unwrap();
            assert_eq!(items, [1, 9]);
            assert_eq!(calls.lock().unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn transform_sees_whole_pages() {
        let calls = Mutex::new(Vec::new());
        let pages = vec![page(&[1, 2], Some("b")), page(&[3], None)];
        let sums = paginate_list(scripted(pages, &calls), init(), |p| {
            vec![p.items.iter().sum::<u32>()]
        })
        .await
        .unwrap();
        assert_eq!(sums, [3, 3]);
    }

    #[tokio::test]
    async fn each_call_waits_for_the_previous_cursor() {
        // Each page only resolves after a yield, and records when it started and finished.
        let log = Mutex::new(Vec::new());
        let log = &log;
        let list = |params: Params| async move {
            let label = params.page_token.clone().unwrap_or_else(|| "a".into());
            log.lock().unwrap().push(format!("start {label}"));
            tokio::task::yield_now().await;
            log.lock().unwrap().push(format!("end {label}"));
            let next = match label.as_str() {
                "a" => Some("b"),
                "b" => Some("c"),
                _ => None,
            };
            Ok::<_, eyre::Report>(page(&[0], next))
        };
        paginate_list(list, init(), |p| p.items).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["start a", "end a", "start b", "end b", "start c", "end c"]
        );
    }

    #[tokio::test]
    async fn first_error_aborts_the_drain() {
        let calls = AtomicUsize::new(0);
        let list = |params: Params| {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            async move {
                match n {
                    0 => Ok(page(&[1], Some("b"))),
                    _ => Err(eyre::eyre!("page {:?} failed", params.page_token)),
                }
            }
        };
        let err = paginate_list(list, init(), |p| p.items).await.unwrap_err();
        assert!(err.to_string().contains("failed"));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn page_cap_is_opt_in() {
        let calls = Mutex::new(Vec::new());
        let endless: Vec<_> = (0..10).map(|_| page(&[1], Some("again"))).collect();
        let err = paginate_list_with(
            PaginateOptions { max_pages: Some(3) },
            scripted(endless, &calls),
            init(),
            |p| p.items,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<AccountError>(),
            Some(&AccountError::PaginationExceeded { max_pages: 3 })
        );
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cap_is_not_hit_when_pages_run_out() {
        let calls = Mutex::new(Vec::new());
        let pages = vec![page(&[1], Some("b")), page(&[2], None)];
        let items = paginate_list_with(
            PaginateOptions { max_pages: Some(2) },
            scripted(pages, &calls),
            init(),
            |p| p.items,
        )
        .await
        .unwrap();
        assert_eq!(items, [1, 2]);
    }
}
