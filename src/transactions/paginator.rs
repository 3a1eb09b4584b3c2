/// Signature paginator with truncation detection
///
/// Walks the ledger's cursor-based signature listing to completion for a
/// wallet. Pages arrive newest-first; the cursor for the next page is the
/// last signature of the previous one (or the server-supplied next-cursor
/// when present).
///
/// Empty pages are provisional, never trusted at face value:
/// - an empty page with no outstanding cursor is retried until
///   `MAX_EMPTY_PAGES` consecutive confirmations, then the walk ends;
/// - an empty page while a next-cursor is still present means the server
///   claims more history exists but returned none of it. After
///   `MAX_TRUNCATION_PAGES` consecutive such pages the walk fails with an
///   integrity error rather than silently returning a truncated list.

use crate::errors::{ApiError, WalletscopeError, WalletscopeResult};
use crate::logger::{self, LogTag};
use crate::rpc::types::SignatureInfo;
use crate::rpc::LedgerRpc;
use crate::transactions::CancelFlag;
use std::collections::HashSet;
use std::sync::Arc;

/// Consecutive empty pages (no cursor) accepted as a genuine end of history
const MAX_EMPTY_PAGES: u32 = 5;

/// Consecutive empty-with-cursor pages tolerated before raising truncation
const MAX_TRUNCATION_PAGES: u32 = 10;

pub struct SignaturePaginator {
    rpc: Arc<dyn LedgerRpc>,
    page_size: usize,
}

impl SignaturePaginator {
    pub fn new(rpc: Arc<dyn LedgerRpc>, page_size: usize) -> Self {
        Self { rpc, page_size }
    }

    /// Fetch the complete, unique set of signatures involving a wallet.
    /// Order is not meaningful; downstream correctness rests on the
    /// dedup-by-signature invariant, not on arrival order.
    pub async fn fetch_all(
        &self,
        wallet: &str,
        cancel: &CancelFlag,
    ) -> WalletscopeResult<Vec<SignatureInfo>> {
        let mut collected: Vec<SignatureInfo> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut empty_pages: u32 = 0;
        let mut truncation_pages: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(WalletscopeError::Cancelled);
            }

            let page = match self
                .rpc
                .get_signatures(wallet, self.page_size, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(ApiError::NotFound) => {
                    // Wallet with no history at all
                    logger::debug(LogTag::Fetch, &format!("No signatures found for {}", wallet));
                    break;
                }
                Err(e) => {
                    // The client already retried transient failures; a page
                    // that still fails is counted like an empty one so a
                    // flapping upstream cannot end the walk early.
                    logger::warning(
                        LogTag::Fetch,
                        &format!("Signature page fetch failed for {}: {}", wallet, e),
                    );
                    if cursor.is_some() {
                        truncation_pages += 1;
                        if truncation_pages >= MAX_TRUNCATION_PAGES {
                            return Err(WalletscopeError::PaginationTruncated {
                                consecutive: truncation_pages,
                                cursor: cursor.clone().unwrap_or_default(),
                            });
                        }
                    } else {
                        empty_pages += 1;
                        if empty_pages >= MAX_EMPTY_PAGES {
                            break;
                        }
                    }
                    continue;
                }
            };

            if page.signatures.is_empty() {
                if let Some(next) = &page.next_cursor {
                    // Server says more history exists but returned nothing
                    truncation_pages += 1;
                    empty_pages = 0;
                    logger::warning(
                        LogTag::Fetch,
                        &format!(
                            "Possible truncation for {}: empty page with cursor present ({}/{})",
                            wallet, truncation_pages, MAX_TRUNCATION_PAGES
                        ),
                    );
                    if truncation_pages >= MAX_TRUNCATION_PAGES {
                        return Err(WalletscopeError::PaginationTruncated {
                            consecutive: truncation_pages,
                            cursor: next.clone(),
                        });
                    }
                    cursor = Some(next.clone());
                    continue;
                }

                empty_pages += 1;
                truncation_pages = 0;
                if empty_pages >= MAX_EMPTY_PAGES {
                    break;
                }
                continue;
            }

            empty_pages = 0;
            truncation_pages = 0;

            let last_signature = page.signatures.last().map(|s| s.signature.clone());
            for info in page.signatures {
                if seen.insert(info.signature.clone()) {
                    collected.push(info);
                }
            }

            // Prefer the server-supplied cursor; otherwise derive it from
            // the last row of the page
            cursor = match page.next_cursor {
                Some(next) => Some(next),
                None => last_signature,
            };
        }

        logger::info(
            LogTag::Fetch,
            &format!("Signature walk complete for {}: {} unique signatures", wallet, collected.len()),
        );

        Ok(collected)
    }
}
