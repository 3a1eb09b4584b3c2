/// JSON-RPC client for the ledger service
///
/// All upstream calls go through here: signature listing, batched
/// transaction lookup, token supply, and pool enumeration for the AMM
/// reader. The API key is carried as a query parameter on every request.
/// Transient failures are retried with bounded exponential backoff; a 429
/// is surfaced as `ApiError::RateLimited` so the batch fetcher can apply
/// its own batch-wide backoff ladder.

use super::throttle::ExponentialBackoff;
use super::types::*;
use crate::config::Config;
use crate::errors::{ApiError, ApiResult};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// Attempts allowed per call for transient failures
const MAX_CALL_ATTEMPTS: u32 = 3;

/// AMM programs scanned by the pool enumeration call, with the account
/// offsets their pool layouts keep the two mints at
const POOL_PROGRAMS: [(&str, PoolProgram, usize, usize); 2] = [
    ("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C", PoolProgram::ConstantProduct, 168, 200),
    ("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA", PoolProgram::BondingCurve, 43, 75),
];

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// The ledger RPC surface the pipeline depends on. Production uses
/// [`LedgerClient`]; tests inject a mock.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Cursor-based signature listing for a wallet, newest first
    async fn get_signatures(
        &self,
        wallet: &str,
        limit: usize,
        before: Option<&str>,
    ) -> ApiResult<SignaturePage>;

    /// Resolve full transaction bodies for a batch of signatures in one
    /// round trip. The result vector is positionally aligned with the
    /// input; unknown signatures come back as `None`.
    async fn get_transactions(
        &self,
        signatures: &[String],
    ) -> ApiResult<Vec<Option<RawTransaction>>>;

    /// Total supply of a mint
    async fn get_token_supply(&self, mint: &str) -> ApiResult<TokenSupply>;

    /// Enumerate candidate liquidity pools holding the (mint, quote) pair
    async fn get_pool_accounts(&self, mint: &str, quote: &str) -> ApiResult<Vec<PoolAccount>>;
}

// =============================================================================
// PRODUCTION CLIENT
// =============================================================================

pub struct LedgerClient {
    client: reqwest::Client,
    endpoint: String,
    backoff: ExponentialBackoff,
}

impl LedgerClient {
    pub fn new(config: &Config) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;

        let mut endpoint = url::Url::parse(&config.rpc_url)
            .map_err(|e| ApiError::InvalidResponse(format!("invalid RPC URL: {}", e)))?;
        endpoint
            .query_pairs_mut()
            .append_pair("api-key", &config.rpc_api_key);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            backoff: ExponentialBackoff::default(),
        })
    }

    /// Issue one JSON-RPC call with bounded retries for transient errors.
    /// Rate limiting is not retried here: the batch layer owns that policy.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> ApiResult<T> {
        let mut attempt = 0;

        loop {
            let result = self.call_once(method, params.clone()).await;

            match result {
                Ok(value) => return Ok(value),
                Err(ApiError::RateLimited) => return Err(ApiError::RateLimited),
                Err(e) if e.is_transient() && attempt + 1 < MAX_CALL_ATTEMPTS => {
                    let delay = self.backoff.delay_for(attempt);
                    logger::debug(
                        LogTag::Rpc,
                        &format!(
                            "{} attempt {} failed ({}), retrying in {}ms",
                            method,
                            attempt + 1,
                            e,
                            delay.as_millis()
                        ),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once<T: DeserializeOwned>(&self, method: &str, params: Value) -> ApiResult<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.post(&body).await?;
        let envelope: Value = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        Self::extract_result(&envelope)
    }

    /// Issue a JSON-RPC *batch* request: one HTTP round trip, responses
    /// matched back to requests by id. Missing or failed entries are `None`.
    async fn call_batch<T: DeserializeOwned>(
        &self,
        method: &str,
        param_sets: Vec<Value>,
    ) -> ApiResult<Vec<Option<T>>> {
        if param_sets.is_empty() {
            return Ok(Vec::new());
        }

        let body: Vec<Value> = param_sets
            .iter()
            .enumerate()
            .map(|(id, params)| {
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "method": method,
                    "params": params,
                })
            })
            .collect();

        let response = self.post(&json!(body)).await?;
        let entries: Vec<Value> = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        // Responses may arrive in any order
        let mut results: Vec<Option<T>> = Vec::with_capacity(param_sets.len());
        results.resize_with(param_sets.len(), || None);

        for entry in entries {
            let id = entry.get("id").and_then(|v| v.as_u64()).map(|v| v as usize);
            let Some(id) = id.filter(|id| *id < results.len()) else {
                continue;
            };
            if let Ok(value) = Self::extract_result::<T>(&entry) {
                results[id] = Some(value);
            }
        }

        Ok(results)
    }

    async fn post(&self, body: &Value) -> ApiResult<reqwest::Response> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ApiError::RateLimited);
        }
        if status.as_u16() == 404 {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            return Err(ApiError::Network(format!("HTTP {}", status)));
        }

        Ok(response)
    }

    fn extract_result<T: DeserializeOwned>(envelope: &Value) -> ApiResult<T> {
        if let Some(error) = envelope.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            // -32602 invalid params, -32601 unknown method stay visible;
            // "not found" style codes degrade to NotFound
            if code == -32004 || code == -32009 {
                return Err(ApiError::NotFound);
            }
            return Err(ApiError::InvalidResponse(error.to_string()));
        }

        let result = envelope
            .get("result")
            .ok_or_else(|| ApiError::InvalidResponse("missing result field".to_string()))?;

        if result.is_null() {
            return Err(ApiError::NotFound);
        }

        serde_json::from_value(result.clone()).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LedgerRpc for LedgerClient {
    async fn get_signatures(
        &self,
        wallet: &str,
        limit: usize,
        before: Option<&str>,
    ) -> ApiResult<SignaturePage> {
        let mut options = json!({ "limit": limit });
        if let Some(cursor) = before {
            options["before"] = json!(cursor);
        }

        self.call("getSignaturesForWallet", json!([wallet, options])).await
    }

    async fn get_transactions(
        &self,
        signatures: &[String],
    ) -> ApiResult<Vec<Option<RawTransaction>>> {
        let param_sets: Vec<Value> = signatures
            .iter()
            .map(|sig| json!([sig, { "encoding": "enriched" }]))
            .collect();

        self.call_batch("getEnrichedTransaction", param_sets).await
    }

    async fn get_token_supply(&self, mint: &str) -> ApiResult<TokenSupply> {
        // getTokenSupply wraps the supply in a context envelope
        #[derive(serde::Deserialize)]
        struct SupplyEnvelope {
            value: TokenSupply,
        }

        let envelope: SupplyEnvelope = self.call("getTokenSupply", json!([mint])).await?;
        Ok(envelope.value)
    }

    async fn get_pool_accounts(&self, mint: &str, quote: &str) -> ApiResult<Vec<PoolAccount>> {
        #[derive(serde::Deserialize)]
        struct ProgramAccount {
            pubkey: String,
            account: AccountData,
        }

        #[derive(serde::Deserialize)]
        struct AccountData {
            data: (String, String),
        }

        let mut pools = Vec::new();

        for (program_id, program, base_offset, quote_offset) in POOL_PROGRAMS {
            // One scan per mint position: pools store the pair in either order
            for (mint_offset, other, other_offset) in
                [(base_offset, quote, quote_offset), (quote_offset, quote, base_offset)]
            {
                let params = json!([
                    program_id,
                    {
                        "encoding": "base64",
                        "filters": [
                            { "memcmp": { "offset": mint_offset, "bytes": mint } },
                            { "memcmp": { "offset": other_offset, "bytes": other } },
                        ],
                    }
                ]);

                let accounts: Vec<ProgramAccount> =
                    match self.call("getProgramAccounts", params).await {
                        Ok(accounts) => accounts,
                        Err(ApiError::NotFound) => continue,
                        Err(e) if e.is_transient() => {
                            logger::warning(
                                LogTag::Pool,
                                &format!("Pool scan failed for program {}: {}", program_id, e),
                            );
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                for account in accounts {
                    let decoded = match base64::engine::general_purpose::STANDARD
                        .decode(&account.account.data.0)
                    {
                        Ok(bytes) => bytes,
                        Err(_) => continue,
                    };

                    pools.push(PoolAccount {
                        address: account.pubkey,
                        program,
                        data: decoded,
                    });
                }
            }
        }

        pools.sort_by(|a, b| a.address.cmp(&b.address));
        pools.dedup_by(|a, b| a.address == b.address);
        Ok(pools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_result_ok() {
        let envelope = json!({ "jsonrpc": "2.0", "id": 1, "result": 42 });
        let value: u64 = LedgerClient::extract_result(&envelope).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_extract_result_error() {
        let envelope = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "bad params" }
        });
        let result: ApiResult<u64> = LedgerClient::extract_result(&envelope);
        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_extract_result_null_is_not_found() {
        let envelope = json!({ "jsonrpc": "2.0", "id": 1, "result": null });
        let result: ApiResult<u64> = LedgerClient::extract_result(&envelope);
        assert!(matches!(result, Err(ApiError::NotFound)));
    }
}
