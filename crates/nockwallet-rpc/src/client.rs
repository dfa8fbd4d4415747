//! JSON-RPC 2.0 client for a Nockchain node.
//!
//! Uses raw HTTP POST with serde_json rather than a full RPC framework to
//! keep the wallet dependency surface lean.

use serde::Deserialize;

use nockwallet_core::note::Note;
use nockwallet_core::types::Digest;
use nockwallet_core::WalletError;

use crate::NodeRpc;

pub struct HttpNodeClient {
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct NotesResponse {
    notes: Vec<Note>,
}

#[derive(Deserialize)]
struct BroadcastResponse {
    output_txid: Digest,
}

impl HttpNodeClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, WalletError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::Rpc(format!("connecting to node at {}: {e}", self.url)))?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| WalletError::Rpc(format!("parsing RPC response: {e}")))?;

        if let Some(err) = json.get("error") {
            return Err(WalletError::Rpc(format!("{method}: {err}")));
        }

        Ok(json["result"].clone())
    }
}

impl NodeRpc for HttpNodeClient {
    async fn query_utxos_by_first_name(
        &self,
        first_name: Digest,
    ) -> Result<Vec<Note>, WalletError> {
        let result = self
            .call(
                "nock_queryUtxosByFirstName",
                serde_json::json!([first_name.to_b58()]),
            )
            .await?;
        let parsed: NotesResponse = serde_json::from_value(result)
            .map_err(|e| WalletError::Rpc(format!("parsing notes: {e}")))?;
        Ok(parsed.notes)
    }

    async fn query_utxos_by_pkh(&self, pkh: Digest) -> Result<Vec<Note>, WalletError> {
        let result = self
            .call("nock_queryUtxosByPkh", serde_json::json!([pkh.to_b58()]))
            .await?;
        let parsed: NotesResponse = serde_json::from_value(result)
            .map_err(|e| WalletError::Rpc(format!("parsing notes: {e}")))?;
        Ok(parsed.notes)
    }

    async fn broadcast(&self, raw_tx_jam: &[u8]) -> Result<Digest, WalletError> {
        let result = self
            .call(
                "nock_broadcastTx",
                serde_json::json!([hex::encode(raw_tx_jam)]),
            )
            .await?;
        let parsed: BroadcastResponse = serde_json::from_value(result)
            .map_err(|e| WalletError::Rpc(format!("parsing broadcast result: {e}")))?;
        Ok(parsed.output_txid)
    }

    async fn health_check(&self) -> Result<(), WalletError> {
        self.call("nock_health", serde_json::json!([])).await?;
        Ok(())
    }
}
