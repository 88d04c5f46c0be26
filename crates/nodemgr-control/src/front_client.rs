//! HTTP client for communicating with front agents.
//!
//! A front fronts one blockchain node's RPC interface. This module provides
//! the `FrontClient` trait used by the orchestrator, the aggregator and the
//! reconciler, an HTTP implementation, and an in-memory mock for tests.

use std::time::Duration;

use async_trait::async_trait;
use nodemgr_core::{FrontAddr, GroupId};
use nodemgr_store::{MapFilter, Store};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{ControlError, Result};
use crate::types::{ControlConfig, GenerateGroupRequest};

/// Trait for front communication.
///
/// This trait abstracts the front API, allowing for mock implementations in
/// tests. Every failure is reported as `ControlError::RemoteCallFailed`.
#[async_trait]
pub trait FrontClient: Send + Sync {
    /// Ask a front to generate a new group.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the front rejects it.
    async fn generate_group(&self, front: &FrontAddr, request: &GenerateGroupRequest)
        -> Result<()>;

    /// Ask a front to start an existing group.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the front rejects it.
    async fn start_group(&self, front: &FrontAddr, group_id: GroupId) -> Result<()>;

    /// List the group ids a front currently serves.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_groups(&self, front: &FrontAddr) -> Result<Vec<GroupId>>;

    /// Latest block number of a group as seen by a front.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn block_number(&self, front: &FrontAddr, group_id: GroupId) -> Result<u64>;

    /// Total transaction count and block number of a group.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn transaction_total(
        &self,
        front: &FrontAddr,
        group_id: GroupId,
    ) -> Result<TransactionTotal>;
}

/// Response from the front's transaction-total endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTotal {
    /// Transactions on the chain so far.
    pub tx_sum: u64,
    /// Chain height the sum was taken at.
    pub block_number: u64,
}

/// Acknowledgement body returned by mutating front endpoints.
#[derive(Debug, Deserialize)]
struct FrontResponse {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Request body for starting a group.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartGroupBody {
    group_id: u32,
}

/// HTTP client for front agents.
#[derive(Debug, Clone)]
pub struct HttpFrontClient {
    client: reqwest::Client,
    base_path: String,
}

impl HttpFrontClient {
    /// Create a front client from the control configuration.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &ControlConfig) -> Result<Self> {
        Self::with_timeouts(
            config.front_base_path.clone(),
            config.front_timeout(),
            config.front_connect_timeout(),
        )
    }

    /// Create a front client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Internal` if the HTTP client cannot be built.
    pub fn with_timeouts(
        base_path: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ControlError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, base_path))
    }

    /// Create a front client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_path: impl Into<String>) -> Self {
        Self {
            client,
            base_path: base_path.into(),
        }
    }

    /// Path prefix of the front API.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn url(&self, front: &FrontAddr, path: &str) -> String {
        format!("{}/{}", front.base_url(&self.base_path), path.trim_start_matches('/'))
    }

    /// POST a body and check the `{code, message}` acknowledgement.
    async fn post_ack<B: Serialize + Sync>(
        &self,
        front: &FrontAddr,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url(front, path))
            .json(body)
            .send()
            .await
            .map_err(|e| remote(front, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(front = %front, path, status = %status, body = %text, "Front rejected request");
            return Err(remote(front, format!("front returned status {status}")));
        }

        let ack: FrontResponse = response
            .json()
            .await
            .map_err(|e| remote(front, format!("failed to parse response: {e}")))?;
        if ack.code != 0 {
            tracing::error!(front = %front, path, code = ack.code, message = %ack.message, "Front reported failure");
            return Err(remote(
                front,
                format!("front error {}: {}", ack.code, ack.message),
            ));
        }
        Ok(())
    }

    /// GET a JSON document.
    async fn get_json<T: DeserializeOwned>(&self, front: &FrontAddr, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(front, path))
            .send()
            .await
            .map_err(|e| remote(front, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote(front, format!("front returned status {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| remote(front, format!("failed to parse response: {e}")))
    }
}

/// Addresses of the fronts currently mapped to a group, in mapping order.
///
/// Mappings whose front row is gone are skipped.
pub(crate) fn mapped_fronts<S: Store + ?Sized>(
    store: &S,
    group_id: GroupId,
) -> Result<Vec<FrontAddr>> {
    let rows = store.list_maps(&MapFilter::by_group(group_id))?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match (row.front_host, row.front_port) {
            (Some(host), Some(port)) => Some(FrontAddr { host, port }),
            _ => None,
        })
        .collect())
}

fn remote(front: &FrontAddr, cause: String) -> ControlError {
    ControlError::RemoteCallFailed {
        front: front.clone(),
        cause,
    }
}

#[async_trait]
impl FrontClient for HttpFrontClient {
    async fn generate_group(
        &self,
        front: &FrontAddr,
        request: &GenerateGroupRequest,
    ) -> Result<()> {
        self.post_ack(front, "group/generate", request).await?;
        tracing::debug!(front = %front, group_id = request.generate_group_id, "Generated group on front");
        Ok(())
    }

    async fn start_group(&self, front: &FrontAddr, group_id: GroupId) -> Result<()> {
        let body = StartGroupBody {
            group_id: group_id.get(),
        };
        self.post_ack(front, "group/start", &body).await?;
        tracing::debug!(front = %front, group_id = %group_id, "Started group on front");
        Ok(())
    }

    async fn list_groups(&self, front: &FrontAddr) -> Result<Vec<GroupId>> {
        let raw: Vec<u32> = self.get_json(front, "group/list").await?;

        let mut groups = Vec::with_capacity(raw.len());
        for id in raw {
            match GroupId::new(id) {
                Ok(group_id) => groups.push(group_id),
                Err(_) => tracing::warn!(front = %front, id, "Front reported an invalid group id"),
            }
        }
        Ok(groups)
    }

    async fn block_number(&self, front: &FrontAddr, group_id: GroupId) -> Result<u64> {
        self.get_json(front, &format!("{group_id}/web3/blockNumber"))
            .await
    }

    async fn transaction_total(
        &self,
        front: &FrontAddr,
        group_id: GroupId,
    ) -> Result<TransactionTotal> {
        self.get_json(front, &format!("{group_id}/web3/transaction-total"))
            .await
    }
}

/// In-memory front fleet for tests.
///
/// Generating or starting a group on a mock front makes that front report
/// the group from `list_groups`. Fronts marked as failing reject every call.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockFrontClient {
    state: parking_lot::Mutex<MockFrontState>,
}

#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
struct MockFrontState {
    groups: std::collections::HashMap<FrontAddr, Vec<GroupId>>,
    block_numbers: std::collections::HashMap<GroupId, u64>,
    tx_sums: std::collections::HashMap<GroupId, u64>,
    failing: std::collections::HashSet<FrontAddr>,
    generate_calls: usize,
    start_calls: usize,
    list_calls: usize,
    total_calls: usize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockFrontClient {
    /// Create a mock with no fronts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the groups a front reports.
    pub fn set_groups(&self, front: &FrontAddr, groups: &[GroupId]) {
        self.state.lock().groups.insert(front.clone(), groups.to_vec());
    }

    /// Set the chain height reported for a group.
    pub fn set_block_number(&self, group_id: GroupId, block_number: u64) {
        self.state.lock().block_numbers.insert(group_id, block_number);
    }

    /// Set the transaction total reported for a group.
    pub fn set_tx_sum(&self, group_id: GroupId, tx_sum: u64) {
        self.state.lock().tx_sums.insert(group_id, tx_sum);
    }

    /// Make every call to a front fail.
    pub fn fail_front(&self, front: &FrontAddr) {
        self.state.lock().failing.insert(front.clone());
    }

    /// Make a failing front answer again.
    pub fn recover_front(&self, front: &FrontAddr) {
        self.state.lock().failing.remove(front);
    }

    /// Number of generate calls received.
    #[must_use]
    pub fn generate_calls(&self) -> usize {
        self.state.lock().generate_calls
    }

    /// Number of start calls received.
    #[must_use]
    pub fn start_calls(&self) -> usize {
        self.state.lock().start_calls
    }

    /// Number of list calls received.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// Number of transaction-total calls received.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state.lock().total_calls
    }

    fn check(state: &MockFrontState, front: &FrontAddr) -> Result<()> {
        if state.failing.contains(front) {
            return Err(remote(front, "request timed out".to_string()));
        }
        Ok(())
    }

    fn serve(state: &mut MockFrontState, front: &FrontAddr, group_id: GroupId) {
        let groups = state.groups.entry(front.clone()).or_default();
        if !groups.contains(&group_id) {
            groups.push(group_id);
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl FrontClient for MockFrontClient {
    async fn generate_group(
        &self,
        front: &FrontAddr,
        request: &GenerateGroupRequest,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.generate_calls += 1;
        Self::check(&state, front)?;
        let group_id = GroupId::new(request.generate_group_id)
            .map_err(|e| remote(front, e.to_string()))?;
        Self::serve(&mut state, front, group_id);
        Ok(())
    }

    async fn start_group(&self, front: &FrontAddr, group_id: GroupId) -> Result<()> {
        let mut state = self.state.lock();
        state.start_calls += 1;
        Self::check(&state, front)?;
        Self::serve(&mut state, front, group_id);
        Ok(())
    }

    async fn list_groups(&self, front: &FrontAddr) -> Result<Vec<GroupId>> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        Self::check(&state, front)?;
        Ok(state.groups.get(front).cloned().unwrap_or_default())
    }

    async fn block_number(&self, front: &FrontAddr, group_id: GroupId) -> Result<u64> {
        let state = self.state.lock();
        Self::check(&state, front)?;
        Ok(state.block_numbers.get(&group_id).copied().unwrap_or(0))
    }

    async fn transaction_total(
        &self,
        front: &FrontAddr,
        group_id: GroupId,
    ) -> Result<TransactionTotal> {
        let mut state = self.state.lock();
        state.total_calls += 1;
        Self::check(&state, front)?;
        Ok(TransactionTotal {
            tx_sum: state.tx_sums.get(&group_id).copied().unwrap_or(0),
            block_number: state.block_numbers.get(&group_id).copied().unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn front_of(server: &MockServer) -> FrontAddr {
        let addr = server.address();
        FrontAddr::new(addr.ip().to_string(), addr.port()).unwrap()
    }

    fn client() -> HttpFrontClient {
        HttpFrontClient::with_timeouts(
            "WeBASE-Front",
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    fn gid(n: u32) -> GroupId {
        GroupId::new(n).unwrap()
    }

    #[tokio::test]
    async fn generate_posts_wire_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/WeBASE-Front/group/generate"))
            .and(body_json(json!({
                "generateGroupId": 7,
                "timestamp": 1_700_000_000_000_u64,
                "nodeList": ["ab12"],
                "description": null
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerateGroupRequest::new(gid(7), 1_700_000_000_000, vec!["ab12".into()]);
        client()
            .generate_group(&front_of(&server), &request)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_zero_code_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/WeBASE-Front/group/start"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 201_101, "message": "group already running"})),
            )
            .mount(&server)
            .await;

        let result = client().start_group(&front_of(&server), gid(3)).await;
        match result {
            Err(ControlError::RemoteCallFailed { cause, .. }) => {
                assert!(cause.contains("group already running"));
            }
            other => panic!("expected RemoteCallFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/WeBASE-Front/group/start"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client().start_group(&front_of(&server), gid(3)).await;
        assert!(matches!(result, Err(ControlError::RemoteCallFailed { .. })));
    }

    #[tokio::test]
    async fn timeout_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/WeBASE-Front/group/start"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 0}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let result = client().start_group(&front_of(&server), gid(3)).await;
        assert!(matches!(result, Err(ControlError::RemoteCallFailed { .. })));
    }

    #[tokio::test]
    async fn list_groups_skips_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/WeBASE-Front/group/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 0, 2])))
            .mount(&server)
            .await;

        let groups = client().list_groups(&front_of(&server)).await.unwrap();
        assert_eq!(groups, vec![gid(1), gid(2)]);
    }

    #[tokio::test]
    async fn reads_chain_counters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/WeBASE-Front/7/web3/blockNumber"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(100)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/WeBASE-Front/7/web3/transaction-total"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"txSum": 80, "blockNumber": 100})),
            )
            .mount(&server)
            .await;

        let front = front_of(&server);
        assert_eq!(client().block_number(&front, gid(7)).await.unwrap(), 100);
        assert_eq!(
            client().transaction_total(&front, gid(7)).await.unwrap(),
            TransactionTotal {
                tx_sum: 80,
                block_number: 100
            }
        );
    }

    #[tokio::test]
    async fn mock_front_tracks_served_groups() {
        let mock = MockFrontClient::new();
        let front = FrontAddr::new("10.0.0.1", 8081).unwrap();

        mock.start_group(&front, gid(4)).await.unwrap();
        mock.start_group(&front, gid(4)).await.unwrap();
        assert_eq!(mock.list_groups(&front).await.unwrap(), vec![gid(4)]);
        assert_eq!(mock.start_calls(), 2);

        mock.fail_front(&front);
        assert!(mock.list_groups(&front).await.is_err());
        mock.recover_front(&front);
        assert!(mock.list_groups(&front).await.is_ok());
    }
}
