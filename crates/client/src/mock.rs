//! In-memory wire client.
//!
//! Records every insert it receives (statement bodies plus per-table row
//! counts) and fails on demand, so shard and dispatcher behavior can be
//! exercised without a server. The dialer hands out one shared client per
//! address, letting tests inspect how rows spread across replicas.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{Client, ClientError, ClientOptions, Dialer, Query};

#[derive(Debug, Default)]
struct MockState {
    rows: HashMap<String, usize>,
    bodies: Vec<String>,
    script: VecDeque<ClientError>,
    fail_always: Option<ClientError>,
    closed: bool,
}

/// A [`Client`] that stores inserts in memory.
#[derive(Debug, Default)]
pub struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error returned by the next `execute` call. Queued errors
    /// are consumed in order before any `fail_always` error applies.
    pub fn fail_next(&self, error: ClientError) {
        self.state.lock().script.push_back(error);
    }

    /// Makes every subsequent `execute` call fail with `error`.
    pub fn fail_always(&self, error: ClientError) {
        self.state.lock().fail_always = Some(error);
    }

    /// Lets `execute` succeed again after [`MockClient::fail_always`].
    pub fn recover(&self) {
        self.state.lock().fail_always = None;
    }

    /// Rows inserted into `table` so far.
    pub fn rows(&self, table: &str) -> usize {
        self.state.lock().rows.get(table).copied().unwrap_or(0)
    }

    /// Rows inserted across all tables.
    pub fn total_rows(&self) -> usize {
        self.state.lock().rows.values().sum()
    }

    /// Statement bodies of every successful insert, in arrival order.
    pub fn bodies(&self) -> Vec<String> {
        self.state.lock().bodies.clone()
    }

    /// Successful inserts so far.
    pub fn inserts(&self) -> usize {
        self.state.lock().bodies.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Table name out of an `INSERT INTO <table> (...) VALUES` statement head.
fn table_of(body: &str) -> String {
    body.split_whitespace().nth(2).unwrap_or("").to_owned()
}

#[async_trait]
impl Client for MockClient {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        query: Query<'_>,
    ) -> Result<(), ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Canceled);
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(ClientError::Closed);
        }
        if let Some(error) = state.script.pop_front() {
            return Err(error);
        }
        if let Some(error) = &state.fail_always {
            return Err(error.clone());
        }

        *state.rows.entry(table_of(&query.body)).or_default() += query.input.rows();
        state.bodies.push(query.body);
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.state.lock().closed = true;
        Ok(())
    }
}

/// A [`Dialer`] that shares one [`MockClient`] per address.
#[derive(Default)]
pub struct MockDialer {
    clients: Mutex<HashMap<String, Arc<MockClient>>>,
    fail: Mutex<Option<ClientError>>,
}

impl MockDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The client served for `address`, created on first use. Tests call
    /// this both to script failures up front and to inspect results.
    pub fn client(&self, address: &str) -> Arc<MockClient> {
        Arc::clone(
            self.clients
                .lock()
                .entry(address.to_owned())
                .or_insert_with(|| Arc::new(MockClient::new())),
        )
    }

    /// Makes every subsequent dial fail with `error`.
    pub fn fail_dial(&self, error: ClientError) {
        *self.fail.lock() = Some(error);
    }

    /// Rows inserted across every dialed client and table.
    pub fn total_rows(&self) -> usize {
        self.clients
            .lock()
            .values()
            .map(|client| client.total_rows())
            .sum()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, options: ClientOptions) -> Result<Arc<dyn Client>, ClientError> {
        if let Some(error) = self.fail.lock().clone() {
            return Err(error);
        }
        Ok(self.client(&options.address))
    }
}

#[cfg(test)]
#[path = "mock_test.rs"]
mod mock_test;
