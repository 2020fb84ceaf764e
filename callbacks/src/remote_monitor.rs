//! Publishes epoch summaries to a monitoring server over HTTP.
use crate::accumulator::EpochAccumulator;
use crate::callback::Callback;
use crate::error::Result;
use crate::logs::{Logs, Params, keys};
use reqwest::blocking::Client;

/// Server used when no root is given.
pub const DEFAULT_ROOT: &str = "http://localhost:9000";

const EPOCH_END_PATH: &str = "/publish/epoch/end/";

/// Posts the epoch logs, with the epoch index and the epoch's mean training
/// loss filled in, to `{root}/publish/epoch/end/` as the form field `data`.
///
/// Requests are synchronous and never retried: a transport failure or an
/// error status stops training.
#[derive(Debug)]
pub struct RemoteMonitor {
    root: String,
    client: Client,
    params: Params,
    totals: EpochAccumulator,
}

impl RemoteMonitor {
    pub fn new(root: impl Into<String>) -> Self {
        Self::with_client(root, Client::new())
    }

    pub fn with_client(root: impl Into<String>, client: Client) -> Self {
        Self {
            root: root.into(),
            client,
            params: Params::default(),
            totals: EpochAccumulator::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.root.trim_end_matches('/'), EPOCH_END_PATH)
    }

    /// The JSON document sent for an epoch.
    fn payload(&self, epoch: usize, logs: &Logs) -> Result<String> {
        let mut fields = serde_json::Map::new();
        for (key, value) in logs.iter() {
            fields.insert(key.to_string(), value.into());
        }
        fields.insert(keys::EPOCH.to_string(), epoch.into());
        fields.insert(keys::LOSS.to_string(), self.totals.loss().into());
        Ok(serde_json::to_string(&fields)?)
    }
}

impl Default for RemoteMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl Callback for RemoteMonitor {
    fn set_params(&mut self, params: &Params) {
        self.params = params.clone();
    }

    fn on_epoch_begin(&mut self, _epoch: usize, _logs: &Logs) -> Result<()> {
        self.totals.reset();
        Ok(())
    }

    fn on_batch_end(&mut self, _batch: usize, logs: &Logs) -> Result<()> {
        self.totals.record_logs(logs, self.params.show_accuracy);
        Ok(())
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        let data = self.payload(epoch, logs)?;
        let endpoint = self.endpoint();

        self.client
            .post(&endpoint)
            .form(&[("data", data)])
            .send()?
            .error_for_status()?;
        tracing::debug!(epoch, %endpoint, "Published epoch summary");
        Ok(())
    }
}
