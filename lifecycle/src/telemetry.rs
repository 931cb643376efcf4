use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Milestones timed from the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingStep {
    ReceivedAccessToken,
    ReceivedSelfUser,
    ValidatedClient,
    InitializedCryptography,
    ReceivedUserData,
    UpdatedFromNotifications,
    AppPreLoaded,
    AppLoaded,
    UpdatedConversations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStatistic {
    ClientType,
    Conversations,
    Connections,
    Notifications,
    Clients,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatisticValue {
    Count(usize),
    Label(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySummary {
    pub timings_ms: BTreeMap<TimingStep, u128>,
    pub statistics: BTreeMap<InitStatistic, StatisticValue>,
}

/// Rounds `value` up to the next multiple of `bucket_size`.
pub fn bucket(value: usize, bucket_size: usize) -> usize {
    if bucket_size == 0 {
        return value;
    }
    value.div_ceil(bucket_size) * bucket_size
}

/// Timings and coarse statistics of one startup run.
pub struct InitTelemetry {
    started_at: Instant,
    timings_ms: BTreeMap<TimingStep, u128>,
    statistics: BTreeMap<InitStatistic, StatisticValue>,
}

impl InitTelemetry {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            timings_ms: BTreeMap::new(),
            statistics: BTreeMap::new(),
        }
    }

    pub fn time_step(&mut self, step: TimingStep) {
        // First occurrence wins
        self.timings_ms
            .entry(step)
            .or_insert_with(|| self.started_at.elapsed().as_millis());
    }

    pub fn add_count(&mut self, statistic: InitStatistic, value: usize, bucket_size: usize) {
        self.statistics
            .insert(statistic, StatisticValue::Count(bucket(value, bucket_size)));
    }

    pub fn add_label(&mut self, statistic: InitStatistic, value: impl Into<String>) {
        self.statistics
            .insert(statistic, StatisticValue::Label(value.into()));
    }

    pub fn summary(&self) -> TelemetrySummary {
        TelemetrySummary {
            timings_ms: self.timings_ms.clone(),
            statistics: self.statistics.clone(),
        }
    }

    pub fn report(&self) {
        match serde_json::to_string(&self.summary()) {
            Ok(json) => log::info!("App init telemetry: {json}"),
            Err(e) => log::warn!("Failed to serialize app init telemetry: {e}"),
        }
    }
}

impl Default for InitTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
