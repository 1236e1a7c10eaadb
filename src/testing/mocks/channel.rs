//! Mock device channel

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::watch::{ConnectionState, DeviceChannel, WatchCommand, WatchError, WatchTelemetry};

/// Scriptable device channel recording every outbound command
pub struct MockDeviceChannel {
    start_results: Mutex<VecDeque<Result<(), WatchError>>>,
    sent: Mutex<Vec<WatchCommand>>,
    state: Mutex<ConnectionState>,
    telemetry_tx: broadcast::Sender<WatchTelemetry>,
}

impl Default for MockDeviceChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeviceChannel {
    pub fn new() -> Self {
        let (telemetry_tx, _) = broadcast::channel(16);
        Self {
            start_results: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            state: Mutex::new(ConnectionState::Connected),
            telemetry_tx,
        }
    }

    /// Script the acknowledgement result for upcoming start requests; once
    /// the script runs out, requests acknowledge successfully.
    pub fn script_start_results(&self, results: Vec<Result<(), WatchError>>) {
        self.start_results.lock().unwrap().extend(results);
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn sent_commands(&self) -> Vec<WatchCommand> {
        self.sent.lock().unwrap().clone()
    }

    /// Deliver telemetry to every subscriber
    pub fn emit_telemetry(&self, telemetry: WatchTelemetry) {
        // Send fails only when nobody subscribes, which is fine for tests
        let _ = self.telemetry_tx.send(telemetry);
    }
}

#[async_trait]
impl DeviceChannel for MockDeviceChannel {
    async fn request(&self, command: WatchCommand) -> Result<(), WatchError> {
        let result = match &command {
            WatchCommand::SessionStart(_) => self
                .start_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(())),
            WatchCommand::SessionEnd(_) => Ok(()),
        };
        self.sent.lock().unwrap().push(command);
        result
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    fn telemetry(&self) -> broadcast::Receiver<WatchTelemetry> {
        self.telemetry_tx.subscribe()
    }
}
