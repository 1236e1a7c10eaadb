//! Mock implementations for testing
//!
//! Recording mocks for the data service, device channel, navigator, and
//! prompter. Each records every call so tests can assert on the exact
//! sequence of side effects; failures and responses are scripted per call.

mod channel;
mod navigator;
mod prompter;
mod service;

pub use channel::MockDeviceChannel;
pub use navigator::MockNavigator;
pub use prompter::MockPrompter;
pub use service::MockDataService;
