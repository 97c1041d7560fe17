//! Test doubles for the prompt, API and component seams

mod mocks;

pub use mocks::{
    Answer, EventLog, FakeComponent, MockApi, MockConnector, RecordedCall, ScriptedPrompter,
};
