use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::components::{Component, PromptContext, StageContext};
use crate::error::{Result, SetupError};
use crate::prompts::{Prompter, Question};
use crate::remote::{ApiConnector, ApiResponse, MonitoringApi};
use crate::stages::Stage;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A request received by [`MockApi`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// `GET`, `POST` or `PUT`
    pub method: String,
    /// Path including the query string
    pub path: String,
    /// Request body, `Null` for GET
    pub body: Value,
}

type Scripted = std::result::Result<Value, (u16, String)>;

/// In-memory monitoring API with scripted responses
///
/// Responses are keyed by method and exact path; anything unscripted fails
/// with a 404 `SetupError::Api`.
#[derive(Debug, Default)]
pub struct MockApi {
    responses: HashMap<(String, String), Scripted>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockApi {
    /// Creates a mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    fn script(mut self, method: &str, path: &str, response: Scripted) -> Self {
        self.responses
            .insert((method.to_string(), path.to_string()), response);
        self
    }

    /// Answers `GET path` with `body`
    pub fn on_get(self, path: &str, body: Value) -> Self {
        self.script("GET", path, Ok(body))
    }

    /// Answers `POST path` with `body`
    pub fn on_post(self, path: &str, body: Value) -> Self {
        self.script("POST", path, Ok(body))
    }

    /// Answers `PUT path` with `body`
    pub fn on_put(self, path: &str, body: Value) -> Self {
        self.script("PUT", path, Ok(body))
    }

    /// Fails `method path` with an API error
    pub fn fail(self, method: &str, path: &str, status: u16, message: &str) -> Self {
        self.script(method, path, Err((status, message.to_string())))
    }

    /// Every request received, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Requests received with the given method, in order
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn respond(&self, method: &str, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        lock(&self.calls).push(RecordedCall {
            method: method.to_string(),
            path: path.to_string(),
            body: body.cloned().unwrap_or(Value::Null),
        });

        match self.responses.get(&(method.to_string(), path.to_string())) {
            Some(Ok(body)) => Ok(ApiResponse {
                status: 200,
                body: body.clone(),
            }),
            Some(Err((status, message))) => Err(SetupError::Api {
                status: *status,
                message: message.clone(),
            }),
            None => Err(SetupError::Api {
                status: 404,
                message: format!("no mock for {} {}", method, path),
            }),
        }
    }
}

#[async_trait]
impl MonitoringApi for MockApi {
    async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.respond("GET", path, None)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.respond("POST", path, Some(body))
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.respond("PUT", path, Some(body))
    }
}

/// Hands out a shared [`MockApi`] and remembers the tokens it was given
#[derive(Debug, Clone)]
pub struct MockConnector {
    api: Arc<MockApi>,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    /// Creates a connector that always returns `api`
    pub fn new(api: Arc<MockApi>) -> Self {
        Self {
            api,
            tokens: Arc::default(),
        }
    }

    /// Tokens passed to `connect`, in order
    pub fn tokens(&self) -> Vec<String> {
        lock(&self.tokens).clone()
    }
}

impl ApiConnector for MockConnector {
    fn connect(&self, authtoken: &str) -> Result<Arc<dyn MonitoringApi>> {
        if authtoken.trim().is_empty() {
            return Err(SetupError::Validation("authtoken is required to call the API".into()));
        }
        lock(&self.tokens).push(authtoken.to_string());
        Ok(self.api.clone())
    }
}

/// A scripted operator answer
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Typed text; empty means "accept the default"
    Text(String),
    /// Index picked from a single-select list
    Choice(usize),
    /// Flags for a multi-select list
    Choices(Vec<bool>),
    /// Yes/no
    Confirm(bool),
}

/// Prompter that replays queued answers
///
/// When the queue runs dry every question takes its default, like an
/// operator pressing enter. Answers failing validation, and empty answers
/// to questions that need a value, are recorded and the question is asked
/// again with the next answer.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
    rejected: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Creates a prompter with no queued answers
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, answer: Answer) -> Self {
        lock(&self.answers).push_back(answer);
        self
    }

    /// Queues a typed answer
    pub fn answer(self, text: &str) -> Self {
        self.push(Answer::Text(text.to_string()))
    }

    /// Queues a single-select pick
    pub fn choose(self, index: usize) -> Self {
        self.push(Answer::Choice(index))
    }

    /// Queues a multi-select result
    pub fn pick(self, flags: &[bool]) -> Self {
        self.push(Answer::Choices(flags.to_vec()))
    }

    /// Queues a yes/no answer
    pub fn confirm_with(self, yes: bool) -> Self {
        self.push(Answer::Confirm(yes))
    }

    /// Messages of every question asked, in order
    pub fn asked(&self) -> Vec<String> {
        lock(&self.asked).clone()
    }

    /// Validation messages for rejected answers
    pub fn rejected(&self) -> Vec<String> {
        lock(&self.rejected).clone()
    }

    /// Answers still queued
    pub fn remaining(&self) -> usize {
        lock(&self.answers).len()
    }

    fn next(&self, message: &str) -> Option<Answer> {
        lock(&self.asked).push(message.to_string());
        lock(&self.answers).pop_front()
    }

    fn unexpected(message: &str, answer: &Answer) -> SetupError {
        SetupError::Prompt(format!("scripted answer {:?} does not fit question '{}'", answer, message))
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn input(&self, question: Question) -> Result<String> {
        loop {
            let answer = match self.next(&question.message) {
                Some(Answer::Text(text)) => match (&question.default, text.is_empty()) {
                    (Some(default), true) => default.clone(),
                    (None, true) if !question.allow_empty => {
                        lock(&self.rejected).push("a value is required".to_string());
                        continue;
                    }
                    _ => text,
                },
                Some(other) => return Err(Self::unexpected(&question.message, &other)),
                None => match &question.default {
                    Some(default) => default.clone(),
                    None if question.allow_empty => String::new(),
                    None => {
                        return Err(SetupError::Prompt(format!(
                            "no scripted answer for '{}'",
                            question.message
                        )))
                    }
                },
            };
            match question.check(&answer) {
                Ok(()) => return Ok(answer),
                Err(message) => lock(&self.rejected).push(message),
            }
        }
    }

    async fn select(&self, message: &str, items: &[String], default: usize) -> Result<usize> {
        match self.next(message) {
            Some(Answer::Choice(index)) if index < items.len() => Ok(index),
            Some(other) => Err(Self::unexpected(message, &other)),
            None => Ok(default),
        }
    }

    async fn multi_select(&self, message: &str, items: &[String], defaults: &[bool]) -> Result<Vec<bool>> {
        match self.next(message) {
            Some(Answer::Choices(flags)) if flags.len() == items.len() => Ok(flags),
            Some(other) => Err(Self::unexpected(message, &other)),
            None => Ok(defaults.to_vec()),
        }
    }

    async fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        match self.next(message) {
            Some(Answer::Confirm(yes)) => Ok(yes),
            Some(other) => Err(Self::unexpected(message, &other)),
            None => Ok(default),
        }
    }
}

/// Shared, ordered record of lifecycle calls
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Configurable in-code component
///
/// Records `"<stage>:<name>"` for every operation it runs; the prompt
/// stage records a start and an end event with a pause in between.
#[derive(Debug, Clone)]
pub struct FakeComponent {
    name: String,
    description: Option<String>,
    default: bool,
    stages: HashSet<Stage>,
    defaults: Map<String, Value>,
    graph_ids: Vec<String>,
    fail_at: Option<Stage>,
    delay: Duration,
    events: EventLog,
}

impl FakeComponent {
    /// Creates a component supporting every stage and producing no graphs
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            default: false,
            stages: Stage::ALL.iter().copied().collect(),
            defaults: Map::new(),
            graph_ids: Vec::new(),
            fail_at: None,
            delay: Duration::from_millis(5),
            events: EventLog::default(),
        }
    }

    /// Sets the default-enabled flag
    pub fn default_on(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    /// Sets the description
    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Restricts the supported stages
    pub fn only(mut self, stages: &[Stage]) -> Self {
        self.stages = stages.iter().copied().collect();
        self
    }

    /// Settings returned by `initialize`
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults.as_object().cloned().unwrap_or_default();
        self
    }

    /// Graph ids returned by `api_calls`
    pub fn with_graphs(mut self, graph_ids: &[&str]) -> Self {
        self.graph_ids = graph_ids.iter().map(|g| g.to_string()).collect();
        self
    }

    /// Makes the given stage fail
    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Sets the pause taken inside each operation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Records events into `events`
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    fn record(&self, event: String) {
        lock(&self.events).push(event);
    }

    async fn step(&self, stage: Stage) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.record(format!("{}:{}", stage, self.name));
        if self.fail_at == Some(stage) {
            return Err(SetupError::new(&format!("{} failed on purpose", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl Component for FakeComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn is_default(&self) -> bool {
        self.default
    }

    fn supports(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    async fn initialize(&self, _ctx: &StageContext<'_>) -> Result<Map<String, Value>> {
        self.step(Stage::Initialize).await?;
        Ok(self.defaults.clone())
    }

    async fn prompts(&self, ctx: &mut PromptContext<'_>) -> Result<()> {
        self.record(format!("prompts-start:{}", self.name));
        self.step(Stage::Prompts).await?;
        ctx.settings().set("prompted", Value::Bool(true));
        self.record(format!("prompts-end:{}", self.name));
        Ok(())
    }

    async fn api_calls(&self, _ctx: &StageContext<'_>) -> Result<Vec<String>> {
        self.step(Stage::ApiCalls).await?;
        Ok(self.graph_ids.clone())
    }

    async fn cleanup(&self, _ctx: &StageContext<'_>) -> Result<()> {
        self.step(Stage::Cleanup).await
    }
}
