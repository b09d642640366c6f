use crate::agent::CompletionApi;
use crate::types::{AssistantMessage, ChatCompletion, ChatRequest, Choice, FunctionCall, Message, ToolCall};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// What the mock saw for one completion request.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub tool_choice: String,
}

enum MockResponse {
    Completion(ChatCompletion),
    Failure(String),
}

#[derive(Clone)]
pub struct MockLlmClient {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    call_history: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_text_response(&self, content: &str) {
        self.push(MockResponse::Completion(completion(AssistantMessage {
            content: Some(content.to_string()),
            tool_calls: None,
        })));
    }

    pub fn add_tool_call_response(&self, tool_name: &str, args: &str) {
        self.add_tool_calls_response(&[(tool_name, args)]);
    }

    pub fn add_tool_calls_response(&self, calls: &[(&str, &str)]) {
        let tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("test-call-{}", i),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: args.to_string(),
                },
            })
            .collect();

        self.push(MockResponse::Completion(completion(AssistantMessage {
            content: Some(String::new()),
            tool_calls: Some(tool_calls),
        })));
    }

    pub fn add_raw_response(&self, completion: ChatCompletion) {
        self.push(MockResponse::Completion(completion));
    }

    pub fn add_error_response(&self, error_msg: &str) {
        self.push(MockResponse::Failure(error_msg.to_string()));
    }

    pub fn get_call_history(&self) -> Vec<RecordedCall> {
        self.call_history.lock().unwrap().clone()
    }

    fn push(&self, response: MockResponse) {
        self.responses.lock().unwrap().push(response);
    }

    fn pop_response(&self) -> Option<MockResponse> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            None
        } else {
            Some(responses.remove(0))
        }
    }
}

fn completion(message: AssistantMessage) -> ChatCompletion {
    ChatCompletion {
        id: Some("mock-completion".to_string()),
        model: None,
        choices: vec![Choice {
            message,
            finish_reason: None,
        }],
    }
}

#[async_trait]
impl CompletionApi for MockLlmClient {
    async fn complete<'a>(&self, api_key: &str, request: &ChatRequest<'a>) -> Result<ChatCompletion> {
        // Store the call for verification
        self.call_history.lock().unwrap().push(RecordedCall {
            api_key: api_key.to_string(),
            model: request.model.to_string(),
            temperature: request.temperature,
            messages: request.messages.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            tool_choice: request.tool_choice.to_string(),
        });

        match self.pop_response() {
            Some(MockResponse::Completion(c)) => Ok(c),
            Some(MockResponse::Failure(msg)) => Err(anyhow::anyhow!("{}", msg)),
            None => Err(anyhow::anyhow!("No mock response available")),
        }
    }
}
