//! Session layer: owns the current conversation and turns user input into
//! chat turns or conversation-management commands.

use crate::agent::{Agent, TurnContext};
use crate::config::{ModelChoice, validate_temperature};
use crate::session::{Conversation, ConversationStore, DEFAULT_TOPIC};
use crate::types::Message;

pub const NO_API_KEY: &str = "No API key configured. Set MISTRAL_API_KEY or pass --api-key.";

pub const HELP_TEXT: &str = "\
Type a message to chat, e.g. \"What are the top 5 GOOGL stock options calls?\"
Commands:
  /save [topic]    save the conversation (under the current topic by default)
  /new             start a new conversation
  /load <topic>    load a saved conversation
  /delete <topic>  delete a saved conversation
  /list            list saved conversations
  /model <name>    switch model (mistral-small-latest, mistral-medium-latest, mistral-large-latest)
  /temp <value>    set temperature between 0.0 and 1.0
  /help            show this help
  /quit            exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chat(String),
    Save(Option<String>),
    New,
    Load(String),
    Delete(String),
    List,
    Model(String),
    Temperature(String),
    Help,
    Quit,
}

impl Command {
    /// `Ok(None)` for blank input.
    pub fn parse(input: &str) -> Result<Option<Command>, String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }
        let Some(rest) = input.strip_prefix('/') else {
            return Ok(Some(Command::Chat(input.to_string())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let required = |what: &str| -> Result<String, String> {
            if arg.is_empty() {
                Err(format!("Usage: /{} <{}>", name, what))
            } else {
                Ok(arg.to_string())
            }
        };

        let cmd = match name {
            "save" => Command::Save((!arg.is_empty()).then(|| arg.to_string())),
            "new" => Command::New,
            "load" => Command::Load(required("topic")?),
            "delete" => Command::Delete(required("topic")?),
            "list" => Command::List,
            "model" => Command::Model(required("model")?),
            "temp" | "temperature" => Command::Temperature(required("value")?),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("Unknown command '/{}'. Type /help for commands.", other)),
        };
        Ok(Some(cmd))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Assistant reply appended to the conversation.
    Reply(Message),
    Notice(String),
    Failure(String),
    /// The current conversation was replaced wholesale.
    Reset {
        topic: String,
        messages: Vec<Message>,
    },
    Topics(Vec<String>),
    ModelChanged(ModelChoice),
    Quit,
}

pub struct ChatApp {
    agent: Agent,
    store: ConversationStore,
    conversation: Conversation,
    api_key: Option<String>,
    model: ModelChoice,
    temperature: f32,
}

impl ChatApp {
    pub fn new(
        agent: Agent,
        store: ConversationStore,
        api_key: Option<String>,
        model: ModelChoice,
        temperature: f32,
    ) -> Self {
        Self {
            agent,
            store,
            conversation: Conversation::new(DEFAULT_TOPIC),
            api_key,
            model,
            temperature,
        }
    }

    #[cfg(test)]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn topic(&self) -> &str {
        &self.conversation.topic
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> ModelChoice {
        self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn saved_topics(&self) -> Vec<String> {
        self.store.list().unwrap_or_else(|e| {
            tracing::warn!("listing conversations failed: {:#}", e);
            Vec::new()
        })
    }

    pub async fn handle_input(&mut self, input: &str) -> Vec<AppEvent> {
        match Command::parse(input) {
            Ok(Some(cmd)) => self.handle(cmd).await,
            Ok(None) => Vec::new(),
            Err(msg) => vec![AppEvent::Failure(msg)],
        }
    }

    pub async fn handle(&mut self, cmd: Command) -> Vec<AppEvent> {
        match cmd {
            Command::Chat(text) => self.chat(text).await,
            Command::Save(topic) => self.save(topic),
            Command::New => {
                self.reset(Conversation::new(DEFAULT_TOPIC));
                vec![self.reset_event(), AppEvent::Notice("Started a new conversation".into())]
            }
            Command::Load(topic) => match self.store.load(&topic) {
                Ok(conversation) => {
                    self.reset(conversation);
                    vec![self.reset_event(), AppEvent::Notice(format!("Loaded '{}'", topic))]
                }
                Err(e) => vec![AppEvent::Failure(format!("{:#}", e))],
            },
            Command::Delete(topic) => self.delete(topic),
            Command::List => {
                let topics = self.saved_topics();
                let notice = if topics.is_empty() {
                    "No saved conversations".to_string()
                } else {
                    format!("Saved conversations: {}", topics.join(", "))
                };
                vec![AppEvent::Topics(topics), AppEvent::Notice(notice)]
            }
            Command::Model(name) => match ModelChoice::from_name(&name) {
                Some(model) => {
                    self.model = model;
                    vec![
                        AppEvent::ModelChanged(model),
                        AppEvent::Notice(format!("Model set to {}", model)),
                    ]
                }
                None => vec![AppEvent::Failure(format!("Unknown model '{}'", name))],
            },
            Command::Temperature(raw) => {
                let parsed = raw
                    .parse::<f32>()
                    .map_err(|_| anyhow::anyhow!("Temperature must be a number, got '{}'", raw))
                    .and_then(|t| validate_temperature(t).map(|_| t));
                match parsed {
                    Ok(t) => {
                        self.temperature = t;
                        vec![AppEvent::Notice(format!("Temperature set to {:.1}", t))]
                    }
                    Err(e) => vec![AppEvent::Failure(e.to_string())],
                }
            }
            Command::Help => vec![AppEvent::Notice(HELP_TEXT.to_string())],
            Command::Quit => vec![AppEvent::Quit],
        }
    }

    async fn chat(&mut self, text: String) -> Vec<AppEvent> {
        let Some(api_key) = self.api_key.clone() else {
            return vec![AppEvent::Failure(NO_API_KEY.to_string())];
        };
        tracing::info!("User input: {}", text);
        self.conversation.add_message(Message::user(text));

        let ctx = TurnContext {
            model: self.model.as_str().to_string(),
            api_key,
            temperature: self.temperature,
        };
        let reply = self.agent.respond(&ctx, &self.conversation.messages).await;
        tracing::info!("Assistant response: {}", reply);

        // Error replies are kept in history like any other reply.
        let message = Message::assistant(reply);
        self.conversation.add_message(message.clone());
        vec![AppEvent::Reply(message)]
    }

    fn save(&mut self, topic: Option<String>) -> Vec<AppEvent> {
        let topic = topic.unwrap_or_else(|| self.conversation.topic.clone());
        match self.store.save(&topic, &self.conversation.messages) {
            Ok(_) => {
                self.conversation.set_topic(&topic);
                vec![
                    AppEvent::Topics(self.saved_topics()),
                    AppEvent::Notice(format!("Saved as '{}'", topic)),
                ]
            }
            Err(e) => vec![AppEvent::Failure(format!("{:#}", e))],
        }
    }

    fn delete(&mut self, topic: String) -> Vec<AppEvent> {
        match self.store.delete(&topic) {
            Ok(false) => vec![AppEvent::Failure(format!("No saved conversation named '{}'", topic))],
            Ok(true) => {
                let mut events = vec![
                    AppEvent::Topics(self.saved_topics()),
                    AppEvent::Notice(format!("Deleted '{}'", topic)),
                ];
                if topic == self.conversation.topic {
                    self.reset(Conversation::new(DEFAULT_TOPIC));
                    events.push(self.reset_event());
                }
                events
            }
            Err(e) => vec![AppEvent::Failure(format!("{:#}", e))],
        }
    }

    fn reset(&mut self, conversation: Conversation) {
        self.conversation = conversation;
    }

    fn reset_event(&self) -> AppEvent {
        AppEvent::Reset {
            topic: self.conversation.topic.clone(),
            messages: self.conversation.messages.clone(),
        }
    }
}
