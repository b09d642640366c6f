use crate::error::ChatError;
use crate::tools::stock_options::{self, StockOptionsArgs, StockOptionsTool};
use crate::types::ToolDeclaration;
use serde_json::Value;

/// The closed set of tools the model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolId {
    GetStockOptions,
}

impl ToolId {
    pub const ALL: [ToolId; 1] = [ToolId::GetStockOptions];

    pub fn name(&self) -> &'static str {
        match self {
            ToolId::GetStockOptions => stock_options::NAME,
        }
    }

    fn declaration(&self) -> ToolDeclaration {
        match self {
            ToolId::GetStockOptions => ToolDeclaration {
                name: stock_options::NAME.to_string(),
                description: stock_options::DESCRIPTION.to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "symbol": {
                            "type": "string",
                            "description": "The stock ticker symbol, like AAPL, GOOGL, or TSLA."
                        },
                        "topX": {
                            "type": "integer",
                            "description": "The number of top options to fetch. Default is 5.",
                            "default": stock_options::DEFAULT_TOP_X
                        }
                    },
                    "required": ["symbol"]
                }),
            },
        }
    }
}

/// A tool call after its arguments were decoded into the tool's own type.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    GetStockOptions(StockOptionsArgs),
}

impl ToolInvocation {
    pub fn id(&self) -> ToolId {
        match self {
            ToolInvocation::GetStockOptions(_) => ToolId::GetStockOptions,
        }
    }
}

#[derive(Clone)]
pub struct ToolRegistry {
    declarations: Vec<ToolDeclaration>,
    stock_options: StockOptionsTool,
}

impl ToolRegistry {
    pub fn new(stock_options: StockOptionsTool) -> Self {
        // Single source of truth for the "tools" schema the LLM sees
        let declarations = ToolId::ALL.iter().map(ToolId::declaration).collect();
        Self {
            declarations,
            stock_options,
        }
    }

    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    pub fn resolve(&self, name: &str) -> Result<ToolId, ChatError> {
        ToolId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == name)
            .ok_or_else(|| ChatError::ToolNotFound(name.to_string()))
    }

    /// Decode the raw `arguments` string of a tool call for `id`.
    pub fn decode(&self, id: ToolId, raw_arguments: &str) -> Result<ToolInvocation, ChatError> {
        let args: Value = serde_json::from_str(raw_arguments)
            .map_err(|e| ChatError::argument_decode(id.name(), format!("invalid JSON: {}", e)))?;
        match id {
            ToolId::GetStockOptions => {
                StockOptionsArgs::from_json(&args).map(ToolInvocation::GetStockOptions)
            }
        }
    }

    pub async fn execute(&self, invocation: &ToolInvocation) -> String {
        match invocation {
            ToolInvocation::GetStockOptions(args) => self.stock_options.call(args).await,
        }
    }
}
