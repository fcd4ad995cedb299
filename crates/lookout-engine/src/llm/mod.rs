//! The language-model boundary.
//!
//! The engine does not talk to any provider; it consumes two services
//! (schema-constrained invocation and free-form invocation) through the
//! [`LanguageModel`] trait, and emits one format: the §observation text
//! tree spliced into messages. Provider adapters (prompt templating,
//! JSON-schema enforcement, retries against a real API) live outside.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::actions::{ACTION_METHODS, Action};
use crate::config::EngineConfig;
use crate::encoded_id::EncodedId;
use crate::error::LlmError;
use crate::snapshot::Snapshot;

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One structured invocation's result: the raw text plus the parsed
/// value when the provider produced valid JSON for the schema.
#[derive(Debug, Clone)]
pub struct StructuredReply {
    /// Raw model output.
    pub raw: String,
    /// Schema-conforming parse, when one exists.
    pub parsed: Option<Value>,
}

/// The two services the engine consumes.
pub trait LanguageModel: Send + Sync {
    /// Single schema-constrained call.
    fn invoke_structured(
        &self,
        schema: &Value,
        messages: &[Message],
    ) -> impl Future<Output = Result<StructuredReply, LlmError>> + Send;

    /// Free-form call for extraction flows.
    fn invoke(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// The model's element choice.
#[derive(Debug, Clone, Deserialize)]
pub struct FoundElement {
    /// The chosen element.
    #[serde(rename = "elementId")]
    pub encoded_id: EncodedId,
    /// Why this element.
    pub description: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Method from the closed action set.
    pub method: String,
    /// Method arguments.
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// Outcome of an element-finding call.
#[derive(Debug, Clone)]
pub enum FindOutcome {
    /// The model committed to an element and method.
    Found(FoundElement),
    /// The model declared the instruction unsatisfiable on this page.
    NotFound { reason: String },
}

/// JSON schema for the element-finding reply.
pub fn element_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "found": {
                "type": "boolean",
                "description": "False when no element on the page satisfies the instruction"
            },
            "elementId": {
                "type": "string",
                "pattern": "^\\d+-\\d+$",
                "description": "The bracketed id of the chosen element"
            },
            "description": { "type": "string" },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "method": { "type": "string", "enum": ACTION_METHODS },
            "arguments": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["found", "description", "confidence"],
        "additionalProperties": false
    })
}

const FIND_SYSTEM_PROMPT: &str = "You are locating elements on a web page. \
The page is given as an indented accessibility tree; every line starts with \
the element's id in brackets. Choose the single element that best satisfies \
the instruction and the method to perform on it.";

/// Ask the model to locate an element for an instruction.
///
/// Retries structured parsing up to the configured attempt budget;
/// validation failures (unknown id, bad method) spend attempts too.
///
/// # Errors
///
/// [`LlmError::NoStructuredOutput`] after the budget is spent;
/// provider errors propagate immediately.
#[instrument(level = "debug", skip_all, fields(instruction = %instruction))]
pub async fn find_element<L: LanguageModel>(
    instruction: &str,
    snapshot: &Snapshot,
    llm: &L,
    config: &EngineConfig,
) -> Result<FindOutcome, LlmError> {
    let schema = element_schema();
    let messages = [
        Message::system(FIND_SYSTEM_PROMPT),
        Message::user(format!(
            "Instruction: {instruction}\n\nPage:\n{}",
            snapshot.dom_state
        )),
    ];

    for attempt in 1..=config.llm_attempts {
        let reply = llm.invoke_structured(&schema, &messages).await?;
        let Some(parsed) = reply.parsed else {
            warn!(attempt = attempt, "no structured output");
            continue;
        };
        match validate_reply(&parsed, snapshot) {
            Ok(outcome) => return Ok(outcome),
            Err(reason) => {
                warn!(attempt = attempt, reason = %reason, "structured reply failed validation");
            }
        }
    }
    Err(LlmError::NoStructuredOutput {
        attempts: config.llm_attempts,
    })
}

/// Validate a parsed reply against the snapshot and the action catalog.
fn validate_reply(parsed: &Value, snapshot: &Snapshot) -> Result<FindOutcome, String> {
    if parsed.get("found").and_then(Value::as_bool) == Some(false) {
        let reason = parsed
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no matching element")
            .to_string();
        return Ok(FindOutcome::NotFound { reason });
    }

    let found: FoundElement = serde_json::from_value(parsed.clone())
        .map_err(|e| format!("reply does not match schema: {e}"))?;

    if !(0.0..=1.0).contains(&found.confidence) {
        return Err(format!("confidence {} out of range", found.confidence));
    }
    if !snapshot.elements.contains_key(&found.encoded_id) {
        return Err(format!(
            "element {} is not in the snapshot",
            found.encoded_id
        ));
    }
    Action::parse(&found.method, &found.arguments)
        .map_err(|e| format!("invalid method: {e}"))?;

    debug!(encoded_id = %found.encoded_id, method = %found.method, "element found");
    Ok(FindOutcome::Found(found))
}

/// One step of a multi-step agent, as the envelope schema shapes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    /// Model reasoning carried across steps.
    pub thoughts: String,
    /// Persistent scratch memory.
    pub memory: String,
    /// The requested action.
    pub action: AgentActionRequest,
}

/// A tagged action request from the registered set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentActionRequest {
    /// Action tag.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Tag-specific parameters.
    #[serde(default)]
    pub params: Value,
}

/// Registry of actions an agent integration exposes to the model.
///
/// The engine's twelve element methods are pre-registered; integrators
/// may add custom actions (navigation, task completion) with their own
/// parameter schemas.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    schemas: std::collections::BTreeMap<String, Value>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        let mut schemas = std::collections::BTreeMap::new();
        for method in ACTION_METHODS {
            schemas.insert(
                method.to_string(),
                json!({
                    "type": "object",
                    "properties": {
                        "elementId": { "type": "string", "pattern": "^\\d+-\\d+$" },
                        "arguments": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["elementId"]
                }),
            );
        }
        Self { schemas }
    }
}

impl ActionRegistry {
    /// Register a custom action with its parameter schema.
    pub fn register(&mut self, action_type: impl Into<String>, params_schema: Value) {
        self.schemas.insert(action_type.into(), params_schema);
    }

    /// Whether an action tag is known.
    pub fn contains(&self, action_type: &str) -> bool {
        self.schemas.contains_key(action_type)
    }

    /// The envelope schema: thoughts, memory, and a tagged union over
    /// the registered action set.
    pub fn envelope_schema(&self) -> Value {
        let variants: Vec<Value> = self
            .schemas
            .iter()
            .map(|(action_type, params)| {
                json!({
                    "type": "object",
                    "properties": {
                        "type": { "const": action_type },
                        "params": params
                    },
                    "required": ["type", "params"],
                    "additionalProperties": false
                })
            })
            .collect();
        json!({
            "type": "object",
            "properties": {
                "thoughts": { "type": "string" },
                "memory": { "type": "string" },
                "action": { "oneOf": variants }
            },
            "required": ["thoughts", "memory", "action"],
            "additionalProperties": false
        })
    }
}

#[cfg(test)]
mod tests;
