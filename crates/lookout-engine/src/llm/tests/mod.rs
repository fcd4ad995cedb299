use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use parking_lot::Mutex;

use super::*;
use crate::snapshot::AccessibilityNode;

fn snapshot_with_button() -> Snapshot {
    let id = EncodedId::new(0, 4);
    let mut elements = BTreeMap::new();
    elements.insert(
        id,
        AccessibilityNode {
            role: "button".to_string(),
            name: Some("Submit".to_string()),
            description: None,
            value: None,
            backend_dom_node_id: 4,
            children: None,
        },
    );
    Snapshot {
        dom_state: "=== Frame 0 (Main) ===\n[0-4] button: Submit\n".to_string(),
        elements,
        xpath_map: HashMap::from([(id, "//button[@id=\"submit\"]".to_string())]),
        backend_node_map: HashMap::from([(id, 4)]),
        frame_map: BTreeMap::new(),
        bounding_box_map: None,
        visual_overlay: None,
        generation: 0,
        captured_at: Instant::now(),
        dirty: AtomicBool::new(false),
        resolutions: Mutex::new(HashMap::new()),
        backend_overrides: Mutex::new(HashMap::new()),
    }
}

struct ScriptedModel {
    replies: Mutex<VecDeque<StructuredReply>>,
    calls: std::sync::atomic::AtomicU32,
}

impl ScriptedModel {
    fn new(replies: Vec<StructuredReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    fn parsed(value: Value) -> StructuredReply {
        StructuredReply {
            raw: value.to_string(),
            parsed: Some(value),
        }
    }

    fn unparsable() -> StructuredReply {
        StructuredReply {
            raw: "I think the button is probably fine".to_string(),
            parsed: None,
        }
    }
}

impl LanguageModel for ScriptedModel {
    async fn invoke_structured(
        &self,
        _schema: &Value,
        _messages: &[Message],
    ) -> Result<StructuredReply, LlmError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::Provider("script exhausted".to_string()))
    }

    async fn invoke(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Ok(String::new())
    }
}

fn config() -> crate::config::EngineConfig {
    crate::config::EngineConfig::default()
}

fn good_reply() -> Value {
    json!({
        "found": true,
        "elementId": "0-4",
        "description": "the submit button",
        "confidence": 0.92,
        "method": "click",
        "arguments": []
    })
}

#[tokio::test]
async fn test_find_element_first_try() {
    let snapshot = snapshot_with_button();
    let model = ScriptedModel::new(vec![ScriptedModel::parsed(good_reply())]);
    let outcome = find_element("click submit", &snapshot, &model, &config())
        .await
        .unwrap();
    match outcome {
        FindOutcome::Found(found) => {
            assert_eq!(found.encoded_id, EncodedId::new(0, 4));
            assert_eq!(found.method, "click");
            assert!((found.confidence - 0.92).abs() < f64::EPSILON);
        }
        FindOutcome::NotFound { reason } => panic!("unexpected not-found: {reason}"),
    }
}

#[tokio::test]
async fn test_find_element_honors_not_found() {
    let snapshot = snapshot_with_button();
    let model = ScriptedModel::new(vec![ScriptedModel::parsed(json!({
        "found": false,
        "description": "no search box on this page",
        "confidence": 0.8
    }))]);
    let outcome = find_element("find the search box", &snapshot, &model, &config())
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        FindOutcome::NotFound { reason } if reason.contains("search box")
    ));
}

#[tokio::test]
async fn test_find_element_retries_unparsable_output() {
    let snapshot = snapshot_with_button();
    let model = ScriptedModel::new(vec![
        ScriptedModel::unparsable(),
        ScriptedModel::parsed(good_reply()),
    ]);
    let outcome = find_element("click submit", &snapshot, &model, &config())
        .await
        .unwrap();
    assert!(matches!(outcome, FindOutcome::Found(_)));
    assert_eq!(model.calls.load(std::sync::atomic::Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_find_element_fatal_after_attempt_budget() {
    let snapshot = snapshot_with_button();
    let model = ScriptedModel::new(vec![
        ScriptedModel::unparsable(),
        ScriptedModel::unparsable(),
        ScriptedModel::unparsable(),
    ]);
    let err = find_element("click submit", &snapshot, &model, &config())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::NoStructuredOutput { attempts: 3 }));
}

#[tokio::test]
async fn test_find_element_rejects_hallucinated_ids() {
    let snapshot = snapshot_with_button();
    let mut bogus = good_reply();
    bogus["elementId"] = json!("0-999");
    let model = ScriptedModel::new(vec![
        ScriptedModel::parsed(bogus),
        ScriptedModel::parsed(good_reply()),
    ]);
    let outcome = find_element("click submit", &snapshot, &model, &config())
        .await
        .unwrap();
    assert!(matches!(outcome, FindOutcome::Found(_)));
    assert_eq!(model.calls.load(std::sync::atomic::Ordering::Relaxed), 2);
}

#[test]
fn test_validate_rejects_unknown_method() {
    let snapshot = snapshot_with_button();
    let mut reply = good_reply();
    reply["method"] = json!("doubleClick");
    let err = validate_reply(&reply, &snapshot).unwrap_err();
    assert!(err.contains("invalid method"));
}

#[test]
fn test_validate_rejects_out_of_range_confidence() {
    let snapshot = snapshot_with_button();
    let mut reply = good_reply();
    reply["confidence"] = json!(1.4);
    assert!(validate_reply(&reply, &snapshot).is_err());
}

#[test]
fn test_element_schema_closes_the_method_set() {
    let schema = element_schema();
    let methods = schema["properties"]["method"]["enum"].as_array().unwrap();
    assert_eq!(methods.len(), 12);
    assert!(methods.contains(&json!("selectOptionFromDropdown")));
}

#[test]
fn test_action_registry_envelope() {
    let mut registry = ActionRegistry::default();
    assert!(registry.contains("click"));
    assert!(!registry.contains("navigate"));

    registry.register(
        "navigate",
        json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        }),
    );
    assert!(registry.contains("navigate"));

    let schema = registry.envelope_schema();
    let variants = schema["properties"]["action"]["oneOf"].as_array().unwrap();
    assert_eq!(variants.len(), 13);
}

#[test]
fn test_agent_step_round_trip() {
    let step: AgentStep = serde_json::from_value(json!({
        "thoughts": "the form needs an email first",
        "memory": "step 2 of 5",
        "action": { "type": "fill", "params": { "elementId": "0-4", "arguments": ["a@b.c"] } }
    }))
    .unwrap();
    assert_eq!(step.action.action_type, "fill");
    let back = serde_json::to_value(&step).unwrap();
    assert_eq!(back["action"]["type"], "fill");
}
