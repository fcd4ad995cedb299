//! Input domain types.
//!
//! The Input domain dispatches trusted input events: synthetic mouse and
//! keyboard events that the page cannot distinguish from real ones.

use serde::Serialize;

/// Mouse event type for Input.dispatchMouseEvent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MouseEventType {
    /// Pointer moved.
    #[serde(rename = "mouseMoved")]
    Moved,
    /// Button pressed.
    #[serde(rename = "mousePressed")]
    Pressed,
    /// Button released.
    #[serde(rename = "mouseReleased")]
    Released,
    /// Wheel rotated.
    #[serde(rename = "mouseWheel")]
    Wheel,
}

/// Mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// No button.
    #[default]
    None,
    /// Left button.
    Left,
    /// Middle button.
    Middle,
    /// Right button.
    Right,
}

/// Parameters for Input.dispatchMouseEvent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchMouseEventParams {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: MouseEventType,
    /// X coordinate relative to the main-frame viewport in CSS pixels.
    pub x: f64,
    /// Y coordinate relative to the main-frame viewport in CSS pixels.
    pub y: f64,
    /// Mouse button.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
    /// Number of times the button was clicked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_count: Option<i64>,
    /// X delta for wheel events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_x: Option<f64>,
    /// Y delta for wheel events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_y: Option<f64>,
    /// Bit field of pressed modifier keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<i64>,
}

impl DispatchMouseEventParams {
    /// A plain pointer event at the given viewport coordinates.
    pub fn at(event_type: MouseEventType, x: f64, y: f64) -> Self {
        Self {
            event_type,
            x,
            y,
            button: None,
            click_count: None,
            delta_x: None,
            delta_y: None,
            modifiers: None,
        }
    }
}

/// Key event type for Input.dispatchKeyEvent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyEventType {
    /// Key pressed.
    #[serde(rename = "keyDown")]
    KeyDown,
    /// Key released.
    #[serde(rename = "keyUp")]
    KeyUp,
    /// Key pressed without text production.
    #[serde(rename = "rawKeyDown")]
    RawKeyDown,
    /// Character generated.
    #[serde(rename = "char")]
    Char,
}

/// Parameters for Input.dispatchKeyEvent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchKeyEventParams {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: KeyEventType,
    /// DOM key value ("Enter", "a", "ArrowDown").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Physical key code ("Enter", "KeyA").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Text generated by the key, for keys that produce characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Windows virtual key code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows_virtual_key_code: Option<i64>,
    /// Native virtual key code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_virtual_key_code: Option<i64>,
    /// Bit field of pressed modifier keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<i64>,
}

/// Parameters for Input.insertText.
///
/// Emulates a direct text insertion (IME-style), firing input events
/// without per-character key events.
#[derive(Debug, Clone, Serialize)]
pub struct InsertTextParams {
    /// Text to insert.
    pub text: String,
}
