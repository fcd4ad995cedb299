//! Keyboard key definitions.
//!
//! Maps DOM key values to the physical code, Windows virtual key code,
//! and generated text that `Input.dispatchKeyEvent` wants. Named keys
//! cover what page interaction needs; single characters fall back to a
//! synthesized definition.

/// Everything a key event pair needs.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDefinition {
    /// DOM key value ("Enter", "a").
    pub key: String,
    /// Physical code ("Enter", "KeyA").
    pub code: String,
    /// Windows virtual key code.
    pub key_code: i64,
    /// Text produced by the key, when any.
    pub text: Option<String>,
}

/// Resolve a key name to its definition.
///
/// Accepts the DOM key values the model emits ("Enter", "ArrowDown",
/// "a"); unknown multi-character names come back as `None`.
pub fn lookup(key: &str) -> Option<KeyDefinition> {
    let named = |key: &str, code: &str, key_code: i64, text: Option<&str>| {
        Some(KeyDefinition {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: text.map(ToString::to_string),
        })
    };

    match key {
        "Enter" => named("Enter", "Enter", 13, Some("\r")),
        "Tab" => named("Tab", "Tab", 9, None),
        "Escape" => named("Escape", "Escape", 27, None),
        "Backspace" => named("Backspace", "Backspace", 8, None),
        "Delete" => named("Delete", "Delete", 46, None),
        "ArrowUp" => named("ArrowUp", "ArrowUp", 38, None),
        "ArrowDown" => named("ArrowDown", "ArrowDown", 40, None),
        "ArrowLeft" => named("ArrowLeft", "ArrowLeft", 37, None),
        "ArrowRight" => named("ArrowRight", "ArrowRight", 39, None),
        "Home" => named("Home", "Home", 36, None),
        "End" => named("End", "End", 35, None),
        "PageUp" => named("PageUp", "PageUp", 33, None),
        "PageDown" => named("PageDown", "PageDown", 34, None),
        "Space" | " " => named(" ", "Space", 32, Some(" ")),
        single if single.chars().count() == 1 => {
            let c = single.chars().next()?;
            let code = if c.is_ascii_alphabetic() {
                format!("Key{}", c.to_ascii_uppercase())
            } else if c.is_ascii_digit() {
                format!("Digit{c}")
            } else {
                String::new()
            };
            Some(KeyDefinition {
                key: single.to_string(),
                code,
                key_code: i64::from(c.to_ascii_uppercase() as u8),
                text: Some(single.to_string()),
            })
        }
        _ => None,
    }
}
