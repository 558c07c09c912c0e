//! Message components.

use serde::{Deserialize, Serialize};

use crate::id::Snowflake;

wire_enum! {
    /// Kind of message component.
    pub enum ComponentType {
        ActionRow = 1,
        Button = 2,
        SelectMenu = 3,
    }
}

wire_enum! {
    /// Visual style of a button.
    pub enum ButtonStyle {
        Primary = 1,
        Secondary = 2,
        Success = 3,
        Danger = 4,
        /// Opens a URL; never produces an interaction.
        Link = 5,
    }
}

/// Emoji shown on a button or select option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialEmoji {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub animated: bool,
}

impl PartialEmoji {
    /// A unicode emoji.
    pub fn unicode(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            animated: false,
        }
    }
}

/// One entry of a select menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<PartialEmoji>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
}

impl SelectOption {
    /// Creates an option with a label and value.
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
            emoji: None,
            default: false,
        }
    }

    /// Sets the secondary description line.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the option as selected by default.
    pub fn selected(mut self) -> Self {
        self.default = true;
        self
    }
}

/// A button or select menu on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentData {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<PartialEmoji>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u8>,
}

impl ComponentData {
    /// An empty button.
    pub fn button() -> Self {
        Self::empty(ComponentType::Button)
    }

    /// An empty select menu.
    pub fn select_menu() -> Self {
        Self::empty(ComponentType::SelectMenu)
    }

    fn empty(kind: ComponentType) -> Self {
        Self {
            kind,
            custom_id: None,
            disabled: false,
            style: None,
            label: None,
            emoji: None,
            url: None,
            options: Vec::new(),
            placeholder: None,
            min_values: None,
            max_values: None,
        }
    }

    /// Whether this component is a link button.
    pub fn is_link(&self) -> bool {
        self.kind == ComponentType::Button
            && (self.style == Some(ButtonStyle::Link) || self.url.is_some())
    }

    /// Whether a select menu binds exactly one value.
    ///
    /// The platform defaults both bounds to 1.
    pub fn selects_single_value(&self) -> bool {
        self.min_values.unwrap_or(1) == 1 && self.max_values.unwrap_or(1) == 1
    }
}

/// A row of components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(default)]
    pub components: Vec<ComponentData>,
}

impl ActionRow {
    /// Wraps components in a row.
    pub fn new(components: Vec<ComponentData>) -> Self {
        Self {
            kind: ComponentType::ActionRow,
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_button_detection() {
        let mut button = ComponentData::button();
        assert!(!button.is_link());
        button.url = Some("https://example.com".into());
        assert!(button.is_link());
    }

    #[test]
    fn select_value_binding() {
        let mut select = ComponentData::select_menu();
        assert!(select.selects_single_value());
        select.max_values = Some(3);
        assert!(!select.selects_single_value());
    }

    #[test]
    fn row_serializes_with_type() {
        let mut button = ComponentData::button();
        button.style = Some(ButtonStyle::Primary);
        button.label = Some("+1".into());
        button.custom_id = Some("inc:ref".into());
        let json = serde_json::to_value(ActionRow::new(vec![button])).unwrap();
        assert_eq!(json["type"], 1);
        assert_eq!(json["components"][0]["type"], 2);
        assert_eq!(json["components"][0]["style"], 1);
        assert_eq!(json["components"][0]["custom_id"], "inc:ref");
    }
}
