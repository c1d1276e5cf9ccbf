use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { label: label.into(), callback_data: callback_data.into() }
    }
}

/// Keyboard attached to an outbound message. Reply keyboards replace the
/// user's input keyboard; pressing a key sends its label back as text.
/// Inline buttons answer with a callback payload instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Markup {
    Reply { rows: Vec<Vec<String>> },
    Inline { rows: Vec<Vec<InlineButton>> },
}

impl Markup {
    pub fn reply() -> ReplyKeyboardBuilder {
        ReplyKeyboardBuilder::default()
    }

    pub fn inline() -> InlineKeyboardBuilder {
        InlineKeyboardBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Reply { rows } => rows.iter().all(Vec::is_empty),
            Self::Inline { rows } => rows.iter().all(Vec::is_empty),
        }
    }
}

#[derive(Default)]
pub struct ReplyKeyboardBuilder {
    rows: Vec<Vec<String>>,
}

impl ReplyKeyboardBuilder {
    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ReplyRowBuilder),
    {
        let mut row = ReplyRowBuilder::default();
        build(&mut row);
        self.rows.push(row.keys);
        self
    }

    pub fn build(self) -> Markup {
        Markup::Reply { rows: self.rows }
    }
}

#[derive(Default)]
pub struct ReplyRowBuilder {
    keys: Vec<String>,
}

impl ReplyRowBuilder {
    pub fn key(&mut self, label: impl Into<String>) -> &mut Self {
        self.keys.push(label.into());
        self
    }
}

#[derive(Default)]
pub struct InlineKeyboardBuilder {
    rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboardBuilder {
    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut InlineRowBuilder),
    {
        let mut row = InlineRowBuilder::default();
        build(&mut row);
        self.rows.push(row.buttons);
        self
    }

    pub fn build(self) -> Markup {
        Markup::Inline { rows: self.rows }
    }
}

#[derive(Default)]
pub struct InlineRowBuilder {
    buttons: Vec<InlineButton>,
}

impl InlineRowBuilder {
    pub fn button(&mut self, button: InlineButton) -> &mut Self {
        self.buttons.push(button);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{InlineButton, Markup};

    #[test]
    fn reply_keyboard_keeps_row_layout() {
        let markup = Markup::reply()
            .row(|row| {
                row.key("My tasks").key("New task");
            })
            .row(|row| {
                row.key("Team");
            })
            .build();

        assert_eq!(
            markup,
            Markup::Reply {
                rows: vec![
                    vec!["My tasks".to_owned(), "New task".to_owned()],
                    vec!["Team".to_owned()],
                ]
            }
        );
        assert!(!markup.is_empty());
    }

    #[test]
    fn inline_keyboard_serializes_with_type_tag() {
        let markup = Markup::inline()
            .row(|row| {
                row.button(InlineButton::new("Yes", "/yes")).button(InlineButton::new("No", "/no"));
            })
            .build();

        let json = serde_json::to_value(&markup).expect("serialize");
        assert_eq!(json["type"], "inline");
        assert_eq!(json["rows"][0][1]["callback_data"], "/no");
    }
}
