use maud::{html, Markup, Render};

use super::button::{Button, ButtonSize, ButtonVariant};

pub struct NavButtons {
    pub items: Vec<NavButton>,
    pub container_classes: Option<String>,
}

pub struct NavButton {
    pub text: String,
    pub href: String,
    pub is_active: bool,
}

impl NavButtons {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            container_classes: None,
        }
    }

    pub fn add_button(mut self, button: NavButton) -> Self {
        self.items.push(button);
        self
    }

    pub fn container_classes(mut self, classes: &str) -> Self {
        self.container_classes = Some(classes.to_string());
        self
    }
}

impl Default for NavButtons {
    fn default() -> Self {
        Self::new()
    }
}

impl NavButton {
    pub fn new(text: &str, href: &str) -> Self {
        Self {
            text: text.to_string(),
            href: href.to_string(),
            is_active: false,
        }
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

impl Render for NavButtons {
    fn render(&self) -> Markup {
        let classes = self
            .container_classes
            .as_deref()
            .unwrap_or("flex flex-wrap justify-center gap-3");

        html! {
            nav class=(classes) {
                @for button in &self.items {
                    (render_nav_button(button))
                }
            }
        }
    }
}

fn render_nav_button(button: &NavButton) -> Markup {
    let variant = if button.is_active {
        ButtonVariant::Primary
    } else {
        ButtonVariant::Link
    };

    Button::new(&button.text)
        .variant(variant)
        .size(ButtonSize::Small)
        .href(&button.href)
        .render()
}
