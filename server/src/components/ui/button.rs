use maud::{html, Markup, Render};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonVariant {
    Primary,
    Secondary,
    Danger,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonSize {
    Small,
    Medium,
    Large,
}

pub struct Button {
    pub text: String,
    pub href: Option<String>,
    pub variant: ButtonVariant,
    pub size: ButtonSize,
    pub full_width: bool,
    pub button_type: Option<String>,
    pub disabled: bool,
}

impl Default for Button {
    fn default() -> Self {
        Self {
            text: String::new(),
            href: None,
            variant: ButtonVariant::Primary,
            size: ButtonSize::Medium,
            full_width: false,
            button_type: None,
            disabled: false,
        }
    }
}

impl Button {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn primary(text: &str) -> Self {
        Self::new(text)
    }

    pub fn secondary(text: &str) -> Self {
        Self::new(text).variant(ButtonVariant::Secondary)
    }

    pub fn variant(mut self, variant: ButtonVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn size(mut self, size: ButtonSize) -> Self {
        self.size = size;
        self
    }

    pub fn full_width(mut self, full_width: bool) -> Self {
        self.full_width = full_width;
        self
    }

    pub fn button_type(mut self, button_type: &str) -> Self {
        self.button_type = Some(button_type.to_string());
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    fn variant_classes(&self) -> &'static str {
        match self.variant {
            ButtonVariant::Primary => "bg-indigo-600 hover:bg-indigo-700 text-white shadow-sm",
            ButtonVariant::Secondary => "bg-white hover:bg-gray-50 text-indigo-600 border border-indigo-300 shadow-sm",
            ButtonVariant::Danger => "bg-red-600 hover:bg-red-700 text-white shadow-sm",
            ButtonVariant::Link => "bg-transparent text-indigo-600 hover:text-indigo-800 hover:underline",
        }
    }

    fn size_classes(&self) -> &'static str {
        match self.size {
            ButtonSize::Small => "py-1.5 px-2.5 text-sm",
            ButtonSize::Medium => "py-2 px-4 text-base",
            ButtonSize::Large => "py-3 px-6 text-lg",
        }
    }

    fn classes(&self) -> String {
        let width_class = if self.full_width { "w-full" } else { "" };
        let disabled_class = if self.disabled {
            "opacity-50 cursor-not-allowed"
        } else {
            "cursor-pointer"
        };

        format!(
            "{} {} {} {} font-medium rounded-lg transition-colors inline-flex items-center justify-center",
            self.variant_classes(),
            self.size_classes(),
            width_class,
            disabled_class
        )
    }
}

impl Render for Button {
    fn render(&self) -> Markup {
        let classes = self.classes();

        match &self.href {
            Some(href) if !self.disabled => html! {
                a href=(href) class=(classes) { (self.text) }
            },
            _ => {
                let button_type = self.button_type.as_deref().unwrap_or("button");
                html! {
                    button type=(button_type) class=(classes) disabled[self.disabled] { (self.text) }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_render_as_anchors() {
        let html = Button::primary("Buy").href("/pricing").render().into_string();
        assert!(html.starts_with("<a href=\"/pricing\""));
    }

    #[test]
    fn disabled_links_render_as_disabled_buttons() {
        let html = Button::primary("Buy")
            .href("/pricing")
            .disabled(true)
            .render()
            .into_string();
        assert!(html.starts_with("<button"));
        assert!(html.contains("disabled"));
    }
}
