use maud::{html, Markup, Render};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

pub struct Heading {
    pub text: String,
    pub level: HeadingLevel,
    pub subtitle: Option<String>,
    pub classes: Option<String>,
}

impl Heading {
    pub fn new(text: &str, level: HeadingLevel) -> Self {
        Self {
            text: text.to_string(),
            level,
            subtitle: None,
            classes: None,
        }
    }

    pub fn h1(text: &str) -> Self {
        Self::new(text, HeadingLevel::H1)
    }

    pub fn h2(text: &str) -> Self {
        Self::new(text, HeadingLevel::H2)
    }

    pub fn h3(text: &str) -> Self {
        Self::new(text, HeadingLevel::H3)
    }

    /// A muted line rendered under the heading
    pub fn subtitle(mut self, subtitle: &str) -> Self {
        self.subtitle = Some(subtitle.to_string());
        self
    }

    pub fn with_classes(mut self, classes: &str) -> Self {
        self.classes = Some(classes.to_string());
        self
    }

    fn level_classes(&self) -> &'static str {
        match self.level {
            HeadingLevel::H1 => "text-3xl md:text-4xl font-bold mb-2",
            HeadingLevel::H2 => "text-2xl font-bold mb-2",
            HeadingLevel::H3 => "text-lg font-semibold mb-1",
        }
    }
}

impl Render for Heading {
    fn render(&self) -> Markup {
        let classes = format!(
            "{} text-gray-900 {}",
            self.level_classes(),
            self.classes.as_deref().unwrap_or("")
        );

        html! {
            @match self.level {
                HeadingLevel::H1 => { h1 class=(classes) { (self.text) } }
                HeadingLevel::H2 => { h2 class=(classes) { (self.text) } }
                HeadingLevel::H3 => { h3 class=(classes) { (self.text) } }
            }
            @if let Some(subtitle) = &self.subtitle {
                p class="text-gray-600 mb-6" { (subtitle) }
            }
        }
    }
}
