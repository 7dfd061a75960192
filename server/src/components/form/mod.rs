use maud::{html, Markup, Render};

const FIELD_CLASSES: &str = "w-full px-4 py-2 border border-gray-300 rounded-lg focus:ring-2 focus:ring-indigo-500 focus:border-indigo-500 text-gray-900";

fn render_label(name: &str, label: Option<&str>) -> Markup {
    html! {
        @if let Some(label) = label {
            label for=(name) class="block text-sm font-medium text-gray-700 mb-1" { (label) }
        }
    }
}

fn render_error(error: Option<&str>) -> Markup {
    html! {
        @if let Some(error) = error {
            p class="mt-1 text-sm text-red-600" { (error) }
        }
    }
}

pub struct InputField {
    pub name: String,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    pub input_type: String,
    pub required: bool,
    pub hidden: bool,
    /// `min`, `max` and `step` for numeric inputs
    pub range: Option<(String, String, String)>,
    pub error: Option<String>,
}

impl InputField {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            placeholder: None,
            value: None,
            input_type: "text".to_string(),
            required: false,
            hidden: false,
            range: None,
            error: None,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn input_type(mut self, input_type: &str) -> Self {
        self.input_type = input_type.to_string();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn range(mut self, min: &str, max: &str, step: &str) -> Self {
        self.range = Some((min.to_string(), max.to_string(), step.to_string()));
        self
    }

    pub fn error(mut self, error: Option<&str>) -> Self {
        self.error = error.map(str::to_string);
        self
    }
}

impl Render for InputField {
    fn render(&self) -> Markup {
        let value = self.value.as_deref().unwrap_or("");

        if self.hidden {
            return html! {
                input type="hidden" name=(self.name) value=(value);
            };
        }

        let (min, max, step) = match &self.range {
            Some((min, max, step)) => (Some(min), Some(max), Some(step)),
            None => (None, None, None),
        };

        html! {
            div class="mb-4" {
                (render_label(&self.name, self.label.as_deref()))
                input
                    type=(self.input_type)
                    name=(self.name)
                    id=(self.name)
                    value=(value)
                    placeholder=(self.placeholder.as_deref().unwrap_or(""))
                    min=[min]
                    max=[max]
                    step=[step]
                    class=(FIELD_CLASSES)
                    required[self.required];
                (render_error(self.error.as_deref()))
            }
        }
    }
}

pub struct TextArea {
    pub name: String,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    pub rows: u8,
    pub max_length: Option<usize>,
    pub required: bool,
    pub error: Option<String>,
}

impl TextArea {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            placeholder: None,
            value: None,
            rows: 3,
            max_length: None,
            required: false,
            error: None,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn value(mut self, value: Option<&str>) -> Self {
        self.value = value.map(str::to_string);
        self
    }

    pub fn rows(mut self, rows: u8) -> Self {
        self.rows = rows;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn error(mut self, error: Option<&str>) -> Self {
        self.error = error.map(str::to_string);
        self
    }
}

impl Render for TextArea {
    fn render(&self) -> Markup {
        html! {
            div class="mb-4" {
                (render_label(&self.name, self.label.as_deref()))
                textarea
                    name=(self.name)
                    id=(self.name)
                    rows=(self.rows)
                    maxlength=[self.max_length]
                    placeholder=(self.placeholder.as_deref().unwrap_or(""))
                    class=(FIELD_CLASSES)
                    required[self.required] {
                    (self.value.as_deref().unwrap_or(""))
                }
                (render_error(self.error.as_deref()))
            }
        }
    }
}

pub struct Select {
    pub name: String,
    pub label: Option<String>,
    /// `(value, label)` pairs
    pub options: Vec<(String, String)>,
    pub selected: Option<String>,
    pub error: Option<String>,
}

impl Select {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            options: Vec::new(),
            selected: None,
            error: None,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn option(mut self, value: &str, label: &str) -> Self {
        self.options.push((value.to_string(), label.to_string()));
        self
    }

    pub fn selected(mut self, value: Option<&str>) -> Self {
        self.selected = value.map(str::to_string);
        self
    }

    pub fn error(mut self, error: Option<&str>) -> Self {
        self.error = error.map(str::to_string);
        self
    }
}

impl Render for Select {
    fn render(&self) -> Markup {
        html! {
            div class="mb-4" {
                (render_label(&self.name, self.label.as_deref()))
                select name=(self.name) id=(self.name) class=(FIELD_CLASSES) {
                    @for (value, label) in &self.options {
                        option value=(value) selected[self.selected.as_deref() == Some(value.as_str())] { (label) }
                    }
                }
                (render_error(self.error.as_deref()))
            }
        }
    }
}

pub struct Form {
    pub action: String,
    pub method: String,
    pub content: Box<dyn Render>,
    pub extra_classes: Option<String>,
}

impl Form {
    pub fn new(action: &str, method: &str, content: impl Render + 'static) -> Self {
        Self {
            action: action.to_string(),
            method: method.to_string(),
            content: Box::new(content),
            extra_classes: None,
        }
    }

    pub fn extra_classes(mut self, classes: &str) -> Self {
        self.extra_classes = Some(classes.to_string());
        self
    }
}

impl Render for Form {
    fn render(&self) -> Markup {
        let extra_classes = self.extra_classes.as_deref().unwrap_or("");

        html! {
            form action=(self.action) method=(self.method) class={"space-y-4 " (extra_classes)} {
                (self.content.render())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_marks_the_chosen_option() {
        let html = Select::new("orientation")
            .option("a", "A")
            .option("b", "B")
            .selected(Some("b"))
            .render()
            .into_string();

        assert!(html.contains(r#"<option value="b" selected>B</option>"#));
        assert!(html.contains(r#"<option value="a">A</option>"#));
    }

    #[test]
    fn field_errors_are_rendered() {
        let html = TextArea::new("prompt")
            .error(Some("Prompt is too short"))
            .render()
            .into_string();

        assert!(html.contains("Prompt is too short"));
    }

    #[test]
    fn numeric_range_attributes() {
        let html = InputField::new("guidanceScale")
            .input_type("number")
            .range("0", "10", "0.5")
            .render()
            .into_string();

        assert!(html.contains(r#"min="0""#));
        assert!(html.contains(r#"step="0.5""#));
    }
}
