use maud::{html, Markup, Render};

use crate::images::Owner;

pub struct Avatar {
    pub src: Option<String>,
    pub alt: String,
    pub size: String,
}

impl Avatar {
    pub fn new(src: Option<String>, alt: &str) -> Self {
        Self {
            src,
            alt: alt.to_string(),
            size: "w-8 h-8".to_string(),
        }
    }

    pub fn for_owner(owner: &Owner) -> Self {
        Self::new(
            owner.avatar_url.clone(),
            owner.username.as_deref().unwrap_or("Anonymous"),
        )
    }

    pub fn size(mut self, size: &str) -> Self {
        self.size = size.to_string();
        self
    }

    fn initial(&self) -> String {
        self.alt
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}

impl Render for Avatar {
    fn render(&self) -> Markup {
        html! {
            div class={"rounded-full overflow-hidden shrink-0 " (self.size)} {
                @if let Some(src) = &self.src {
                    img src=(src) alt=(self.alt) class="w-full h-full object-cover";
                } @else {
                    div class="bg-gradient-to-br from-indigo-300 to-purple-300 w-full h-full flex items-center justify-center text-white font-bold" {
                        (self.initial())
                    }
                }
            }
        }
    }
}
