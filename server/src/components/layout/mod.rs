use maud::{html, Markup, Render, DOCTYPE};

use super::ui::nav_buttons::{NavButton, NavButtons};

/// What the nav bar shows about the signed in user
#[derive(Debug, Clone)]
pub struct NavUser {
    pub name: String,
    pub credits: i32,
}

impl From<&crate::user::User> for NavUser {
    fn from(user: &crate::user::User) -> Self {
        Self {
            name: user.display_name().to_string(),
            credits: user.credits,
        }
    }
}

pub struct Page {
    pub title: String,
    pub content: Box<dyn Render>,
    pub user: Option<NavUser>,
    /// Path of the current page, highlighted in the nav
    pub active: Option<String>,
}

impl Page {
    pub fn new(title: impl Into<String>, content: impl Render + 'static) -> Self {
        Self {
            title: title.into(),
            content: Box::new(content),
            user: None,
            active: None,
        }
    }

    pub fn user(mut self, user: Option<NavUser>) -> Self {
        self.user = user;
        self
    }

    pub fn active(mut self, path: &str) -> Self {
        self.active = Some(path.to_string());
        self
    }

    fn nav(&self) -> NavButtons {
        let active = self.active.as_deref().unwrap_or("");
        let mut nav = NavButtons::new()
            .add_button(NavButton::new("Generate", "/generate").active(active == "/generate"))
            .add_button(NavButton::new("Feed", "/feed").active(active == "/feed"))
            .add_button(NavButton::new("Pricing", "/pricing").active(active == "/pricing"));

        nav = match &self.user {
            Some(_) => nav
                .add_button(NavButton::new("History", "/history").active(active == "/history"))
                .add_button(NavButton::new("Billing", "/billing").active(active == "/billing"))
                .add_button(NavButton::new("Sign out", "/logout")),
            None => nav.add_button(NavButton::new("Sign in", "/login")),
        };

        nav
    }
}

impl Render for Page {
    fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    title { (self.title) " - Imagic" }
                    meta charset="utf-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    script src="https://unpkg.com/@tailwindcss/browser@4" {}
                    script src="/static/imagic.js" defer {}
                }
                body class="min-h-screen bg-gradient-to-br from-slate-50 via-indigo-50 to-purple-50" {
                    header class="bg-white/80 border-b border-gray-100" {
                        div class="max-w-6xl mx-auto px-4 py-3 flex flex-wrap items-center justify-between gap-3" {
                            a href="/" class="text-2xl font-bold text-indigo-700" { "Imagic" }
                            (self.nav().container_classes("flex flex-wrap items-center gap-2"))
                            @if let Some(user) = &self.user {
                                span class="text-sm text-gray-600" data-credits=(user.credits) {
                                    (user.name) " · " (user.credits) " credits"
                                }
                            }
                        }
                    }

                    main class="max-w-6xl mx-auto px-4 py-6 md:py-10" {
                        (self.content.render())
                    }

                    footer class="mt-8 pb-8 text-center text-sm text-gray-500" {
                        "© 2025 Imagic - AI image generation"
                    }
                }
            }
        }
    }
}

impl axum::response::IntoResponse for Page {
    fn into_response(self) -> axum::response::Response {
        self.render().into_response()
    }
}

pub struct Card {
    pub content: Box<dyn Render>,
    pub max_width: Option<String>,
}

impl Card {
    pub fn new(content: impl Render + 'static) -> Self {
        Self {
            content: Box::new(content),
            max_width: None,
        }
    }

    pub fn with_max_width(mut self, max_width: &str) -> Self {
        self.max_width = Some(max_width.to_string());
        self
    }
}

impl Render for Card {
    fn render(&self) -> Markup {
        let width_class = self.max_width.as_deref().unwrap_or("max-w-md");

        html! {
            div class={(width_class) " mx-auto bg-white rounded-xl border border-gray-100 shadow-md overflow-hidden w-full p-6"} {
                (self.content.render())
            }
        }
    }
}

/// A dismissable-looking notice above page content
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Render for Notice {
    fn render(&self) -> Markup {
        let classes = match self.kind {
            NoticeKind::Info => "bg-blue-50 text-blue-800 border-blue-200",
            NoticeKind::Success => "bg-green-50 text-green-800 border-green-200",
            NoticeKind::Error => "bg-red-50 text-red-800 border-red-200",
        };

        html! {
            div class={"border rounded-lg px-4 py-3 mb-4 " (classes)} role="status" {
                (self.message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_out_nav_offers_sign_in() {
        let html = Page::new("Feed", html! { p { "hi" } })
            .active("/feed")
            .render()
            .into_string();

        assert!(html.contains("Sign in"));
        assert!(!html.contains("History"));
        assert!(html.contains("<title>Feed - Imagic</title>"));
    }

    #[test]
    fn signed_in_nav_shows_credits() {
        let html = Page::new("Generate", html! {})
            .user(Some(NavUser {
                name: "ada".into(),
                credits: 7,
            }))
            .render()
            .into_string();

        assert!(html.contains("Sign out"));
        assert!(html.contains("7 credits"));
    }
}
