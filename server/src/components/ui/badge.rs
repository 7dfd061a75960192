use maud::{html, Markup, Render};

use crate::credits::LimitStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BadgeColor {
    Blue,
    Green,
    Red,
    Yellow,
    Purple,
    Gray,
}

pub struct Badge {
    pub text: String,
    pub color: BadgeColor,
    pub rounded: bool,
}

impl Badge {
    pub fn new(text: impl Into<String>, color: BadgeColor) -> Self {
        Self {
            text: text.into(),
            color,
            rounded: false,
        }
    }

    pub fn rounded(mut self, rounded: bool) -> Self {
        self.rounded = rounded;
        self
    }

    fn color_classes(&self) -> &'static str {
        match self.color {
            BadgeColor::Blue => "bg-blue-100 text-blue-800",
            BadgeColor::Green => "bg-green-100 text-green-800",
            BadgeColor::Red => "bg-red-100 text-red-800",
            BadgeColor::Yellow => "bg-yellow-100 text-yellow-800",
            BadgeColor::Purple => "bg-purple-100 text-purple-800",
            BadgeColor::Gray => "bg-gray-100 text-gray-800",
        }
    }
}

impl Render for Badge {
    fn render(&self) -> Markup {
        let rounded = if self.rounded { "rounded-full" } else { "rounded" };
        let classes = format!(
            "{} text-xs font-medium px-2 py-1 {}",
            self.color_classes(),
            rounded
        );

        html! {
            span class=(classes) { (self.text) }
        }
    }
}

/// Remaining generations for the current visitor
pub struct LimitBadge<'a>(pub &'a LimitStatus);

impl LimitBadge<'_> {
    fn text(&self) -> String {
        let status = self.0;
        match (status.is_guest, status.max) {
            (true, Some(max)) => format!("{} of {max} free generations left today", status.remaining),
            _ => format!("{} credits remaining", status.remaining),
        }
    }

    fn color(&self) -> BadgeColor {
        match self.0.remaining {
            0 => BadgeColor::Red,
            1 => BadgeColor::Yellow,
            _ => BadgeColor::Green,
        }
    }
}

impl Render for LimitBadge<'_> {
    fn render(&self) -> Markup {
        html! {
            span id="limit-badge" {
                (Badge::new(self.text(), self.color()).rounded(true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_badge_counts_credits() {
        let status = crate::credits::user_status(3);
        let html = LimitBadge(&status).render().into_string();
        assert!(html.contains("3 credits remaining"));
        assert!(html.contains("bg-green-100"));
    }

    #[test]
    fn empty_balance_is_red() {
        let status = crate::credits::user_status(0);
        assert_eq!(LimitBadge(&status).color(), BadgeColor::Red);
    }
}
