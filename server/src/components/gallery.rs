use maud::{html, Markup, Render};

use super::ui::{avatar::Avatar, badge::{Badge, BadgeColor}};
use crate::images::{HistoryImage, ImageCard};
use crate::pagination::PaginationMeta;

/// A feed entry: image, owner and bookmark count
pub struct FeedTile<'a>(pub &'a ImageCard);

impl Render for FeedTile<'_> {
    fn render(&self) -> Markup {
        let card = self.0;
        let owner = card.owner.username.as_deref().unwrap_or("Anonymous");

        html! {
            figure class="bg-white rounded-xl shadow-sm overflow-hidden border border-gray-100" {
                img src=(card.image.image_url) alt=(card.image.display_title()) loading="lazy" class="w-full aspect-square object-cover";
                figcaption class="p-3 space-y-2" {
                    p class="text-sm text-gray-800 line-clamp-2" { (card.image.display_title()) }
                    div class="flex items-center justify-between" {
                        div class="flex items-center gap-2" {
                            (Avatar::for_owner(&card.owner).size("w-6 h-6"))
                            span class="text-xs text-gray-600" { (owner) }
                        }
                        span class="text-xs text-gray-500" data-bookmarked=(card.is_bookmarked.to_string()) {
                            (card.bookmark_count) " bookmarks"
                        }
                    }
                }
            }
        }
    }
}

/// One of the viewer's own images, with a publish control while unpublished
pub struct HistoryTile<'a>(pub &'a HistoryImage);

impl Render for HistoryTile<'_> {
    fn render(&self) -> Markup {
        let image = &self.0.image;

        html! {
            figure class="bg-white rounded-xl shadow-sm overflow-hidden border border-gray-100" {
                a href=(image.image_url) target="_blank" {
                    img src=(image.image_url) alt=(image.display_title()) loading="lazy" class="w-full aspect-square object-cover";
                }
                figcaption class="p-3 space-y-2" {
                    p class="text-sm text-gray-800 line-clamp-2" { (image.display_title()) }
                    div class="flex items-center justify-between gap-2" {
                        @if image.published {
                            (Badge::new("Published", BadgeColor::Green).rounded(true))
                        } @else {
                            (Badge::new("Private", BadgeColor::Gray).rounded(true))
                        }
                        span class="text-xs text-gray-500" { (image.created_at_utc.format("%Y-%m-%d").to_string()) }
                    }
                    @if !image.published {
                        form action="/history/publish" method="post" class="flex gap-2" {
                            input type="hidden" name="imageId" value=(image.id.to_string());
                            input type="text" name="title" placeholder="Title (optional)" maxlength="100"
                                class="flex-1 px-2 py-1 text-sm border border-gray-300 rounded";
                            button type="submit" class="text-sm text-indigo-600 hover:underline" { "Publish" }
                        }
                    }
                }
            }
        }
    }
}

pub struct Grid {
    pub tiles: Vec<Markup>,
    pub empty_message: String,
}

impl Grid {
    pub fn new(tiles: Vec<Markup>, empty_message: &str) -> Self {
        Self {
            tiles,
            empty_message: empty_message.to_string(),
        }
    }
}

impl Render for Grid {
    fn render(&self) -> Markup {
        html! {
            @if self.tiles.is_empty() {
                p class="text-center text-gray-500 py-12" { (self.empty_message) }
            } @else {
                div class="grid grid-cols-1 sm:grid-cols-2 lg:grid-cols-3 gap-4" {
                    @for tile in &self.tiles {
                        (tile)
                    }
                }
            }
        }
    }
}

/// Previous / next links that keep any other query parameters
pub struct Paginator {
    pub meta: PaginationMeta,
    pub path: String,
    pub extra_query: Vec<(String, String)>,
}

impl Paginator {
    pub fn new(meta: PaginationMeta, path: &str) -> Self {
        Self {
            meta,
            path: path.to_string(),
            extra_query: Vec::new(),
        }
    }

    pub fn keep(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.extra_query.push((key.to_string(), value.to_string()));
        }
        self
    }

    pub fn href(&self, page: i64) -> String {
        let mut query = self.extra_query.clone();
        query.push(("page".to_string(), page.to_string()));
        query.push(("limit".to_string(), self.meta.limit.to_string()));

        let encoded = serde_urlencoded::to_string(&query).unwrap_or_default();
        format!("{}?{}", self.path, encoded)
    }
}

impl Render for Paginator {
    fn render(&self) -> Markup {
        let meta = &self.meta;

        html! {
            @if meta.total_pages > 1 {
                nav class="flex items-center justify-center gap-4 mt-6 text-sm" {
                    @if meta.has_previous() {
                        a href=(self.href(meta.page - 1)) class="text-indigo-600 hover:underline" { "← Previous" }
                    }
                    span class="text-gray-600" { "Page " (meta.page) " of " (meta.total_pages) }
                    @if meta.has_next() {
                        a href=(self.href(meta.page + 1)) class="text-indigo-600 hover:underline" { "Next →" }
                    }
                }
            }
        }
    }
}
