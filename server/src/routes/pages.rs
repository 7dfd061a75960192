use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use maud::{html, Markup};
use serde::Deserialize;
use tracing::info;

use super::api::{feeds::FeedQuery, images::requester};
use crate::{
    auth::{AuthUser, OptionalUser},
    components::{
        form::{Form as HtmlForm, InputField, Select, TextArea},
        gallery::{FeedTile, Grid, HistoryTile, Paginator},
        layout::{Card, NavUser, Notice, NoticeKind, Page},
        ui::{
            badge::LimitBadge,
            button::Button,
            heading::Heading,
        },
    },
    cookies::CookieJar,
    credits::{can_generate, LimitStatus},
    errors::{JsonError, ServerResult},
    generation::{
        service::{self, GenerateError, Generated},
        ColorScheme, GenerateImageInput, Orientation, DEFAULT_GUIDANCE_SCALE, PROMPT_MAX_CHARS,
    },
    images::{validate_title, Image, TITLE_MAX_CHARS},
    pagination::{Pagination, PaginationMeta},
    state::AppState,
    validation::{non_empty, parse_id, Issue},
};

#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    pub login_error: Option<String>,
}

pub async fn home(
    State(state): State<AppState>,
    OptionalUser { user, .. }: OptionalUser,
    Query(query): Query<HomeQuery>,
) -> ServerResult<Page, StatusCode> {
    let (recent, _) = Image::feed(
        &state.db,
        user.as_ref().map(|u| u.id),
        None,
        Pagination::new(1, 8),
    )
    .await?;

    let tiles = recent.iter().map(|card| html! { (FeedTile(card)) }).collect();

    let content = html! {
        @if query.login_error.is_some() {
            (Notice::new(NoticeKind::Error, "Sign in failed. Please try again."))
        }
        section class="text-center py-10 space-y-4" {
            (Heading::h1("Turn your ideas into images")
                .subtitle("Describe what you want to see and Imagic paints it for you."))
            div class="flex justify-center gap-3" {
                (Button::primary("Start generating").href("/generate"))
                (Button::secondary("Browse the feed").href("/feed"))
            }
        }
        section class="space-y-4" {
            (Heading::h2("Recently published"))
            (Grid::new(tiles, "Nothing has been published yet."))
        }
    };

    Ok(Page::new("Home", content)
        .user(user.as_ref().map(NavUser::from))
        .active("/"))
}

/// Fields as posted by the generate form; numbers arrive as text
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateForm {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub color_scheme: Option<String>,
    #[serde(default)]
    pub orientation: String,
    #[serde(default)]
    pub guidance_scale: Option<String>,
    #[serde(default)]
    pub seed: Option<String>,
}

impl GenerateForm {
    fn to_input(&self) -> Result<GenerateImageInput, Vec<Issue>> {
        let mut issues = Vec::new();

        let guidance_scale = match non_empty(self.guidance_scale.clone()) {
            None => None,
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    issues.push(Issue::new("guidanceScale", "Guidance scale must be a number"));
                    None
                }
            },
        };

        let seed = match non_empty(self.seed.clone()) {
            None => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    issues.push(Issue::new("seed", "Seed must be a whole number"));
                    None
                }
            },
        };

        if !issues.is_empty() {
            return Err(issues);
        }

        Ok(GenerateImageInput {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            color_scheme: self.color_scheme.clone(),
            orientation: self.orientation.clone(),
            guidance_scale,
            seed,
        })
    }
}

fn issue_for<'a>(issues: &'a [Issue], path: &str) -> Option<&'a str> {
    issues
        .iter()
        .find(|issue| issue.path == path)
        .map(|issue| issue.message.as_str())
}

fn generate_form(values: &GenerateForm, issues: &[Issue], status: &LimitStatus) -> Markup {
    let default_guidance = DEFAULT_GUIDANCE_SCALE.to_string();
    let orientation = if values.orientation.is_empty() {
        Orientation::Square.as_str()
    } else {
        values.orientation.as_str()
    };

    let mut color_schemes = Select::new("colorScheme")
        .label("Color scheme")
        .option("", "Any")
        .selected(values.color_scheme.as_deref())
        .error(issue_for(issues, "colorScheme"));
    for scheme in ColorScheme::ALL {
        color_schemes = color_schemes.option(scheme.as_str(), scheme.as_str());
    }

    let mut orientations = Select::new("orientation")
        .label("Orientation")
        .selected(Some(orientation))
        .error(issue_for(issues, "orientation"));
    for option in Orientation::ALL {
        orientations = orientations.option(option.as_str(), option.label());
    }

    let fields = html! {
        (TextArea::new("prompt")
            .label("Prompt")
            .placeholder("A lighthouse on a cliff at dusk, oil painting")
            .value(Some(values.prompt.as_str()))
            .rows(4)
            .max_length(PROMPT_MAX_CHARS)
            .required(true)
            .error(issue_for(issues, "prompt")))
        (TextArea::new("negativePrompt")
            .label("Avoid (optional)")
            .value(values.negative_prompt.as_deref())
            .rows(2)
            .error(issue_for(issues, "negativePrompt")))
        div class="grid md:grid-cols-2 gap-4" {
            (color_schemes)
            (orientations)
        }
        div class="grid md:grid-cols-2 gap-4" {
            (InputField::new("guidanceScale")
                .label("Guidance scale")
                .input_type("number")
                .range("0", "10", "0.5")
                .value(values.guidance_scale.as_deref().unwrap_or(&default_guidance))
                .error(issue_for(issues, "guidanceScale")))
            (InputField::new("seed")
                .label("Seed (optional)")
                .input_type("number")
                .value(values.seed.as_deref().unwrap_or(""))
                .error(issue_for(issues, "seed")))
        }
        (Button::primary("Generate")
            .button_type("submit")
            .full_width(true)
            .disabled(!status.allowed))
    };

    html! {
        div class="flex items-center justify-between mb-4" {
            (Heading::h2("Create an image"))
            (LimitBadge(status))
        }
        (HtmlForm::new("/generate", "post", fields))
    }
}

fn generate_layout(form: Markup, result: Option<Markup>, is_guest: bool) -> Markup {
    html! {
        div class="grid lg:grid-cols-2 gap-6" {
            (Card::new(form).with_max_width("max-w-full"))
            div class="space-y-4" {
                @if let Some(result) = result {
                    (result)
                }
                @if is_guest {
                    (Notice::new(
                        NoticeKind::Info,
                        "Images made without an account live in this browser only. Sign in to keep them.",
                    ))
                    (Heading::h3("Your images on this device"))
                    div id="local-images" class="grid grid-cols-2 gap-3" {}
                }
            }
        }
    }
}

pub async fn generate_page(
    State(state): State<AppState>,
    user: OptionalUser,
    cookies: CookieJar,
) -> Page {
    let nav = user.user.as_ref().map(NavUser::from);
    let requester = requester(user, &cookies);
    let status = can_generate(&requester, &state.limits);

    let form = generate_form(&GenerateForm::default(), &[], &status);

    Page::new(
        "Generate",
        generate_layout(form, None, requester.is_guest()),
    )
    .user(nav)
    .active("/generate")
}

fn generated_image(image_url: &str, prompt: &str, caption: Markup) -> Markup {
    html! {
        figure class="bg-white rounded-xl shadow-md overflow-hidden" {
            img src=(image_url) alt=(prompt) class="w-full object-cover";
            figcaption class="p-4 space-y-2 text-sm text-gray-700" {
                p { (prompt) }
                (caption)
            }
        }
    }
}

fn generate_failure(err: &GenerateError, is_guest: bool) -> Markup {
    let JsonError { message, .. } = err.to_json_error();

    html! {
        (Notice::new(NoticeKind::Error, message))
        @match err {
            GenerateError::LimitReached(_) if is_guest => {
                (Button::primary("Sign in for more").href("/login"))
            }
            GenerateError::LimitReached(_) | GenerateError::InsufficientCredits => {
                (Button::primary("Buy credits").href("/pricing"))
            }
            _ => {}
        }
    }
}

pub async fn generate_submit(
    State(state): State<AppState>,
    user: OptionalUser,
    cookies: CookieJar,
    Form(values): Form<GenerateForm>,
) -> ServerResult<Page, StatusCode> {
    let mut nav = user.user.as_ref().map(NavUser::from);
    let requester = requester(user, &cookies);
    let is_guest = requester.is_guest();
    let before = can_generate(&requester, &state.limits);

    let input = match values.to_input() {
        Ok(input) => input,
        Err(issues) => {
            let form = generate_form(&values, &issues, &before);
            return Ok(Page::new("Generate", generate_layout(form, None, is_guest))
                .user(nav)
                .active("/generate"));
        }
    };

    let (status, issues, result) = match service::generate(&state, requester, input).await {
        Ok(Generated::Saved { image, limit }) => {
            if let Some(nav) = nav.as_mut() {
                nav.credits = limit.remaining;
            }
            let caption = html! {
                a href="/history" class="text-indigo-600 hover:underline" { "Saved to your history" }
            };
            let result = generated_image(&image.image_url, &image.prompt, caption);
            (limit, Vec::new(), result)
        }
        Ok(Generated::Local {
            image,
            usage,
            limit,
        }) => {
            cookies.add(usage.to_cookie()?);
            let local = serde_json::to_string(&image)?;
            let caption = html! {
                div data-local-image=(local) {}
                a href="/login" class="text-indigo-600 hover:underline" { "Sign in to save it to your account" }
            };
            let result = generated_image(&image.image_url, &image.prompt, caption);
            (limit, Vec::new(), result)
        }
        Err(GenerateError::Invalid(issues)) => (before, issues, html! {}),
        Err(err) => {
            info!(error = %err, "Generation from the form failed");
            let failure = generate_failure(&err, is_guest);
            let status = match err {
                GenerateError::LimitReached(status) => status,
                _ => before,
            };
            (status, Vec::new(), failure)
        }
    };

    let form = generate_form(&values, &issues, &status);

    Ok(Page::new("Generate", generate_layout(form, Some(result), is_guest))
        .user(nav)
        .active("/generate"))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub notice: Option<String>,
}

fn history_notice(code: &str) -> Option<Notice> {
    match code {
        "published" => Some(Notice::new(NoticeKind::Success, "Image published to the feed.")),
        "not_found" => Some(Notice::new(
            NoticeKind::Error,
            "Image not found or you don't have permission.",
        )),
        "invalid_title" => Some(Notice::new(
            NoticeKind::Error,
            format!("Titles can be at most {TITLE_MAX_CHARS} characters."),
        )),
        _ => None,
    }
}

pub async fn history_page(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> ServerResult<Page, StatusCode> {
    let pagination = Pagination::from_raw(query.page.as_deref(), query.limit.as_deref());
    let (images, total) = Image::history(&state.db, user.id, pagination).await?;
    let meta = PaginationMeta::new(pagination, total);

    let tiles = images.iter().map(|image| html! { (HistoryTile(image)) }).collect();

    let content = html! {
        @if let Some(notice) = query.notice.as_deref().and_then(history_notice) {
            (notice)
        }
        (Heading::h1("Your images").subtitle("Publish an image to share it on the feed."))
        (Grid::new(tiles, "You haven't generated anything yet."))
        (Paginator::new(meta, "/history"))
    };

    Ok(Page::new("History", content)
        .user(Some(NavUser::from(&user)))
        .active("/history"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishForm {
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn history_publish(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    Form(form): Form<PublishForm>,
) -> ServerResult<Redirect, StatusCode> {
    let Ok(image_id) = parse_id("imageId", &form.image_id) else {
        return Ok(Redirect::to("/history?notice=not_found"));
    };

    let Ok(title) = validate_title(form.title) else {
        return Ok(Redirect::to("/history?notice=invalid_title"));
    };

    match Image::publish(&state.db, image_id, user.id, title.as_deref()).await? {
        Some(_) => Ok(Redirect::to("/history?notice=published")),
        None => Ok(Redirect::to("/history?notice=not_found")),
    }
}

pub async fn feed_page(
    State(state): State<AppState>,
    OptionalUser { user, .. }: OptionalUser,
    Query(query): Query<FeedQuery>,
) -> ServerResult<Page, StatusCode> {
    let pagination = query.pagination();
    let search = query.search();

    let (images, total) = Image::feed(
        &state.db,
        user.as_ref().map(|u| u.id),
        search.as_deref(),
        pagination,
    )
    .await?;
    let meta = PaginationMeta::new(pagination, total);

    let tiles = images.iter().map(|card| html! { (FeedTile(card)) }).collect();
    let search_fields = html! {
        div class="flex gap-2" {
            input type="search" name="search" value=(search.as_deref().unwrap_or(""))
                placeholder="Search prompts and titles"
                class="flex-1 px-3 py-2 border border-gray-300 rounded-lg";
            (Button::secondary("Search").button_type("submit"))
        }
    };

    let content = html! {
        (Heading::h1("Feed").subtitle("Images the community has published."))
        (HtmlForm::new("/feed", "get", search_fields).extra_classes("mb-6"))
        (Grid::new(tiles, "No images match your search."))
        (Paginator::new(meta, "/feed").keep("search", search.as_deref()))
    };

    Ok(Page::new("Feed", content)
        .user(user.as_ref().map(NavUser::from))
        .active("/feed"))
}

/// API paths get the JSON error shape, everything else an HTML page
pub async fn not_found(uri: Uri) -> Response {
    if uri.path().starts_with("/api/") {
        return JsonError::not_found("Not found").into_response();
    }

    let content = html! {
        div class="text-center py-16 space-y-4" {
            (Heading::h1("Page not found"))
            p class="text-gray-600" { "There is nothing at " code { (uri.path()) } "." }
            (Button::primary("Go home").href("/"))
        }
    };

    (StatusCode::NOT_FOUND, Page::new("Not found", content)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credits::user_status;

    #[test]
    fn form_numbers_are_parsed() {
        let form = GenerateForm {
            prompt: "a red fox".into(),
            orientation: Orientation::Square.as_str().into(),
            guidance_scale: Some("4.5".into()),
            seed: Some("42".into()),
            ..Default::default()
        };

        let input = form.to_input().unwrap();
        assert_eq!(input.guidance_scale, Some(4.5));
        assert_eq!(input.seed, Some(42));
    }

    #[test]
    fn blank_numbers_fall_back_to_defaults() {
        let form = GenerateForm {
            guidance_scale: Some(" ".into()),
            seed: Some(String::new()),
            ..Default::default()
        };

        let input = form.to_input().unwrap();
        assert_eq!(input.guidance_scale, None);
        assert_eq!(input.seed, None);
    }

    #[test]
    fn junk_numbers_are_field_issues() {
        let form = GenerateForm {
            guidance_scale: Some("lots".into()),
            seed: Some("1.5".into()),
            ..Default::default()
        };

        let issues = form.to_input().unwrap_err();
        assert_eq!(
            issue_for(&issues, "guidanceScale"),
            Some("Guidance scale must be a number")
        );
        assert_eq!(issue_for(&issues, "seed"), Some("Seed must be a whole number"));
    }

    #[test]
    fn generate_form_shows_field_errors_and_limit() {
        let issues = vec![Issue::new("prompt", "Prompt must be at least 3 characters")];
        let html = generate_form(&GenerateForm::default(), &issues, &user_status(2))
            .into_string();

        assert!(html.contains("Prompt must be at least 3 characters"));
        assert!(html.contains("limit-badge"));
        assert!(html.contains("square 1024x1024"));
    }

    #[test]
    fn guests_get_a_local_images_container() {
        let html = generate_layout(html! {}, None, true).into_string();
        assert!(html.contains("id=\"local-images\""));

        let html = generate_layout(html! {}, None, false).into_string();
        assert!(!html.contains("local-images"));
    }

    #[test]
    fn unknown_history_notices_are_ignored() {
        assert!(history_notice("published").is_some());
        assert!(history_notice("<script>").is_none());
    }
}
