use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Json, Redirect},
    Form,
};
use chrono::Utc;
use maud::{html, Markup};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::api::reject;
use crate::{
    auth::{AuthUser, OptionalUser},
    billing::{
        self,
        db::{Purchase, SubscriptionRecord},
        payments::CheckoutSession,
        plans::{Plan, PlanId},
        webhook::{verify_signature, WebhookEvent, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER},
        Fulfilment,
    },
    components::{
        layout::{Card, NavUser, Notice, NoticeKind, Page},
        ui::{
            badge::{Badge, BadgeColor},
            button::Button,
            heading::Heading,
        },
    },
    errors::{ApiResult, JsonError, ServerResult, WithRedirect as _},
    state::AppState,
    user::User,
};

#[derive(Debug, Default, Deserialize)]
pub struct PricingQuery {
    pub error: Option<String>,
}

fn plan_card(plan: &Plan, signed_in: bool) -> Markup {
    let allowance = if plan.recurring {
        "Unlimited generations, billed monthly".to_string()
    } else {
        format!("{} image credits", plan.credits)
    };

    html! {
        div class="bg-white rounded-xl shadow-md border border-gray-100 p-6 flex flex-col gap-3" {
            (Heading::h3(plan.name))
            p class="text-3xl font-bold text-gray-900" {
                (plan.display_price())
                @if plan.recurring {
                    span class="text-base font-normal text-gray-500" { " / month" }
                }
            }
            p class="text-sm text-gray-600" { (plan.description) }
            p class="text-sm font-medium text-indigo-700" { (allowance) }
            div class="mt-auto" {
                @if !plan.is_purchasable() {
                    (Button::secondary("Unavailable").full_width(true).disabled(true))
                } @else if signed_in {
                    form action="/billing/checkout" method="post" {
                        input type="hidden" name="plan" value=(plan.id.slug());
                        (Button::primary("Buy").button_type("submit").full_width(true))
                    }
                } @else {
                    (Button::primary("Sign in to buy").href("/login").full_width(true))
                }
            }
        }
    }
}

pub async fn pricing_page(
    State(state): State<AppState>,
    OptionalUser { user, .. }: OptionalUser,
    Query(query): Query<PricingQuery>,
) -> Page {
    let signed_in = user.is_some();

    let content = html! {
        @if query.error.is_some() {
            (Notice::new(NoticeKind::Error, "We couldn't start the checkout. Please try again."))
        }
        (Heading::h1("Pricing").subtitle("Buy a credit pack or go unlimited."))
        div class="grid md:grid-cols-2 lg:grid-cols-4 gap-4 mt-6" {
            @for plan in state.plans.all() {
                (plan_card(plan, signed_in))
            }
        }
    };

    Page::new("Pricing", content)
        .user(user.as_ref().map(NavUser::from))
        .active("/pricing")
}

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub plan: String,
}

pub async fn checkout(
    State(state): State<AppState>,
    AuthUser { mut user, .. }: AuthUser,
    Form(form): Form<CheckoutForm>,
) -> ServerResult<Redirect, Redirect> {
    let Some(plan) = PlanId::parse(&form.plan) else {
        info!(plan = %form.plan, "Checkout for an unknown plan");
        return Ok(Redirect::to("/pricing?error=plan"));
    };

    let url = billing::start_checkout(&state, &mut user, plan)
        .await
        .with_redirect(Redirect::to("/pricing?error=checkout"))?;

    Ok(Redirect::to(&url))
}

#[derive(Debug, Default, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Whether a checkout session was started by this user
fn belongs_to(session: &CheckoutSession, user: &User) -> bool {
    let by_metadata = session
        .metadata
        .get("user_id")
        .is_some_and(|id| *id == user.id.to_string());
    let by_customer = session.customer.is_some()
        && session.customer.as_deref() == user.payment_customer_id.as_deref();

    by_metadata || by_customer
}

fn fulfilment_notice(fulfilment: Fulfilment) -> Notice {
    match fulfilment {
        Fulfilment::Fulfilled { credits, .. } if credits == billing::plans::UNLIMITED_CREDITS => {
            Notice::new(NoticeKind::Success, "Your unlimited subscription is active.")
        }
        Fulfilment::Fulfilled { credits, .. } => Notice::new(
            NoticeKind::Success,
            format!("Thanks! {credits} credits were added to your account."),
        ),
        Fulfilment::AlreadyFulfilled => {
            Notice::new(NoticeKind::Success, "Your purchase is complete.")
        }
        Fulfilment::Ignored => Notice::new(
            NoticeKind::Info,
            "Your payment is still processing. Credits will appear shortly.",
        ),
    }
}

pub async fn success_page(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
    Query(query): Query<SuccessQuery>,
) -> ServerResult<Page, StatusCode> {
    let not_found = Notice::new(NoticeKind::Error, "We couldn't find that checkout.");

    let notice = match query.session_id.as_deref().filter(|id| !id.is_empty()) {
        None => not_found,
        Some(session_id) => match state.payments.retrieve_checkout_session(session_id).await {
            Ok(session) if belongs_to(&session, &user) => {
                fulfilment_notice(billing::fulfil_checkout(&state, &session).await?)
            }
            Ok(_) => {
                warn!(user_id = %user.id, %session_id, "Checkout session belongs to someone else");
                not_found
            }
            Err(err) if err.is_not_found() => not_found,
            Err(err) => return Err(err.into()),
        },
    };

    let user = User::get_by_id(&state.db, user.id).await?.unwrap_or(user);

    let content = html! {
        (Card::new(html! {
            (Heading::h2("Checkout"))
            (notice)
            p class="text-gray-700 mb-4" { "Your balance: " strong { (user.credits) } " credits" }
            div class="flex gap-3" {
                (Button::primary("Start generating").href("/generate"))
                (Button::secondary("View billing").href("/billing"))
            }
        }))
    };

    Ok(Page::new("Checkout complete", content).user(Some(NavUser::from(&user))))
}

fn purchase_rows(purchases: &[Purchase]) -> Markup {
    html! {
        table class="w-full text-sm" {
            thead {
                tr class="text-left text-gray-500 border-b" {
                    th class="py-2" { "Date" }
                    th { "Credits" }
                    th { "Amount" }
                    th { "Status" }
                }
            }
            tbody {
                @for purchase in purchases {
                    tr class="border-b border-gray-100" {
                        td class="py-2" { (purchase.created_at_utc.format("%Y-%m-%d").to_string()) }
                        td { (purchase.credits) }
                        td { (purchase.display_amount()) }
                        td { (purchase.status) }
                    }
                }
            }
        }
    }
}

pub async fn billing_page(
    State(state): State<AppState>,
    AuthUser { user, .. }: AuthUser,
) -> ServerResult<Page, StatusCode> {
    let subscription = SubscriptionRecord::active_for_user(&state.db, user.id).await?;
    let purchases = Purchase::history(&state.db, user.id).await?;

    let content = html! {
        (Heading::h1("Billing"))
        div class="grid md:grid-cols-2 gap-4 my-6" {
            (Card::new(html! {
                (Heading::h3("Balance"))
                p class="text-3xl font-bold" { (user.credits) }
                p class="text-sm text-gray-500 mb-4" { "credits remaining" }
                (Button::primary("Buy more").href("/pricing"))
            }).with_max_width("max-w-full"))
            (Card::new(html! {
                (Heading::h3("Subscription"))
                @match &subscription {
                    Some(sub) => {
                        (Badge::new(sub.status.clone(), BadgeColor::Green).rounded(true))
                        p class="text-sm text-gray-600 mt-2" {
                            "Renews " (sub.current_period_end.format("%Y-%m-%d").to_string())
                        }
                    }
                    None => {
                        p class="text-sm text-gray-600" { "No active subscription." }
                    }
                }
            }).with_max_width("max-w-full"))
        }
        (Heading::h2("Purchases"))
        @if purchases.is_empty() {
            p class="text-gray-500" { "No purchases yet." }
        } @else {
            (purchase_rows(&purchases))
        }
    };

    Ok(Page::new("Billing", content)
        .user(Some(NavUser::from(&user)))
        .active("/billing"))
}

/// Payment provider events. Failures after verification are 500s so the
/// provider retries; every handler is idempotent.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(err) = verify_signature(
        &body,
        signature,
        state.payments.webhook_secret(),
        Utc::now().timestamp(),
        DEFAULT_TOLERANCE_SECS,
    ) {
        return reject(JsonError::bad_request(err.to_string()), err);
    }

    let event = match WebhookEvent::parse(&body) {
        Ok(event) => event,
        Err(err) => return reject(JsonError::bad_request(err.to_string()), err),
    };

    let handled = match &event {
        WebhookEvent::CheckoutCompleted(session) => billing::fulfil_checkout(&state, session)
            .await
            .map(|fulfilment| info!(?fulfilment, "Checkout webhook handled")),
        WebhookEvent::InvoicePaid(invoice) => match &invoice.subscription {
            Some(subscription_id) => billing::handle_invoice_paid(&state, subscription_id).await,
            None => {
                info!(invoice_id = %invoice.id, "Invoice without a subscription, ignoring");
                Ok(())
            }
        },
        WebhookEvent::SubscriptionDeleted(subscription) => {
            billing::handle_subscription_deleted(&state, &subscription.id).await
        }
        WebhookEvent::Other { id, kind } => {
            info!(event_id = %id, %kind, "Unhandled webhook event");
            Ok(())
        }
    };

    if let Err(err) = handled {
        return reject(JsonError::internal("Webhook handler failed"), err);
    }

    Ok(Json(json!({ "received": true })))
}
