use serde::Serialize;

/// Balance granted by an active subscription, standing in for "unlimited"
pub const UNLIMITED_CREDITS: i32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Starter,
    Creator,
    Professional,
    Unlimited,
}

impl PlanId {
    pub fn slug(&self) -> &'static str {
        match self {
            PlanId::Starter => "starter",
            PlanId::Creator => "creator",
            PlanId::Professional => "professional",
            PlanId::Unlimited => "unlimited",
        }
    }

    pub fn parse(slug: &str) -> Option<Self> {
        match slug.trim().to_ascii_lowercase().as_str() {
            "starter" => Some(PlanId::Starter),
            "creator" => Some(PlanId::Creator),
            "professional" => Some(PlanId::Professional),
            "unlimited" => Some(PlanId::Unlimited),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: PlanId,
    pub name: &'static str,
    pub description: &'static str,
    pub credits: i32,
    /// Price in cents
    pub price: i64,
    /// Monthly subscription rather than a one off purchase
    pub recurring: bool,
    /// The payment provider's price id; plans without one can't be bought
    pub price_id: Option<String>,
}

impl Plan {
    pub fn display_price(&self) -> String {
        format!("${}.{:02}", self.price / 100, self.price % 100)
    }

    pub fn checkout_mode(&self) -> &'static str {
        if self.recurring {
            "subscription"
        } else {
            "payment"
        }
    }

    pub fn is_purchasable(&self) -> bool {
        self.price_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(
        starter: Option<String>,
        creator: Option<String>,
        professional: Option<String>,
        unlimited: Option<String>,
    ) -> Self {
        let plans = vec![
            Plan {
                id: PlanId::Starter,
                name: "Starter",
                description: "Perfect for trying out the service",
                credits: 10,
                price: 499,
                recurring: false,
                price_id: starter,
            },
            Plan {
                id: PlanId::Creator,
                name: "Creator",
                description: "Great for regular content creators",
                credits: 50,
                price: 1999,
                recurring: false,
                price_id: creator,
            },
            Plan {
                id: PlanId::Professional,
                name: "Professional",
                description: "For professionals and businesses",
                credits: 200,
                price: 4999,
                recurring: false,
                price_id: professional,
            },
            Plan {
                id: PlanId::Unlimited,
                name: "Unlimited",
                description: "Unlimited generations for power users",
                credits: UNLIMITED_CREDITS,
                price: 9999,
                recurring: true,
                price_id: unlimited,
            },
        ];

        Self { plans }
    }

    /// Price ids come from `PRICE_*`; unset ones leave the plan listed but not purchasable
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self::new(
            var("PRICE_STARTER"),
            var("PRICE_CREATOR"),
            var("PRICE_PROFESSIONAL"),
            var("PRICE_UNLIMITED"),
        )
    }

    pub fn all(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get(&self, id: PlanId) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }

    pub fn by_price_id(&self, price_id: &str) -> Option<&Plan> {
        self.plans
            .iter()
            .find(|p| p.price_id.as_deref() == Some(price_id))
    }
}

/// Credits for a one off payment when the plan can't be identified
pub fn credits_for_amount(amount: i64) -> i32 {
    match amount {
        499 => 10,
        1999 => 50,
        4999 => 200,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PlanCatalog {
        PlanCatalog::new(
            Some("price_starter".into()),
            None,
            Some("price_pro".into()),
            Some("price_unlimited".into()),
        )
    }

    #[test]
    fn catalog_lists_all_four_plans_in_order() {
        let names: Vec<_> = catalog().all().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Starter", "Creator", "Professional", "Unlimited"]);
    }

    #[test]
    fn plans_without_price_ids_are_not_purchasable() {
        let catalog = catalog();
        assert!(catalog.get(PlanId::Starter).unwrap().is_purchasable());
        assert!(!catalog.get(PlanId::Creator).unwrap().is_purchasable());
    }

    #[test]
    fn only_unlimited_is_a_subscription() {
        let catalog = catalog();
        assert_eq!(catalog.get(PlanId::Unlimited).unwrap().checkout_mode(), "subscription");
        assert_eq!(catalog.get(PlanId::Professional).unwrap().checkout_mode(), "payment");
        assert_eq!(catalog.get(PlanId::Unlimited).unwrap().credits, UNLIMITED_CREDITS);
    }

    #[test]
    fn lookup_by_price_id() {
        assert_eq!(catalog().by_price_id("price_pro").unwrap().id, PlanId::Professional);
        assert!(catalog().by_price_id("price_missing").is_none());
    }

    #[test]
    fn display_price_formats_cents() {
        let catalog = catalog();
        assert_eq!(catalog.get(PlanId::Starter).unwrap().display_price(), "$4.99");
        assert_eq!(catalog.get(PlanId::Unlimited).unwrap().display_price(), "$99.99");
    }

    #[test]
    fn amount_fallback_matches_known_prices() {
        assert_eq!(credits_for_amount(499), 10);
        assert_eq!(credits_for_amount(1999), 50);
        assert_eq!(credits_for_amount(4999), 200);
        assert_eq!(credits_for_amount(123), 0);
    }

    #[test]
    fn plan_slugs_roundtrip() {
        for plan in catalog().all() {
            assert_eq!(PlanId::parse(plan.id.slug()), Some(plan.id));
        }
        assert_eq!(PlanId::parse(" Creator "), Some(PlanId::Creator));
        assert_eq!(PlanId::parse("enterprise"), None);
    }
}
