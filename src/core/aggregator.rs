use crate::core::{AggregatedResult, Offer, QuoteOutcome, Route, TierResult, WeightTier};

/// Minimum-price offer; ties keep the first one seen. NaN prices are ignored.
pub fn cheapest_offer(offers: &[Offer]) -> Option<&Offer> {
    let mut best: Option<&Offer> = None;
    for offer in offers.iter().filter(|o| o.price.is_finite()) {
        match best {
            Some(current) if offer.price >= current.price => {}
            _ => best = Some(offer),
        }
    }
    best
}

/// 一條路線在所有級距的報價結果，依級距順序收集
#[derive(Debug, Clone)]
pub struct RouteQuotes {
    pub route: Route,
    pub outcomes: Vec<(WeightTier, QuoteOutcome)>,
}

impl RouteQuotes {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, tier: WeightTier, outcome: QuoteOutcome) {
        self.outcomes.push((tier, outcome));
    }
}

#[derive(Debug, Clone)]
pub struct OfferAggregator {
    tiers: Vec<WeightTier>,
}

impl OfferAggregator {
    pub fn new(tiers: Vec<WeightTier>) -> Self {
        Self { tiers }
    }

    /// 每個請求的級距都會有一筆結果，沒有報價就標記為 unavailable
    pub fn aggregate(&self, quotes: &RouteQuotes) -> AggregatedResult {
        let tiers = self
            .tiers
            .iter()
            .map(|&tier| {
                let mut offers: Vec<Offer> = Vec::new();
                let mut last_reason: Option<&str> = None;

                for (_, outcome) in quotes.outcomes.iter().filter(|(t, _)| *t == tier) {
                    match outcome {
                        QuoteOutcome::Offers(found) => offers.extend(found.iter().cloned()),
                        QuoteOutcome::Unavailable { reason } => last_reason = Some(reason.as_str()),
                    }
                }

                let result = match cheapest_offer(&offers) {
                    Some(offer) => TierResult::Cheapest(offer.clone()),
                    None => TierResult::Unavailable {
                        reason: last_reason
                            .map(str::to_string)
                            .unwrap_or_else(|| "no offers".to_string()),
                    },
                };
                (tier, result)
            })
            .collect();

        AggregatedResult {
            route: quotes.route.clone(),
            tiers,
        }
    }

    pub fn aggregate_all(&self, quotes: &[RouteQuotes]) -> Vec<AggregatedResult> {
        quotes.iter().map(|q| self.aggregate(q)).collect()
    }
}
