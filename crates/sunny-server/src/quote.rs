//! Solar panel cleaning quotes

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("No pricing tier matched {0} panels")]
    NoTier(u32),

    #[error("Solar panel pricing is not configured: {0}")]
    Config(String),

    #[error("Failed to read pricing file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pricing file: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a tier computes its price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TierPrice {
    /// Fixed amount for the whole job
    Flat {
        #[serde(serialize_with = "serialize_amount")]
        amount: f64,
    },
    /// Rate multiplied by the panel count
    PerPanel {
        #[serde(serialize_with = "serialize_amount")]
        rate: f64,
    },
}

/// Inclusive panel-count range and its price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub min: u32,
    pub max: u32,
    #[serde(flatten)]
    pub price: TierPrice,
}

impl PricingTier {
    fn contains(&self, panel_count: u32) -> bool {
        (self.min..=self.max).contains(&panel_count)
    }

    fn price_for(&self, panel_count: u32) -> f64 {
        match self.price {
            TierPrice::Flat { amount } => amount,
            TierPrice::PerPanel { rate } => rate * f64::from(panel_count),
        }
    }
}

/// Pricing for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePricing {
    /// Larger jobs are priced by a specialist
    pub over_max_panels: u32,
    pub tiers: Vec<PricingTier>,
}

/// Pricing file layout: `{"pricing": {"solarPanelCleaning": {...}}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    pub pricing: Services,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Services {
    pub solar_panel_cleaning: Option<ServicePricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            pricing: Services {
                solar_panel_cleaning: Some(ServicePricing {
                    over_max_panels: 60,
                    tiers: vec![
                        PricingTier {
                            min: 1,
                            max: 10,
                            price: TierPrice::Flat { amount: 99.0 },
                        },
                        PricingTier {
                            min: 11,
                            max: 30,
                            price: TierPrice::PerPanel { rate: 8.5 },
                        },
                        PricingTier {
                            min: 31,
                            max: 60,
                            price: TierPrice::PerPanel { rate: 7.25 },
                        },
                    ],
                }),
            },
        }
    }
}

/// A priced job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedQuote {
    #[serde(serialize_with = "serialize_amount")]
    pub price: f64,
    pub price_text: String,
    pub panel_count: u32,
    pub tier_matched: PricingTier,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Quote {
    Priced(PricedQuote),
    /// Too large to price automatically
    NeedsDetails { message: String },
}

impl Quote {
    /// Response body: `{ok: true, ...}` or `{ok: false, needs, message}`
    pub fn to_json(&self) -> Value {
        match self {
            Quote::Priced(quote) => {
                let mut body = json!({ "ok": true });
                if let (Some(body), Ok(Value::Object(fields))) =
                    (body.as_object_mut(), serde_json::to_value(quote))
                {
                    body.extend(fields);
                }
                body
            }
            Quote::NeedsDetails { message } => json!({
                "ok": false,
                "needs": ["details"],
                "message": message,
            }),
        }
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, panel_count: u32) -> Result<Quote, QuoteError>;
}

/// Quotes from a [`PricingTable`]
#[derive(Debug, Clone, Default)]
pub struct TieredPricing {
    table: PricingTable,
}

impl TieredPricing {
    pub fn new(table: PricingTable) -> Self {
        Self { table }
    }

    /// Load a JSON pricing table
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, QuoteError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&raw)?))
    }

    pub fn table(&self) -> &PricingTable {
        &self.table
    }

    /// Price a job synchronously
    pub fn calculate(&self, panel_count: u32) -> Result<Quote, QuoteError> {
        let service = self
            .table
            .pricing
            .solar_panel_cleaning
            .as_ref()
            .ok_or_else(|| QuoteError::Config("missing solarPanelCleaning".to_string()))?;

        if panel_count > service.over_max_panels {
            return Ok(Quote::NeedsDetails {
                message: format!(
                    "For systems over {} panels, pricing is handled by a specialist after collecting a few details.",
                    service.over_max_panels
                ),
            });
        }

        let tier = service
            .tiers
            .iter()
            .find(|tier| tier.contains(panel_count))
            .ok_or(QuoteError::NoTier(panel_count))?;

        let price = round_cents(tier.price_for(panel_count));
        debug!(panel_count, price, "Calculated quote");

        Ok(Quote::Priced(PricedQuote {
            price,
            price_text: format!("${:.2}", price),
            panel_count,
            tier_matched: tier.clone(),
        }))
    }
}

#[async_trait]
impl QuoteProvider for TieredPricing {
    async fn quote(&self, panel_count: u32) -> Result<Quote, QuoteError> {
        self.calculate(panel_count)
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whole amounts serialize as integers (`99`, not `99.0`)
fn serialize_amount<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
