//! Provider pricing models

use serde::{Deserialize, Serialize};

/// How a provider bills for a unit of work
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PricingKind {
	/// Flat price per call
	PerRequest,
	/// Price per KB of payload
	PerUnitSize,
	/// Price per second of processing
	PerTime,
	/// Monthly fee, prorated over an assumed request volume
	Subscription,
}

/// Volume bracket for tiered pricing
///
/// A tier applies while the provider's usage counter is at or below `up_to`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingTier {
	pub up_to: u64,
	pub price: f64,
}

/// Free allowance granted by the provider each billing period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeTier {
	pub monthly_allowance: u64,
}

/// Pricing description attached to every provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingModel {
	pub kind: PricingKind,
	pub base_price: f64,
	#[serde(default)]
	pub tiers: Vec<PricingTier>,
	#[serde(default)]
	pub free_tier: Option<FreeTier>,
}

impl PricingModel {
	/// Flat per-request pricing without tiers or free allowance
	pub fn per_request(base_price: f64) -> Self {
		Self {
			kind: PricingKind::PerRequest,
			base_price,
			tiers: Vec::new(),
			free_tier: None,
		}
	}

	pub fn with_kind(kind: PricingKind, base_price: f64) -> Self {
		Self {
			kind,
			base_price,
			tiers: Vec::new(),
			free_tier: None,
		}
	}

	pub fn with_tiers(mut self, mut tiers: Vec<PricingTier>) -> Self {
		tiers.sort_by_key(|tier| tier.up_to);
		self.tiers = tiers;
		self
	}

	pub fn with_free_tier(mut self, monthly_allowance: u64) -> Self {
		self.free_tier = Some(FreeTier { monthly_allowance });
		self
	}

	/// Unit price for the given usage level
	///
	/// Picks the first bracket covering `usage`; past the last bracket (or
	/// without brackets) the base price applies.
	pub fn unit_price(&self, usage: u64) -> f64 {
		self.tiers
			.iter()
			.find(|tier| usage <= tier.up_to)
			.map(|tier| tier.price)
			.unwrap_or(self.base_price)
	}

	/// Whether the free allowance still covers the next call
	pub fn is_within_free_tier(&self, usage: u64) -> bool {
		self.free_tier
			.as_ref()
			.is_some_and(|free| usage < free.monthly_allowance)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unit_price_uses_matching_tier() {
		let pricing = PricingModel::per_request(0.01).with_tiers(vec![
			PricingTier {
				up_to: 1000,
				price: 0.005,
			},
			PricingTier {
				up_to: 100,
				price: 0.008,
			},
		]);

		assert_eq!(pricing.unit_price(50), 0.008);
		assert_eq!(pricing.unit_price(500), 0.005);
		assert_eq!(pricing.unit_price(5000), 0.01);
	}

	#[test]
	fn test_free_tier_allowance() {
		let pricing = PricingModel::per_request(0.01).with_free_tier(10);
		assert!(pricing.is_within_free_tier(9));
		assert!(!pricing.is_within_free_tier(10));
		assert!(!PricingModel::per_request(0.01).is_within_free_tier(0));
	}
}
