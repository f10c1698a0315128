use cp_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{OrderItem, OrderTotals};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Item {0} has an invalid quantity: {1}")]
    InvalidQuantity(String, i64),
    #[error("Item {0} has a negative price")]
    NegativePrice(String),
    #[error("Discount {discount} is invalid for a subtotal of {subtotal}")]
    InvalidDiscount { discount: Money, subtotal: Money },
    #[error("The order amounts are too large to be represented")]
    AmountOverflow,
}

/// Turns a cart into order totals.
///
/// `total = subtotal - discount + delivery_fee + tax`, where tax is charged on the discounted subtotal and delivery is
/// free once the discounted subtotal reaches `free_delivery_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub free_delivery_threshold: Money,
    pub delivery_fee: Money,
    pub tax_rate_bps: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { free_delivery_threshold: Money::from_rupees(500), delivery_fee: Money::from_rupees(40), tax_rate_bps: 0 }
    }
}

impl PricingPolicy {
    pub fn validate_items(items: &[OrderItem]) -> Result<(), PricingError> {
        if items.is_empty() {
            return Err(PricingError::EmptyOrder);
        }
        for item in items {
            if item.quantity < 1 {
                return Err(PricingError::InvalidQuantity(item.product_id.clone(), item.quantity));
            }
            if item.unit_price.is_negative() {
                return Err(PricingError::NegativePrice(item.product_id.clone()));
            }
        }
        Ok(())
    }

    pub fn calculate(&self, items: &[OrderItem], discount: Money) -> Result<OrderTotals, PricingError> {
        Self::validate_items(items)?;
        let subtotal = items
            .iter()
            .map(OrderItem::line_total)
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
            .ok_or(PricingError::AmountOverflow)?;
        if discount.is_negative() || discount > subtotal {
            return Err(PricingError::InvalidDiscount { discount, subtotal });
        }
        let discounted = subtotal - discount;
        let delivery_fee =
            if discounted >= self.free_delivery_threshold { Money::default() } else { self.delivery_fee };
        let tax = discounted.basis_points(self.tax_rate_bps).ok_or(PricingError::AmountOverflow)?;
        let total = discounted
            .checked_add(delivery_fee)
            .and_then(|t| t.checked_add(tax))
            .ok_or(PricingError::AmountOverflow)?;
        Ok(OrderTotals { subtotal, discount, delivery_fee, tax, total })
    }
}
