//! Shipping Methods

use serde::{Deserialize, Serialize};

use crate::prices::Price;

/// A shipping option offered by the cart service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethod {
    /// Server id
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Price of the method
    pub price: Price,

    /// Estimated transit time in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<u32>,

    /// Whether this method should be selected when nothing else is
    #[serde(default)]
    pub is_default: bool,
}

/// Returns the method flagged as default, if any.
pub fn default_method(methods: &[ShippingMethod]) -> Option<&ShippingMethod> {
    methods.iter().find(|method| method.is_default)
}

/// Looks up a method by id.
pub fn find_method<'a>(methods: &'a [ShippingMethod], id: &str) -> Option<&'a ShippingMethod> {
    methods.iter().find(|method| method.id == id)
}
