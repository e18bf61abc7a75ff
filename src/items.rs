//! Items
//!
//! Cart line items. An item is identified by an [`ItemId`] (a temporary local
//! id until the cart service confirms it) and de-duplicated by its
//! [`ItemKey`], the `(product, variant)` pair.

use std::fmt;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prices::{Price, Quantity};

const LOCAL_PREFIX: &str = "local-";

/// Identity of a cart line item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemId {
    /// Temporary id issued locally before the cart service has confirmed the item.
    Local(Uuid),

    /// Id assigned by the cart service.
    Server(String),
}

impl ItemId {
    /// Issues a fresh temporary id.
    pub fn local() -> Self {
        ItemId::Local(Uuid::now_v7())
    }

    /// Wraps a server-issued id.
    pub fn server(id: impl Into<String>) -> Self {
        ItemId::Server(id.into())
    }

    /// Whether the id is still awaiting server confirmation.
    pub fn is_local(&self) -> bool {
        matches!(self, ItemId::Local(_))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Local(uuid) => write!(f, "{LOCAL_PREFIX}{uuid}"),
            ItemId::Server(id) => f.write_str(id),
        }
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        let local = value
            .strip_prefix(LOCAL_PREFIX)
            .and_then(|raw| Uuid::parse_str(raw).ok());

        match local {
            Some(uuid) => ItemId::Local(uuid),
            None => ItemId::Server(value),
        }
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.to_string()
    }
}

/// De-duplication key: the same product and variant collapse into one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    /// Product id
    pub product_id: String,

    /// Variant id, if the product has variants
    pub variant_id: Option<String>,
}

/// Gift wrap charge attached to a line, charged per unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GiftWrap {
    /// Whether the wrap is currently selected
    pub enabled: bool,

    /// Cost per unit
    pub cost: Price,
}

/// A cart line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Line identity
    pub id: ItemId,

    /// Product id
    pub product_id: String,

    /// Variant id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Number of units, never zero
    pub quantity: Quantity,

    /// Price per unit
    pub unit_price: Price,

    /// Pre-sale price per unit, if the product is on sale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Price>,

    /// Free-form options chosen by the shopper (engraving, size notes, ...)
    #[serde(default)]
    pub customizations: FxHashMap<String, String>,

    /// Optional gift wrap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gift_wrap: Option<GiftWrap>,
}

impl CartItem {
    /// Builds a line from an add request with the given id.
    pub fn from_new(id: ItemId, item: NewCartItem) -> Self {
        Self {
            id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            original_price: item.original_price,
            customizations: item.customizations,
            gift_wrap: item.gift_wrap,
        }
    }

    /// Returns the de-duplication key.
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
        }
    }

    /// Whether this line matches the given key.
    pub fn matches(&self, key: &ItemKey) -> bool {
        self.product_id == key.product_id && self.variant_id == key.variant_id
    }

    /// Unit price times quantity.
    pub fn line_subtotal(&self) -> Decimal {
        self.unit_price.times(self.quantity)
    }

    /// Gift wrap cost for the whole line, zero when wrap is absent or disabled.
    pub fn gift_wrap_cost(&self) -> Decimal {
        match self.gift_wrap {
            Some(GiftWrap { enabled: true, cost }) => cost.times(self.quantity),
            _ => Decimal::ZERO,
        }
    }
}

/// An add-to-cart request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCartItem {
    /// Product id
    pub product_id: String,

    /// Variant id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Units to add
    pub quantity: Quantity,

    /// Price per unit as currently displayed
    pub unit_price: Price,

    /// Pre-sale price per unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Price>,

    /// Shopper options
    #[serde(default)]
    pub customizations: FxHashMap<String, String>,

    /// Optional gift wrap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gift_wrap: Option<GiftWrap>,
}

impl NewCartItem {
    /// Creates a plain request for a product at a price.
    pub fn new(product_id: impl Into<String>, quantity: Quantity, unit_price: Price) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: None,
            name: String::new(),
            quantity,
            unit_price,
            original_price: None,
            customizations: FxHashMap::default(),
            gift_wrap: None,
        }
    }

    /// Sets the variant.
    #[must_use]
    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds an enabled gift wrap at the given per-unit cost.
    #[must_use]
    pub fn with_gift_wrap(mut self, cost: Price) -> Self {
        self.gift_wrap = Some(GiftWrap {
            enabled: true,
            cost,
        });
        self
    }

    /// Adds a customization.
    #[must_use]
    pub fn with_customization(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.customizations.insert(key.into(), value.into());
        self
    }

    /// Returns the de-duplication key.
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
        }
    }
}
