//! Product listing and the local cart

use serde::{Deserialize, Serialize};

use super::StoreId;

/// A product offered by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Price in minor units (cents)
    pub price: i64,
    pub currency: String,
    #[serde(default)]
    pub image_url: String,
    pub store_id: StoreId,
}

/// Products the user has put aside, in insertion order
///
/// The cart lives only in memory; it is not synced anywhere.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Vec<Product>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, product: Product) {
        self.items.push(product);
    }

    /// Remove the items at the given positions
    ///
    /// Out-of-range offsets are ignored. Offsets refer to positions before
    /// any removal, so `[0, 1]` drops the first two items.
    pub fn remove_at(&mut self, offsets: &[usize]) {
        let mut index = 0;
        self.items.retain(|_| {
            let keep = !offsets.contains(&index);
            index += 1;
            keep
        });
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[Product] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of prices in minor units, per currency
    pub fn totals(&self) -> Vec<(String, i64)> {
        let mut totals: Vec<(String, i64)> = Vec::new();
        for item in &self.items {
            match totals.iter_mut().find(|(currency, _)| *currency == item.currency) {
                Some((_, sum)) => *sum += item.price,
                None => totals.push((item.currency.clone(), item.price)),
            }
        }
        totals
    }
}
