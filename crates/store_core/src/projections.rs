use shared::domain::{Order, OrderLine, Product, ProductId};
use url::Url;

/// Where product images live and what to show when one is missing. Thumbnail
/// paths arrive relative from the backend and are joined against `base_url`.
#[derive(Debug, Clone)]
pub struct Assets {
    base_url: Url,
    fallback_image: String,
}

impl Assets {
    pub fn new(mut base_url: Url, fallback_image: impl Into<String>) -> Self {
        // Url::join replaces the last path segment unless the base ends in a
        // slash, so normalize once here.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            fallback_image: fallback_image.into(),
        }
    }

    pub fn fallback_image(&self) -> &str {
        &self.fallback_image
    }

    /// Resolve a thumbnail reference to a displayable image reference.
    /// Absent or unjoinable references resolve to the fallback image, never
    /// to a broken or empty one.
    pub fn resolve(&self, thumbnail: Option<&str>) -> String {
        match thumbnail {
            Some(path) if !path.trim().is_empty() => self
                .base_url
                .join(path.trim_start_matches('/'))
                .map(|joined| joined.to_string())
                .unwrap_or_else(|_| self.fallback_image.clone()),
            _ => self.fallback_image.clone(),
        }
    }
}

/// One order line resolved for display: price/quantity snapshot from order
/// time plus a guaranteed-displayable image reference.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineView {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub line_total: f64,
    pub image: String,
}

impl OrderLineView {
    pub(crate) fn from_line(line: &OrderLine, assets: &Assets) -> Self {
        Self {
            product_id: line.product.id.clone(),
            name: line.product.name.clone(),
            unit_price: line.product.price,
            quantity: line.quantity,
            line_total: line.line_total(),
            image: assets.resolve(line.product.thumbnail.as_deref()),
        }
    }
}

/// An order plus its resolved lines, as consumed by the detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLineView>,
}

impl OrderDetail {
    pub(crate) fn resolve(order: &Order, assets: &Assets) -> Self {
        let lines = order
            .products
            .iter()
            .map(|line| OrderLineView::from_line(line, assets))
            .collect();
        Self {
            order: order.clone(),
            lines,
        }
    }
}

/// A product with its image reference resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductView {
    pub product: Product,
    pub image: String,
}

impl ProductView {
    pub(crate) fn resolve(product: &Product, assets: &Assets) -> Self {
        Self {
            image: assets.resolve(product.thumbnail.as_deref()),
            product: product.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/projections_tests.rs"]
mod tests;
