//! Maps source-specific records into [`NormalizedProduct`].
//!
//! Each [`SourceNetwork`] has a fixed field map chosen by an explicit `match`;
//! the record's shape is never sniffed. Price parsing lives in
//! [`crate::price`]; tag vocabulary is injected as a [`KeywordTable`].

use affdb_core::{
    KeywordTable, NormalizedProduct, SourceNetwork, DEFAULT_CURRENCY, UNKNOWN_BRAND,
};
use serde_json::Value;

use crate::price::{choose_currency, choose_price, read_price};
use crate::summary::SkipReason;

/// An opaque record as it arrives from a source API.
pub type RawItem = serde_json::Map<String, Value>;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

/// Why a record could not become a product. These are expected outcomes on
/// real feeds, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Required fields absent or blank, in `title`, `product_url`,
    /// `image_url` order.
    MissingFields(Vec<&'static str>),
    InvalidImage { image_url: String },
    InvalidUrl { field: &'static str, value: String },
}

impl Rejection {
    #[must_use]
    pub fn skip_reason(&self) -> SkipReason {
        match self {
            Rejection::MissingFields(_) => SkipReason::MissingFields,
            Rejection::InvalidImage { .. } => SkipReason::InvalidImage,
            Rejection::InvalidUrl { .. } => SkipReason::InvalidUrl,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::MissingFields(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            Rejection::InvalidImage { image_url } => {
                write!(f, "image url has no accepted extension: {image_url}")
            }
            Rejection::InvalidUrl { field, value } => {
                write!(f, "{field} is not an absolute http(s) url: {value}")
            }
        }
    }
}

/// Candidate field names per canonical attribute, tried in order.
struct FieldMap {
    title: &'static [&'static str],
    description: &'static [&'static str],
    brand: &'static [&'static str],
    price: &'static [&'static str],
    currency: &'static [&'static str],
    image_url: &'static [&'static str],
    product_url: &'static [&'static str],
    source_id: &'static [&'static str],
    category: &'static [&'static str],
    rating: &'static [&'static str],
}

const GENERIC_FIELDS: FieldMap = FieldMap {
    title: &["title", "name"],
    description: &["description"],
    brand: &["brand"],
    price: &["price"],
    currency: &["currency"],
    image_url: &["image_url", "image"],
    product_url: &["product_url", "url", "link"],
    source_id: &["id", "sku"],
    category: &["category"],
    rating: &["rating"],
};

const AWIN_FIELDS: FieldMap = FieldMap {
    title: &["product_name"],
    description: &["description"],
    brand: &["brand_name", "merchant_name"],
    price: &["search_price", "store_price"],
    currency: &["currency"],
    image_url: &["merchant_image_url", "aw_image_url"],
    product_url: &["aw_deep_link", "merchant_deep_link"],
    source_id: &["aw_product_id"],
    category: &["category_name", "merchant_category"],
    rating: &["rating"],
};

const CJ_FIELDS: FieldMap = FieldMap {
    title: &["title"],
    description: &["description"],
    brand: &["brand"],
    price: &["price", "salePrice"],
    currency: &[],
    image_url: &["imageLink"],
    product_url: &["link"],
    source_id: &["id"],
    category: &["productType"],
    rating: &[],
};

const RAKUTEN_FIELDS: FieldMap = FieldMap {
    title: &["productname"],
    description: &["description"],
    brand: &["manufacturer"],
    price: &["price"],
    currency: &[],
    image_url: &["imageurl"],
    product_url: &["linkurl"],
    source_id: &["sku"],
    category: &["category"],
    rating: &[],
};

const IMPACT_FIELDS: FieldMap = FieldMap {
    title: &["Name"],
    description: &["Description"],
    brand: &["Manufacturer"],
    price: &["CurrentPrice"],
    currency: &["Currency"],
    image_url: &["ImageUrl"],
    product_url: &["Url"],
    source_id: &["CatalogItemId"],
    category: &["Category"],
    rating: &["Rating"],
};

fn field_map(network: SourceNetwork) -> &'static FieldMap {
    match network {
        SourceNetwork::Generic => &GENERIC_FIELDS,
        SourceNetwork::Awin => &AWIN_FIELDS,
        SourceNetwork::Cj => &CJ_FIELDS,
        SourceNetwork::Rakuten => &RAKUTEN_FIELDS,
        SourceNetwork::Impact => &IMPACT_FIELDS,
    }
}

/// Normalizes one raw record from `network` into a [`NormalizedProduct`].
///
/// # Errors
///
/// Returns a [`Rejection`] when a required field is missing, a URL is not
/// absolute http(s), or the image URL lacks an accepted extension.
pub fn normalize(
    raw: &RawItem,
    network: SourceNetwork,
    keywords: &KeywordTable,
) -> Result<NormalizedProduct, Rejection> {
    let fields = field_map(network);

    let title = first_text(raw, fields.title);
    let product_url = first_text(raw, fields.product_url);
    let image_url = first_text(raw, fields.image_url);

    let missing: Vec<&'static str> = [
        ("title", title.is_none()),
        ("product_url", product_url.is_none()),
        ("image_url", image_url.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();

    let (Some(title), Some(product_url), Some(image_url)) = (title, product_url, image_url) else {
        return Err(Rejection::MissingFields(missing));
    };

    for (field, value) in [("product_url", &product_url), ("image_url", &image_url)] {
        if !is_absolute_http(value) {
            return Err(Rejection::InvalidUrl {
                field,
                value: value.clone(),
            });
        }
    }

    if !has_image_extension(&image_url) {
        return Err(Rejection::InvalidImage { image_url });
    }

    let description = match first_text(raw, fields.description) {
        Some(d) if !d.eq_ignore_ascii_case("none") => d,
        _ => title.clone(),
    };

    let brand = first_text(raw, fields.brand).unwrap_or_else(|| UNKNOWN_BRAND.to_string());

    let candidates: Vec<_> = fields
        .price
        .iter()
        .filter_map(|f| raw.get(*f))
        .filter_map(read_price)
        .collect();
    let price = choose_price(&candidates).and_then(|c| c.amount);
    let currency = choose_currency(&candidates, first_text(raw, fields.currency).as_deref())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let category = first_text(raw, fields.category);
    let rating = fields
        .rating
        .iter()
        .filter_map(|f| raw.get(*f))
        .find_map(read_rating);

    let source_id = first_text(raw, fields.source_id).unwrap_or_else(|| product_url.clone());

    let tag_text = format!(
        "{title} {description} {}",
        category.as_deref().unwrap_or_default()
    );
    let tags = keywords.tags_for(&tag_text);

    Ok(NormalizedProduct {
        title,
        description,
        brand,
        price,
        currency,
        image_url: Some(image_url),
        product_url,
        tags,
        source_network: network,
        source_id,
        category,
        rating,
    })
}

/// First non-blank text value among `keys`.
fn first_text(raw: &RawItem, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| raw.get(*k)).find_map(read_text)
}

/// Strings are trimmed, numbers stringified, and objects searched for the
/// usual sub-keys (`{short, long}` descriptions, `{primary}` categories).
fn read_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["long", "short", "primary", "name"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(read_text),
        _ => None,
    }
}

fn read_rating(value: &Value) -> Option<f64> {
    let rating = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (rating.is_finite() && rating >= 0.0).then_some(rating)
}

/// Host and everything after it, for an `http://` or `https://` URL.
fn split_http(url: &str) -> Option<(&str, &str)> {
    let scheme = ["https://", "http://"].into_iter().find(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })?;
    let rest = &url[scheme.len()..];
    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(rest.split_at(host_end))
}

fn is_absolute_http(url: &str) -> bool {
    split_http(url)
        .is_some_and(|(host, _)| !host.is_empty() && !host.contains(char::is_whitespace))
}

/// Extension check on the last path segment only; the host never counts.
fn has_image_extension(url: &str) -> bool {
    let Some((_, rest)) = split_http(url) else {
        return false;
    };
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    let file_name = path.rsplit('/').next().unwrap_or_default();
    file_name.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|accepted| ext.eq_ignore_ascii_case(accepted))
    })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
