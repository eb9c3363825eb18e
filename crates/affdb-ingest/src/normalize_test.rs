use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::json;

use super::*;

fn raw(value: serde_json::Value) -> RawItem {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn generic(value: serde_json::Value) -> Result<NormalizedProduct, Rejection> {
    normalize(&raw(value), SourceNetwork::Generic, &KeywordTable::default())
}

// ---------------------------------------------------------------------------
// Generic network
// ---------------------------------------------------------------------------

#[test]
fn womens_navy_dress_scenario() {
    let product = generic(json!({
        "title": "Women's Navy Dress",
        "description": "",
        "price": "29.99",
        "image_url": "https://cdn.example.com/navy-dress.jpg",
        "product_url": "https://shop.example.com/p/navy-dress",
        "id": "nd-1"
    }))
    .expect("should normalize");

    assert_eq!(product.description, "Women's Navy Dress");
    assert_eq!(product.brand, UNKNOWN_BRAND);
    assert_eq!(product.price, Some(dec("29.99")));
    assert_eq!(product.currency, "USD");
    assert!(product.tags.contains("dress"));
    assert!(product.tags.contains("navy"));
    assert_eq!(product.source_id, "nd-1");
    assert_eq!(product.source_network, SourceNetwork::Generic);
}

#[test]
fn literal_none_description_falls_back_to_title() {
    let product = generic(json!({
        "name": "Silk Scarf",
        "description": "  None ",
        "image": "https://cdn.example.com/scarf.png",
        "url": "https://shop.example.com/scarf"
    }))
    .unwrap();
    assert_eq!(product.title, "Silk Scarf");
    assert_eq!(product.description, "Silk Scarf");
    assert_eq!(product.source_id, "https://shop.example.com/scarf");
    assert!(product.price.is_none());
}

#[test]
fn missing_image_is_rejected_with_field_list() {
    let err = generic(json!({
        "title": "Linen Shirt",
        "product_url": "https://shop.example.com/shirt"
    }))
    .unwrap_err();
    assert_eq!(err, Rejection::MissingFields(vec!["image_url"]));
    assert_eq!(err.skip_reason(), SkipReason::MissingFields);
}

#[test]
fn all_missing_fields_are_listed_in_order() {
    let err = generic(json!({"title": "   ", "price": 10})).unwrap_err();
    assert_eq!(
        err,
        Rejection::MissingFields(vec!["title", "product_url", "image_url"])
    );
}

#[test]
fn image_without_accepted_extension_is_rejected() {
    let err = generic(json!({
        "title": "Boots",
        "image_url": "https://cdn.example.com/boots.svg",
        "product_url": "https://shop.example.com/boots"
    }))
    .unwrap_err();
    assert!(matches!(err, Rejection::InvalidImage { .. }));
    assert_eq!(err.skip_reason(), SkipReason::InvalidImage);
}

#[test]
fn image_extension_must_be_on_the_path_not_the_host() {
    for image_url in [
        "https://images.png",
        "https://images.png/",
        "https://cdn.jpg/?format=webp",
        "https://cdn.example.com/v1.2/render",
    ] {
        let err = generic(json!({
            "title": "Boots",
            "image_url": image_url,
            "product_url": "https://shop.example.com/boots"
        }))
        .unwrap_err();
        assert!(
            matches!(err, Rejection::InvalidImage { .. }),
            "{image_url} should be rejected, got {err:?}"
        );
    }

    assert!(has_image_extension("HTTPS://images.example.com/a/b/boots.webp#zoom"));
}

#[test]
fn image_extension_may_carry_query_string() {
    let product = generic(json!({
        "title": "Boots",
        "image_url": "https://cdn.example.com/boots.JPEG?w=800&h=800",
        "product_url": "https://shop.example.com/boots"
    }))
    .unwrap();
    assert!(product.image_url.is_some());
}

#[test]
fn relative_product_url_is_invalid() {
    let err = generic(json!({
        "title": "Boots",
        "image_url": "https://cdn.example.com/boots.jpg",
        "product_url": "/p/boots"
    }))
    .unwrap_err();
    assert_eq!(
        err,
        Rejection::InvalidUrl {
            field: "product_url",
            value: "/p/boots".to_string()
        }
    );
    assert_eq!(err.skip_reason(), SkipReason::InvalidUrl);
}

#[test]
fn flat_currency_field_and_rating() {
    let product = generic(json!({
        "title": "Wool Coat",
        "brand": "Arket",
        "price": 189,
        "currency": "eur",
        "rating": "4.6",
        "category": "Outerwear",
        "image_url": "https://cdn.example.com/coat.webp",
        "product_url": "https://shop.example.com/coat"
    }))
    .unwrap();
    assert_eq!(product.price, Some(dec("189")));
    assert_eq!(product.currency, "EUR");
    assert_eq!(product.rating, Some(4.6));
    assert_eq!(product.category.as_deref(), Some("Outerwear"));
    assert!(product.tags.contains("outerwear"));
    assert!(product.tags.contains("wool"));
}

#[test]
fn free_text_price_detects_currency() {
    let product = generic(json!({
        "title": "Cashmere Sweater",
        "price": "£1,250.00",
        "image_url": "https://cdn.example.com/sweater.jpg",
        "product_url": "https://shop.example.com/sweater"
    }))
    .unwrap();
    assert_eq!(product.price, Some(dec("1250.00")));
    assert_eq!(product.currency, "GBP");
}

#[test]
fn zero_price_is_absent() {
    let product = generic(json!({
        "title": "Tote",
        "price": 0,
        "image_url": "https://cdn.example.com/tote.jpg",
        "product_url": "https://shop.example.com/tote"
    }))
    .unwrap();
    assert!(product.price.is_none());
}

// ---------------------------------------------------------------------------
// Network adapters
// ---------------------------------------------------------------------------

#[test]
fn awin_adapter_maps_fields() {
    let product = normalize(
        &raw(json!({
            "aw_product_id": 99812,
            "product_name": "Floral Midi Skirt",
            "description": "Flowing midi skirt in a floral print",
            "merchant_name": "Boden",
            "search_price": "64.00",
            "currency": "GBP",
            "aw_image_url": "https://images2.productserve.com/skirt.jpg",
            "aw_deep_link": "https://www.awin1.com/pclick.php?p=99812",
            "merchant_category": "Skirts"
        })),
        SourceNetwork::Awin,
        &KeywordTable::default(),
    )
    .unwrap();

    assert_eq!(product.title, "Floral Midi Skirt");
    assert_eq!(product.brand, "Boden");
    assert_eq!(product.price, Some(dec("64.00")));
    assert_eq!(product.currency, "GBP");
    assert_eq!(product.source_id, "99812");
    assert_eq!(
        product.product_url,
        "https://www.awin1.com/pclick.php?p=99812"
    );
    assert!(product.tags.contains("skirt"));
    assert!(product.tags.contains("floral"));
}

#[test]
fn cj_nested_price_wins_over_sale_price() {
    let product = normalize(
        &raw(json!({
            "id": "cj-1",
            "title": "Trail Sneaker",
            "brand": "Merrell",
            "price": {"amount": "120.00", "currency": "USD"},
            "salePrice": 95,
            "imageLink": "https://cdn.cj.com/sneaker.png",
            "link": "https://www.anrdoezrs.net/links/1/sneaker",
            "productType": "Shoes"
        })),
        SourceNetwork::Cj,
        &KeywordTable::default(),
    )
    .unwrap();
    assert_eq!(product.price, Some(dec("120.00")));
    assert_eq!(product.currency, "USD");
    assert_eq!(product.category.as_deref(), Some("Shoes"));
    assert!(product.tags.contains("shoes"));
}

#[test]
fn cj_falls_back_to_sale_price_when_nested_is_empty() {
    let product = normalize(
        &raw(json!({
            "id": "cj-2",
            "title": "Trail Sneaker",
            "price": {"amount": "0", "currency": "CAD"},
            "salePrice": 95,
            "imageLink": "https://cdn.cj.com/sneaker.png",
            "link": "https://www.anrdoezrs.net/links/1/sneaker"
        })),
        SourceNetwork::Cj,
        &KeywordTable::default(),
    )
    .unwrap();
    assert_eq!(product.price, Some(dec("95")));
    assert_eq!(product.currency, "CAD");
}

#[test]
fn rakuten_nested_description_and_category() {
    let product = normalize(
        &raw(json!({
            "sku": "RK-77",
            "productname": "Silk Blouse",
            "description": {"short": "Silk blouse", "long": "A relaxed silk blouse with mother-of-pearl buttons"},
            "manufacturer": "Equipment",
            "price": {"value": "228.00", "currency": "USD"},
            "imageurl": "https://images.rakuten.com/blouse.jpg",
            "linkurl": "https://click.linksynergy.com/link?id=77",
            "category": {"primary": "Tops"}
        })),
        SourceNetwork::Rakuten,
        &KeywordTable::default(),
    )
    .unwrap();
    assert!(product.description.starts_with("A relaxed silk blouse"));
    assert_eq!(product.category.as_deref(), Some("Tops"));
    assert_eq!(product.brand, "Equipment");
    assert_eq!(product.price, Some(dec("228.00")));
    assert!(product.tags.contains("top"));
    assert!(product.tags.contains("silk"));
}

#[test]
fn rakuten_text_price() {
    let product = normalize(
        &raw(json!({
            "sku": "RK-78",
            "productname": "Denim Jacket",
            "price": "$89.50 USD",
            "imageurl": "https://images.rakuten.com/jacket.jpg",
            "linkurl": "https://click.linksynergy.com/link?id=78"
        })),
        SourceNetwork::Rakuten,
        &KeywordTable::default(),
    )
    .unwrap();
    assert_eq!(product.price, Some(dec("89.50")));
    assert_eq!(product.currency, "USD");
}

#[test]
fn impact_adapter_maps_pascal_case_fields() {
    let product = normalize(
        &raw(json!({
            "CatalogItemId": "IM-5",
            "Name": "Sports Bra",
            "Description": "High-support sports bra",
            "Manufacturer": "Lululemon",
            "CurrentPrice": "58.00",
            "Currency": "USD",
            "ImageUrl": "https://cdn.impact.com/bra.avif",
            "Url": "https://goto.target.com/c/1/bra",
            "Category": "Activewear",
            "Rating": 4.2
        })),
        SourceNetwork::Impact,
        &KeywordTable::default(),
    )
    .unwrap();
    assert_eq!(product.source_id, "IM-5");
    assert_eq!(product.brand, "Lululemon");
    assert_eq!(product.rating, Some(4.2));
    assert!(product.tags.contains("activewear"));
}

#[test]
fn adapter_ignores_other_networks_field_names() {
    let err = normalize(
        &raw(json!({
            "title": "Sports Bra",
            "image_url": "https://cdn.impact.com/bra.jpg",
            "product_url": "https://goto.target.com/c/1/bra"
        })),
        SourceNetwork::Impact,
        &KeywordTable::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        Rejection::MissingFields(vec!["title", "product_url", "image_url"])
    );
}
