//! Card layout of the rumah123.com listing pages.
//!
//! The site serves two card variants (featured and regular) with different
//! markup, so most fields carry more than one extraction strategy.

use crate::models::{Field, ListingRecord, Source};
use crate::scrapers::normalize::{normalize_area, normalize_price};
use crate::scrapers::strategy::{element_text, first_match, selector, Strategy};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

pub const SITE_ORIGIN: &str = "https://www.rumah123.com";

/// Which count an attribute icon stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amenity {
    Bedrooms,
    Bathrooms,
    Garage,
}

impl Amenity {
    const ALL: [Amenity; 3] = [Amenity::Bedrooms, Amenity::Bathrooms, Amenity::Garage];

    /// Fragment of the icon reference (`#icon-bed`, `#icon-bath`, `#icon-car`)
    fn icon_key(self) -> &'static str {
        match self {
            Amenity::Bedrooms => "bed",
            Amenity::Bathrooms => "bath",
            Amenity::Garage => "car",
        }
    }

    /// Label suffix used by cards without the structured block
    fn label_suffix(self) -> &'static str {
        match self {
            Amenity::Bedrooms => "KT",
            Amenity::Bathrooms => "KM",
            Amenity::Garage => "GRS",
        }
    }
}

/// Selectors and per-field strategies for one catalog
pub struct CatalogLayout {
    pub card: Selector,
    pub price: Vec<Strategy>,
    pub location: Vec<Strategy>,
    pub land_area: Vec<Strategy>,
    pub building_area: Vec<Strategy>,
    pub link: Vec<Strategy>,
    pub image: Vec<Strategy>,
    attribute_block: Selector,
    attribute_item: Selector,
    attribute_icon: Selector,
    attribute_value: Selector,
    amenity_fallback: Vec<(Amenity, Strategy)>,
}

pub static LAYOUT: Lazy<CatalogLayout> = Lazy::new(|| CatalogLayout {
    card: selector(r#"div.featured-card-component, div[data-test-id="card-regular"]"#),
    price: vec![
        Strategy::text("div.card-featured__middle-section__price strong"),
        Strategy::text(r#"div[data-test-id="card-price"]"#),
    ],
    location: vec![
        Strategy::text("a[title] + span"),
        Strategy::text(r#"p[data-test-id="card-location"]"#),
    ],
    land_area: vec![
        Strategy::labelled("div.attribute-info", "LT", Some("span")),
        Strategy::labelled("p", "LT", None),
    ],
    building_area: vec![
        Strategy::labelled("div.attribute-info", "LB", Some("span")),
        Strategy::labelled("p", "LB", None),
    ],
    link: vec![Strategy::attr(r#"a[href^="/properti/"]"#, "href")],
    image: vec![Strategy::attr("img", "src"), Strategy::attr("img", "data-src")],
    attribute_block: selector("div.ui-molecules-list__divider-none--horizontal"),
    attribute_item: selector("div.relative.ui-molecules-list__item"),
    attribute_icon: selector("svg use"),
    attribute_value: selector("span.attribute-text"),
    amenity_fallback: Amenity::ALL
        .iter()
        .map(|a| (*a, Strategy::before_suffix("p", a.label_suffix())))
        .collect(),
});

/// Bedroom/bathroom/garage counts of one card
#[derive(Debug, Default, Clone, PartialEq)]
struct Amenities {
    bedrooms: Option<String>,
    bathrooms: Option<String>,
    garage: Option<String>,
}

impl Amenities {
    fn set(&mut self, amenity: Amenity, value: Option<String>) {
        match amenity {
            Amenity::Bedrooms => self.bedrooms = value,
            Amenity::Bathrooms => self.bathrooms = value,
            Amenity::Garage => self.garage = value,
        }
    }
}

impl CatalogLayout {
    /// Structured, icon-keyed attribute list. The label fallback only applies
    /// when the card has no such list at all.
    fn amenities(&self, card: ElementRef<'_>) -> Amenities {
        let mut found = Amenities::default();

        let Some(block) = card.select(&self.attribute_block).next() else {
            for (amenity, strategy) in &self.amenity_fallback {
                found.set(*amenity, strategy.apply(card));
            }
            return found;
        };

        for item in block.select(&self.attribute_item) {
            let Some(icon) = item.select(&self.attribute_icon).next() else {
                continue;
            };
            // `xlink:href` may surface as a namespaced `href` depending on the parser
            let href = icon
                .value()
                .attrs()
                .find(|(name, _)| *name == "href" || name.ends_with(":href"))
                .map(|(_, value)| value)
                .unwrap_or_default();
            let value = item
                .select(&self.attribute_value)
                .next()
                .map(element_text)
                .filter(|v| !v.is_empty());

            if let Some(amenity) = Amenity::ALL.into_iter().find(|a| href.contains(a.icon_key())) {
                found.set(amenity, value);
            }
        }
        found
    }

    /// Extract one record from a listing card. Fields are independent: a
    /// missing field becomes unavailable without affecting the others.
    pub fn extract_card(&self, card: ElementRef<'_>) -> ListingRecord {
        let amenities = self.amenities(card);

        let price = first_match(&self.price, card)
            .map(|raw| normalize_price(&raw))
            .unwrap_or(Field::Unavailable);
        let land_area = first_match(&self.land_area, card)
            .map(|raw| normalize_area(&raw))
            .unwrap_or(Field::Unavailable);
        let building_area = first_match(&self.building_area, card)
            .map(|raw| normalize_area(&raw))
            .unwrap_or(Field::Unavailable);
        let listing_url = first_match(&self.link, card).and_then(|href| absolute_url(&href));

        ListingRecord {
            price,
            location: first_match(&self.location, card).into(),
            bedrooms: amenities.bedrooms.into(),
            toilet: amenities.bathrooms.into(),
            garage: amenities.garage.into(),
            land_area,
            building_area,
            listing_url: listing_url.into(),
            image_url: first_match(&self.image, card).into(),
            source: Source::Rumah123,
        }
    }

    /// Every card on a rendered page, in document order
    pub fn parse_listings(&self, html: &str) -> Vec<ListingRecord> {
        let document = Html::parse_document(html);
        let records: Vec<ListingRecord> = document
            .select(&self.card)
            .map(|card| self.extract_card(card))
            .collect();
        debug!("Parsed {} listing cards", records.len());
        records
    }
}

fn absolute_url(href: &str) -> Option<String> {
    let base = Url::parse(SITE_ORIGIN).ok()?;
    base.join(href).ok().map(String::from)
}
