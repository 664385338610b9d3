// Size and brand normalization into exact-match bucket keys
use regex::Regex;
use std::sync::LazyLock;

pub const NO_SIZE: &str = "NO_SIZE";
pub const NO_BRAND: &str = "NO_BRAND";

static COUNT_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^x\s*(\d+)$").unwrap());
static COUNT_PIECES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(?:pcs|pieces|piece)$").unwrap());
static COUNT_MULTI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*x\s*(\d+)$").unwrap());
static QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:[.,]\d+)?)\s*([a-z]+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeKind {
    Count,
    Weight,
    Volume,
    Unknown,
}

/// A size string split into its numeric value and canonical unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSize {
    pub kind: SizeKind,
    pub value: f64,
    /// `x`, `g`, `kg`, `ml`, `l`, or the cleaned original text for unknown sizes.
    pub unit: String,
}

impl ParsedSize {
    fn unknown(text: &str) -> Self {
        Self {
            kind: SizeKind::Unknown,
            value: 0.0,
            unit: strip_whitespace(text),
        }
    }

    /// Canonical bucket key: weights in grams, volumes in milliliters.
    pub fn bucket_key(&self) -> String {
        match self.kind {
            SizeKind::Weight => {
                let grams = if self.unit == "kg" { self.value * 1000.0 } else { self.value };
                format!("{}g", format_value(grams))
            }
            SizeKind::Volume => {
                let ml = if self.unit == "l" { self.value * 1000.0 } else { self.value };
                format!("{}ml", format_value(ml))
            }
            SizeKind::Count => format!("{}x", format_value(self.value)),
            SizeKind::Unknown => self.unit.clone(),
        }
    }
}

/// Parses a free-text size such as `2 L`, `500gm`, `x6` or `3x4`.
pub fn parse_size(raw: &str) -> ParsedSize {
    let text = raw.trim().to_lowercase();

    if let Some(caps) = COUNT_PREFIX.captures(&text).or_else(|| COUNT_PIECES.captures(&text)) {
        if let Ok(n) = caps[1].parse::<f64>() {
            return ParsedSize { kind: SizeKind::Count, value: n, unit: "x".into() };
        }
    }

    if let Some(caps) = COUNT_MULTI.captures(&text) {
        if let (Ok(n), Ok(m)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) {
            return ParsedSize { kind: SizeKind::Count, value: n * m, unit: "x".into() };
        }
    }

    if let Some(caps) = QUANTITY.captures(&text) {
        let value = caps[1].replace(',', ".").parse::<f64>();
        let unit = canonical_unit(&caps[2]);
        if let (Ok(value), Some((kind, unit))) = (value, unit) {
            return ParsedSize { kind, value, unit: unit.into() };
        }
    }

    ParsedSize::unknown(&text)
}

fn canonical_unit(unit: &str) -> Option<(SizeKind, &'static str)> {
    match unit {
        "g" | "gm" | "gms" | "gram" | "grams" => Some((SizeKind::Weight, "g")),
        "kg" | "kilogram" | "kilograms" => Some((SizeKind::Weight, "kg")),
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
            Some((SizeKind::Volume, "ml"))
        }
        "l" | "liter" | "liters" | "litre" | "litres" => Some((SizeKind::Volume, "l")),
        _ => None,
    }
}

/// Bucket key for an optional size field. Blank and absent sizes share `NO_SIZE`.
pub fn size_bucket_key(size: Option<&str>) -> String {
    match size.map(str::trim) {
        Some(s) if !s.is_empty() => parse_size(s).bucket_key(),
        _ => NO_SIZE.to_string(),
    }
}

/// Bucket key for an optional brand field: upper-cased and trimmed.
pub fn brand_bucket_key(brand: Option<&str>) -> String {
    match brand.map(str::trim) {
        Some(b) if !b.is_empty() => b.to_uppercase(),
        _ => NO_BRAND.to_string(),
    }
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

// 0.33 l must land on 330ml, not 330.00000000000006ml
fn format_value(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_units_collapse_to_milliliters() {
        assert_eq!(size_bucket_key(Some("2L")), "2000ml");
        assert_eq!(size_bucket_key(Some("2 L")), "2000ml");
        assert_eq!(size_bucket_key(Some("2000 ml")), "2000ml");
        assert_eq!(size_bucket_key(Some("0.33 litre")), "330ml");
        assert_eq!(size_bucket_key(Some("1,5 Liters")), "1500ml");
    }

    #[test]
    fn weight_units_collapse_to_grams() {
        assert_eq!(size_bucket_key(Some("1kg")), "1000g");
        assert_eq!(size_bucket_key(Some("1000 GM")), "1000g");
        assert_eq!(size_bucket_key(Some("500 grams")), "500g");
        assert_eq!(size_bucket_key(Some("0.25 kilogram")), "250g");
    }

    #[test]
    fn count_shapes() {
        assert_eq!(parse_size("x6").kind, SizeKind::Count);
        assert_eq!(size_bucket_key(Some("x6")), "6x");
        assert_eq!(size_bucket_key(Some("6pcs")), "6x");
        assert_eq!(size_bucket_key(Some("6 pieces")), "6x");
        assert_eq!(size_bucket_key(Some("2x3")), "6x");
    }

    #[test]
    fn unknown_sizes_keep_their_literal_text() {
        let parsed = parse_size("Family Pack");
        assert_eq!(parsed.kind, SizeKind::Unknown);
        assert_eq!(parsed.bucket_key(), "familypack");
        assert_eq!(size_bucket_key(Some("6x330ml")), "6x330ml");
    }

    #[test]
    fn missing_size_and_brand_use_sentinels() {
        assert_eq!(size_bucket_key(None), NO_SIZE);
        assert_eq!(size_bucket_key(Some("   ")), NO_SIZE);
        assert_eq!(brand_bucket_key(None), NO_BRAND);
        assert_eq!(brand_bucket_key(Some("")), NO_BRAND);
    }

    #[test]
    fn brand_key_is_case_insensitive() {
        assert_eq!(brand_bucket_key(Some(" Coca Cola ")), "COCA COLA");
        assert_eq!(brand_bucket_key(Some("COCA COLA")), brand_bucket_key(Some("coca cola")));
        assert_ne!(brand_bucket_key(Some("Coca-Cola")), brand_bucket_key(Some("Coca Cola")));
    }

    #[test]
    fn different_sizes_never_share_a_bucket() {
        assert_ne!(size_bucket_key(Some("1L")), size_bucket_key(Some("2L")));
    }

    #[test]
    fn huge_counts_keep_every_digit() {
        assert_eq!(size_bucket_key(Some("x10000000000000000000")), "10000000000000000000x");
        assert_ne!(
            size_bucket_key(Some("x10000000000000000000")),
            size_bucket_key(Some("x20000000000000000000"))
        );
    }
}
