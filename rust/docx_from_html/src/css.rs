//! Just enough CSS to carry inline `style` attributes into run and
//! paragraph properties.

use std::collections::BTreeMap;

pub const TWIPS_PER_PX: f64 = 15.0;
pub const TWIPS_PER_PT: f64 = 20.0;
pub const EMU_PER_PX: u64 = 9525;
pub const EMU_PER_TWIP: u64 = 635;

/// Split `a: b; c: d` into a lower-cased key map. Later declarations win.
pub fn parse_style(raw: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for decl in raw.split(';') {
        let Some((key, value)) = decl.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().trim_end_matches("!important").trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        out.insert(key, value.to_string());
    }
    out
}

fn split_number(raw: &str) -> Option<(f64, &str)> {
    let raw = raw.trim();
    let end = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(raw.len());
    let value: f64 = raw[..end].parse().ok()?;
    Some((value, raw[end..].trim()))
}

/// Length in twips. `%` and `em` are resolved against `reference` twips.
pub fn length_to_twips(raw: &str, reference: u32) -> Option<u32> {
    let (value, unit) = split_number(raw)?;
    let twips = match unit.to_ascii_lowercase().as_str() {
        "" | "px" => value * TWIPS_PER_PX,
        "pt" => value * TWIPS_PER_PT,
        "in" => value * 1440.0,
        "cm" => value * 567.0,
        "mm" => value * 56.7,
        "em" | "rem" => value * 240.0,
        "%" => value * f64::from(reference) / 100.0,
        _ => return None,
    };
    (twips >= 0.0).then(|| twips.round() as u32)
}

/// Font size in half points.
pub fn font_size_to_half_points(raw: &str) -> Option<u32> {
    let (value, unit) = split_number(raw)?;
    let half_points = match unit.to_ascii_lowercase().as_str() {
        "pt" => value * 2.0,
        "" | "px" => value * 1.5,
        "em" | "rem" => value * 24.0,
        _ => return None,
    };
    (half_points > 0.0).then(|| half_points.round() as u32)
}

const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "000000"),
    ("white", "FFFFFF"),
    ("red", "FF0000"),
    ("green", "008000"),
    ("blue", "0000FF"),
    ("yellow", "FFFF00"),
    ("orange", "FFA500"),
    ("purple", "800080"),
    ("gray", "808080"),
    ("grey", "808080"),
    ("silver", "C0C0C0"),
    ("navy", "000080"),
    ("teal", "008080"),
    ("maroon", "800000"),
];

/// Colour as an upper-case `RRGGBB` hex string.
pub fn color_to_hex(raw: &str) -> Option<String> {
    let raw = raw.trim().to_ascii_lowercase();
    if let Some(hex) = raw.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return match hex.len() {
            3 => Some(hex.chars().flat_map(|c| [c, c]).collect::<String>().to_ascii_uppercase()),
            6 => Some(hex.to_ascii_uppercase()),
            _ => None,
        };
    }
    if let Some(inner) = raw
        .strip_prefix("rgb(")
        .or_else(|| raw.strip_prefix("rgba("))
        .and_then(|s| s.strip_suffix(')'))
    {
        let parts: Vec<u8> = inner
            .split(',')
            .take(3)
            .filter_map(|p| p.trim().parse::<f64>().ok())
            .map(|v| v.clamp(0.0, 255.0) as u8)
            .collect();
        if parts.len() != 3 {
            return None;
        }
        return Some(format!("{:02X}{:02X}{:02X}", parts[0], parts[1], parts[2]));
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, hex)| hex.to_string())
}

/// `text-align` → `w:jc` value.
pub fn justification(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "left" | "start" => Some("left"),
        "center" => Some("center"),
        "right" | "end" => Some("right"),
        "justify" => Some("both"),
        _ => None,
    }
}
