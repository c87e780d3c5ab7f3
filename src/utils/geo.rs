/// Mean Earth radius in metres
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS84 points in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Normalize a UK postcode to its canonical "OUTCODE INCODE" form.
///
/// Returns `None` when the input does not look like a postcode at all, so
/// callers can fall back to free-text geocoding. The check is structural
/// (outward 2-4 alphanumerics starting with a letter, inward digit + two
/// letters), not a full validation against the postcode file.
pub fn normalize_postcode(input: &str) -> Option<String> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if compact.len() < 5 || compact.len() > 7 {
        return None;
    }

    if !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let (outward, inward) = compact.split_at(compact.len() - 3);

    if outward.len() < 2 || outward.len() > 4 {
        return None;
    }

    let mut outward_chars = outward.chars();
    if !outward_chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    // Outward codes always contain at least one digit (e.g. SW1A, M1, EC1)
    if !outward.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut inward_chars = inward.chars();
    let first_in = inward_chars.next()?;
    if !first_in.is_ascii_digit() {
        return None;
    }
    if !inward_chars.all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some(format!("{} {}", outward, inward))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_m(51.5, -0.12, 51.5, -0.12), 0.0);
    }

    #[test]
    fn test_haversine_london_landmarks() {
        // Trafalgar Square to Buckingham Palace, roughly 900m as the crow flies
        let d = haversine_m(51.5080, -0.1281, 51.5014, -0.1419);
        assert!(d > 800.0 && d < 1400.0, "unexpected distance: {d}");
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = haversine_m(51.5, -0.1, 53.48, -2.24);
        let b = haversine_m(53.48, -2.24, 51.5, -0.1);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_postcode_standard_forms() {
        assert_eq!(
            normalize_postcode("sw1a2aa"),
            Some("SW1A 2AA".to_string())
        );
        assert_eq!(
            normalize_postcode("SW1A 2AA"),
            Some("SW1A 2AA".to_string())
        );
        assert_eq!(normalize_postcode("m1 1ae"), Some("M1 1AE".to_string()));
        assert_eq!(
            normalize_postcode("  ec1a 1bb "),
            Some("EC1A 1BB".to_string())
        );
    }

    #[test]
    fn test_normalize_postcode_rejects_free_text() {
        assert_eq!(normalize_postcode("10 Downing Street"), None);
        assert_eq!(normalize_postcode("London"), None);
        assert_eq!(normalize_postcode(""), None);
        assert_eq!(normalize_postcode("ABCDEF"), None);
        assert_eq!(normalize_postcode("12345"), None);
    }

    #[test]
    fn test_normalize_postcode_rejects_bad_inward() {
        // Inward part must be digit + two letters
        assert_eq!(normalize_postcode("SW1A 2A1"), None);
        assert_eq!(normalize_postcode("SW1A AAA"), None);
    }
}
