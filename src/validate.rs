//! Pure checks run on request arguments before anything is sent.
//!
//! Each function either returns the (possibly normalized) value or an
//! [`Error::Validation`]. They do no I/O and can be combined freely; every
//! filter type calls the subset that applies to its fields.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::filters::{BoundingBox, DataKind, Rollup};
use crate::models::Coordinates;

/// Largest identifier the API accepts (signed 32-bit range).
pub const MAX_ID: u32 = i32::MAX as u32;
pub const MAX_LIMIT: u32 = 1_000;
/// Metres.
pub const MAX_RADIUS: u32 = 25_000;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 1_000;

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Validation(message.into()))
}

pub fn validate_id(id: u32) -> Result<u32> {
    if id == 0 || id > MAX_ID {
        return invalid(format!("ID values must be between 1 and {MAX_ID}, got {id}"));
    }
    Ok(id)
}

/// Identifier list filter such as `providers_id`.
pub fn validate_ids(param: &str, ids: &[u32]) -> Result<()> {
    if ids.is_empty() {
        return invalid(format!("query parameter {param} must contain at least one ID"));
    }
    for &id in ids {
        if id == 0 || id > MAX_ID {
            return invalid(format!(
                "query parameter {param} values must be between 1 and {MAX_ID}, got {id}"
            ));
        }
    }
    Ok(())
}

pub fn validate_page(page: u32) -> Result<u32> {
    if page == 0 {
        return invalid("page query parameter must be an integer greater than zero, got 0");
    }
    Ok(page)
}

pub fn validate_limit(limit: u32) -> Result<u32> {
    if limit == 0 || limit > MAX_LIMIT {
        return invalid(format!(
            "limit query parameter must be greater than zero and less than or equal to {MAX_LIMIT}, got {limit}"
        ));
    }
    Ok(limit)
}

pub fn validate_coordinates(coordinates: &Coordinates) -> Result<Coordinates> {
    let Coordinates {
        latitude,
        longitude,
    } = *coordinates;
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return invalid(format!("latitude must be between -90 and 90, got {latitude}"));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return invalid(format!(
            "longitude must be between -180 and 180, got {longitude}"
        ));
    }
    Ok(*coordinates)
}

pub fn validate_radius(radius: u32) -> Result<u32> {
    if radius == 0 || radius > MAX_RADIUS {
        return invalid(format!(
            "radius must be between 1 and {MAX_RADIUS} metres, got {radius}"
        ));
    }
    Ok(radius)
}

pub fn validate_bbox(bbox: &BoundingBox) -> Result<BoundingBox> {
    let values = [bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat];
    if values.iter().any(|v| !v.is_finite()) {
        return invalid("bounding box values must be finite numbers");
    }
    for lat in [bbox.min_lat, bbox.max_lat] {
        if !(-90.0..=90.0).contains(&lat) {
            return invalid(format!("latitudes must be between -90 and 90, got {lat}"));
        }
    }
    for lon in [bbox.min_lon, bbox.max_lon] {
        if !(-180.0..=180.0).contains(&lon) {
            return invalid(format!("longitudes must be between -180 and 180, got {lon}"));
        }
    }
    if bbox.min_lon >= bbox.max_lon {
        return invalid(format!(
            "minimum longitude must be less than maximum longitude, got {} >= {}",
            bbox.min_lon, bbox.max_lon
        ));
    }
    if bbox.min_lat >= bbox.max_lat {
        return invalid(format!(
            "minimum latitude must be less than maximum latitude, got {} >= {}",
            bbox.min_lat, bbox.max_lat
        ));
    }
    Ok(*bbox)
}

/// `coordinates` + `radius` and `bbox` are mutually exclusive spatial
/// filters. Setting neither is an unfiltered query.
pub fn validate_spatial(
    coordinates: Option<&Coordinates>,
    radius: Option<u32>,
    bbox: Option<&BoundingBox>,
) -> Result<()> {
    if bbox.is_some() && (coordinates.is_some() || radius.is_some()) {
        return invalid("bbox cannot be used with coordinates/radius parameters");
    }
    match (coordinates, radius, bbox) {
        (Some(coordinates), Some(radius), _) => {
            validate_coordinates(coordinates)?;
            validate_radius(radius)?;
            Ok(())
        }
        (Some(_), None, _) => invalid("coordinates requires radius parameter"),
        (None, Some(_), _) => invalid("radius requires coordinates parameter"),
        (None, None, Some(bbox)) => validate_bbox(bbox).map(|_| ()),
        (None, None, None) => Ok(()),
    }
}

/// Normalizes to upper case and checks against ISO 3166-1 alpha-2.
pub fn validate_iso(code: &str) -> Result<String> {
    let upper = code.trim().to_ascii_uppercase();
    if upper.len() != 2 || !ISO_CODES.contains(&upper.as_str()) {
        return invalid(format!(
            "iso value must be a valid ISO-3166-1 alpha-2 country code, got {code:?}"
        ));
    }
    Ok(upper)
}

/// `iso` and `countries_id` select countries two different ways; only one
/// may be given.
pub fn validate_country(iso: Option<&str>, countries_id: Option<&[u32]>) -> Result<Option<String>> {
    match (iso, countries_id) {
        (Some(_), Some(_)) => invalid("iso and countries_id cannot be used together"),
        (Some(code), None) => validate_iso(code).map(Some),
        (None, Some(ids)) => validate_ids("countries_id", ids).map(|_| None),
        (None, None) => Ok(None),
    }
}

pub fn validate_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    if let (Some(from), Some(to)) = (from, to) {
        if from >= to {
            return invalid(format!("date_from must be before date_to, got {from} >= {to}"));
        }
    }
    Ok(())
}

pub fn validate_datetime_range(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<()> {
    if let (Some(from), Some(to)) = (from, to) {
        if from >= to {
            return invalid(format!(
                "datetime_from must be before datetime_to, got {} >= {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            ));
        }
    }
    Ok(())
}

/// Checks which time window pair fits the requested data kind.
///
/// Day and year data are filtered by calendar dates (`date_from`/`date_to`),
/// raw measurements and hours by instants (`datetime_from`/`datetime_to`).
pub fn validate_time_window(
    data: DataKind,
    dates: (Option<NaiveDate>, Option<NaiveDate>),
    datetimes: (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
) -> Result<()> {
    let has_dates = dates.0.is_some() || dates.1.is_some();
    let has_datetimes = datetimes.0.is_some() || datetimes.1.is_some();
    if has_dates && has_datetimes {
        return invalid("date_from/date_to cannot be combined with datetime_from/datetime_to");
    }
    if has_dates && !data.uses_dates() {
        return invalid(format!(
            "date_from/date_to are only valid for days or years data, use datetime_from/datetime_to for {}",
            data.as_str()
        ));
    }
    if has_datetimes && data.uses_dates() {
        return invalid(format!(
            "datetime_from/datetime_to are only valid for measurements or hours data, use date_from/date_to for {}",
            data.as_str()
        ));
    }
    validate_date_range(dates.0, dates.1)?;
    validate_datetime_range(datetimes.0, datetimes.1)
}

/// `data` has no default, the caller must say what kind they want.
pub fn validate_data(data: Option<DataKind>) -> Result<DataKind> {
    data.ok_or_else(|| {
        Error::Validation(
            "data is required, must be one of: measurements, hours, days, years".to_string(),
        )
    })
}

pub fn validate_rollup(data: DataKind, rollup: Option<Rollup>) -> Result<Option<Rollup>> {
    let Some(rollup) = rollup else {
        return Ok(None);
    };
    if !data.rollups().contains(&rollup) {
        return invalid(format!(
            "rollup {} is not available for {} data",
            rollup.as_str(),
            data.as_str()
        ));
    }
    Ok(Some(rollup))
}

pub fn validate_order_by(order_by: &str) -> Result<&str> {
    if order_by.trim().is_empty() {
        return invalid("order_by must not be empty");
    }
    Ok(order_by)
}

const ISO_CODES: [&str; 249] = [
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW", "AX",
    "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ",
    "BR", "BS", "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK",
    "CL", "CM", "CN", "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM",
    "DO", "DZ", "EC", "EE", "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FM", "FO", "FR",
    "GA", "GB", "GD", "GE", "GF", "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS",
    "GT", "GU", "GW", "GY", "HK", "HM", "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN",
    "IO", "IQ", "IR", "IS", "IT", "JE", "JM", "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN",
    "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC", "LI", "LK", "LR", "LS", "LT", "LU", "LV",
    "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK", "ML", "MM", "MN", "MO", "MP", "MQ",
    "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ", "NA", "NC", "NE", "NF", "NG", "NI",
    "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG", "PH", "PK", "PL", "PM",
    "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW", "SA", "SB", "SC",
    "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS", "ST", "SV",
    "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO", "TR",
    "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
    "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
];

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox::new(-74.1, 40.6, -73.8, 40.9)
    }

    fn point() -> Coordinates {
        Coordinates::new(40.7, -74.0)
    }

    #[test]
    fn test_iso_list_has_no_duplicates() {
        let mut codes = ISO_CODES.to_vec();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ISO_CODES.len());
    }

    #[test]
    fn test_id_bounds() {
        assert!(validate_id(1).is_ok());
        assert!(validate_id(MAX_ID).is_ok());
        assert!(validate_id(0).is_err());
        assert!(validate_id(MAX_ID + 1).is_err());
        assert!(validate_ids("providers_id", &[1, 2, 3]).is_ok());
        assert!(validate_ids("providers_id", &[1, 0]).is_err());
        assert!(validate_ids("providers_id", &[]).is_err());
    }

    #[test]
    fn test_page_and_limit() {
        assert!(validate_page(1).is_ok());
        assert!(validate_page(0).is_err());
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(MAX_LIMIT).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(MAX_LIMIT + 1).is_err());
    }

    #[test]
    fn test_spatial_exclusivity() {
        assert!(validate_spatial(None, None, None).is_ok());
        assert!(validate_spatial(Some(&point()), Some(1_000), None).is_ok());
        assert!(validate_spatial(None, None, Some(&bbox())).is_ok());

        let both = validate_spatial(Some(&point()), Some(1_000), Some(&bbox()));
        assert!(matches!(both, Err(Error::Validation(_))));
        assert!(validate_spatial(Some(&point()), None, Some(&bbox())).is_err());
        assert!(validate_spatial(None, Some(10), Some(&bbox())).is_err());
        assert!(validate_spatial(Some(&point()), None, None).is_err());
        assert!(validate_spatial(None, Some(10), None).is_err());
    }

    #[test]
    fn test_spatial_values_checked() {
        let far = Coordinates::new(91.0, 0.0);
        assert!(validate_spatial(Some(&far), Some(10), None).is_err());
        assert!(validate_spatial(Some(&point()), Some(MAX_RADIUS + 1), None).is_err());
        assert!(validate_spatial(Some(&point()), Some(0), None).is_err());
        let inverted = BoundingBox::new(-73.8, 40.6, -74.1, 40.9);
        assert!(validate_spatial(None, None, Some(&inverted)).is_err());
        let nan = Coordinates::new(f64::NAN, 0.0);
        assert!(validate_coordinates(&nan).is_err());
        assert!(validate_coordinates(&Coordinates::new(-90.0, 180.0)).is_ok());
    }

    #[test]
    fn test_country_selection() {
        assert_eq!(validate_country(Some("us"), None).unwrap(), Some("US".to_string()));
        assert!(validate_country(Some("XX"), None).is_err());
        assert!(validate_country(Some("USA"), None).is_err());
        assert!(validate_country(None, Some(&[155])).unwrap().is_none());
        assert!(validate_country(Some("US"), Some(&[155])).is_err());
    }

    #[test]
    fn test_date_ordering() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(validate_date_range(Some(a), Some(b)).is_ok());
        assert!(validate_date_range(Some(b), Some(a)).is_err());
        assert!(validate_date_range(Some(a), Some(a)).is_err());
        assert!(validate_date_range(Some(a), None).is_ok());

        let x = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let y = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        assert!(validate_datetime_range(Some(x), Some(y)).is_ok());
        assert!(validate_datetime_range(Some(y), Some(x)).is_err());
        assert!(validate_datetime_range(Some(x), Some(x)).is_err());
    }

    #[test]
    fn test_time_window_pairing() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1);
        let instant = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        assert!(validate_time_window(DataKind::Days, (day, None), (None, None)).is_ok());
        assert!(validate_time_window(DataKind::Hours, (None, None), (instant, None)).is_ok());
        assert!(validate_time_window(DataKind::Hours, (day, None), (None, None)).is_err());
        assert!(validate_time_window(DataKind::Years, (None, None), (instant, None)).is_err());
        assert!(validate_time_window(DataKind::Days, (day, None), (instant, None)).is_err());
    }

    #[test]
    fn test_data_required_and_rollups() {
        assert!(validate_data(None).is_err());
        assert_eq!(validate_data(Some(DataKind::Hours)).unwrap(), DataKind::Hours);
        assert!(validate_rollup(DataKind::Hours, Some(Rollup::DayOfWeek)).is_ok());
        assert!(validate_rollup(DataKind::Measurements, Some(Rollup::Yearly)).is_err());
        assert!(validate_rollup(DataKind::Years, Some(Rollup::Monthly)).is_err());
        assert!(validate_rollup(DataKind::Years, None).unwrap().is_none());
    }

    #[test]
    fn test_order_by() {
        assert!(validate_order_by("id").is_ok());
        assert!(validate_order_by("  ").is_err());
    }
}
