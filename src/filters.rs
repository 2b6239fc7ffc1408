//! Typed filters for list operations.
//!
//! Every filter struct validates itself and produces the query-string pairs
//! for its endpoint through [`ListFilters::to_query`]. Fields mirror the API's
//! query parameters; unset `Option`s are left out of the request.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::Result;
use crate::models::Coordinates;
use crate::validate::{
    DEFAULT_LIMIT, DEFAULT_PAGE, validate_country, validate_data, validate_id, validate_ids,
    validate_limit, validate_order_by, validate_page, validate_rollup, validate_spatial,
    validate_time_window,
};

/// Query-string pairs in the order they were added.
pub type QueryParams = Vec<(&'static str, String)>;

/// Validation plus query encoding for one list endpoint.
pub trait ListFilters {
    fn to_query(&self) -> Result<QueryParams>;
}

/// Rectangle filter, WGS 84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Pollutant,
    Meteorological,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pollutant => "pollutant",
            Self::Meteorological => "meteorological",
        }
    }
}

/// Base resolution of a measurements query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Measurements,
    Hours,
    Days,
    Years,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measurements => "measurements",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Years => "years",
        }
    }

    /// Days and years are filtered by calendar date rather than by instant.
    pub fn uses_dates(&self) -> bool {
        matches!(self, Self::Days | Self::Years)
    }

    pub fn rollups(&self) -> &'static [Rollup] {
        match self {
            Self::Measurements => &[Rollup::Hourly, Rollup::Daily],
            Self::Hours => &[
                Rollup::Daily,
                Rollup::Monthly,
                Rollup::Yearly,
                Rollup::HourOfDay,
                Rollup::DayOfWeek,
                Rollup::MonthOfYear,
            ],
            Self::Days => &[Rollup::Monthly, Rollup::Yearly],
            Self::Years => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollup {
    Hourly,
    Daily,
    Monthly,
    Yearly,
    HourOfDay,
    DayOfWeek,
    MonthOfYear,
}

impl Rollup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::HourOfDay => "hourofday",
            Self::DayOfWeek => "dayofweek",
            Self::MonthOfYear => "monthofyear",
        }
    }
}

#[derive(Default)]
struct QueryBuilder {
    params: QueryParams,
}

impl QueryBuilder {
    fn push(&mut self, key: &'static str, value: impl ToString) -> &mut Self {
        self.params.push((key, value.to_string()));
        self
    }

    fn push_opt<V: ToString>(&mut self, key: &'static str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    fn push_ids(&mut self, key: &'static str, ids: Option<&[u32]>) -> Result<&mut Self> {
        if let Some(ids) = ids {
            validate_ids(key, ids)?;
            self.push(key, join(ids));
        }
        Ok(self)
    }

    fn paging(
        &mut self,
        page: u32,
        limit: u32,
        order_by: Option<&str>,
        sort_order: Option<SortOrder>,
    ) -> Result<&mut Self> {
        self.push("page", validate_page(page)?);
        self.push("limit", validate_limit(limit)?);
        if let Some(order_by) = order_by {
            self.push("order_by", validate_order_by(order_by)?);
        }
        self.push_opt("sort_order", sort_order.map(|s| s.as_str()));
        Ok(self)
    }

    fn spatial(
        &mut self,
        coordinates: Option<&Coordinates>,
        radius: Option<u32>,
        bbox: Option<&BoundingBox>,
    ) -> Result<&mut Self> {
        validate_spatial(coordinates, radius, bbox)?;
        if let (Some(c), Some(r)) = (coordinates, radius) {
            self.push("coordinates", format!("{},{}", c.latitude, c.longitude));
            self.push("radius", r);
        }
        if let Some(b) = bbox {
            self.push(
                "bbox",
                format!("{},{},{},{}", b.min_lon, b.min_lat, b.max_lon, b.max_lat),
            );
        }
        Ok(self)
    }

    fn country(&mut self, iso: Option<&str>, countries_id: Option<&[u32]>) -> Result<&mut Self> {
        let iso = validate_country(iso, countries_id)?;
        self.push_opt("iso", iso);
        self.push_ids("countries_id", countries_id)
    }

    fn finish(&mut self) -> QueryParams {
        std::mem::take(&mut self.params)
    }
}

fn join(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

macro_rules! paging_setters {
    ($ty:ty) => {
        impl $ty {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn page(mut self, page: u32) -> Self {
                self.page = page;
                self
            }

            pub fn limit(mut self, limit: u32) -> Self {
                self.limit = limit;
                self
            }

            pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
                self.order_by = Some(order_by.into());
                self
            }

            pub fn sort_order(mut self, sort_order: SortOrder) -> Self {
                self.sort_order = Some(sort_order);
                self
            }
        }
    };
}

/// Pagination and ordering only. Used by instruments, manufacturers, owners
/// and licenses.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFilters {
    pub page: u32,
    pub limit: u32,
    pub order_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl Default for PageFilters {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            order_by: None,
            sort_order: None,
        }
    }
}

paging_setters!(PageFilters);

impl ListFilters for PageFilters {
    fn to_query(&self) -> Result<QueryParams> {
        let mut q = QueryBuilder::default();
        q.paging(
            self.page,
            self.limit,
            self.order_by.as_deref(),
            self.sort_order,
        )?;
        Ok(q.finish())
    }
}

pub type InstrumentsFilters = PageFilters;
pub type ManufacturersFilters = PageFilters;
pub type OwnersFilters = PageFilters;
pub type LicensesFilters = PageFilters;

#[derive(Debug, Clone, PartialEq)]
pub struct LocationsFilters {
    pub page: u32,
    pub limit: u32,
    pub order_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub coordinates: Option<Coordinates>,
    /// Metres around `coordinates`.
    pub radius: Option<u32>,
    pub bbox: Option<BoundingBox>,
    pub providers_id: Option<Vec<u32>>,
    pub countries_id: Option<Vec<u32>>,
    pub parameters_id: Option<Vec<u32>>,
    pub licenses_id: Option<Vec<u32>>,
    pub instruments_id: Option<Vec<u32>>,
    pub manufacturers_id: Option<Vec<u32>>,
    pub owners_id: Option<Vec<u32>>,
    pub iso: Option<String>,
    /// Reference-grade monitors (`true`) or air sensors (`false`).
    pub monitor: Option<bool>,
    pub mobile: Option<bool>,
}

impl Default for LocationsFilters {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            order_by: None,
            sort_order: None,
            coordinates: None,
            radius: None,
            bbox: None,
            providers_id: None,
            countries_id: None,
            parameters_id: None,
            licenses_id: None,
            instruments_id: None,
            manufacturers_id: None,
            owners_id: None,
            iso: None,
            monitor: None,
            mobile: None,
        }
    }
}

paging_setters!(LocationsFilters);

impl LocationsFilters {
    pub fn near(mut self, coordinates: Coordinates, radius: u32) -> Self {
        self.coordinates = Some(coordinates);
        self.radius = Some(radius);
        self
    }

    pub fn within(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn iso(mut self, iso: impl Into<String>) -> Self {
        self.iso = Some(iso.into());
        self
    }
}

impl ListFilters for LocationsFilters {
    fn to_query(&self) -> Result<QueryParams> {
        let mut q = QueryBuilder::default();
        q.paging(
            self.page,
            self.limit,
            self.order_by.as_deref(),
            self.sort_order,
        )?
        .spatial(self.coordinates.as_ref(), self.radius, self.bbox.as_ref())?
        .country(self.iso.as_deref(), self.countries_id.as_deref())?
        .push_ids("providers_id", self.providers_id.as_deref())?
        .push_ids("parameters_id", self.parameters_id.as_deref())?
        .push_ids("licenses_id", self.licenses_id.as_deref())?
        .push_ids("instruments_id", self.instruments_id.as_deref())?
        .push_ids("manufacturers_id", self.manufacturers_id.as_deref())?
        // the locations endpoint names this filter after owner contacts
        .push_ids("owner_contacts_id", self.owners_id.as_deref())?
        .push_opt("monitor", self.monitor)
        .push_opt("mobile", self.mobile);
        Ok(q.finish())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParametersFilters {
    pub page: u32,
    pub limit: u32,
    pub order_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub parameter_type: Option<ParameterType>,
    pub coordinates: Option<Coordinates>,
    pub radius: Option<u32>,
    pub bbox: Option<BoundingBox>,
    pub iso: Option<String>,
    pub countries_id: Option<Vec<u32>>,
}

impl Default for ParametersFilters {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            order_by: None,
            sort_order: None,
            parameter_type: None,
            coordinates: None,
            radius: None,
            bbox: None,
            iso: None,
            countries_id: None,
        }
    }
}

paging_setters!(ParametersFilters);

impl ListFilters for ParametersFilters {
    fn to_query(&self) -> Result<QueryParams> {
        let mut q = QueryBuilder::default();
        q.paging(
            self.page,
            self.limit,
            self.order_by.as_deref(),
            self.sort_order,
        )?
        .push_opt("parameter_type", self.parameter_type.map(|p| p.as_str()))
        .spatial(self.coordinates.as_ref(), self.radius, self.bbox.as_ref())?
        .country(self.iso.as_deref(), self.countries_id.as_deref())?;
        Ok(q.finish())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvidersFilters {
    pub page: u32,
    pub limit: u32,
    pub order_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub parameters_id: Option<Vec<u32>>,
    pub monitor: Option<bool>,
    pub coordinates: Option<Coordinates>,
    pub radius: Option<u32>,
    pub bbox: Option<BoundingBox>,
    pub iso: Option<String>,
    pub countries_id: Option<Vec<u32>>,
}

impl Default for ProvidersFilters {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            order_by: None,
            sort_order: None,
            parameters_id: None,
            monitor: None,
            coordinates: None,
            radius: None,
            bbox: None,
            iso: None,
            countries_id: None,
        }
    }
}

paging_setters!(ProvidersFilters);

impl ListFilters for ProvidersFilters {
    fn to_query(&self) -> Result<QueryParams> {
        let mut q = QueryBuilder::default();
        q.paging(
            self.page,
            self.limit,
            self.order_by.as_deref(),
            self.sort_order,
        )?
        .push_ids("parameters_id", self.parameters_id.as_deref())?
        .push_opt("monitor", self.monitor)
        .spatial(self.coordinates.as_ref(), self.radius, self.bbox.as_ref())?
        .country(self.iso.as_deref(), self.countries_id.as_deref())?;
        Ok(q.finish())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountriesFilters {
    pub page: u32,
    pub limit: u32,
    pub order_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub parameters_id: Option<Vec<u32>>,
    pub providers_id: Option<Vec<u32>>,
}

impl Default for CountriesFilters {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            order_by: None,
            sort_order: None,
            parameters_id: None,
            providers_id: None,
        }
    }
}

paging_setters!(CountriesFilters);

impl ListFilters for CountriesFilters {
    fn to_query(&self) -> Result<QueryParams> {
        let mut q = QueryBuilder::default();
        q.paging(
            self.page,
            self.limit,
            self.order_by.as_deref(),
            self.sort_order,
        )?
        .push_ids("parameters_id", self.parameters_id.as_deref())?
        .push_ids("providers_id", self.providers_id.as_deref())?;
        Ok(q.finish())
    }
}

/// Filters for `/sensors/{id}/{data}[/{rollup}]`.
///
/// `data` must be set; there is no default kind.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementsFilters {
    pub sensors_id: u32,
    pub data: Option<DataKind>,
    pub rollup: Option<Rollup>,
    pub datetime_from: Option<DateTime<Utc>>,
    pub datetime_to: Option<DateTime<Utc>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: u32,
    pub limit: u32,
}

impl MeasurementsFilters {
    pub fn new(sensors_id: u32) -> Self {
        Self {
            sensors_id,
            data: None,
            rollup: None,
            datetime_from: None,
            datetime_to: None,
            date_from: None,
            date_to: None,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn data(mut self, data: DataKind) -> Self {
        self.data = Some(data);
        self
    }

    pub fn rollup(mut self, rollup: Rollup) -> Self {
        self.rollup = Some(rollup);
        self
    }

    pub fn datetimes(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.datetime_from = from;
        self.datetime_to = to;
        self
    }

    pub fn dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Resource path relative to the API root, after validation.
    pub fn path(&self) -> Result<String> {
        let sensors_id = validate_id(self.sensors_id)?;
        let data = validate_data(self.data)?;
        let path = match validate_rollup(data, self.rollup)? {
            Some(rollup) => format!("sensors/{sensors_id}/{}/{}", data.as_str(), rollup.as_str()),
            None => format!("sensors/{sensors_id}/{}", data.as_str()),
        };
        Ok(path)
    }
}

impl ListFilters for MeasurementsFilters {
    fn to_query(&self) -> Result<QueryParams> {
        let data = validate_data(self.data)?;
        validate_time_window(
            data,
            (self.date_from, self.date_to),
            (self.datetime_from, self.datetime_to),
        )?;
        let mut q = QueryBuilder::default();
        q.push_opt("datetime_from", self.datetime_from.as_ref().map(format_datetime))
            .push_opt("datetime_to", self.datetime_to.as_ref().map(format_datetime))
            .push_opt("date_from", self.date_from)
            .push_opt("date_to", self.date_to)
            .paging(self.page, self.limit, None, None)?;
        Ok(q.finish())
    }
}
