use crate::store::PointStore;
use crate::supabase::{NewPointRow, PointRow, UserRow};
use crate::{Player, Point};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use reqwest::{Client, RequestBuilder};
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

const POINTS_TABLE: &str = "points";
const USERS_TABLE: &str = "users";

/// PostgREST client for the score database.
#[derive(Debug, Clone)]
pub struct SupabaseApi {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    NotFound(String),
    MissingId,
    Other(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::MissingId => write!(f, "Point has no server id yet"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl SupabaseApi {
    /// `base_url` is the project URL, e.g. `https://xyz.supabase.co`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("courtside/0.1 (volleyball scorekeeper)")
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch every point created today (UTC), oldest first.
    pub async fn fetch_todays_points(&self) -> ApiResult<Vec<Point>> {
        let (from, to) = day_window(Utc::now().date_naive());
        let url = format!(
            "{}?select=*&created_at=gte.{from}&created_at=lt.{to}&order=created_at.asc",
            self.table_url(POINTS_TABLE)
        );
        let rows: Vec<PointRow> = self.get(&url).await?;
        Ok(rows.into_iter().map(Point::from).collect())
    }

    /// Insert a point and return the id the database assigned to it.
    pub async fn add_point(&self, point: &Point) -> ApiResult<Option<String>> {
        let url = self.table_url(POINTS_TABLE);
        let request = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(&NewPointRow::from(point));
        let rows: Vec<PointRow> = self.send_json(request, &url).await?;
        Ok(rows.into_iter().next().and_then(|row| row.id))
    }

    /// Look up the newest point by creation time, then delete it by id.
    pub async fn delete_last_point(&self) -> ApiResult<Option<Point>> {
        let url = format!(
            "{}?select=*&order=created_at.desc&limit=1",
            self.table_url(POINTS_TABLE)
        );
        let rows: Vec<PointRow> = self.get(&url).await?;
        let Some(last) = rows.into_iter().next().map(Point::from) else {
            return Ok(None);
        };
        let Some(id) = last.id.clone() else {
            return Ok(None);
        };
        self.delete_by_id(&id).await?;
        Ok(Some(last))
    }

    pub async fn delete_by_id(&self, id: &str) -> ApiResult<()> {
        let url = format!("{}?id=eq.{id}", self.table_url(POINTS_TABLE));
        self.delete(&url).await
    }

    pub async fn delete_all_todays_points(&self) -> ApiResult<()> {
        let (from, to) = day_window(Utc::now().date_naive());
        let url = format!(
            "{}?created_at=gte.{from}&created_at=lt.{to}",
            self.table_url(POINTS_TABLE)
        );
        self.delete(&url).await
    }

    pub async fn fetch_users(&self) -> ApiResult<Vec<Player>> {
        let url = format!("{}?select=*", self.table_url(USERS_TABLE));
        let rows: Vec<UserRow> = self.get(&url).await?;
        Ok(rows.into_iter().filter_map(UserRow::into_player).collect())
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let request = self.authorized(self.client.get(url));
        self.send_json(request, url).await
    }

    async fn delete(&self, url: &str) -> ApiResult<()> {
        let response = self
            .authorized(self.client.delete(url))
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))?;
        response
            .error_for_status()
            .map(|_| ())
            .map_err(|e| ApiError::Api(e, url.to_owned()))
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> ApiResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))?;

        match response.error_for_status() {
            Ok(res) => res
                .json::<T>()
                .await
                .map_err(|e| ApiError::Parsing(e, url.to_owned())),
            Err(e) => Err(ApiError::Api(e, url.to_owned())),
        }
    }
}

#[async_trait]
impl PointStore for SupabaseApi {
    async fn fetch_todays_points(&self) -> ApiResult<Vec<Point>> {
        SupabaseApi::fetch_todays_points(self).await
    }

    async fn append_point(&self, point: &Point) -> ApiResult<Option<String>> {
        self.add_point(point).await
    }

    async fn delete_most_recent_point(&self) -> ApiResult<Option<Point>> {
        self.delete_last_point().await
    }

    async fn delete_point(&self, id: &str) -> ApiResult<()> {
        self.delete_by_id(id).await
    }

    async fn delete_all_points_for_today(&self) -> ApiResult<()> {
        self.delete_all_todays_points().await
    }

    async fn fetch_player_roster(&self) -> ApiResult<Vec<Player>> {
        self.fetch_users().await
    }
}

/// Half-open `[day, day + 1)` window, formatted for PostgREST filters.
fn day_window(day: NaiveDate) -> (String, String) {
    let start = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let end = day
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (
        start.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        end.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )
}
