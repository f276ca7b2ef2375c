//! SoundCharts API client — chart rankings, song metadata, artist audience.
//!
//! Auth is two headers (`x-app-id` + `x-api-key`). Single objects come back
//! wrapped in `{"object": …}`, collections in `{"items": […], "page": …}`.

use reqwest::Client;
use serde::Deserialize;

use crate::error::ConnectError;

const DEFAULT_BASE_URL: &str = "https://customer.api.soundcharts.com";
const USER_AGENT: &str = "Chartpulse/0.1.0 (https://github.com/chartpulse)";

/// Items per ranking page request
const PAGE_LIMIT: u64 = 100;
/// Pagination ceiling in case the reported `total` is missing or absurd
const MAX_OFFSET: u64 = 5000;

#[derive(Debug, Clone)]
pub struct SoundchartsConfig {
    pub base_url: String,
    pub app_id: String,
    pub api_key: String,
}

impl SoundchartsConfig {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id: app_id.into(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ─── Response types ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ObjectWrapper<T> {
    object: T,
}

#[derive(Debug, Deserialize)]
struct ItemsPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    page: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingItem {
    pub position: i32,
    pub old_position: Option<i32>,
    pub position_evolution: Option<i32>,
    pub time_on_chart: Option<i32>,
    /// Platform metric behind the position (streams, plays)
    pub metric: Option<i64>,
    pub song: RankingSong,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSong {
    pub uuid: String,
    pub name: String,
    pub credit_name: Option<String>,
    pub image_url: Option<String>,
    pub isrc: Option<String>,
    #[serde(default)]
    pub artists: Vec<SongArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SongArtist {
    pub uuid: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDetail {
    pub uuid: String,
    pub name: String,
    pub credit_name: Option<String>,
    pub isrc: Option<String>,
    /// Seconds
    pub duration: Option<i32>,
    /// "YYYY-MM-DD", sometimes with a time suffix
    pub release_date: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub artists: Vec<SongArtist>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDetail {
    pub uuid: String,
    pub name: String,
    pub image_url: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudiencePoint {
    pub date: Option<String>,
    pub follower_count: Option<i64>,
    pub monthly_listeners: Option<i64>,
}

// ─── Client ─────────────────────────────────────────────────────────

pub struct SoundchartsClient {
    client: Client,
    config: SoundchartsConfig,
}

impl SoundchartsClient {
    pub fn new(config: SoundchartsConfig) -> Result<Self, ConnectError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { client, config })
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ConnectError> {
        let resp = self
            .client
            .get(format!("{}{}", self.config.base_url, path))
            .header("x-app-id", &self.config.app_id)
            .header("x-api-key", &self.config.api_key)
            .query(query)
            .send()
            .await?;
        Ok(resp)
    }

    async fn decode_object<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, ConnectError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ConnectError::api("soundcharts", status, message));
        }
        let wrapper: ObjectWrapper<T> = resp
            .json()
            .await
            .map_err(|e| ConnectError::Decode(format!("{what}: {e}")))?;
        Ok(wrapper.object)
    }

    /// Fetch the full ranking for one chart on one date, following pagination.
    ///
    /// Returns `Ok(None)` when the provider has no ranking for that date —
    /// charts are not published every day, so a 404 here is a normal outcome,
    /// not an error.
    pub async fn get_chart_ranking(
        &self,
        slug: &str,
        date: chrono::NaiveDate,
    ) -> Result<Option<Vec<RankingItem>>, ConnectError> {
        let path = format!("/api/v2.14/chart/song/{slug}/ranking/{date}T00:00:00");
        let mut items: Vec<RankingItem> = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let resp = self
                .get(
                    &path,
                    &[
                        ("offset", offset.to_string()),
                        ("limit", PAGE_LIMIT.to_string()),
                    ],
                )
                .await?;

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let message = resp.text().await.unwrap_or_default();
                return Err(ConnectError::api("soundcharts", status, message));
            }

            let page: ItemsPage<RankingItem> = resp
                .json()
                .await
                .map_err(|e| ConnectError::Decode(format!("ranking page: {e}")))?;

            let got = page.items.len() as u64;
            items.extend(page.items);
            offset += got;

            let total = page.page.and_then(|p| p.total);
            let exhausted = got < PAGE_LIMIT
                || total.is_some_and(|t| offset >= t)
                || offset >= MAX_OFFSET;
            if exhausted {
                break;
            }
        }

        Ok(Some(items))
    }

    /// Fetch song metadata by SoundCharts uuid.
    pub async fn get_song(&self, uuid: &str) -> Result<SongDetail, ConnectError> {
        let resp = self.get(&format!("/api/v2.25/song/{uuid}"), &[]).await?;
        Self::decode_object(resp, "song").await
    }

    /// Fetch artist metadata by SoundCharts uuid.
    pub async fn get_artist(&self, uuid: &str) -> Result<ArtistDetail, ConnectError> {
        let resp = self.get(&format!("/api/v2/artist/{uuid}"), &[]).await?;
        Self::decode_object(resp, "artist").await
    }

    /// Fetch recent audience points for an artist on a platform
    /// ("spotify", "instagram", …). Newest first.
    pub async fn get_artist_audience(
        &self,
        uuid: &str,
        platform: &str,
    ) -> Result<Vec<AudiencePoint>, ConnectError> {
        let resp = self
            .get(&format!("/api/v2/artist/{uuid}/audience/{platform}"), &[])
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ConnectError::api("soundcharts", status, message));
        }

        let page: ItemsPage<AudiencePoint> = resp
            .json()
            .await
            .map_err(|e| ConnectError::Decode(format!("audience: {e}")))?;
        Ok(page.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> SoundchartsClient {
        SoundchartsClient::new(
            SoundchartsConfig::new("test-app", "test-key").with_base_url(server.uri()),
        )
        .unwrap()
    }

    fn ranking_item(position: i32, uuid: &str, name: &str) -> serde_json::Value {
        json!({
            "position": position,
            "oldPosition": position + 1,
            "positionEvolution": 1,
            "timeOnChart": 3,
            "metric": 1_000_000 - position as i64,
            "song": {
                "uuid": uuid,
                "name": name,
                "creditName": format!("{name} feat. Other"),
                "imageUrl": "https://img.example.com/song.jpg",
                "isrc": "USUM71703861",
                "artists": [{"uuid": "artist-uuid-1", "name": "Some Artist"}]
            }
        })
    }

    #[tokio::test]
    async fn test_get_chart_ranking_single_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(
                "/api/v2.14/chart/song/spotify-top-200-fr/ranking/2024-03-01T00:00:00",
            ))
            .and(header("x-app-id", "test-app"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [ranking_item(1, "s-1", "Song One"), ranking_item(2, "s-2", "Song Two")],
                "page": {"offset": 0, "limit": 100, "total": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let items = client
            .get_chart_ranking("spotify-top-200-fr", date)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].position, 1);
        assert_eq!(items[0].song.uuid, "s-1");
        assert_eq!(items[0].song.isrc.as_deref(), Some("USUM71703861"));
        assert_eq!(items[1].metric, Some(999_998));
    }

    #[tokio::test]
    async fn test_get_chart_ranking_paginates() {
        let server = MockServer::start().await;
        let first: Vec<serde_json::Value> = (1..=100)
            .map(|i| ranking_item(i, &format!("s-{i}"), &format!("Song {i}")))
            .collect();

        Mock::given(method("GET"))
            .and(path(
                "/api/v2.14/chart/song/spotify-top-200-fr/ranking/2024-03-01T00:00:00",
            ))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": first,
                "page": {"offset": 0, "limit": 100, "total": 101}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(
                "/api/v2.14/chart/song/spotify-top-200-fr/ranking/2024-03-01T00:00:00",
            ))
            .and(query_param("offset", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [ranking_item(101, "s-101", "Song 101")],
                "page": {"offset": 100, "limit": 100, "total": 101}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let items = client
            .get_chart_ranking("spotify-top-200-fr", date)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(items.len(), 101);
        assert_eq!(items[100].position, 101);
    }

    #[tokio::test]
    async fn test_get_chart_ranking_unpublished_date_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errors": [{"message": "Chart ranking not found"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let result = client.get_chart_ranking("spotify-top-200-fr", date).await;

        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_get_chart_ranking_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = client
            .get_chart_ranking("spotify-top-200-fr", date)
            .await
            .unwrap_err();

        match err {
            ConnectError::Api { status, .. } => assert_eq!(status, 500),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_song() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2.25/song/song-uuid-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": {
                    "uuid": "song-uuid-9",
                    "name": "Shape of You",
                    "creditName": "Ed Sheeran",
                    "isrc": "GBAHS1600463",
                    "duration": 233,
                    "releaseDate": "2017-01-06",
                    "imageUrl": "https://img.example.com/shape.jpg",
                    "artists": [{"uuid": "a-1", "name": "Ed Sheeran"}]
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let song = client.get_song("song-uuid-9").await.unwrap();

        assert_eq!(song.name, "Shape of You");
        assert_eq!(song.duration, Some(233));
        assert_eq!(song.release_date.as_deref(), Some("2017-01-06"));
        assert_eq!(song.artists.len(), 1);
    }

    #[tokio::test]
    async fn test_get_artist_audience() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/artist/a-1/audience/spotify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"date": "2024-03-01", "followerCount": 111_222_333, "monthlyListeners": 80_000_000},
                    {"date": "2024-02-29", "followerCount": 111_000_000, "monthlyListeners": 79_500_000}
                ],
                "page": {"total": 2}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let points = client.get_artist_audience("a-1", "spotify").await.unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].follower_count, Some(111_222_333));
        assert_eq!(points[0].monthly_listeners, Some(80_000_000));
    }
}
