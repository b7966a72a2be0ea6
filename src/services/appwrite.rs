use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::StoreSettings;
use crate::models::{Location, MatchRecord, UserQuery, UserRecord};
use crate::services::store::{StoreError, UserStore};

/// Page size used when walking a collection with cursors
const PAGE_SIZE: usize = 100;
const USER_ID_FIELD: &str = "user_id";
const MATCH_ID_FIELD: &str = "match_id";

/// Collection IDs in Appwrite
#[derive(Debug, Clone)]
pub struct AppwriteCollections {
    pub users: String,
    pub swipes: String,
    pub matches: String,
}

/// Appwrite documents API client implementing the user store
///
/// Handles:
/// - Single-document and membership (`equal("$id", [...])`) user reads
/// - Discovery queries over profile-complete users
/// - Swipe and match lookups for recommendations and the match list
pub struct AppwriteStore {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    client: Client,
    collections: AppwriteCollections,
    membership_limit: usize,
}

impl AppwriteStore {
    /// Create a new Appwrite store client
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collections: AppwriteCollections,
        membership_limit: usize,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            client,
            collections,
            membership_limit: membership_limit.max(1),
        })
    }

    pub fn from_settings(settings: &StoreSettings) -> Result<Self, StoreError> {
        for (name, value) in [
            ("store.endpoint", &settings.endpoint),
            ("store.project_id", &settings.project_id),
            ("store.database_id", &settings.database_id),
        ] {
            if value.is_empty() {
                return Err(StoreError::Unavailable(format!("{} is not configured", name)));
            }
        }

        Self::new(
            settings.endpoint.clone(),
            settings.api_key.clone(),
            settings.project_id.clone(),
            settings.database_id.clone(),
            AppwriteCollections {
                users: settings.collections.users.clone(),
                swipes: settings.collections.swipes.clone(),
                matches: settings.collections.matches.clone(),
            },
            settings.membership_limit,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            collection
        )
    }

    async fn get_json(&self, url: &str) -> Result<Option<Value>, StoreError> {
        let response = self
            .client
            .get(url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::error!("Appwrite request failed: {} - {}", status, body);
            return Err(StoreError::ApiError(format!("{}: {}", status, body)));
        }

        Ok(Some(response.json().await?))
    }

    /// List documents of a collection, walking cursors until `max_rows` or the end
    /// List documents matching `queries`, following cursors up to `max_rows`
    ///
    /// Documents that do not parse are logged and skipped; the rest of the
    /// page is still returned.
    async fn list_documents<T: DeserializeOwned>(
        &self,
        collection: &str,
        id_field: &str,
        queries: &[Value],
        max_rows: usize,
    ) -> Result<Vec<T>, StoreError> {
        let base = self.documents_url(collection);
        let mut rows = Vec::new();
        let mut listed = 0;
        let mut cursor: Option<String> = None;

        while listed < max_rows {
            let page_size = (max_rows - listed).min(PAGE_SIZE);

            let mut page_queries = queries.to_vec();
            page_queries.push(json!({ "method": "limit", "values": [page_size] }));
            if let Some(after) = &cursor {
                page_queries.push(json!({ "method": "cursorAfter", "values": [after] }));
            }

            let url = format!("{}?{}", base, encode_queries(&page_queries));
            tracing::debug!("Listing {} documents (page of {})", collection, page_size);

            let json = self
                .get_json(&url)
                .await?
                .ok_or_else(|| StoreError::ApiError(format!("Collection {} not found", collection)))?;

            let documents = json
                .get("documents")
                .and_then(|d| d.as_array())
                .ok_or_else(|| StoreError::InvalidResponse("Missing documents array".into()))?;

            let page_len = documents.len();
            listed += page_len;
            cursor = documents
                .last()
                .and_then(|d| d.get("$id"))
                .and_then(|id| id.as_str())
                .map(String::from);

            for doc in documents {
                match parse_document(doc, id_field) {
                    Ok(row) => rows.push(row),
                    Err(e) => {
                        let id = doc.get("$id").and_then(Value::as_str).unwrap_or("<unknown>");
                        tracing::warn!("Skipping {} document {}: {}", collection, id, e);
                    }
                }
            }

            if page_len < page_size || cursor.is_none() {
                break;
            }
        }

        Ok(rows)
    }
}

#[async_trait]
impl UserStore for AppwriteStore {
    fn membership_limit(&self) -> usize {
        self.membership_limit
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let url = format!(
            "{}/{}",
            self.documents_url(&self.collections.users),
            urlencoding::encode(user_id)
        );

        tracing::debug!("Fetching user {}", user_id);

        match self.get_json(&url).await? {
            Some(doc) => Ok(Some(parse_document(&doc, USER_ID_FIELD)?)),
            None => Ok(None),
        }
    }

    async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let queries = [json!({ "method": "equal", "attribute": "$id", "values": ids })];
        self.list_documents(&self.collections.users, USER_ID_FIELD, &queries, ids.len())
            .await
    }

    async fn query_users(&self, query: &UserQuery) -> Result<Vec<UserRecord>, StoreError> {
        let mut queries = Vec::new();

        if query.profile_complete {
            queries.push(json!({ "method": "equal", "attribute": "isProfileComplete", "values": [true] }));
        }
        if let Some(min) = query.age_min {
            queries.push(json!({ "method": "greaterThanEqual", "attribute": "age", "values": [min] }));
        }
        if let Some(max) = query.age_max {
            queries.push(json!({ "method": "lessThanEqual", "attribute": "age", "values": [max] }));
        }
        if let Some(education) = &query.education {
            queries.push(json!({ "method": "equal", "attribute": "education", "values": [education] }));
        }

        let users = self
            .list_documents(&self.collections.users, USER_ID_FIELD, &queries, query.limit)
            .await?;

        tracing::debug!("Queried {} users (limit {})", users.len(), query.limit);
        Ok(users)
    }

    async fn swiped_target_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let queries = [json!({ "method": "equal", "attribute": "user_id", "values": [user_id] })];
        let swipes: Vec<Value> = self
            .list_documents(&self.collections.swipes, "swipe_id", &queries, usize::MAX)
            .await?;

        Ok(swipes
            .iter()
            .filter_map(|s| s.get("target_user_id").and_then(|t| t.as_str()))
            .map(String::from)
            .collect())
    }

    async fn active_matches(&self, user_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
        let as_first = [
            json!({ "method": "equal", "attribute": "user1_id", "values": [user_id] }),
            json!({ "method": "equal", "attribute": "is_active", "values": [true] }),
        ];
        let as_second = [
            json!({ "method": "equal", "attribute": "user2_id", "values": [user_id] }),
            json!({ "method": "equal", "attribute": "is_active", "values": [true] }),
        ];

        let (mut first, second): (Vec<MatchRecord>, Vec<MatchRecord>) = futures::try_join!(
            self.list_documents(&self.collections.matches, MATCH_ID_FIELD, &as_first, usize::MAX),
            self.list_documents(&self.collections.matches, MATCH_ID_FIELD, &as_second, usize::MAX),
        )?;

        first.extend(second);
        Ok(first)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        let url = format!("{}?{}", self.documents_url(&self.collections.users), encode_queries(&[
            json!({ "method": "limit", "values": [1] }),
        ]));
        Ok(self.get_json(&url).await?.is_some())
    }
}

fn encode_queries(queries: &[Value]) -> String {
    queries
        .iter()
        .map(|q| format!("queries[]={}", urlencoding::encode(&q.to_string())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Convert an Appwrite document into one of our records
///
/// The document `$id` is stored under `id_field`, replacing any attribute of
/// that name. Other system attributes are dropped. Locations stored as a JSON
/// string or as flat `latitude`/`longitude` attributes are folded into
/// `location`.
fn parse_document<T: DeserializeOwned>(doc: &Value, id_field: &str) -> Result<T, StoreError> {
    let object = doc
        .as_object()
        .ok_or_else(|| StoreError::InvalidResponse("Document is not an object".into()))?;

    let mut data: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !key.starts_with('$'))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if let Some(id) = object.get("$id") {
        data.insert(id_field.to_string(), id.clone());
    }

    if let Some(Value::String(raw)) = data.get("location") {
        let parsed = serde_json::from_str::<Value>(raw).unwrap_or(Value::Null);
        data.insert("location".to_string(), parsed);
    }

    if !data.contains_key("location") {
        let lat = data.get("latitude").and_then(Value::as_f64);
        let lng = data.get("longitude").and_then(Value::as_f64);
        if lat.is_some() || lng.is_some() {
            let location = Location::new(lat.unwrap_or_default(), lng.unwrap_or_default());
            data.remove("latitude");
            data.remove("longitude");
            data.insert("location".to_string(), json!(location));
        }
    }

    serde_json::from_value(Value::Object(data))
        .map_err(|e| StoreError::InvalidResponse(format!("Failed to parse document: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BatchFetcher;
    use mockito::Matcher;
    use std::sync::Arc;

    fn store(base_url: String) -> AppwriteStore {
        AppwriteStore::new(
            base_url,
            "test_key".to_string(),
            "test_project".to_string(),
            "test_db".to_string(),
            AppwriteCollections {
                users: "users".to_string(),
                swipes: "swipes".to_string(),
                matches: "matches".to_string(),
            },
            30,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_document_strips_system_fields() {
        let doc = json!({
            "$id": "u1",
            "$collectionId": "users",
            "$permissions": [],
            "name": "Mali",
            "age": 27,
            "interests": ["hiking"],
            "location": "{\"lat\": 13.75, \"lng\": 100.5}",
            "isProfileComplete": true,
            "job": "designer"
        });

        let user: UserRecord = parse_document(&doc, USER_ID_FIELD).unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.location, Some(Location::new(13.75, 100.5)));
        assert!(user.is_profile_complete);
        assert_eq!(user.extra.get("job"), Some(&json!("designer")));
        assert!(!user.extra.contains_key("$collectionId"));
    }

    #[test]
    fn test_parse_document_flat_coordinates() {
        let doc = json!({ "$id": "u2", "latitude": 1.5, "longitude": 103.8 });

        let user: UserRecord = parse_document(&doc, USER_ID_FIELD).unwrap();
        assert_eq!(user.location, Some(Location::new(1.5, 103.8)));
        assert!(!user.extra.contains_key("latitude"));
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/databases/test_db/collections/users/documents/ghost")
            .match_header("X-Appwrite-Project", "test_project")
            .with_status(404)
            .with_body(r#"{"message":"Document not found"}"#)
            .create_async()
            .await;

        let result = store(server.url()).get_user("ghost").await.unwrap();

        assert!(result.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_membership_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/databases/test_db/collections/users/documents")
            .match_query(Matcher::UrlEncoded(
                "queries[]".into(),
                json!({ "method": "equal", "attribute": "$id", "values": ["u1", "u2"] }).to_string(),
            ))
            .match_header("X-Appwrite-Key", "test_key")
            .with_status(200)
            .with_body(r#"{"total":1,"documents":[{"$id":"u1","name":"Mali"}]}"#)
            .create_async()
            .await;

        let users = store(server.url())
            .get_users_by_ids(&["u1".to_string(), "u2".to_string()])
            .await
            .unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name.as_deref(), Some("Mali"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_surfaces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/databases/test_db/collections/users/documents")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = store(server.url())
            .query_users(&UserQuery { profile_complete: true, limit: 10, ..Default::default() })
            .await;

        assert!(matches!(result, Err(StoreError::ApiError(_))));
    }

    #[test]
    fn test_parse_document_id_replaces_stored_attribute() {
        let doc = json!({ "$id": "u1", "user_id": "stale", "name": "Mali" });

        let user: UserRecord = parse_document(&doc, USER_ID_FIELD).unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.name.as_deref(), Some("Mali"));
    }

    #[test]
    fn test_parse_match_document() {
        let doc = json!({ "$id": "m1", "user1_id": "a", "user2_id": "b", "is_active": true });

        let record: MatchRecord = parse_document(&doc, MATCH_ID_FIELD).unwrap();
        assert_eq!(record.match_id, "m1");
        assert_eq!(record.counterpart("a"), "b");
    }

    #[tokio::test]
    async fn test_malformed_document_skipped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/databases/test_db/collections/users/documents")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"total":3,"documents":[
                    {"$id":"u1","name":"Mali"},
                    {"$id":"u2","name":"Niran","lastLogin":"2024-05-01"},
                    {"$id":"u3","name":"Ploy"}
                ]}"#,
            )
            .create_async()
            .await;

        let store: Arc<dyn UserStore> = Arc::new(store(server.url()));
        let ids: Vec<String> = vec!["u1".into(), "u2".into(), "u3".into()];
        let batch = BatchFetcher::new(store).fetch(&ids).await;

        assert_eq!(batch.failed_partitions, 0);
        assert!(batch.found.contains_key("u1"));
        assert!(batch.found.contains_key("u3"));
        assert_eq!(batch.missing, vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn test_discovery_survives_malformed_document() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/databases/test_db/collections/users/documents")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"total":2,"documents":[
                    {"$id":"u1","age":"twenty"},
                    {"$id":"u2","age":24,"isProfileComplete":true}
                ]}"#,
            )
            .create_async()
            .await;

        let users = store(server.url())
            .query_users(&UserQuery { profile_complete: true, limit: 10, ..Default::default() })
            .await
            .unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, "u2");
    }

    #[test]
    fn test_from_settings_requires_endpoint() {
        let settings = StoreSettings::default();
        assert!(AppwriteStore::from_settings(&settings).is_err());
    }
}
