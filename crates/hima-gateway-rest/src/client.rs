//! HTTP client implementing the hima gateway

use async_trait::async_trait;
use hima_api::{Group, MemberRecord, NewGroup, NewMember, PlansPatch, StatusUpdate};
use hima_gateway::{Gateway, GatewayError, GatewayResult};
use hima_util::{GroupId, InviteCode, UserId};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::query::{self, QueryParams, GROUPS_TABLE, MEMBERS_TABLE};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Membership row with its group embedded
#[derive(Debug, Deserialize)]
struct MembershipRow {
    groups: Option<Group>,
}

/// Gateway over the backend's REST API
pub struct RestGateway {
    client: Client,
    base_url: String,
}

impl RestGateway {
    /// Create a gateway for `base_url`, authenticating with the anon key
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> GatewayResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {anon_key}"))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, table: &str, params: &QueryParams) -> RequestBuilder {
        self.client
            .request(method, query::table_url(&self.base_url, table))
            .query(params)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: QueryParams,
    ) -> GatewayResult<Vec<T>> {
        debug!(table, ?params, "Select");
        let response = send(self.request(Method::GET, table, &params)).await?;
        decode(response).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        params: QueryParams,
    ) -> GatewayResult<Option<T>> {
        Ok(self.select(table, params).await?.into_iter().next())
    }

    async fn insert<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> GatewayResult<T> {
        debug!(table, "Insert");
        let response = send(
            self.request(Method::POST, table, &Vec::new())
                .header("Prefer", "return=representation")
                .json(body),
        )
        .await?;

        decode::<T>(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode(format!("Insert into {table} returned no rows")))
    }

    async fn patch<B: Serialize + Sync>(
        &self,
        table: &str,
        params: QueryParams,
        body: &B,
    ) -> GatewayResult<()> {
        debug!(table, ?params, "Update");
        send(
            self.request(Method::PATCH, table, &params)
                .header("Prefer", "return=minimal")
                .json(body),
        )
        .await?;
        Ok(())
    }
}

fn header_value(value: &str) -> GatewayResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| GatewayError::Internal("Anon key is not a valid header value".into()))
}

/// Send a request and turn non-success statuses into errors
async fn send(request: RequestBuilder) -> GatewayResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::Request(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    warn!(status = %status, message = %message, "Backend request rejected");
    Err(status_error(status, message))
}

fn status_error(status: StatusCode, message: String) -> GatewayError {
    if status == StatusCode::NOT_FOUND {
        return GatewayError::NotFound(message);
    }
    GatewayError::Status {
        status: status.as_u16(),
        message,
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<Vec<T>> {
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::Request(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
}

#[async_trait]
impl Gateway for RestGateway {
    async fn get_group(&self, group_id: &GroupId) -> GatewayResult<Option<Group>> {
        self.select_one(GROUPS_TABLE, query::group_by_id(group_id))
            .await
    }

    async fn get_group_by_invite_code(&self, code: &InviteCode) -> GatewayResult<Option<Group>> {
        self.select_one(GROUPS_TABLE, query::group_by_invite_code(code))
            .await
    }

    async fn get_user_groups(&self, user_id: &UserId) -> GatewayResult<Vec<Group>> {
        let rows: Vec<MembershipRow> = self
            .select(MEMBERS_TABLE, query::user_memberships(user_id))
            .await?;
        Ok(rows.into_iter().filter_map(|row| row.groups).collect())
    }

    async fn get_group_members(&self, group_id: &GroupId) -> GatewayResult<Vec<MemberRecord>> {
        self.select(MEMBERS_TABLE, query::group_members(group_id))
            .await
    }

    async fn find_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> GatewayResult<Option<MemberRecord>> {
        self.select_one(MEMBERS_TABLE, query::find_member(group_id, user_id))
            .await
    }

    async fn insert_group(&self, group: &NewGroup) -> GatewayResult<Group> {
        self.insert(GROUPS_TABLE, group).await
    }

    async fn insert_member(&self, member: &NewMember) -> GatewayResult<MemberRecord> {
        match self.insert::<_, MemberRecord>(MEMBERS_TABLE, member).await {
            // Unique (group_id, user_id) violation
            Err(GatewayError::Status { status: 409, .. }) => {
                Err(GatewayError::AlreadyMember(member.group_id.clone()))
            }
            other => other,
        }
    }

    async fn update_member_status(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        update: &StatusUpdate,
    ) -> GatewayResult<()> {
        let patch = update.to_patch(hima_util::now_utc());
        self.patch(MEMBERS_TABLE, query::member_filter(group_id, user_id), &patch)
            .await
    }

    async fn update_tomorrow_plans(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        plans: &[String],
    ) -> GatewayResult<()> {
        let patch = PlansPatch {
            tomorrow_plans: plans.to_vec(),
            last_active: hima_util::format_instant(&hima_util::now_utc()),
        };
        self.patch(MEMBERS_TABLE, query::member_filter(group_id, user_id), &patch)
            .await
    }

    async fn is_healthy(&self) -> bool {
        let params = vec![("select", "id".to_string()), ("limit", "1".to_string())];
        match send(self.request(Method::GET, GROUPS_TABLE, &params)).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let gateway =
            RestGateway::new("https://abc.supabase.co/", "key", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(gateway.base_url(), "https://abc.supabase.co");
    }

    #[test]
    fn invalid_anon_key_is_rejected() {
        let result = RestGateway::new("https://abc.supabase.co", "bad\nkey", DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(GatewayError::Internal(_))));
    }

    #[test]
    fn not_found_status_maps_to_not_found() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "gone".into()),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "dup".into()),
            GatewayError::Status { status: 409, .. }
        ));
    }

    #[test]
    fn membership_rows_skip_missing_groups() {
        let rows: Vec<MembershipRow> = serde_json::from_str(
            r#"[
                {"group_id": "g1", "groups": {"id": "g1", "name": "one", "invite_code": "AB12CD34", "created_at": null}},
                {"group_id": "g2", "groups": null}
            ]"#,
        )
        .unwrap();
        let groups: Vec<Group> = rows.into_iter().filter_map(|r| r.groups).collect();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "one");
    }
}
