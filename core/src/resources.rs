//! Resource operations built on `HttpClient` and the normalizers.
//!
//! Each operation fixes a path and a result type; envelope differences
//! between endpoints are absorbed here so callers always see one shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::UploadedFile;
use crate::error::ApiError;
use crate::http::MultipartFile;
use crate::http_client::HttpClient;
use crate::normalize::{safe_items, safe_page, unwrap_data, Page};
use crate::query::QueryParams;
use crate::session::SessionProvider;
use crate::transport::Transport;

pub const PROFILE_PATH: &str = "/members/profile";
pub const AVATAR_PATH: &str = "/members/profile/avatar";
pub const AVATAR_FIELD: &str = "avatar";
pub const POSTS_PATH: &str = "/feed/posts";
pub const CONVERSATIONS_PATH: &str = "/messages/conversations";
pub const GOALS_PATH: &str = "/goals";
pub const MY_EXPERT_PATH: &str = "/experts/my-expert";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Partial profile update. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Archived,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub status: GoalStatus,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub current_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expert {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub specialties: Vec<String>,
}

/// Path of a single post. The id is percent-encoded as one segment.
fn post_path(post_id: &str) -> String {
    format!("{POSTS_PATH}/{}", urlencoding::encode(post_id))
}

fn messages_path(conversation_id: &str) -> String {
    format!(
        "{CONVERSATIONS_PATH}/{}/messages",
        urlencoding::encode(conversation_id)
    )
}

/// Deserialize a single-object response, unwrapping `{data:{...}}`.
fn decode_object<R: for<'de> Deserialize<'de>>(value: &Value) -> Result<R, ApiError> {
    let inner = unwrap_data(value)
        .ok_or_else(|| ApiError::Deserialization("expected a JSON object".to_string()))?;
    R::deserialize(inner).map_err(|e| ApiError::Deserialization(e.to_string()))
}

impl<T: Transport, S: SessionProvider> HttpClient<T, S> {
    pub async fn profile(&self) -> Result<Profile, ApiError> {
        decode_object(&self.get(PROFILE_PATH, None).await?)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        decode_object(&self.patch(PROFILE_PATH, Some(update)).await?)
    }

    pub async fn upload_avatar(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, ApiError> {
        let file = MultipartFile {
            field_name: AVATAR_FIELD.to_string(),
            file_name: file_name.to_string(),
            mime_type: Some(mime_type.to_string()),
            bytes,
        };
        self.upload_file(AVATAR_PATH, file).await
    }

    pub async fn feed(&self, page: u32, limit: u32) -> Result<Page<Post>, ApiError> {
        let params = QueryParams::new().with("page", page).with("limit", limit);
        Ok(safe_page(&self.get(POSTS_PATH, Some(&params)).await?))
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<Post, ApiError> {
        decode_object(&self.post(POSTS_PATH, Some(post)).await?)
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.delete(&post_path(post_id)).await?;
        Ok(())
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        Ok(safe_items(&self.get(CONVERSATIONS_PATH, None).await?))
    }

    pub async fn send_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> Result<Message, ApiError> {
        decode_object(&self.post(&messages_path(conversation_id), Some(message)).await?)
    }

    /// Goals, optionally filtered by status.
    pub async fn goals(&self, status: Option<GoalStatus>) -> Result<Vec<Goal>, ApiError> {
        let params = QueryParams::new().with_opt("status", status.map(GoalStatus::as_str));
        Ok(safe_items(&self.get(GOALS_PATH, Some(&params)).await?))
    }

    /// The member's assigned expert. `None` when the server has none (404).
    pub async fn my_expert(&self) -> Result<Option<Expert>, ApiError> {
        match self.get(MY_EXPERT_PATH, None).await {
            Ok(value) => decode_object(&value).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ids_are_encoded_as_one_segment() {
        assert_eq!(post_path("p1"), "/feed/posts/p1");
        assert_eq!(post_path("a/b?c"), "/feed/posts/a%2Fb%3Fc");
        assert_eq!(post_path("x#y"), "/feed/posts/x%23y");
        assert_eq!(
            messages_path("c/1?x=2"),
            "/messages/conversations/c%2F1%3Fx%3D2/messages"
        );
    }

    #[test]
    fn decode_object_unwraps_data() {
        let value = json!({"data": {"id": "e1", "name": "Coach Kim"}});
        let expert: Expert = decode_object(&value).unwrap();
        assert_eq!(expert.name, "Coach Kim");
        assert!(expert.specialties.is_empty());
    }

    #[test]
    fn decode_object_rejects_non_object() {
        let err = decode_object::<Expert>(&json!([1])).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn profile_update_omits_unset_fields() {
        let update = ProfileUpdate {
            bio: Some("Father of two".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"bio": "Father of two"}));
    }

    #[test]
    fn goal_status_wire_names() {
        assert_eq!(serde_json::to_value(GoalStatus::Completed).unwrap(), json!("completed"));
        assert_eq!(GoalStatus::Active.as_str(), "active");
    }
}
