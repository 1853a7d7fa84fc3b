use chrono::{DateTime, NaiveDate, Utc};
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type PublicationId = Uuid;
pub type InteractionId = Uuid;
pub type ReviewId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Public part of a user account. Password hash never leaves the repository
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub birthdate: Option<NaiveDate>,
    pub is_admin: bool,
    pub is_validated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Apiv2Schema)]
/// What non-admin users get to see about other users
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, deserialize_with = "birthdate_from_json")]
    pub birthdate: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Profile update. Email is not part of it on purpose, it can't be changed
pub struct UserPatch {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(
        default,
        deserialize_with = "birthdate_from_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub birthdate: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Apiv2Schema)]
/// Fields that aren't strings are read as missing
pub struct LoginRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub authorization: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Apiv2Schema)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Apiv2Schema)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub token: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Apiv2Schema)]
/// Zero or values that aren't numbers are treated as absent
pub struct Pagination {
    #[serde(default, deserialize_with = "positive_from_query")]
    pub skip: Option<usize>,
    #[serde(default, deserialize_with = "positive_from_query")]
    pub take: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse<T> {
    pub status: String,
    pub user: T,
}

impl<T> UserResponse<T> {
    pub fn success(user: T) -> Self {
        Self {
            status: "success".to_string(),
            user,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeResponse {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetAllUsersResponse {
    pub users: Vec<User>,
}

/// Condition of the book. Serialized with the labels the frontend shows
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Apiv2Schema)]
pub enum BookState {
    #[serde(rename = "Nuevo")]
    New,
    #[serde(rename = "Como Nuevo")]
    LikeNew,
    #[serde(rename = "Usado")]
    Used,
    #[serde(rename = "Muy Usado")]
    VeryUsed,
}

impl BookState {
    pub fn code(&self) -> &'static str {
        match self {
            BookState::New => "NEW",
            BookState::LikeNew => "LIKE_NEW",
            BookState::Used => "USED",
            BookState::VeryUsed => "VERY_USED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "NEW" => Some(BookState::New),
            "LIKE_NEW" => Some(BookState::LikeNew),
            "USED" => Some(BookState::Used),
            "VERY_USED" => Some(BookState::VeryUsed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Apiv2Schema)]
pub enum PublicationType {
    #[serde(rename = "Venta")]
    Sell,
    #[serde(rename = "Permuta")]
    Trade,
    #[serde(rename = "Venta/Permuta")]
    SellTrade,
}

impl PublicationType {
    pub fn code(&self) -> &'static str {
        match self {
            PublicationType::Sell => "SELL",
            PublicationType::Trade => "TRADE",
            PublicationType::SellTrade => "SELL_TRADE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "SELL" => Some(PublicationType::Sell),
            "TRADE" => Some(PublicationType::Trade),
            "SELL_TRADE" => Some(PublicationType::SellTrade),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Apiv2Schema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationStatus {
    #[default]
    Available,
    Completed,
}

impl PublicationStatus {
    pub fn code(&self) -> &'static str {
        match self {
            PublicationStatus::Available => "AVAILABLE",
            PublicationStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "AVAILABLE" => Some(PublicationStatus::Available),
            "COMPLETED" => Some(PublicationStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Book listing created by a user
pub struct Publication {
    pub id: PublicationId,
    pub title: String,
    pub author: String,
    pub language: String,
    pub genres: Vec<String>,
    pub book_state: BookState,
    pub description: String,
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
    pub price: f64,
    pub image: String,
    pub book_id: Option<String>,
    pub owner_id: UserId,
    pub status: PublicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct NewPublication {
    pub title: String,
    pub author: String,
    pub language: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub book_state: BookState,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
    /// Missing, null or empty price means the book is given away for free
    #[serde(default, deserialize_with = "price_from_json")]
    pub price: f64,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub book_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Apiv2Schema)]
/// Fields of a publication that its owner is allowed to change
pub struct PublicationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BookState>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub publication_type: Option<PublicationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_price_from_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnerName {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Publication as shown in listings
pub struct PublicationListItem {
    #[serde(flatten)]
    pub publication: Publication,
    pub owner: OwnerName,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Publication as shown on its own page, owner flattened to the name
pub struct PublicationDetails {
    #[serde(flatten)]
    pub publication: Publication,
    pub owner: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Apiv2Schema)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Like,
    Trade,
}

impl InteractionType {
    pub fn code(&self) -> &'static str {
        match self {
            InteractionType::Like => "LIKE",
            InteractionType::Trade => "TRADE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "LIKE" => Some(InteractionType::Like),
            "TRADE" => Some(InteractionType::Trade),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Apiv2Schema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionStatus {
    #[default]
    Pending,
    Completed,
}

impl InteractionStatus {
    pub fn code(&self) -> &'static str {
        match self {
            InteractionStatus::Pending => "PENDING",
            InteractionStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PENDING" => Some(InteractionStatus::Pending),
            "COMPLETED" => Some(InteractionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Engagement of a user with somebody else's publication.
/// There is at most one interaction per (user, publication) pair
pub struct Interaction {
    pub id: InteractionId,
    pub user_id: UserId,
    /// None once the publication was deleted
    pub publication_id: Option<PublicationId>,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub status: InteractionStatus,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Apiv2Schema)]
pub struct NewInteraction {
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractionCreated {
    pub interaction: Interaction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionWithPublication {
    #[serde(flatten)]
    pub interaction: Interaction,
    pub publication: Publication,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractionWithUser {
    #[serde(flatten)]
    pub interaction: Interaction,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Rating and comment one user leaves about another
pub struct Review {
    pub id: ReviewId,
    pub rating: i32,
    pub comment: String,
    /// Author of the review
    pub user_id: UserId,
    pub reviewed_user_id: UserId,
    pub publication_id: Option<PublicationId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
    pub reviewed_user_id: UserId,
    #[serde(default)]
    pub publication_id: Option<PublicationId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingResponse {
    pub average: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// A set of publication recommendations for a user, never containing
/// own publications or publications the user already interacted with
pub struct Recommendations {
    /// Up to 4 publications sharing the most genres with the ones the user interacted with
    pub genre_match: Vec<Publication>,
    /// Up to 4 publications of authors the user already showed interest in
    pub author_match: Vec<Publication>,
    /// Up to 4 publications with the highest number of interactions
    pub most_popular: Vec<Publication>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Accepts numbers, numeric strings, empty strings and null for a price.
/// Empty strings and null end up as 0
fn price_from_value(value: serde_json::Value) -> Result<f64, String> {
    match value {
        serde_json::Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| "price is not a valid number".to_string()),
        serde_json::Value::String(text) if text.trim().is_empty() => Ok(0.0),
        serde_json::Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| format!("price {text} is not a number")),
        serde_json::Value::Null => Ok(0.0),
        other => Err(format!("price {other} is not a number")),
    }
}

fn price_from_json<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    price_from_value(value).map_err(serde::de::Error::custom)
}

/// Same as [`price_from_json`] but null leaves the price unchanged
fn optional_price_from_json<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        value => price_from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => Some(text),
        _ => None,
    })
}

fn positive_from_query<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text
        .and_then(|text| text.trim().parse().ok())
        .filter(|number: &usize| *number > 0))
}

/// Accepts plain dates as well as full timestamps, of which only the date is kept
fn birthdate_from_json<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.get(..10)
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("birthdate {text} is not a date")))
}
