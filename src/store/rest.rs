//! PostgREST client for the hosted reservations table.
//!
//! Thin HTTP wrapper. Column names on the wire are the backend's
//! (`nome`, `sala`, `data`, `inicio`, `fim`, `descricao`, `link_agenda`).
//! The backend keys reservations by the room's display name, not its id, so
//! every call translates through the catalog in both directions. Parsing is
//! kept in pure functions for testability.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{StoreConfig, default_catalog};
use crate::model::*;

use super::{ReservationStore, StoreError, check_row};

/// Postgres SQLSTATE for `exclusion_violation`.
const EXCLUSION_VIOLATION: &str = "23P01";

// =============================================================================
// CLIENT
// =============================================================================

pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    reservations_table: String,
    rooms_table: Option<String>,
}

impl RestStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url,
            api_key: config.api_key,
            reservations_table: config.reservations_table,
            rooms_table: config.rooms_table,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// One room's day. `sala` is the backend's room key.
    fn day_query(&self, sala: &str, date: NaiveDate) -> reqwest::RequestBuilder {
        self.http.get(self.table_url(&self.reservations_table)).query(&[
            ("select", "*".to_string()),
            ("sala", format!("eq.{sala}")),
            ("data", format!("eq.{date}")),
        ])
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, StoreError> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            tracing::warn!(status, "store request rejected");
            return Err(classify_failure(status, text));
        }
        Ok(text)
    }
}

#[async_trait]
impl ReservationStore for RestStore {
    async fn list_by_room_and_date(
        &self,
        room_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rooms = self.list_rooms().await?;
        let request = self.day_query(sala_for(&rooms, room_id), date);
        parse_reservations(&self.send(request).await?, &rooms)
    }

    async fn create(&self, reservation: NewReservation) -> Result<Reservation, StoreError> {
        let rooms = self.list_rooms().await?;
        let row = InsertRow::new(&reservation, sala_for(&rooms, &reservation.room_id));
        let request = self
            .http
            .post(self.table_url(&self.reservations_table))
            .header("Prefer", "return=representation")
            .json(&row);
        parse_reservations(&self.send(request).await?, &rooms)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed("insert returned no rows".into()))
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let Some(table) = &self.rooms_table else {
            return Ok(default_catalog());
        };
        let request = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*")]);
        parse_rooms(&self.send(request).await?)
    }

    async fn get(&self, id: &str) -> Result<Option<Reservation>, StoreError> {
        let rooms = self.list_rooms().await?;
        let request = self
            .http
            .get(self.table_url(&self.reservations_table))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        Ok(parse_reservations(&self.send(request).await?, &rooms)?.into_iter().next())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct InsertRow<'a> {
    nome: &'a str,
    sala: &'a str,
    data: String,
    inicio: String,
    fim: String,
    descricao: &'a str,
}

impl<'a> InsertRow<'a> {
    fn new(r: &'a NewReservation, sala: &'a str) -> Self {
        Self {
            nome: &r.name,
            sala,
            data: r.date.to_string(),
            inicio: format_hhmm(r.start),
            fim: format_hhmm(r.end),
            descricao: r.description.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Deserialize)]
struct ReservationRow {
    id: serde_json::Value,
    nome: Option<String>,
    sala: String,
    data: String,
    inicio: String,
    fim: String,
    descricao: Option<String>,
    link_agenda: Option<String>,
}

#[derive(Deserialize)]
struct RoomRow {
    id: serde_json::Value,
    #[serde(alias = "nome")]
    name: String,
    #[serde(default, alias = "capacidade")]
    capacity: u32,
    #[serde(default, alias = "descricao")]
    description: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default, alias = "imagem")]
    image: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

fn id_string(value: &serde_json::Value) -> Result<String, StoreError> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(StoreError::Malformed(format!("unusable id: {other}"))),
    }
}

/// Room id to the backend's `sala` key. Ids outside the catalog go out as-is.
pub(crate) fn sala_for<'a>(rooms: &'a [Room], room_id: &'a str) -> &'a str {
    rooms
        .iter()
        .find(|r| r.id == room_id)
        .map_or(room_id, |r| r.name.as_str())
}

/// `sala` back to a room id. Also accepts rows already keyed by id.
fn room_id_for(rooms: &[Room], sala: String) -> String {
    match rooms.iter().find(|r| r.name == sala || r.id == sala) {
        Some(room) => room.id.clone(),
        None => sala,
    }
}

fn empty_to_none(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parse a PostgREST array of reservation rows. An empty body is an empty list.
pub(crate) fn parse_reservations(text: &str, rooms: &[Room]) -> Result<Vec<Reservation>, StoreError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<ReservationRow> =
        serde_json::from_str(text).map_err(|e| StoreError::Malformed(e.to_string()))?;
    rows.into_iter()
        .map(|row| {
            let id = id_string(&row.id)?;
            let date = parse_date(&row.data)
                .ok_or_else(|| StoreError::Malformed(format!("bad date on {id}: {}", row.data)))?;
            let start = parse_time(&row.inicio)
                .ok_or_else(|| StoreError::Malformed(format!("bad start on {id}: {}", row.inicio)))?;
            let end = parse_time(&row.fim)
                .ok_or_else(|| StoreError::Malformed(format!("bad end on {id}: {}", row.fim)))?;
            let reservation = Reservation {
                id,
                room_id: room_id_for(rooms, row.sala),
                date,
                start,
                end,
                name: row.nome.unwrap_or_default(),
                description: empty_to_none(row.descricao),
                calendar_link: empty_to_none(row.link_agenda),
            };
            check_row(&reservation)?;
            Ok(reservation)
        })
        .collect()
}

pub(crate) fn parse_rooms(text: &str) -> Result<Vec<Room>, StoreError> {
    let rows: Vec<RoomRow> =
        serde_json::from_str(text).map_err(|e| StoreError::Malformed(e.to_string()))?;
    rows.into_iter()
        .map(|row| {
            Ok(Room {
                id: id_string(&row.id)?,
                name: row.name,
                capacity: row.capacity,
                description: row.description.unwrap_or_default(),
                tags: row.tags.unwrap_or_default(),
                image: empty_to_none(row.image),
            })
        })
        .collect()
}

/// Map a non-success response to a typed error. PostgREST reports constraint
/// failures as 409 with the SQLSTATE in the `code` field.
pub(crate) fn classify_failure(status: u16, body: String) -> StoreError {
    if status == 409 && body.contains(EXCLUSION_VIOLATION) {
        return StoreError::ExclusionViolation(body);
    }
    StoreError::Status { status, body }
}
