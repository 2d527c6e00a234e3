use crate::errors::AppError;
use crate::models::{
    parse_date, A1cOutcome, A1cQuery, AddRecordForm, AddRecordRequest, ChartResponse,
    EditRecordRequest, LevelInput, Record, RecordsQuery, RecordsResponse, SortOrder,
};
use crate::state::AppState;
use crate::storage::record_key;
use crate::ui::render_index;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    Form, Json,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(render_index(&session.sorted(SortOrder::Desc)))
}

pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<RecordsQuery>,
) -> Json<RecordsResponse> {
    let session = state.session.lock().await;
    let records = match query.order {
        Some(order) => session.sorted(order),
        None => session.records(),
    };
    Json(RecordsResponse { records })
}

pub async fn get_record(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Record>, AppError> {
    let date = path_date(&date)?;
    let session = state.session.lock().await;
    let key = session
        .key_for(&date)
        .map(str::to_owned)
        .unwrap_or_else(|| record_key(&date));
    session
        .store()
        .fetch(&key)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no record dated {key}")))
}

pub async fn create_record(
    State(state): State<AppState>,
    Json(payload): Json<AddRecordRequest>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let record = add_record(&state, payload.blood_sugar.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn add_record_form(
    State(state): State<AppState>,
    Form(form): Form<AddRecordForm>,
) -> Result<Redirect, AppError> {
    add_record(&state, Some(&LevelInput::Text(form.blood_sugar))).await?;
    Ok(Redirect::to("/"))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(payload): Json<EditRecordRequest>,
) -> Result<Json<Record>, AppError> {
    let original = path_date(&date)?;
    let new_date = match payload.date.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            parse_date(raw).ok_or_else(|| AppError::bad_request(format!("invalid date '{raw}'")))?,
        ),
    };

    let mut session = state.session.lock().await;
    let record = session
        .edit(&original, payload.blood_sugar.as_ref(), new_date)
        .await
        .inspect_err(|err| warn!("edit failed: {err}"))?;
    info!(from = %record_key(&original), to = %record_key(&record.date), "record edited");
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<StatusCode, AppError> {
    let date = path_date(&date)?;
    let mut session = state.session.lock().await;
    session
        .delete(&date)
        .await
        .inspect_err(|err| warn!("delete failed: {err}"))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_a1c(
    State(state): State<AppState>,
    Query(query): Query<A1cQuery>,
) -> Result<Json<A1cOutcome>, AppError> {
    let months = match (query.window, query.months) {
        (Some(window), _) => window.months(),
        (None, Some(months)) => months,
        (None, None) => {
            return Err(AppError::bad_request(
                "pass a window (weekly, monthly, quarterly, semiannual) or months",
            ))
        }
    };

    let session = state.session.lock().await;
    Ok(Json(session.a1c(months, Utc::now())?))
}

pub async fn get_chart(State(state): State<AppState>) -> Json<ChartResponse> {
    let session = state.session.lock().await;
    Json(session.chart())
}

async fn add_record(state: &AppState, level: Option<&LevelInput>) -> Result<Record, AppError> {
    let mut session = state.session.lock().await;
    let record = session
        .add(level, Utc::now())
        .await
        .inspect_err(|err| warn!("add failed: {err}"))?;
    Ok(record)
}

fn path_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.strip_prefix(crate::storage::RECORD_PREFIX).unwrap_or(raw);
    parse_date(raw).ok_or_else(|| AppError::bad_request(format!("invalid date '{raw}'")))
}
