//! # API Routes
//!
//! Maps HTTP requests onto scheduler operations. Every failure is turned
//! into a structured JSON response here; nothing below this layer sees
//! HTTP.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Added /reminders/{id}/status and /health
//! - 1.0.0: Timed, event and recurring creation, listing and event triggers

use crate::core::ReminderResult;
use crate::features::reminders::{ReminderId, ReminderScheduler, ReminderSpec};
use crate::http::protocol::{
    CreateEventRequest, CreateRecurringRequest, CreateTimedRequest, CreatedResponse,
    HealthResponse, HttpRequest, HttpResponse, StatusErrorResponse, TriggerResponse,
};
use log::warn;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;

/// Dispatch a request to its handler
pub fn route(scheduler: &ReminderScheduler, request: &HttpRequest) -> HttpResponse {
    if request.method == "OPTIONS" {
        return HttpResponse::no_content();
    }

    let segments: Vec<&str> = request
        .path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("GET", ["reminders"]) => HttpResponse::json(200, &scheduler.list()),
        ("POST", ["reminders"]) => {
            create(scheduler, request, CreateTimedRequest::into_spec, None)
        }
        ("POST", ["reminders", "event"]) => {
            create(scheduler, request, CreateEventRequest::into_spec, None)
        }
        ("POST", ["reminders", "recurring"]) => create(
            scheduler,
            request,
            CreateRecurringRequest::into_spec,
            Some("Reminder created successfully."),
        ),
        ("GET", ["reminders", id, "status"]) => status(scheduler, id),
        ("POST", ["events", name]) => trigger(scheduler, name),
        ("GET", ["health"]) => HttpResponse::json(
            200,
            &HealthResponse {
                status: "ok",
                stats: scheduler.stats(),
            },
        ),
        (_, ["reminders"])
        | (_, ["reminders", "event"])
        | (_, ["reminders", "recurring"])
        | (_, ["reminders", _, "status"])
        | (_, ["events", _])
        | (_, ["health"]) => HttpResponse::failure(405, "Method not allowed"),
        _ => HttpResponse::failure(404, "Not found"),
    }
}

/// Parse a JSON body; an empty body reads as all fields missing
fn parse_body<T>(request: &HttpRequest) -> Result<T, HttpResponse>
where
    T: DeserializeOwned + Default,
{
    if request.body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(&request.body).map_err(|e| {
        warn!("Rejected {} {}: invalid JSON: {e}", request.method, request.path);
        HttpResponse::failure(400, &format!("Invalid JSON body: {e}"))
    })
}

fn create<T, F>(
    scheduler: &ReminderScheduler,
    request: &HttpRequest,
    into_spec: F,
    message: Option<&str>,
) -> HttpResponse
where
    T: DeserializeOwned + Default,
    F: FnOnce(T) -> ReminderResult<ReminderSpec>,
{
    let body = match parse_body::<T>(request) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match into_spec(body).and_then(|spec| scheduler.create(spec)) {
        Ok(reminder) => HttpResponse::json(
            201,
            &CreatedResponse {
                success: true,
                reminder,
                message: message.map(String::from),
            },
        ),
        Err(e) => {
            warn!("Rejected {} {}: {e}", request.method, request.path);
            HttpResponse::from_error(&e)
        }
    }
}

fn status(scheduler: &ReminderScheduler, raw_id: &str) -> HttpResponse {
    let not_found = || {
        HttpResponse::json(
            404,
            &StatusErrorResponse {
                status: "error",
                message: "Reminder not found".to_string(),
            },
        )
    };

    let Ok(id) = raw_id.parse::<ReminderId>() else {
        return not_found();
    };

    match scheduler.status(id) {
        Ok(status) => HttpResponse::json(200, &status),
        Err(_) => not_found(),
    }
}

fn trigger(scheduler: &ReminderScheduler, raw_name: &str) -> HttpResponse {
    let name = match percent_decode_str(raw_name).decode_utf8() {
        Ok(name) => name.into_owned(),
        Err(_) => return HttpResponse::failure(400, "Event name is not valid UTF-8"),
    };

    let triggered = scheduler.trigger_event(&name);
    HttpResponse::json(
        200,
        &TriggerResponse {
            success: true,
            event: name,
            reminders_triggered: triggered,
        },
    )
}
