//! Read-only web dashboard.
//!
//! Serves the same snapshot two ways: JSON at `/api/overview` and a
//! self-contained HTML page at `/`.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use ingot_core::gold::format_gold;
use ingot_db::{
    Member, MemberRepository, Price, PriceRepository, Purchase, PurchaseRepository,
    SettingsRepository,
};

use crate::state::AppState;

const TOP_MEMBER_LIMIT: i64 = 25;
const RECENT_PURCHASE_LIMIT: i64 = 15;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
}

/// Overview snapshot served as JSON and rendered as HTML
#[derive(Debug, Serialize)]
pub struct Overview {
    pub member_count: i64,
    pub purchase_count: i64,
    pub configured_guilds: i64,
    pub latest_price: Option<Price>,
    pub top_members: Vec<Member>,
    pub recent_purchases: Vec<Purchase>,
    pub generated_at: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Dashboard listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the router with all routes
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/overview", get(overview_handler))
        .route("/health", get(health_handler))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not found") })
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        service: "ingot-dashboard".to_string(),
    })
}

async fn gather_overview(state: &AppState) -> Result<Overview, ingot_db::DbError> {
    let pool = state.db.pool();
    Ok(Overview {
        member_count: MemberRepository::count(pool).await?,
        purchase_count: PurchaseRepository::count(pool).await?,
        configured_guilds: SettingsRepository::count(pool).await?,
        latest_price: PriceRepository::latest(pool).await?,
        top_members: MemberRepository::top_by_balance(pool, TOP_MEMBER_LIMIT).await?,
        recent_purchases: PurchaseRepository::recent(pool, RECENT_PURCHASE_LIMIT).await?,
        generated_at: Utc::now(),
    })
}

/// GET /api/overview
async fn overview_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match gather_overview(&state).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(e) => {
            error!("Overview query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match gather_overview(&state).await {
        Ok(overview) => Html(render_overview_html(&overview)).into_response(),
        Err(e) => {
            error!("Overview query failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// Escape text interpolated into HTML
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Shorten a Discord snowflake for display: first 4 + last 4 digits
fn short_discord_id(id: &str) -> String {
    if id.len() <= 8 {
        id.to_string()
    } else {
        format!("{}…{}", &id[..4], &id[id.len() - 4..])
    }
}

fn render_overview_html(overview: &Overview) -> String {
    let mut s = String::with_capacity(8 * 1024);

    s.push_str(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>Ingot Dashboard</title>\
         <style>\
         body{font-family:sans-serif;background:#1e1f22;color:#d2d5d9;margin:2rem}\
         h1{color:#f39c12}h2{color:#fff;margin-top:2rem}\
         table{border-collapse:collapse;width:100%;max-width:700px}\
         th,td{text-align:left;padding:6px 12px;border-bottom:1px solid #3b3d44}\
         th{color:#fff}\
         .stats{display:flex;gap:2rem}\
         .stat{background:#2b2d31;padding:1rem 2rem;border-radius:10px}\
         .stat b{display:block;font-size:1.6rem;color:#fff}\
         .stale{color:#e67e22}\
         </style></head><body><h1>Ingot</h1>",
    );

    let _ = write!(
        s,
        "<div class=\"stats\">\
         <div class=\"stat\"><b>{}</b>members</div>\
         <div class=\"stat\"><b>{}</b>purchases</div>\
         <div class=\"stat\"><b>{}</b>guilds configured</div>",
        overview.member_count, overview.purchase_count, overview.configured_guilds
    );
    match &overview.latest_price {
        Some(price) => {
            let stale = if price.is_stale() {
                " <span class=\"stale\">(stale)</span>"
            } else {
                ""
            };
            let _ = write!(
                s,
                "<div class=\"stat\"><b>${:.2}</b>per 1M gold{}</div>",
                price.usd_per_1m, stale
            );
        }
        None => s.push_str("<div class=\"stat\"><b>—</b>no price set</div>"),
    }
    s.push_str("</div>");

    s.push_str("<h2>Top balances</h2><table><tr><th>Member</th><th>Balance</th></tr>");
    for member in &overview.top_members {
        let _ = write!(
            s,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&short_discord_id(&member.discord_id)),
            format_gold(member.balance_gold)
        );
    }
    s.push_str("</table>");

    s.push_str(
        "<h2>Recent purchases</h2>\
         <table><tr><th>When</th><th>Member</th><th>Kind</th><th>Details</th><th>Cost</th></tr>",
    );
    for purchase in &overview.recent_purchases {
        let _ = write!(
            s,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            purchase.created_at.format("%Y-%m-%d %H:%M"),
            escape_html(&short_discord_id(&purchase.discord_id)),
            purchase.kind,
            escape_html(&purchase.details),
            format_gold(purchase.gold_cost)
        );
    }
    s.push_str("</table>");

    let _ = write!(
        s,
        "<p>Generated {}</p></body></html>",
        overview.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"x\" & 'y'</b>"),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_short_discord_id() {
        assert_eq!(short_discord_id("1234"), "1234");
        assert_eq!(short_discord_id("123456789012345678"), "1234…5678");
    }

    #[test]
    fn test_render_escapes_purchase_details() {
        let overview = Overview {
            member_count: 1,
            purchase_count: 1,
            configured_guilds: 0,
            latest_price: None,
            top_members: vec![],
            recent_purchases: vec![Purchase {
                id: 1,
                discord_id: "123456789012345678".to_string(),
                kind: ingot_db::PurchaseKind::Boost,
                details: "<script>alert(1)</script>".to_string(),
                gold_cost: 1_000_000,
                balance_after: 0,
                created_at: Utc::now(),
            }],
            generated_at: Utc::now(),
        };

        let html = render_overview_html(&overview);
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("no price set"));
    }
}
