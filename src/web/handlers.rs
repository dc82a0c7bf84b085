//! Page, API and update handlers

use crate::db::sqlite::models::Ticker;
use crate::error::AppError;
use crate::services::{
    DesktopView, MoversService, NewsService, QuotesService, RefreshScheduler, SearchService,
    ViewService,
};
use crate::session::MessageLevel;
use crate::state::AppState;
use crate::util::{normalize_symbol, price_change};
use crate::web::session_layer::SessionHandle;
use crate::web::types::*;
use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Health Check
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(StatusResponse::ok("stockwatch is running"))
}

/// GET /ping
pub async fn ping() -> StatusCode {
    StatusCode::OK
}

// ============================================================================
// Pages
// ============================================================================

/// GET /desktop
pub async fn desktop(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Json<DesktopView> {
    let mut session = session.lock().await;
    Json(ViewService::desktop_view(&state, &mut session).await)
}

/// GET /view/{symbol}?ts={days}
///
/// When the ticker itself cannot be loaded the visitor is sent back to the
/// dashboard with a message.
pub async fn view_ticker(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(symbol): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let mut session = session.lock().await;
    match ViewService::ticker_view(&state, &mut session, &symbol, query.ts).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => {
            warn!("Failed to load ticker {}: {}", symbol, e);
            let text = if e.is_not_found() {
                format!("Sorry, could not find ticker {}", normalize_symbol(&symbol))
            } else {
                format!("Sorry, failed to load ticker {}", normalize_symbol(&symbol))
            };
            session.flash(text, MessageLevel::Danger);
            Redirect::to("/desktop").into_response()
        }
    }
}

/// GET /view/{symbol}/{date}
pub async fn view_intraday(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path((symbol, date)): Path<(String, String)>,
) -> Response {
    let mut session = session.lock().await;
    match ViewService::intraday_view(&state, &mut session, &symbol, &date).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => {
            warn!("Failed to load {} on {}: {}", symbol, date, e);
            let symbol = normalize_symbol(&symbol);
            let text = if e.is_not_found() {
                format!("Sorry, could not find ticker {}", symbol)
            } else if matches!(e, AppError::Validation(_)) {
                format!("Sorry, {} is not a valid date", date)
            } else {
                format!("Sorry, failed to load ticker {}", symbol)
            };
            session.flash(text, MessageLevel::Danger);
            Redirect::to("/desktop").into_response()
        }
    }
}

/// GET /search/{kind}?q=
///
/// A ticker search goes straight to the best match.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(kind): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Redirect {
    let mut session = session.lock().await;
    if kind != "ticker" {
        error!("Unknown search kind: {}", kind);
        session.flash("Sorry, invalid search request", MessageLevel::Danger);
        return Redirect::to("/desktop");
    }

    let q = query.q.trim();
    if q.is_empty() {
        session.flash("Please enter a symbol or company name to search for", MessageLevel::Warning);
        return Redirect::to("/desktop");
    }

    match SearchService::search_tickers(&state, q).await {
        Ok(results) => match results.first() {
            Some(best) => Redirect::to(&format!("/view/{}", best.ticker_symbol)),
            None => {
                session.flash(format!("No tickers found for {}", q), MessageLevel::Warning);
                Redirect::to("/desktop")
            }
        },
        Err(e) => {
            warn!("Ticker search for {:?} failed: {}", q, e);
            session.flash(format!("Sorry, search for {} failed", q), MessageLevel::Danger);
            Redirect::to("/desktop")
        }
    }
}

// ============================================================================
// Manual refreshes
// ============================================================================

/// POST /update/{action}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(action): Path<String>,
    Query(query): Query<UpdateQuery>,
) -> Json<UpdateResponse> {
    info!("Update requested: {}", action);

    let (success, text) = match action.as_str() {
        "movers" => match MoversService::load_movers(&state).await {
            Ok(count) => (true, format!("pulled latest Morningstar movers ({})", count)),
            Err(e) => (false, format!("pulling latest Morningstar movers failed: {}", e)),
        },
        "news" => {
            let q = query.q.trim();
            if q.is_empty() {
                (false, "no query string found".to_string())
            } else {
                match NewsService::load_market_news(&state, q).await {
                    Ok(count) => (true, format!("pulled latest market news for {} ({})", q, count)),
                    Err(e) => (false, format!("pulling latest market news for {} failed: {}", q, e)),
                }
            }
        }
        other => {
            error!("Unknown update action: {}", other);
            (false, format!("unknown update action: {}", other))
        }
    };

    let level = if success {
        MessageLevel::Success
    } else {
        MessageLevel::Danger
    };

    let mut session = session.lock().await;
    session.flash(text, level);
    Json(UpdateResponse {
        action,
        success,
        messages: session.take_messages(),
    })
}

// ============================================================================
// REST API v1
// ============================================================================

/// GET /api/v1/{endpoint}
pub async fn api_v1(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
    Query(query): Query<ApiQuery>,
) -> Json<ApiEnvelope> {
    let mut envelope = ApiEnvelope::new(&endpoint);

    match endpoint.as_str() {
        "version" => envelope.succeed("ok"),
        "quotes" => api_quotes(&state, &query.symbols, &mut envelope).await,
        other => {
            error!("Call to unknown api endpoint: {}", other);
            envelope.fail("Failure: unknown endpoint");
        }
    }

    Json(envelope)
}

/// Quote fields per symbol: live while the market is open, otherwise from
/// the last two end-of-day rows
async fn api_quotes(state: &AppState, symbols: &str, envelope: &mut ApiEnvelope) {
    let mut tickers: Vec<Ticker> = Vec::new();
    for symbol in symbols.split(',').map(normalize_symbol) {
        if symbol.is_empty() {
            continue;
        }
        let ticker = match state.sqlite.get_ticker_by_symbol(&symbol) {
            Ok(Some(ticker)) => ticker,
            Ok(None) => {
                warn!("Failed to find ticker {}", symbol);
                continue;
            }
            Err(e) => {
                warn!("Failed to load ticker {}: {}", symbol, e);
                continue;
            }
        };

        let news = RefreshScheduler::ticker_news_status(state, &ticker);
        let last_checked = match news.last_checked {
            Some(at) => at
                .with_timezone(&state.market.tz)
                .format("%b %d %H:%M")
                .to_string(),
            None if news.updating_now => "checking now".to_string(),
            None => "not yet".to_string(),
        };
        envelope.put(&symbol, "last_checked_news", last_checked);
        envelope.put(&symbol, "updating_news_now", news.updating_now);
        tickers.push(ticker);
    }

    if state.is_market_open() {
        let symbols: Vec<String> = tickers.iter().map(|t| t.ticker_symbol.clone()).collect();
        let quotes = match QuotesService::get_quotes(state, &symbols).await {
            Ok(quotes) => quotes,
            Err(e) => {
                error!("Failed to get live quotes: {}", e);
                envelope.fail("Failure: could not load quote");
                return;
            }
        };

        for ticker in &tickers {
            let symbol = &ticker.ticker_symbol;
            let Some(quote) = quotes.get(symbol).filter(|q| q.price > 0.0) else {
                continue;
            };
            envelope.put(symbol, "quote_shareprice", dollars(quote.price));
            envelope.put(symbol, "quote_ask", dollars(quote.ask));
            envelope.put(symbol, "quote_asksize", quote.ask_size.to_string());
            envelope.put(symbol, "quote_bid", dollars(quote.bid));
            envelope.put(symbol, "quote_bidsize", quote.bid_size.to_string());
            envelope.put(symbol, "quote_dailymove", quote.daily_move());
            envelope.put(symbol, "quote_change", dollars(quote.change));
            envelope.put(symbol, "quote_change_pct", format!("{:.2}%", quote.change_pct));
            envelope.put(symbol, "quote_volume", quote.volume.to_string());
            if let Some(as_of) = quote.as_of {
                envelope.put(
                    symbol,
                    "quote_asof",
                    as_of.with_timezone(&state.market.tz).format("%b %-d %H:%M:%S").to_string(),
                );
            }
            envelope.put(
                symbol,
                "quote_dailyrange",
                format!("{} - {}", dollars(quote.day_low), dollars(quote.day_high)),
            );
        }
        envelope.data.insert("is_market_open".to_string(), "true".into());
        envelope.succeed("ok");
    } else {
        for ticker in &tickers {
            let symbol = &ticker.ticker_symbol;
            let dailies = match state.sqlite.get_last_two_dailies(ticker.id) {
                Ok(dailies) => dailies,
                Err(e) => {
                    error!("Failed to get last dailies for {}: {}", symbol, e);
                    continue;
                }
            };
            let Some(last) = dailies.first() else {
                continue;
            };

            let daily_move = state
                .sqlite
                .get_last_daily_move(ticker.id)
                .unwrap_or_else(|e| {
                    error!("Failed to get last daily move for {}: {}", symbol, e);
                    "unknown".to_string()
                });

            envelope.put(symbol, "quote_shareprice", dollars(last.close_price));
            envelope.put(symbol, "quote_dailymove", daily_move);
            if let Some((change, pct)) = dailies
                .get(1)
                .and_then(|prior| price_change(last.close_price, prior.close_price))
            {
                envelope.put(symbol, "quote_change", dollars(change));
                envelope.put(symbol, "quote_change_pct", format!("{:.2}%", pct));
            }
            envelope.put(symbol, "quote_volume", format!("{:.0}", last.volume));
            envelope.put(symbol, "quote_asof", last.price_date.format("%b %-d").to_string());
            envelope.put(
                symbol,
                "quote_dailyrange",
                format!("{} - {}", dollars(last.low_price), dollars(last.high_price)),
            );
        }
        envelope.data.insert("is_market_open".to_string(), "false".into());
        envelope.succeed("ok");
    }
}

fn dollars(amount: f64) -> String {
    format!("${:.2}", amount)
}
